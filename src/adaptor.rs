//! Adaptor signatures.
//!
//! Processing a session with an adaptor point `T = t*G` makes the aggregate
//! signature a pre-signature: it only becomes a valid signature once the
//! adaptor secret `t` is added to its `s` value. Conversely, anyone holding
//! both the pre-signature and the final signature learns `t`.
//!
//! The sign of `t` follows the parity of the final nonce, as reported by
//! [`crate::Session::nonce_parity`].

use std::fmt;

use crypto_rs::secp256k1::{Secp256k1Point, Secp256k1Scalar};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::keys::{scalar_from_bytes, scalar_to_bytes};

/// Errors for adaptor operations.
#[derive(Debug, Error, PartialEq)]
pub enum AdaptorError {
    #[error("signature s value is not below the group order")]
    SignatureOverflow,
    #[error("adaptor secret is zero or not below the group order")]
    SecretOverflow,
}

/// The secret scalar `t` behind an adaptor point `T = t*G`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AdaptorSecret([u8; 32]);

impl AdaptorSecret {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, AdaptorError> {
        match scalar_from_bytes(bytes) {
            Some(t) if !t.is_zero() => Ok(Self(*bytes)),
            _ => Err(AdaptorError::SecretOverflow),
        }
    }

    /// Samples an adaptor secret from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        loop {
            let t = Secp256k1Scalar::random(&mut rng);
            if !t.is_zero() {
                return Self(scalar_to_bytes(&t));
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The adaptor point `T = t*G` to pass to [`crate::Session::new`].
    pub fn adaptor_point(&self) -> Secp256k1Point {
        match scalar_from_bytes(&self.0) {
            Some(t) => Secp256k1Point::generator() * &t,
            None => Secp256k1Point::identity(),
        }
    }
}

impl fmt::Debug for AdaptorSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdaptorSecret(..)")
    }
}

fn sig_scalar(sig: &[u8; 64]) -> Result<Secp256k1Scalar, AdaptorError> {
    let mut s = [0u8; 32];
    s.copy_from_slice(&sig[32..]);
    scalar_from_bytes(&s).ok_or(AdaptorError::SignatureOverflow)
}

/// Turns a pre-signature into a signature using the adaptor secret.
pub fn adapt(
    pre_sig: &[u8; 64],
    sec_adaptor: &[u8; 32],
    nonce_parity: bool,
) -> Result<[u8; 64], AdaptorError> {
    let s = sig_scalar(pre_sig)?;
    let mut t = scalar_from_bytes(sec_adaptor).ok_or(AdaptorError::SecretOverflow)?;
    if nonce_parity {
        t = -t;
    }
    let mut sig = *pre_sig;
    sig[32..].copy_from_slice(&scalar_to_bytes(&(s + &t)));
    Ok(sig)
}

/// Recovers the adaptor secret from a signature and its pre-signature.
pub fn extract_adaptor(
    sig: &[u8; 64],
    pre_sig: &[u8; 64],
    nonce_parity: bool,
) -> Result<[u8; 32], AdaptorError> {
    let s = sig_scalar(sig)?;
    let s_pre = sig_scalar(pre_sig)?;
    let mut t = s + &(-s_pre);
    if nonce_parity {
        t = -t;
    }
    Ok(scalar_to_bytes(&t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(byte: u8) -> [u8; 32] {
        let mut t = [0u8; 32];
        t[0] = 0x17;
        t[31] = byte;
        t
    }

    #[test]
    fn adapt_then_extract_recovers_secret() {
        let mut pre_sig = [0u8; 64];
        pre_sig[..32].copy_from_slice(&[0xaa; 32]);
        pre_sig[32..].copy_from_slice(&secret(0x55));
        let t = secret(0x99);
        for parity in [false, true] {
            let sig = adapt(&pre_sig, &t, parity).unwrap();
            assert_eq!(&sig[..32], &pre_sig[..32]);
            assert_ne!(sig, pre_sig);
            assert_eq!(extract_adaptor(&sig, &pre_sig, parity).unwrap(), t);
        }
    }

    #[test]
    fn wrong_parity_extracts_negated_secret() {
        let pre_sig = [0x01u8; 64];
        let t = secret(0x02);
        let sig = adapt(&pre_sig, &t, false).unwrap();
        assert_ne!(extract_adaptor(&sig, &pre_sig, true).unwrap(), t);
    }

    #[test]
    fn adaptor_secret_validation() {
        assert_eq!(
            AdaptorSecret::from_bytes(&[0u8; 32]).unwrap_err(),
            AdaptorError::SecretOverflow
        );
        let t = AdaptorSecret::from_bytes(&secret(1)).unwrap();
        assert_eq!(t.as_bytes(), &secret(1));
        let a = AdaptorSecret::random();
        let b = AdaptorSecret::random();
        assert_ne!(a.adaptor_point(), b.adaptor_point());
    }

    #[test]
    fn rejects_overflowing_inputs() {
        let pre_sig = [0xffu8; 64];
        assert_eq!(
            adapt(&pre_sig, &secret(1), false).unwrap_err(),
            AdaptorError::SignatureOverflow
        );
        let ok_sig = [0x01u8; 64];
        assert_eq!(
            adapt(&ok_sig, &[0xff; 32], false).unwrap_err(),
            AdaptorError::SecretOverflow
        );
        assert_eq!(
            extract_adaptor(&pre_sig, &ok_sig, false).unwrap_err(),
            AdaptorError::SignatureOverflow
        );
    }
}
