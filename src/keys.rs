//! Key material and encoding helpers.
//!
//! Public keys are x-only: a 32-byte x-coordinate whose point is taken to have
//! an even Y coordinate. A [`Keypair`] keeps the signer's full public point
//! because signing needs the parity of its Y coordinate.

use std::fmt;
use std::hash::{Hash, Hasher};

use crypto_rs::secp256k1::{Secp256k1Point, Secp256k1Scalar};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Big-endian encoding of the secp256k1 group order.
pub(crate) const CURVE_ORDER_BE: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// Errors for loading or creating key material.
#[derive(Debug, Error, PartialEq)]
pub enum KeyError {
    /// The bytes are not the x-coordinate of any curve point.
    #[error("invalid x-only public key")]
    InvalidPublicKey,
    /// The secret key is zero or not below the group order.
    #[error("invalid secret key")]
    InvalidSecretKey,
}

/// Parses a big-endian scalar that must already be below the group order.
///
/// Tweaks, partial signatures and secret keys are rejected rather than
/// reduced when they overflow, unlike hash outputs which go straight through
/// [`Secp256k1Scalar::from_bytes_be`].
pub(crate) fn scalar_from_bytes(bytes: &[u8; 32]) -> Option<Secp256k1Scalar> {
    if *bytes >= CURVE_ORDER_BE {
        return None;
    }
    Some(Secp256k1Scalar::from_bytes_be(bytes))
}

pub(crate) fn scalar_to_bytes(s: &Secp256k1Scalar) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&s.to_bytes_be());
    out
}

pub(crate) fn is_infinity(p: &Secp256k1Point) -> bool {
    *p == Secp256k1Point::identity()
}

/// The 32-byte x-coordinate of a non-identity point.
pub(crate) fn x_bytes(p: &Secp256k1Point) -> [u8; 32] {
    let c = p.to_bytes_compressed();
    let mut x = [0u8; 32];
    x.copy_from_slice(&c[1..33]);
    x
}

/// The point with x-coordinate `x` and even Y, if one exists.
pub(crate) fn lift_x(x: &[u8; 32]) -> Option<Secp256k1Point> {
    let mut buf = [0u8; 33];
    buf[0] = 0x02;
    buf[1..].copy_from_slice(x);
    Secp256k1Point::from_bytes_compressed(&buf)
}

/// An x-only public key (BIP340 convention: implicit even Y).
#[derive(Clone)]
pub struct XOnlyPublicKey {
    bytes: [u8; 32],
    point: Secp256k1Point,
}

impl XOnlyPublicKey {
    /// Parses a 32-byte x-only key.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        let point = lift_x(bytes).ok_or(KeyError::InvalidPublicKey)?;
        Ok(Self {
            bytes: *bytes,
            point,
        })
    }

    /// Drops the parity of a (non-identity) point.
    pub fn from_point(p: &Secp256k1Point) -> Self {
        debug_assert!(!is_infinity(p), "x-only key of the point at infinity");
        let point = p.normalize_parity();
        Self {
            bytes: x_bytes(&point),
            point,
        }
    }

    /// The 32-byte x-coordinate.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }

    /// Borrowed form of [`XOnlyPublicKey::to_bytes`].
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// The even-Y point for this key.
    pub fn point(&self) -> &Secp256k1Point {
        &self.point
    }
}

impl PartialEq for XOnlyPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for XOnlyPublicKey {}

impl Hash for XOnlyPublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Debug for XOnlyPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("XOnlyPublicKey")
            .field(&hex::encode(self.bytes))
            .finish()
    }
}

impl fmt::Display for XOnlyPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.bytes))
    }
}

/// A signer's secret key together with its full public point.
///
/// The secret bytes are wiped when the keypair is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Keypair {
    secret: [u8; 32],
    #[zeroize(skip)]
    public: Secp256k1Point,
}

impl Keypair {
    /// Loads a keypair from a 32-byte big-endian secret key.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Result<Self, KeyError> {
        let sk = scalar_from_bytes(secret).ok_or(KeyError::InvalidSecretKey)?;
        if sk.is_zero() {
            return Err(KeyError::InvalidSecretKey);
        }
        let public = Secp256k1Point::generator() * &sk;
        Ok(Self {
            secret: *secret,
            public,
        })
    }

    /// Samples a fresh keypair from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        let sk = loop {
            let s = Secp256k1Scalar::random(&mut rng);
            if !s.is_zero() {
                break s;
            }
        };
        Self {
            secret: scalar_to_bytes(&sk),
            public: Secp256k1Point::generator() * &sk,
        }
    }

    /// The full public point, including its Y parity.
    pub fn public_key(&self) -> &Secp256k1Point {
        &self.public
    }

    pub fn x_only_public_key(&self) -> XOnlyPublicKey {
        XOnlyPublicKey::from_point(&self.public)
    }

    pub(crate) fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }

    pub(crate) fn secret_scalar(&self) -> Secp256k1Scalar {
        Secp256k1Scalar::from_bytes_be(&self.secret)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public.to_bytes_compressed()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn sk(byte: u8) -> [u8; 32] {
        let mut b = [0u8; 32];
        b[31] = byte;
        b
    }

    #[test]
    fn generator_x_only_roundtrip() {
        let g = Secp256k1Point::generator();
        let pk = XOnlyPublicKey::from_point(&g);
        let parsed = XOnlyPublicKey::from_bytes(pk.as_bytes()).unwrap();
        assert_eq!(parsed, pk);
        assert_eq!(parsed.point(), &g);
    }

    #[test]
    fn x_only_drops_parity() {
        let g = Secp256k1Point::generator();
        let neg = -g.clone();
        assert_eq!(XOnlyPublicKey::from_point(&g), XOnlyPublicKey::from_point(&neg));
        assert!(!XOnlyPublicKey::from_point(&neg).point().y_is_odd());
    }

    #[test]
    fn rejects_x_not_on_curve() {
        // 7 is not a quadratic residue mod p, so no point has x = 0.
        let x = [0u8; 32];
        assert_eq!(
            XOnlyPublicKey::from_bytes(&x),
            Err(KeyError::InvalidPublicKey)
        );
    }

    #[test]
    fn secret_key_range() {
        assert_eq!(
            Keypair::from_secret_bytes(&[0u8; 32]).unwrap_err(),
            KeyError::InvalidSecretKey
        );
        assert_eq!(
            Keypair::from_secret_bytes(&CURVE_ORDER_BE).unwrap_err(),
            KeyError::InvalidSecretKey
        );
        let kp = Keypair::from_secret_bytes(&sk(3)).unwrap();
        let three = Secp256k1Scalar::new(BigUint::from(3u8));
        assert_eq!(kp.public_key(), &(Secp256k1Point::generator() * &three));
    }

    #[test]
    fn scalar_encoding() {
        let s = Secp256k1Scalar::new(BigUint::from(0x0102u16));
        let b = scalar_to_bytes(&s);
        assert_eq!(&b[30..], &[0x01, 0x02]);
        assert!(b[..30].iter().all(|&x| x == 0));
        assert_eq!(scalar_to_bytes(&Secp256k1Scalar::zero()), [0u8; 32]);
        assert_eq!(scalar_from_bytes(&b), Some(s));
        assert_eq!(scalar_from_bytes(&CURVE_ORDER_BE), None);
    }

    #[test]
    fn range_check_boundary() {
        let mut below = CURVE_ORDER_BE;
        below[31] -= 1;
        assert_eq!(scalar_from_bytes(&below), Some(-Secp256k1Scalar::one()));
        assert_eq!(scalar_to_bytes(&-Secp256k1Scalar::one()), below);
    }

    #[test]
    fn random_keypairs_differ() {
        let a = Keypair::random();
        let b = Keypair::random();
        assert_ne!(a.x_only_public_key(), b.x_only_public_key());
    }
}
