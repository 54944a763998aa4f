//! Per-message signing session.
//!
//! Processing the aggregate nonce together with the message and the key
//! aggregation cache yields everything the signers and the aggregator need:
//!
//! - the nonce coefficient `b`,
//! - the final nonce `R = R1 + b*R2 (+ T)` where `T` is an optional adaptor point,
//! - the parity of `R` (signers negate their nonces when it is odd),
//! - the BIP340 challenge `e`,
//! - `e * tweak`, which the aggregator adds once for the whole tweak chain.

use crypto_rs::secp256k1::{Secp256k1Point, Secp256k1Scalar};
use thiserror::Error;
use tracing::{debug, warn};

use crate::challenge::{compute_challenge, nonce_coefficient};
use crate::keyagg::KeyAggCache;
use crate::keys::{is_infinity, x_bytes};
use crate::nonce::AggregateNonce;

/// Errors for session processing.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    /// The final nonce is the point at infinity. Restart with fresh nonces.
    #[error("final nonce is the point at infinity")]
    NonceInfinity,
}

/// Read-only state derived once per (cache, aggregate nonce, message, adaptor).
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub(crate) fin_nonce_x: [u8; 32],
    pub(crate) fin_nonce_parity: bool,
    pub(crate) nonce_coef: Secp256k1Scalar,
    pub(crate) challenge: Secp256k1Scalar,
    /// `e * tweak`, negated when the aggregate key has odd Y.
    pub(crate) s_part: Secp256k1Scalar,
}

impl Session {
    /// Processes the aggregate nonce for signing `msg` under `cache`.
    ///
    /// # Arguments
    /// - `aggnonce`: Sum of every signer's public nonce.
    /// - `msg`: The 32-byte message to sign.
    /// - `cache`: The key aggregation cache, with any tweaks already applied.
    /// - `adaptor`: Optional adaptor point `T`. With one, the resulting aggregate
    ///   signature is a pre-signature; see [`crate::adaptor`].
    ///
    /// # Returns
    /// The session, or [`SessionError::NonceInfinity`] when the final nonce is the
    /// point at infinity. Signers must then start over with fresh nonces.
    pub fn new(
        aggnonce: &AggregateNonce,
        msg: &[u8; 32],
        cache: &KeyAggCache,
        adaptor: Option<&Secp256k1Point>,
    ) -> Result<Self, SessionError> {
        let agg_pk_x = x_bytes(&cache.pk);

        let b = nonce_coefficient(aggnonce, &agg_pk_x, msg);
        let mut R = aggnonce.R1.clone() + &(&aggnonce.R2 * &b);
        if let Some(T) = adaptor {
            R = R + T;
        }
        if is_infinity(&R) {
            warn!("final nonce is infinity, signers must draw fresh nonces");
            return Err(SessionError::NonceInfinity);
        }

        let fin_nonce_parity = R.y_is_odd();
        let fin_nonce_x = x_bytes(&R);
        let e = compute_challenge(&fin_nonce_x, &agg_pk_x, msg);

        let s_part = if cache.tweak.is_zero() {
            Secp256k1Scalar::zero()
        } else {
            let et = &e * &cache.tweak;
            if cache.pk.y_is_odd() { -et } else { et }
        };

        debug!(
            nonce_parity = fin_nonce_parity,
            adaptor = adaptor.is_some(),
            "processed aggregate nonce"
        );
        Ok(Session {
            fin_nonce_x,
            fin_nonce_parity,
            nonce_coef: b,
            challenge: e,
            s_part,
        })
    }

    /// Parity of the final nonce. Needed to adapt or extract with an adaptor.
    pub fn nonce_parity(&self) -> bool {
        self.fin_nonce_parity
    }

    /// x-coordinate of the final nonce, the first half of the signature.
    pub fn final_nonce_x(&self) -> &[u8; 32] {
        &self.fin_nonce_x
    }

    /// The BIP340 challenge `e` of this session.
    pub fn challenge(&self) -> &Secp256k1Scalar {
        &self.challenge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::XOnlyPublicKey;
    use crate::nonce::PublicNonce;
    use num_bigint::BigUint;

    fn scalar(k: u64) -> Secp256k1Scalar {
        Secp256k1Scalar::new(BigUint::from(k))
    }

    fn cache() -> KeyAggCache {
        let pks: Vec<_> = [2u64, 3]
            .iter()
            .map(|&k| XOnlyPublicKey::from_point(&(Secp256k1Point::generator() * &scalar(k))))
            .collect();
        KeyAggCache::new(&pks).unwrap()
    }

    #[test]
    fn final_nonce_combines_components() {
        let g = Secp256k1Point::generator();
        let R1 = g.clone() * &scalar(10);
        let R2 = g.clone() * &scalar(20);
        let agg = AggregateNonce::sum(&[PublicNonce::new(R1.clone(), R2.clone()).unwrap()]).unwrap();
        let msg = [4u8; 32];
        let c = cache();
        let session = Session::new(&agg, &msg, &c, None).unwrap();
        let expected = R1 + &(&R2 * &session.nonce_coef);
        assert_eq!(session.final_nonce_x(), &x_bytes(&expected));
        assert_eq!(session.nonce_parity(), expected.y_is_odd());
        assert_eq!(
            session.challenge(),
            &compute_challenge(&x_bytes(&expected), &x_bytes(&c.pk), &msg)
        );
        assert!(session.s_part.is_zero());
    }

    #[test]
    fn adaptor_shifts_final_nonce() {
        let g = Secp256k1Point::generator();
        let agg = AggregateNonce::sum(&[PublicNonce::new(
            g.clone() * &scalar(10),
            g.clone() * &scalar(20),
        )
        .unwrap()])
        .unwrap();
        let msg = [4u8; 32];
        let c = cache();
        let plain = Session::new(&agg, &msg, &c, None).unwrap();
        let T = g.clone() * &scalar(99);
        let adapted = Session::new(&agg, &msg, &c, Some(&T)).unwrap();
        assert_eq!(plain.nonce_coef, adapted.nonce_coef);
        assert_ne!(plain.final_nonce_x(), adapted.final_nonce_x());
    }

    #[test]
    fn infinite_final_nonce_fails() {
        // R1 = G, R2 = G, adaptor = -(1 + b)*G cancels the final nonce.
        let g = Secp256k1Point::generator();
        let agg = AggregateNonce::sum(&[PublicNonce::new(g.clone(), g.clone()).unwrap()]).unwrap();
        let msg = [6u8; 32];
        let c = cache();
        let b = Session::new(&agg, &msg, &c, None).unwrap().nonce_coef;
        let T = -(g.clone() * &(Secp256k1Scalar::one() + &b));
        assert_eq!(
            Session::new(&agg, &msg, &c, Some(&T)).unwrap_err(),
            SessionError::NonceInfinity
        );
    }

    #[test]
    fn tweak_term_present_only_when_tweaked() {
        let g = Secp256k1Point::generator();
        let agg = AggregateNonce::sum(&[PublicNonce::new(
            g.clone() * &scalar(5),
            g.clone() * &scalar(6),
        )
        .unwrap()])
        .unwrap();
        let msg = [8u8; 32];
        let mut c = cache();
        let mut t = [0u8; 32];
        t[31] = 42;
        c.ec_tweak_add(&t).unwrap();
        let session = Session::new(&agg, &msg, &c, None).unwrap();
        let et = session.challenge().clone() * &scalar(42);
        let expected = if c.aggregate_pubkey().y_is_odd() { -et } else { et };
        assert_eq!(session.s_part, expected);
    }
}
