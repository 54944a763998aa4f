//! Hash-derived scalars of a signing session.
//!
//! ```text
//! b = H_tag("MuSig/noncecoef", aggnonce || X.x || m) mod n
//! e = H_tag("BIP0340/challenge", R.x || X.x || m) mod n
//! ```
//!
//! `e` is exactly the BIP340 challenge, so the aggregate signature verifies
//! with an ordinary single-key Schnorr verifier.

use crypto_rs::secp256k1::Secp256k1Scalar;

use crate::nonce::AggregateNonce;
use crate::tagged;

/// Nonce coefficient `b` binding the aggregate nonce to the key and message.
pub(crate) fn nonce_coefficient(
    aggnonce: &AggregateNonce,
    agg_pk_x: &[u8; 32],
    msg: &[u8; 32],
) -> Secp256k1Scalar {
    let digest = tagged::hash(
        &tagged::MUSIG_NONCECOEF,
        &[&aggnonce.serialize(), agg_pk_x, msg],
    );
    Secp256k1Scalar::from_bytes_be(&digest)
}

/// BIP340 challenge `e` for final nonce x-coordinate `r_x`.
pub fn compute_challenge(r_x: &[u8; 32], agg_pk_x: &[u8; 32], msg: &[u8; 32]) -> Secp256k1Scalar {
    Secp256k1Scalar::from_bytes_be(&tagged::hash(
        &tagged::BIP340_CHALLENGE,
        &[r_x, agg_pk_x, msg],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::x_bytes;
    use crate::nonce::PublicNonce;
    use crypto_rs::secp256k1::Secp256k1Point;

    fn g_x() -> [u8; 32] {
        x_bytes(&Secp256k1Point::generator())
    }

    #[test]
    fn test_challenge_consistency() {
        let e1 = compute_challenge(&g_x(), &g_x(), &[1u8; 32]);
        let e2 = compute_challenge(&g_x(), &g_x(), &[1u8; 32]);
        assert_eq!(e1, e2, "Challenge must be deterministic");
        assert!(!e1.is_zero());
    }

    #[test]
    fn test_challenge_varies_with_message() {
        let e1 = compute_challenge(&g_x(), &g_x(), &[1u8; 32]);
        let e2 = compute_challenge(&g_x(), &g_x(), &[2u8; 32]);
        assert_ne!(e1, e2, "Different messages yield different challenges");
    }

    #[test]
    fn test_challenge_varies_with_key() {
        let g = Secp256k1Point::generator();
        let x2 = x_bytes(&(g.clone() + &g));
        let e1 = compute_challenge(&g_x(), &g_x(), &[1u8; 32]);
        let e2 = compute_challenge(&g_x(), &x2, &[1u8; 32]);
        assert_ne!(e1, e2);
    }

    #[test]
    fn nonce_coefficient_binds_aggregate_nonce() {
        let g = Secp256k1Point::generator();
        let two_g = g.clone() + &g;
        let a = AggregateNonce::sum(&[PublicNonce::new(g.clone(), two_g.clone()).unwrap()]).unwrap();
        let b = AggregateNonce::sum(&[PublicNonce::new(two_g, g).unwrap()]).unwrap();
        let msg = [3u8; 32];
        assert_ne!(
            nonce_coefficient(&a, &g_x(), &msg),
            nonce_coefficient(&b, &g_x(), &msg)
        );
        assert_eq!(
            nonce_coefficient(&a, &g_x(), &msg),
            nonce_coefficient(&a, &g_x(), &msg)
        );
    }
}
