//! Verification of partial and final signatures.
//!
//! Checking the final signature against the aggregate key is the cheap way to
//! confirm a signing run. If it fails, verifying each partial signature against
//! its signer's public nonce and key tells which signer misbehaved.

use crypto_rs::schnorr::schnorr_verify;
use crypto_rs::secp256k1::Secp256k1Point;
use tracing::warn;

use crate::keyagg::KeyAggCache;
use crate::keys::XOnlyPublicKey;
use crate::nonce::PublicNonce;
use crate::session::Session;
use crate::sign::PartialSignature;

/// Checks `s_i * G == g_R * (R1_i + b*R2_i) + e * a_i * g * P_i`.
///
/// `g_R` is -1 if the session's final nonce has odd Y. `g` is -1 if the
/// aggregate key's Y parity and the tweak-chain parity disagree.
///
/// # Arguments
/// - `psig`: The partial signature under test.
/// - `pubnonce`, `pubkey`: What that signer announced in round one.
/// - `cache`, `session`: The same state the signer used.
///
/// # Returns
/// `true` if the share is valid. A `false` identifies the misbehaving signer.
pub fn partial_sig_verify(
    psig: &PartialSignature,
    pubnonce: &PublicNonce,
    pubkey: &XOnlyPublicKey,
    cache: &KeyAggCache,
    session: &Session,
) -> bool {
    let mut R_i = pubnonce.effective_nonce(&session.nonce_coef);
    if session.fin_nonce_parity {
        R_i = -R_i;
    }

    let mut e = &session.challenge * &cache.key_agg_coefficient(pubkey);
    if cache.pk.y_is_odd() ^ cache.internal_key_parity {
        e = -e;
    }

    let lhs = Secp256k1Point::generator() * &psig.0;
    let rhs = R_i + &(pubkey.point() * &e);
    let ok = lhs == rhs;
    if !ok {
        warn!(signer = %pubkey, "partial signature failed verification");
    }
    ok
}

/// Verifies a final 64-byte signature with the BIP340 verifier.
pub fn verify_signature(sig: &[u8; 64], msg: &[u8; 32], pubkey: &XOnlyPublicKey) -> bool {
    schnorr_verify(&pubkey.point().x_only_bytes(), &msg[..], sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyagg::key_agg;
    use crate::keys::Keypair;
    use crate::nonce::{AggregateNonce, NonceGen, SessionId};
    use crate::sign::{partial_sig_agg, partial_sign};
    use crypto_rs::secp256k1::Secp256k1Scalar;

    #[test]
    fn test_two_party_verify() {
        let kp1 = Keypair::random();
        let kp2 = Keypair::random();
        let pks = vec![kp1.x_only_public_key(), kp2.x_only_public_key()];
        let (agg_pk, cache) = key_agg(&pks).unwrap();
        let msg = [0x11u8; 32];

        let (sec1, pub1) = NonceGen::new(SessionId::random().unwrap())
            .with_keypair(&kp1)
            .generate()
            .unwrap();
        let (sec2, pub2) = NonceGen::new(SessionId::random().unwrap())
            .with_keypair(&kp2)
            .generate()
            .unwrap();
        let aggnonce = AggregateNonce::sum(&[pub1.clone(), pub2.clone()]).unwrap();
        let session = Session::new(&aggnonce, &msg, &cache, None).unwrap();

        let s1 = partial_sign(sec1, &kp1, &cache, &session).unwrap();
        let s2 = partial_sign(sec2, &kp2, &cache, &session).unwrap();
        assert!(partial_sig_verify(&s1, &pub1, &pks[0], &cache, &session));
        assert!(partial_sig_verify(&s2, &pub2, &pks[1], &cache, &session));
        // Swapped nonces or keys do not verify.
        assert!(!partial_sig_verify(&s1, &pub2, &pks[0], &cache, &session));
        assert!(!partial_sig_verify(&s1, &pub1, &pks[1], &cache, &session));

        let sig = partial_sig_agg(&session, &[s1, s2]).unwrap();
        assert!(verify_signature(&sig, &msg, &agg_pk));
        assert!(!verify_signature(&sig, &[0x12u8; 32], &agg_pk));
    }

    #[test]
    fn corrupted_partial_signature_is_detected() {
        let kp1 = Keypair::random();
        let kp2 = Keypair::random();
        let pks = vec![kp1.x_only_public_key(), kp2.x_only_public_key()];
        let (agg_pk, cache) = key_agg(&pks).unwrap();
        let msg = [0x22u8; 32];

        let (sec1, pub1) = NonceGen::new(SessionId::random().unwrap())
            .with_keypair(&kp1)
            .generate()
            .unwrap();
        let (sec2, pub2) = NonceGen::new(SessionId::random().unwrap())
            .with_keypair(&kp2)
            .generate()
            .unwrap();
        let aggnonce = AggregateNonce::sum(&[pub1.clone(), pub2.clone()]).unwrap();
        let session = Session::new(&aggnonce, &msg, &cache, None).unwrap();

        let s1 = partial_sign(sec1, &kp1, &cache, &session).unwrap();
        let s2 = partial_sign(sec2, &kp2, &cache, &session).unwrap();
        let bad = PartialSignature(s2.0.clone() + &Secp256k1Scalar::one());

        assert!(partial_sig_verify(&s1, &pub1, &pks[0], &cache, &session));
        assert!(!partial_sig_verify(&bad, &pub2, &pks[1], &cache, &session));
        let sig = partial_sig_agg(&session, &[s1, bad]).unwrap();
        assert!(!verify_signature(&sig, &msg, &agg_pk));
    }
}
