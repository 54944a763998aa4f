//! Partial signing and signature aggregation.
//!
//! Signer `i` with secret key `x_i`, key aggregation coefficient `a_i` and
//! secret nonce `(k1, k2)` produces
//!
//! ```text
//! s_i = g_R * (k1 + b*k2) + e * a_i * g * x_i
//! ```
//!
//! where `g_R` is -1 if the final nonce has odd Y, and `g` folds together the
//! parity of the signer's own key, of the aggregate key and of the tweak chain.
//! The aggregator sums all `s_i`, adds the session's tweak term and pairs the
//! result with the final nonce's x-coordinate.

use crypto_rs::secp256k1::Secp256k1Scalar;
use thiserror::Error;
use tracing::debug;

use crate::keyagg::KeyAggCache;
use crate::keys::{Keypair, scalar_from_bytes, scalar_to_bytes};
use crate::nonce::SecretNonce;
use crate::session::Session;

/// Errors for signing and aggregation.
#[derive(Debug, Error, PartialEq)]
pub enum SignError {
    /// The secret nonce was generated for a different public key.
    #[error("secret nonce is bound to a different public key")]
    NonceKeyMismatch,
    /// Partial signature bytes are not below the group order.
    #[error("partial signature is not below the group order")]
    Overflow,
    /// No partial signatures were given.
    #[error("no partial signatures to aggregate")]
    NoPartials,
}

/// One signer's contribution to the aggregate signature.
#[derive(Clone, Debug, PartialEq)]
pub struct PartialSignature(pub(crate) Secp256k1Scalar);

impl PartialSignature {
    /// 32-byte big-endian encoding, as sent to the aggregator.
    pub fn serialize(&self) -> [u8; 32] {
        scalar_to_bytes(&self.0)
    }

    /// Parses a partial signature, rejecting values not below the group order.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignError> {
        scalar_from_bytes(bytes)
            .map(PartialSignature)
            .ok_or(SignError::Overflow)
    }
}

/// Produces this signer's partial signature, consuming the secret nonce.
///
/// # Arguments
/// - `secnonce`: The secret nonce from [`crate::NonceGen::generate`]. It is moved
///   in, so it cannot be used for a second signature.
/// - `keypair`: The signer's keypair. Must be the key `secnonce` is bound to.
/// - `cache`: The key aggregation cache, with any tweaks already applied.
/// - `session`: The session built from the aggregate nonce and the message.
///
/// # Returns
/// The partial signature `s_i`, or [`SignError::NonceKeyMismatch`] if the secret
/// nonce belongs to another key.
///
/// # Note
/// The `SecretNonce` bytes are wiped when this function returns, whether it
/// succeeds or not. The intermediate nonce and secret key scalars live in
/// `crypto-rs` big integers, which are not zeroized on drop, so copies of them
/// may remain in freed memory.
///
/// Signing twice with one secret nonce does not compile:
///
/// ```compile_fail
/// use musig2::{AggregateNonce, Keypair, NonceGen, Session, SessionId, key_agg, partial_sign};
///
/// let kp = Keypair::random();
/// let (_, cache) = key_agg(&[kp.x_only_public_key()]).unwrap();
/// let (sec, pubn) = NonceGen::new(SessionId::random().unwrap())
///     .with_keypair(&kp)
///     .generate()
///     .unwrap();
/// let aggnonce = AggregateNonce::sum(&[pubn]).unwrap();
/// let session = Session::new(&aggnonce, &[7u8; 32], &cache, None).unwrap();
///
/// let first = partial_sign(sec, &kp, &cache, &session);
/// let second = partial_sign(sec, &kp, &cache, &session);
/// ```
///
/// Signing once is the intended use:
///
/// ```
/// use musig2::{
///     AggregateNonce, Keypair, NonceGen, Session, SessionId, key_agg, partial_sig_agg,
///     partial_sign, verify_signature,
/// };
///
/// let kp = Keypair::random();
/// let msg = [7u8; 32];
/// let (agg_pk, cache) = key_agg(&[kp.x_only_public_key()]).unwrap();
/// let (sec, pubn) = NonceGen::new(SessionId::random().unwrap())
///     .with_keypair(&kp)
///     .generate()
///     .unwrap();
/// let aggnonce = AggregateNonce::sum(&[pubn]).unwrap();
/// let session = Session::new(&aggnonce, &msg, &cache, None).unwrap();
///
/// let psig = partial_sign(sec, &kp, &cache, &session).unwrap();
/// let sig = partial_sig_agg(&session, &[psig]).unwrap();
/// assert!(verify_signature(&sig, &msg, &agg_pk));
/// ```
pub fn partial_sign(
    secnonce: SecretNonce,
    keypair: &Keypair,
    cache: &KeyAggCache,
    session: &Session,
) -> Result<PartialSignature, SignError> {
    let pk = keypair.x_only_public_key();
    if secnonce.signer_pubkey() != pk.as_bytes() {
        return Err(SignError::NonceKeyMismatch);
    }
    let (mut k1, mut k2) = secnonce.scalars();
    drop(secnonce);

    let mut sk = keypair.secret_scalar();
    if keypair.public_key().y_is_odd() ^ cache.pk.y_is_odd() ^ cache.internal_key_parity {
        sk = -sk;
    }
    let a = cache.key_agg_coefficient(&pk);

    if session.fin_nonce_parity {
        k1 = -k1;
        k2 = -k2;
    }

    let s = k1 + &(&session.nonce_coef * &k2) + &(&session.challenge * &a * &sk);
    debug!(signer = %pk, "created partial signature");
    Ok(PartialSignature(s))
}

/// Aggregates all signers' partial signatures into a 64-byte BIP340 signature.
///
/// An invalid partial signature is not detected here; the result then fails
/// verification and [`crate::verify::partial_sig_verify`] identifies the culprit.
pub fn partial_sig_agg(
    session: &Session,
    partials: &[PartialSignature],
) -> Result<[u8; 64], SignError> {
    if partials.is_empty() {
        return Err(SignError::NoPartials);
    }
    let s = partials
        .iter()
        .fold(session.s_part.clone(), |acc, p| acc + &p.0);

    let mut sig = [0u8; 64];
    sig[..32].copy_from_slice(&session.fin_nonce_x);
    sig[32..].copy_from_slice(&scalar_to_bytes(&s));
    debug!(signers = partials.len(), "aggregated partial signatures");
    Ok(sig)
}
