//! Nonce generation and aggregation for MuSig2.
//!
//! Every signer draws two secret scalars `(k1, k2)` per signing session and
//! broadcasts `(R1, R2) = (k1*G, k2*G)`. Once all public nonces are known they
//! are summed component-wise into an [`AggregateNonce`].
//!
//! A [`SecretNonce`] must sign at most one message. It cannot be cloned or
//! serialized, signing takes it by value, and it is wiped when dropped.

use std::fmt;

use crypto_rs::secp256k1::{Secp256k1Point, Secp256k1Scalar};
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::Digest;
use thiserror::Error;
use tracing::trace;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::keyagg::KeyAggCache;
use crate::keys::{Keypair, XOnlyPublicKey, is_infinity, scalar_to_bytes};
use crate::tagged;

/// Serialized size of a [`PublicNonce`] or [`AggregateNonce`].
pub const NONCE_LEN: usize = 66;

/// Errors for nonce operations.
#[derive(Debug, Error, PartialEq)]
pub enum NonceError {
    /// A derived nonce scalar reduced to zero.
    #[error("nonce scalar is zero")]
    ZeroScalar,
    /// Neither a keypair nor a public key was given to bind the nonce to.
    #[error("secret nonce must be bound to a signer public key")]
    MissingSignerKey,
    /// Empty nonce list.
    #[error("empty nonce list")]
    NoNonces,
    /// Input point bytes were invalid or encode the identity where it is not allowed.
    #[error("invalid public nonce point")]
    InvalidPoint,
    /// Input bytes were of wrong length.
    #[error("nonce must be {NONCE_LEN} bytes, got {0}")]
    WrongLength(usize),
    /// The extra input does not fit the 4-byte length prefix.
    #[error("extra input of {0} bytes exceeds the u32 length prefix")]
    ExtraInputTooLong(usize),
    /// The operating system randomness source failed.
    #[error("randomness source failed: {0}")]
    Randomness(String),
}

/// Fresh per-session randomness for nonce generation.
///
/// Must never repeat: two nonces derived from the same session id (and the
/// same optional inputs) reveal the signer's secret key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionId([u8; 32]);

impl SessionId {
    /// Draws a session id from the operating system CSPRNG.
    pub fn random() -> Result<Self, NonceError> {
        let mut buf = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| NonceError::Randomness(e.to_string()))?;
        Ok(Self(buf))
    }

    /// Wraps caller-provided unique bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<[u8; 32]> for SessionId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(..)")
    }
}

/// A signer's secret nonce pair, bound to the signer's x-only public key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretNonce {
    k1: [u8; 32],
    k2: [u8; 32],
    pubkey: [u8; 32],
}

impl SecretNonce {
    /// The x-only public key this nonce may sign for.
    pub fn signer_pubkey(&self) -> &[u8; 32] {
        &self.pubkey
    }

    /// Recomputes the matching public nonce.
    pub fn public_nonce(&self) -> PublicNonce {
        let (k1, k2) = self.scalars();
        PublicNonce {
            R1: Secp256k1Point::generator() * &k1,
            R2: Secp256k1Point::generator() * &k2,
        }
    }

    pub(crate) fn scalars(&self) -> (Secp256k1Scalar, Secp256k1Scalar) {
        (
            Secp256k1Scalar::from_bytes_be(&self.k1),
            Secp256k1Scalar::from_bytes_be(&self.k2),
        )
    }
}

impl fmt::Debug for SecretNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretNonce")
            .field("pubkey", &hex::encode(self.pubkey))
            .finish_non_exhaustive()
    }
}

/// Encodes a point as 33 compressed bytes, the identity as 33 zero bytes.
fn point_to_bytes_or_zero(p: &Secp256k1Point) -> [u8; 33] {
    if is_infinity(p) {
        [0u8; 33]
    } else {
        p.to_bytes_compressed()
    }
}

fn point_from_bytes_or_zero(bytes: &[u8]) -> Result<Secp256k1Point, NonceError> {
    let mut arr = [0u8; 33];
    arr.copy_from_slice(bytes);
    if arr == [0u8; 33] {
        return Ok(Secp256k1Point::identity());
    }
    Secp256k1Point::from_bytes_compressed(&arr).ok_or(NonceError::InvalidPoint)
}

/// A signer's public nonce `(R1, R2)`. Safe to broadcast.
#[derive(Clone, Debug, PartialEq)]
pub struct PublicNonce {
    pub(crate) R1: Secp256k1Point,
    pub(crate) R2: Secp256k1Point,
}

impl PublicNonce {
    /// Builds a public nonce from two points, neither of which may be infinity.
    pub fn new(R1: Secp256k1Point, R2: Secp256k1Point) -> Result<Self, NonceError> {
        if is_infinity(&R1) || is_infinity(&R2) {
            return Err(NonceError::InvalidPoint);
        }
        Ok(Self { R1, R2 })
    }

    /// `R1 || R2` as two 33-byte compressed points.
    pub fn serialize(&self) -> [u8; NONCE_LEN] {
        let mut out = [0u8; NONCE_LEN];
        out[..33].copy_from_slice(&self.R1.to_bytes_compressed());
        out[33..].copy_from_slice(&self.R2.to_bytes_compressed());
        out
    }

    /// Parses two concatenated compressed points.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NonceError> {
        if bytes.len() != NONCE_LEN {
            return Err(NonceError::WrongLength(bytes.len()));
        }
        let R1 = point_from_bytes_or_zero(&bytes[..33])?;
        let R2 = point_from_bytes_or_zero(&bytes[33..])?;
        Self::new(R1, R2)
    }

    /// `R1 + b * R2`: this signer's share of the final nonce.
    pub(crate) fn effective_nonce(&self, b: &Secp256k1Scalar) -> Secp256k1Point {
        self.R1.clone() + &(&self.R2 * b)
    }
}

/// Component-wise sum of all signers' public nonces.
///
/// Either component may be the point at infinity.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateNonce {
    pub(crate) R1: Secp256k1Point,
    pub(crate) R2: Secp256k1Point,
}

impl AggregateNonce {
    /// Sums public nonces. The order does not affect the result, but every
    /// signer must aggregate the same set.
    pub fn sum(nonces: &[PublicNonce]) -> Result<Self, NonceError> {
        if nonces.is_empty() {
            return Err(NonceError::NoNonces);
        }
        let (R1, R2) = nonces.iter().fold(
            (Secp256k1Point::identity(), Secp256k1Point::identity()),
            |(R1, R2), n| (R1 + &n.R1, R2 + &n.R2),
        );
        trace!(signers = nonces.len(), "aggregated public nonces");
        Ok(Self { R1, R2 })
    }

    /// Serializes both components; an infinite component is 33 zero bytes.
    pub fn serialize(&self) -> [u8; NONCE_LEN] {
        let mut out = [0u8; NONCE_LEN];
        out[..33].copy_from_slice(&point_to_bytes_or_zero(&self.R1));
        out[33..].copy_from_slice(&point_to_bytes_or_zero(&self.R2));
        out
    }

    /// Parses an aggregate nonce; 33 zero bytes decode to infinity.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NonceError> {
        if bytes.len() != NONCE_LEN {
            return Err(NonceError::WrongLength(bytes.len()));
        }
        Ok(Self {
            R1: point_from_bytes_or_zero(&bytes[..33])?,
            R2: point_from_bytes_or_zero(&bytes[33..])?,
        })
    }
}

/// Big-endian length prefix of the extra input.
fn extra_input_len(len: usize) -> Result<[u8; 4], NonceError> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| NonceError::ExtraInputTooLong(len))
}

/// Builder for a signer's nonce pair.
///
/// Only the session id is required for security. The other inputs are mixed
/// into the derivation and help if the session id source is weak.
pub struct NonceGen<'a> {
    session_id: SessionId,
    keypair: Option<&'a Keypair>,
    pubkey: Option<XOnlyPublicKey>,
    aggregate_pubkey: Option<[u8; 32]>,
    message: Option<&'a [u8]>,
    extra_input: Option<&'a [u8]>,
}

impl<'a> NonceGen<'a> {
    /// Starts a builder from a fresh session id. The id is consumed.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            keypair: None,
            pubkey: None,
            aggregate_pubkey: None,
            message: None,
            extra_input: None,
        }
    }

    /// Mixes in the signer's secret key and binds the nonce to its public key.
    pub fn with_keypair(mut self, keypair: &'a Keypair) -> Self {
        self.pubkey = Some(keypair.x_only_public_key());
        self.keypair = Some(keypair);
        self
    }

    /// Binds the nonce to `pubkey` without mixing in a secret key.
    pub fn with_pubkey(mut self, pubkey: XOnlyPublicKey) -> Self {
        self.pubkey = Some(pubkey);
        self
    }

    /// Mixes in the aggregate key the nonce will sign for.
    pub fn with_aggregate_pubkey(mut self, aggregate_pubkey: &XOnlyPublicKey) -> Self {
        self.aggregate_pubkey = Some(aggregate_pubkey.to_bytes());
        self
    }

    /// Mixes in the (possibly tweaked) aggregate key of `cache`.
    pub fn with_cache(self, cache: &KeyAggCache) -> Self {
        self.with_aggregate_pubkey(&cache.x_only_aggregate())
    }

    /// Mixes in the message. Prefixed with its 8-byte length, so any length is fine.
    pub fn with_message(mut self, message: &'a [u8]) -> Self {
        self.message = Some(message);
        self
    }

    /// Mixes in arbitrary auxiliary data, at most `u32::MAX` bytes.
    pub fn with_extra_input(mut self, extra_input: &'a [u8]) -> Self {
        self.extra_input = Some(extra_input);
        self
    }

    /// Derives the secret nonce and its public nonce.
    ///
    /// # Returns
    /// The pair `(SecretNonce, PublicNonce)`. Keep the first, broadcast the second.
    ///
    /// # Errors
    /// - [`NonceError::MissingSignerKey`] if neither a keypair nor a public key was given.
    /// - [`NonceError::ExtraInputTooLong`] if the extra input exceeds `u32::MAX` bytes.
    /// - [`NonceError::ZeroScalar`] if a derived scalar is zero.
    pub fn generate(self) -> Result<(SecretNonce, PublicNonce), NonceError> {
        let pubkey = self.pubkey.as_ref().ok_or(NonceError::MissingSignerKey)?;
        let extra = self.extra_input.unwrap_or(&[]);
        let extra_len = extra_input_len(extra.len())?;

        let mut rand = match self.keypair {
            Some(kp) => {
                let aux = tagged::hash(&tagged::MUSIG_AUX, &[&self.session_id.0]);
                let mut out = *kp.secret_bytes();
                out.iter_mut().zip(aux.iter()).for_each(|(o, a)| *o ^= a);
                out
            }
            None => self.session_id.0,
        };

        let mut hasher = tagged::engine(&tagged::MUSIG_NONCE);
        hasher.update(rand);
        rand.zeroize();
        hasher.update([32u8]);
        hasher.update(pubkey.as_bytes());
        match &self.aggregate_pubkey {
            Some(agg) => {
                hasher.update([32u8]);
                hasher.update(agg);
            }
            None => hasher.update([0u8]),
        }
        match self.message {
            Some(msg) => {
                hasher.update([1u8]);
                hasher.update((msg.len() as u64).to_be_bytes());
                hasher.update(msg);
            }
            None => hasher.update([0u8]),
        }
        hasher.update(extra_len);
        hasher.update(extra);

        let derive = |i: u8| {
            let digest = tagged::finish(hasher.clone().chain_update([i]));
            let s = Secp256k1Scalar::from_bytes_be(&digest);
            if s.is_zero() {
                return Err(NonceError::ZeroScalar);
            }
            Ok(scalar_to_bytes(&s))
        };
        let mut k1 = derive(0)?;
        let mut k2 = match derive(1) {
            Ok(k2) => k2,
            Err(e) => {
                k1.zeroize();
                return Err(e);
            }
        };

        let secnonce = SecretNonce {
            k1,
            k2,
            pubkey: pubkey.to_bytes(),
        };
        k1.zeroize();
        k2.zeroize();
        let pubnonce = secnonce.public_nonce();
        trace!(signer = %pubkey, "generated nonce pair");
        Ok((secnonce, pubnonce))
    }
}
