//! MuSig2 public key aggregation (KeyAgg).
//!
//! Combines an ordered list of x-only public keys into one aggregate key and a
//! [`KeyAggCache`] that later protocol steps read:
//!
//! 1. `pk_hash = H_tag("KeyAgg list", x_1 || ... || x_n)` over the keys in input order.
//! 2. The "second" key is the first key that differs from `x_1`; its x-coordinate is
//!    kept as `second_pk_x` (zero when all keys are equal, which no curve point has).
//! 3. `a_i = 1` if `x_i == second_pk_x`, otherwise
//!    `a_i = H_tag("KeyAgg coefficient", pk_hash || x_i) mod n`.
//! 4. `X = sum(a_i * P_i)` where `P_i` is the even-Y lift of `x_i`.
//!
//! The reported aggregate key is the x-only form of `X`; the cache keeps the full
//! point so its parity can be accounted for when signing.

use crypto_rs::secp256k1::{Secp256k1Point, Secp256k1Scalar};
use sha2::Digest;
use thiserror::Error;
use tracing::debug;

use crate::keys::{
    XOnlyPublicKey, is_infinity, scalar_from_bytes, scalar_to_bytes,
};
use crate::tagged;

/// Magic prefix of a serialized [`KeyAggCache`].
pub const KEYAGG_CACHE_MAGIC: [u8; 4] = [0xf4, 0xad, 0xbb, 0xdf];

/// Size of a serialized [`KeyAggCache`].
pub const KEYAGG_CACHE_LEN: usize = 4 + 64 + 32 + 32 + 1 + 32;

/// Errors for key aggregation.
#[derive(Debug, Error, PartialEq)]
pub enum KeyAggError {
    /// The key list was empty.
    #[error("no public keys provided")]
    NoKeys,
    /// The aggregate key is the point at infinity.
    #[error("aggregate public key is the point at infinity")]
    Infinity,
}

/// Errors for loading a serialized [`KeyAggCache`].
#[derive(Debug, Error, PartialEq)]
pub enum CacheError {
    #[error("keyagg cache must be {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },
    /// Missing magic: the buffer was never initialized as a cache.
    #[error("keyagg cache magic mismatch")]
    BadMagic,
    #[error("keyagg cache holds an invalid aggregate point")]
    InvalidPoint,
    #[error("keyagg cache holds an invalid second public key")]
    InvalidSecondKey,
    /// The parity byte is neither 0 nor 1.
    #[error("keyagg cache parity byte must be 0 or 1, got {0}")]
    InvalidParity(u8),
    #[error("keyagg cache tweak is not below the group order")]
    TweakOverflow,
}

/// Aggregation state shared by all signers of one key set.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyAggCache {
    /// Aggregate (possibly tweaked) public key, never infinity.
    pub(crate) pk: Secp256k1Point,
    pub(crate) second_pk_x: [u8; 32],
    pub(crate) pk_hash: [u8; 32],
    /// Whether the accumulated tweak sequence negated the untweaked key.
    pub(crate) internal_key_parity: bool,
    /// Cumulative tweak, in the sign convention of `pk`.
    pub(crate) tweak: Secp256k1Scalar,
}

/// Hash of the ordered key list.
pub(crate) fn compute_pk_hash(pubkeys: &[XOnlyPublicKey]) -> [u8; 32] {
    let mut hasher = tagged::engine(&tagged::KEYAGG_LIST);
    for pk in pubkeys {
        hasher.update(pk.as_bytes());
    }
    tagged::finish(hasher)
}

/// x-coordinate of the first key that differs from the first one, or zero.
pub(crate) fn find_second_pk_x(pubkeys: &[XOnlyPublicKey]) -> [u8; 32] {
    let Some(first) = pubkeys.first() else {
        return [0u8; 32];
    };
    pubkeys
        .iter()
        .skip(1)
        .find(|pk| pk.as_bytes() != first.as_bytes())
        .map(XOnlyPublicKey::to_bytes)
        .unwrap_or([0u8; 32])
}

pub(crate) fn key_agg_coefficient_internal(
    pk_hash: &[u8; 32],
    x: &[u8; 32],
    second_pk_x: &[u8; 32],
) -> Secp256k1Scalar {
    if x == second_pk_x {
        return Secp256k1Scalar::one();
    }
    Secp256k1Scalar::from_bytes_be(&tagged::hash(&tagged::KEYAGG_COEF, &[pk_hash, x]))
}

/// Aggregates `pubkeys` into an x-only aggregate key and a [`KeyAggCache`].
///
/// # Parameters
/// - `pubkeys`: The signers' x-only keys. The result depends on their order,
///   so every signer must use the same order. Duplicate keys are permitted.
///
/// # Returns
/// - `(agg_pk, cache)` where `agg_pk` is the key final signatures verify
///   against and `cache` carries the state later steps need.
/// - [`KeyAggError::NoKeys`] for an empty list, [`KeyAggError::Infinity`] if the
///   keys cancel out.
pub fn key_agg(
    pubkeys: &[XOnlyPublicKey],
) -> Result<(XOnlyPublicKey, KeyAggCache), KeyAggError> {
    let cache = KeyAggCache::new(pubkeys)?;
    Ok((cache.x_only_aggregate(), cache))
}

impl KeyAggCache {
    /// Runs key aggregation and returns only the cache.
    pub fn new(pubkeys: &[XOnlyPublicKey]) -> Result<Self, KeyAggError> {
        if pubkeys.is_empty() {
            return Err(KeyAggError::NoKeys);
        }

        let pk_hash = compute_pk_hash(pubkeys);
        let second_pk_x = find_second_pk_x(pubkeys);

        let X = pubkeys
            .iter()
            .fold(Secp256k1Point::identity(), |acc, pk| {
                let a = key_agg_coefficient_internal(&pk_hash, pk.as_bytes(), &second_pk_x);
                acc + &(pk.point() * &a)
            });
        if is_infinity(&X) {
            return Err(KeyAggError::Infinity);
        }

        let cache = KeyAggCache {
            pk: X,
            second_pk_x,
            pk_hash,
            internal_key_parity: false,
            tweak: Secp256k1Scalar::zero(),
        };
        debug!(
            signers = pubkeys.len(),
            agg_pk = %cache.x_only_aggregate(),
            "aggregated public keys"
        );
        Ok(cache)
    }

    /// The full aggregate point, including any applied tweaks.
    pub fn aggregate_pubkey(&self) -> &Secp256k1Point {
        &self.pk
    }

    /// The x-only aggregate key that final signatures verify against.
    pub fn x_only_aggregate(&self) -> XOnlyPublicKey {
        XOnlyPublicKey::from_point(&self.pk)
    }

    /// Key aggregation coefficient of `pubkey` under this cache.
    ///
    /// Not a membership test: a key outside the set still gets a coefficient.
    pub fn key_agg_coefficient(&self, pubkey: &XOnlyPublicKey) -> Secp256k1Scalar {
        key_agg_coefficient_internal(&self.pk_hash, pubkey.as_bytes(), &self.second_pk_x)
    }

    /// Sum of all tweaks applied so far (in the sign convention of the cache).
    pub fn tweak_sum(&self) -> &Secp256k1Scalar {
        &self.tweak
    }

    /// Serializes the cache:
    /// `magic(4) || point(64) || second_pk_x(32) || pk_hash(32) || parity(1) || tweak(32)`.
    ///
    /// The point field holds the 33-byte compressed encoding, zero padded.
    pub fn serialize(&self) -> [u8; KEYAGG_CACHE_LEN] {
        let mut out = [0u8; KEYAGG_CACHE_LEN];
        out[..4].copy_from_slice(&KEYAGG_CACHE_MAGIC);
        out[4..37].copy_from_slice(&self.pk.to_bytes_compressed());
        out[68..100].copy_from_slice(&self.second_pk_x);
        out[100..132].copy_from_slice(&self.pk_hash);
        out[132] = self.internal_key_parity as u8;
        out[133..165].copy_from_slice(&scalar_to_bytes(&self.tweak));
        out
    }

    /// Loads a serialized cache, checking its magic and every field.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
        if bytes.len() != KEYAGG_CACHE_LEN {
            return Err(CacheError::WrongLength {
                expected: KEYAGG_CACHE_LEN,
                got: bytes.len(),
            });
        }
        if bytes[..4] != KEYAGG_CACHE_MAGIC {
            return Err(CacheError::BadMagic);
        }

        let mut compressed = [0u8; 33];
        compressed.copy_from_slice(&bytes[4..37]);
        if bytes[37..68].iter().any(|&b| b != 0) {
            return Err(CacheError::InvalidPoint);
        }
        let pk = Secp256k1Point::from_bytes_compressed(&compressed)
            .ok_or(CacheError::InvalidPoint)?;
        if is_infinity(&pk) {
            return Err(CacheError::InvalidPoint);
        }

        let mut second_pk_x = [0u8; 32];
        second_pk_x.copy_from_slice(&bytes[68..100]);
        if second_pk_x != [0u8; 32] && XOnlyPublicKey::from_bytes(&second_pk_x).is_err() {
            return Err(CacheError::InvalidSecondKey);
        }

        let mut pk_hash = [0u8; 32];
        pk_hash.copy_from_slice(&bytes[100..132]);

        let internal_key_parity = match bytes[132] {
            0 => false,
            1 => true,
            b => return Err(CacheError::InvalidParity(b)),
        };

        let mut tweak_bytes = [0u8; 32];
        tweak_bytes.copy_from_slice(&bytes[133..165]);
        let tweak = scalar_from_bytes(&tweak_bytes).ok_or(CacheError::TweakOverflow)?;

        Ok(KeyAggCache {
            pk,
            second_pk_x,
            pk_hash,
            internal_key_parity,
            tweak,
        })
    }
}

impl TryFrom<&[u8]> for KeyAggCache {
    type Error = CacheError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}
