//! Domain-separated tagged hashes.
//!
//! A tagged hash is `SHA256(SHA256(tag) || SHA256(tag) || data)`. The 64-byte
//! prefix fills exactly one SHA256 block, so the hasher state after absorbing
//! it is computed once per tag and cloned for every use.

use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Hasher state primed with the tag prefix for a single domain.
pub(crate) type TaggedHasher = LazyLock<Sha256>;

fn midstate(tag: &str) -> Sha256 {
    let tag_hash = Sha256::digest(tag.as_bytes());
    Sha256::new().chain_update(tag_hash).chain_update(tag_hash)
}

pub(crate) static KEYAGG_LIST: TaggedHasher = LazyLock::new(|| midstate("KeyAgg list"));
pub(crate) static KEYAGG_COEF: TaggedHasher = LazyLock::new(|| midstate("KeyAgg coefficient"));
pub(crate) static MUSIG_AUX: TaggedHasher = LazyLock::new(|| midstate("MuSig/aux"));
pub(crate) static MUSIG_NONCE: TaggedHasher = LazyLock::new(|| midstate("MuSig/nonce"));
pub(crate) static MUSIG_NONCECOEF: TaggedHasher = LazyLock::new(|| midstate("MuSig/noncecoef"));
pub(crate) static BIP340_CHALLENGE: TaggedHasher = LazyLock::new(|| midstate("BIP0340/challenge"));

/// Returns a fresh hasher for the given domain, ready to absorb data.
pub(crate) fn engine(tag: &TaggedHasher) -> Sha256 {
    Sha256::clone(tag)
}

/// Finalizes a hasher into a 32-byte digest.
pub(crate) fn finish(hasher: Sha256) -> [u8; 32] {
    hasher.finalize().into()
}

/// One-shot tagged hash over the concatenation of `parts`.
pub(crate) fn hash(tag: &TaggedHasher, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = engine(tag);
    for part in parts {
        hasher.update(part);
    }
    finish(hasher)
}
