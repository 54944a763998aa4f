//! MuSig2: multi-signature Schnorr implementation (n-of-n) using secp256k1.
//! Uses crypto-rs v0.1.0 (<https://github.com/BEULAHEVANJALIN/crypto-rs>) for elliptic curve operations.
//!
//! Protocol outline:
//! 1. [`key_agg`] combines the signers' x-only keys into an aggregate key and a [`KeyAggCache`],
//!    optionally tweaked with [`KeyAggCache::xonly_tweak_add`] / [`KeyAggCache::ec_tweak_add`].
//! 2. Each signer runs [`NonceGen`] and broadcasts its [`PublicNonce`].
//! 3. The public nonces are summed into an [`AggregateNonce`] and processed into a [`Session`].
//! 4. Each signer calls [`partial_sign`], consuming its [`SecretNonce`].
//! 5. [`partial_sig_agg`] combines the partial signatures into a BIP340 signature.
#![allow(non_snake_case)]
pub mod adaptor;
pub use adaptor::{adapt, extract_adaptor};
mod challenge;
pub use challenge::compute_challenge;
pub mod error;
pub use error::MusigError;
pub mod keyagg;
pub use keyagg::{KeyAggCache, key_agg};
pub mod keys;
pub use keys::{Keypair, XOnlyPublicKey};
pub mod nonce;
pub use nonce::{AggregateNonce, NonceGen, PublicNonce, SecretNonce, SessionId};
pub mod session;
pub use session::Session;
pub mod sign;
pub use sign::{PartialSignature, partial_sig_agg, partial_sign};
mod tagged;
pub mod tweak;
pub mod verify;
pub use verify::{partial_sig_verify, verify_signature};
