use crate::adaptor::AdaptorError;
use crate::keyagg::{CacheError, KeyAggError};
use crate::keys::KeyError;
use crate::nonce::NonceError;
use crate::session::SessionError;
use crate::sign::SignError;
use crate::tweak::TweakError;
use thiserror::Error;

/// Any error produced by the MuSig2 protocol engine.
#[derive(Debug, Error, PartialEq)]
pub enum MusigError {
    /// Invalid key material.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// Key aggregation failed.
    #[error("key aggregation error: {0}")]
    KeyAgg(#[from] KeyAggError),

    /// A serialized key aggregation cache could not be loaded.
    #[error("keyagg cache error: {0}")]
    Cache(#[from] CacheError),

    /// Tweaking the aggregate key failed.
    #[error("tweak error: {0}")]
    Tweak(#[from] TweakError),

    /// A nonce-generation or nonce-parsing error (e.g. zero scalar, invalid point).
    #[error("nonce error: {0}")]
    Nonce(#[from] NonceError),

    /// Nonce processing failed; restart the session with fresh nonces.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Signing or signature aggregation failed.
    #[error("signing error: {0}")]
    Sign(#[from] SignError),

    /// Adapting or extracting an adaptor secret failed.
    #[error("adaptor error: {0}")]
    Adaptor(#[from] AdaptorError),
}
