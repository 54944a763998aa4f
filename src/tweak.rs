//! Additive tweaking of an aggregate key.
//!
//! Two flavours are supported. An x-only tweak first normalizes the current
//! aggregate point to even Y (as Taproot output keys do) and then adds
//! `t * G`. A plain tweak adds `t * G` to the point as is (BIP32 style).
//!
//! The cache tracks the cumulative tweak and whether the normalizations
//! negated the untweaked key, so signing applies the net effect exactly once.

use crypto_rs::secp256k1::Secp256k1Point;
use thiserror::Error;
use tracing::debug;

use crate::keyagg::KeyAggCache;
use crate::keys::{is_infinity, scalar_from_bytes};

/// Errors for key tweaking.
#[derive(Debug, Error, PartialEq)]
pub enum TweakError {
    /// The tweak is not below the group order.
    #[error("tweak is not below the group order")]
    Overflow,
    /// The tweaked key is the point at infinity.
    #[error("tweaked public key is the point at infinity")]
    Infinity,
}

impl KeyAggCache {
    /// Applies an x-only tweak and returns the new (full) aggregate point.
    ///
    /// The cache is left unchanged on failure.
    pub fn xonly_tweak_add(&mut self, tweak32: &[u8; 32]) -> Result<Secp256k1Point, TweakError> {
        self.tweak_add_internal(tweak32, true)
    }

    /// Applies a plain tweak and returns the new (full) aggregate point.
    ///
    /// The cache is left unchanged on failure.
    pub fn ec_tweak_add(&mut self, tweak32: &[u8; 32]) -> Result<Secp256k1Point, TweakError> {
        self.tweak_add_internal(tweak32, false)
    }

    fn tweak_add_internal(
        &mut self,
        tweak32: &[u8; 32],
        xonly: bool,
    ) -> Result<Secp256k1Point, TweakError> {
        let t = scalar_from_bytes(tweak32).ok_or(TweakError::Overflow)?;

        let mut pk = self.pk.clone();
        let mut acc = self.tweak.clone();
        let mut parity = self.internal_key_parity;
        if xonly && pk.y_is_odd() {
            pk = -pk;
            acc = -acc;
            parity = !parity;
        }

        let tweaked = pk + &(Secp256k1Point::generator() * &t);
        if is_infinity(&tweaked) {
            return Err(TweakError::Infinity);
        }

        self.pk = tweaked;
        self.tweak = acc + &t;
        self.internal_key_parity = parity;
        debug!(
            xonly,
            agg_pk = %self.x_only_aggregate(),
            internal_key_parity = parity,
            "tweaked aggregate key"
        );
        Ok(self.pk.clone())
    }
}
