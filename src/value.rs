//! Secret values paired with a tracked upper bound.

use std::marker::PhantomData;

use crate::{
    backend::Share,
    bounds::{bitlen_of, max_of_bitlen},
    repr::{BooleanRepresentation, Representation},
};

/// A secret value of representation `R`.
///
/// Besides the backend handle, a value carries `max_val`, an upper bound on what it can hold. On
/// construction the handle of a boolean value is narrowed to `bitlen_of(max_val)` wires, so a
/// value never occupies more wires than its bound requires. Values are immutable; gates on a
/// [`crate::session::Context`] produce new ones.
#[derive(Debug, Clone)]
pub struct Value<R: Representation> {
    share: Share,
    max_val: u64,
    repr: PhantomData<R>,
}

impl<R: Representation> Value<R> {
    /// Wraps a handle, taking the bound from its bit length.
    pub fn new(share: Share) -> Self {
        let max_val = max_of_bitlen(share.bitlen());
        Self::with_bound(share, max_val)
    }

    /// Wraps a handle with an explicit bound, narrowing the handle to the bits the bound needs.
    ///
    /// The bound is clamped to the largest value the (narrowed) handle can represent.
    pub fn with_bound(mut share: Share, max_val: u64) -> Self {
        assert_eq!(
            share.repr(),
            R::KIND,
            "share of the wrong representation for this value"
        );
        let bitlen = bitlen_of(max_val).min(share.bitlen());
        share.truncate(bitlen);
        Value {
            max_val: max_val.min(max_of_bitlen(share.bitlen())),
            share,
            repr: PhantomData,
        }
    }

    /// The same value under a tighter bound. A looser bound than the current one is ignored.
    pub fn narrow(self, max_val: u64) -> Self {
        let max_val = max_val.min(self.max_val);
        Self::with_bound(self.share, max_val)
    }

    /// The backend handle.
    pub fn share(&self) -> &Share {
        &self.share
    }

    /// The tracked upper bound.
    pub fn max_val(&self) -> u64 {
        self.max_val
    }

    /// The number of bits of the handle.
    pub fn bitlen(&self) -> u32 {
        self.share.bitlen()
    }
}

impl<R: BooleanRepresentation> Value<R> {
    /// Bit `i` (least significant first) as a single-bit value.
    pub fn bit(&self, i: u32) -> Value<R> {
        assert!(i < self.bitlen(), "bit {i} of a {}-bit value", self.bitlen());
        let wire = self.share.wires()[i as usize];
        Value::with_bound(Share::boolean(R::KIND, vec![wire]), 1)
    }
}
