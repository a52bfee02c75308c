//! The interface between circuit descriptions and the engine that evaluates them.
//!
//! A backend hands out opaque [`Share`]s for inputs and gates, evaluates the recorded circuit when
//! [`CircuitBackend::execute`] is called and afterwards reveals outputs addressed to its party.
//! The builders in this crate never look behind these handles.

pub mod plain;

use std::future::Future;

use serde::Serialize;

use crate::{
    channel,
    repr::{Recipient, Repr, Role},
};

pub use plain::{PlainBackend, SoloBackend};

/// A single wire of a recorded circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Wire(pub(crate) usize);

/// An opaque handle to a secret value held by a backend.
///
/// Boolean representations use one wire per bit (least significant first), arithmetic values use a
/// single wire holding a ring element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub(crate) repr: Repr,
    pub(crate) wires: Vec<Wire>,
    pub(crate) bitlen: u32,
}

impl Share {
    pub(crate) fn boolean(repr: Repr, wires: Vec<Wire>) -> Self {
        debug_assert!(repr.is_boolean());
        let bitlen = wires.len() as u32;
        Share { repr, wires, bitlen }
    }

    pub(crate) fn arithmetic(wire: Wire, bitlen: u32) -> Self {
        Share {
            repr: Repr::Arithmetic,
            wires: vec![wire],
            bitlen,
        }
    }

    /// The representation of the secret.
    pub fn repr(&self) -> Repr {
        self.repr
    }

    /// The number of bits the share can hold.
    pub fn bitlen(&self) -> u32 {
        self.bitlen
    }

    /// The wires backing the share.
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// Drops the high wires of a boolean share. Arithmetic shares keep their ring width.
    pub(crate) fn truncate(&mut self, bitlen: u32) {
        if self.repr.is_boolean() && bitlen < self.bitlen {
            self.wires.truncate(bitlen as usize);
            self.bitlen = bitlen;
        }
    }
}

/// Gate and wire counts of the circuit recorded since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Non-linear boolean gates.
    pub and_gates: usize,
    /// Linear boolean gates (XOR, NOT).
    pub xor_gates: usize,
    /// Arithmetic ADD/SUB/MUL gates.
    pub arithmetic_gates: usize,
    /// Representation-promotion gates.
    pub conversions: usize,
    /// Wires fed by inputs of either party.
    pub input_wires: usize,
    /// Longest chain of interactive gates (AND, MUL, promotions).
    pub depth: u32,
}

/// Errors raised while executing a circuit.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Exchanging messages with the other party failed.
    #[error(transparent)]
    Channel(#[from] channel::Error),
    /// The other party's circuit does not match ours.
    #[error("peer supplied {actual} {kind} values, but the circuit expects {expected}")]
    InputMismatch {
        /// Which kind of input disagreed.
        kind: &'static str,
        /// Number of values our circuit consumes.
        expected: usize,
        /// Number of values the peer supplied.
        actual: usize,
    },
}

/// Records gates of a circuit. Object-safe, so that contexts can share one backend.
///
/// All binary gates require both operands to be of the same representation. Boolean gates accept
/// operands of different bit lengths and zero-extend the shorter one.
pub trait GateBuilder {
    /// The party this backend runs for.
    fn role(&self) -> Role;

    /// Ring width of the arithmetic representation.
    fn arithmetic_bitlen(&self) -> u32;

    /// Input of `bitlen` bits owned by `owner`. The value is ignored unless `owner` is this party.
    fn put_input(&mut self, repr: Repr, value: u64, bitlen: u32, owner: Role) -> Share;

    /// Placeholder for an input of `bitlen` bits owned by the other party.
    fn put_dummy_input(&mut self, repr: Repr, bitlen: u32) -> Share {
        let owner = self.role().peer();
        self.put_input(repr, 0, bitlen, owner)
    }

    /// Input already split into shares; `share` is this party's part.
    fn put_shared_input(&mut self, repr: Repr, share: u64, bitlen: u32) -> Share;

    /// A public constant.
    fn put_const_input(&mut self, repr: Repr, value: u64, bitlen: u32) -> Share;

    /// Reveals `share` to `to` after execution.
    fn put_output(&mut self, share: &Share, to: Recipient) -> Share;

    /// Reveals `share` as a fresh split: each party learns its own part after execution.
    fn put_shared_output(&mut self, share: &Share) -> Share;

    /// Bitwise AND.
    fn and(&mut self, a: &Share, b: &Share) -> Share;
    /// Bitwise XOR.
    fn xor(&mut self, a: &Share, b: &Share) -> Share;
    /// Bitwise OR.
    fn or(&mut self, a: &Share, b: &Share) -> Share;
    /// Bitwise NOT.
    fn not(&mut self, a: &Share) -> Share;
    /// Addition.
    fn add(&mut self, a: &Share, b: &Share) -> Share;
    /// Subtraction, wrapping at the operand width.
    fn sub(&mut self, a: &Share, b: &Share) -> Share;
    /// Multiplication.
    fn mul(&mut self, a: &Share, b: &Share) -> Share;
    /// Unsigned `a > b` as a single bit.
    fn gt(&mut self, a: &Share, b: &Share) -> Share;
    /// `cond ? t : f`, where `cond` is a single bit.
    fn mux(&mut self, cond: &Share, t: &Share, f: &Share) -> Share;

    /// Promotes `share` to another representation. A boolean share promoted to arithmetic must
    /// already span the full ring width.
    fn convert(&mut self, share: &Share, to: Repr) -> Share;

    /// The revealed value of an output share, once executed and if visible to this party.
    fn clear_value(&self, share: &Share) -> Option<u64>;
}

/// A [`GateBuilder`] that can run what it recorded.
pub trait CircuitBackend: GateBuilder {
    /// Evaluates the recorded circuit together with the other party.
    fn execute(&mut self) -> impl Future<Output = Result<(), BackendError>>;

    /// Forgets the recorded circuit and its results, keeping the connection to the peer.
    fn reset(&mut self);

    /// Statistics of the recorded circuit.
    fn stats(&self) -> Stats;
}
