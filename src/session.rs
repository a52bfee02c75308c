//! Binding representations to a backend and describing gates on them.
//!
//! A [`Session`] owns one circuit backend. Each representation can be bound to it by at most one
//! [`Context`] at a time; binding an already-bound representation fails, and dropping the context
//! releases the binding again. All gates are described through a context, which also tracks the
//! bound of every result.

use std::{
    cell::{Cell, RefCell},
    fmt,
    marker::PhantomData,
};

use tracing::trace;

use crate::{
    backend::{BackendError, CircuitBackend, GateBuilder, Share, Stats},
    bounds::{self, bitlen_of, max_of_bitlen},
    repr::{BooleanRepresentation, Recipient, Repr, Representation, Role},
    value::Value,
};

/// Errors raised when binding a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// Another context is still bound to this representation.
    #[error("representation {0} is already bound to a context")]
    AlreadyBound(Repr),
}

#[derive(Debug, Default)]
struct Bindings([Cell<bool>; 3]);

impl Bindings {
    fn acquire(&self, repr: Repr) -> Result<(), BindError> {
        let slot = &self.0[repr.slot()];
        if slot.replace(true) {
            Err(BindError::AlreadyBound(repr))
        } else {
            Ok(())
        }
    }

    fn release(&self, repr: Repr) {
        self.0[repr.slot()].set(false);
    }

    fn is_bound(&self, repr: Repr) -> bool {
        self.0[repr.slot()].get()
    }
}

/// One party's circuit backend together with its representation bindings.
#[derive(Debug)]
pub struct Session<B> {
    backend: RefCell<B>,
    bindings: Bindings,
}

impl<B: CircuitBackend + 'static> Session<B> {
    /// Wraps a backend. No representation is bound yet.
    pub fn new(backend: B) -> Self {
        Session {
            backend: RefCell::new(backend),
            bindings: Bindings::default(),
        }
    }

    /// Binds representation `R` to this session's backend.
    pub fn bind<R: Representation>(&self) -> Result<Context<'_, R>, BindError> {
        self.bindings.acquire(R::KIND)?;
        trace!(repr = %R::KIND, "bound context");
        Ok(Context {
            backend: &self.backend,
            bindings: &self.bindings,
            repr: PhantomData,
        })
    }

    /// Whether a context is currently bound to `repr`.
    pub fn is_bound(&self, repr: Repr) -> bool {
        self.bindings.is_bound(repr)
    }

    /// Runs the recorded circuit with the other party.
    ///
    /// Requires exclusive access, so every context must have been dropped beforehand.
    pub async fn execute(&mut self) -> Result<(), BackendError> {
        self.backend.get_mut().execute().await
    }

    /// Discards the recorded circuit. Values created before are no longer valid afterwards.
    pub fn reset(&mut self) {
        self.backend.get_mut().reset();
    }

    /// Statistics of the circuit recorded since the last reset.
    pub fn stats(&self) -> Stats {
        self.backend.borrow().stats()
    }

    /// The party this session runs for.
    pub fn role(&self) -> Role {
        self.backend.borrow().role()
    }

    /// Width of the arithmetic ring.
    pub fn arithmetic_bitlen(&self) -> u32 {
        self.backend.borrow().arithmetic_bitlen()
    }

    /// The revealed value of an output, once executed and if visible to this party.
    pub fn clear_value<R: Representation>(&self, value: &Value<R>) -> Option<u64> {
        self.backend.borrow().clear_value(value.share())
    }

    /// Unwraps the backend.
    pub fn into_backend(self) -> B {
        self.backend.into_inner()
    }
}

/// Exclusive binding of representation `R` to a session's backend.
///
/// Releases the binding when dropped.
pub struct Context<'s, R: Representation> {
    backend: &'s RefCell<dyn GateBuilder + 'static>,
    bindings: &'s Bindings,
    repr: PhantomData<R>,
}

impl<R: Representation> fmt::Debug for Context<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("repr", &R::KIND).finish()
    }
}

impl<R: Representation> Drop for Context<'_, R> {
    fn drop(&mut self) {
        self.bindings.release(R::KIND);
        trace!(repr = %R::KIND, "released context");
    }
}

impl<R: Representation> Context<'_, R> {
    fn gate(&self, f: impl FnOnce(&mut (dyn GateBuilder + 'static)) -> Share) -> Share {
        let mut backend = self.backend.borrow_mut();
        f(&mut *backend)
    }

    /// The party this context builds for.
    pub fn role(&self) -> Role {
        self.backend.borrow().role()
    }

    /// Ring width of the arithmetic representation.
    pub fn arithmetic_bitlen(&self) -> u32 {
        self.backend.borrow().arithmetic_bitlen()
    }

    /// A private input of this party.
    pub fn input(&self, value: u64, bitlen: u32) -> Value<R> {
        let role = self.role();
        let share = self.gate(|b| b.put_input(R::KIND, value, bitlen, role));
        Value::with_bound(share, max_of_bitlen(bitlen))
    }

    /// A placeholder for the other party's private input of `bitlen` bits.
    pub fn dummy_input(&self, bitlen: u32) -> Value<R> {
        let share = self.gate(|b| b.put_dummy_input(R::KIND, bitlen));
        Value::with_bound(share, max_of_bitlen(bitlen))
    }

    /// An input split between both parties; `share` is this party's part.
    pub fn shared_input(&self, share: u64, bitlen: u32) -> Value<R> {
        let share = self.gate(|b| b.put_shared_input(R::KIND, share, bitlen));
        Value::with_bound(share, max_of_bitlen(bitlen))
    }

    /// A public constant occupying as few bits as possible.
    pub fn constant(&self, value: u64) -> Value<R> {
        let share = self.gate(|b| b.put_const_input(R::KIND, value, bitlen_of(value)));
        Value::with_bound(share, value)
    }

    /// A public constant of exactly `bitlen` bits.
    pub fn constant_with_bitlen(&self, value: u64, bitlen: u32) -> Value<R> {
        let share = self.gate(|b| b.put_const_input(R::KIND, value, bitlen));
        Value::with_bound(share, max_of_bitlen(bitlen))
    }

    /// Reveals `v` to `to` once the circuit has been executed.
    pub fn output(&self, v: &Value<R>, to: Recipient) -> Value<R> {
        let share = self.gate(|b| b.put_output(v.share(), to));
        Value::with_bound(share, v.max_val())
    }

    /// Reveals `v` as fresh shares, one per party.
    pub fn shared_output(&self, v: &Value<R>) -> Value<R> {
        let share = self.gate(|b| b.put_shared_output(v.share()));
        Value::with_bound(share, v.max_val())
    }

    /// `a + b`.
    pub fn add(&self, a: &Value<R>, b: &Value<R>) -> Value<R> {
        let share = self.gate(|g| g.add(a.share(), b.share()));
        Value::with_bound(share, bounds::add(a.max_val(), b.max_val()))
    }

    /// `a - b`, only meaningful if `a >= b`.
    pub fn sub(&self, a: &Value<R>, b: &Value<R>) -> Value<R> {
        let share = self.gate(|g| g.sub(a.share(), b.share()));
        Value::with_bound(share, bounds::sub(a.max_val(), b.max_val()))
    }

    /// `a * b`.
    pub fn mul(&self, a: &Value<R>, b: &Value<R>) -> Value<R> {
        let share = self.gate(|g| g.mul(a.share(), b.share()));
        Value::with_bound(share, bounds::mul(a.max_val(), b.max_val()))
    }

    /// Converts a value of another representation into this one, keeping its bound.
    ///
    /// Boolean values headed for the arithmetic representation are first zero-extended to the
    /// ring width.
    pub fn convert<S: Representation>(&self, v: &Value<S>) -> Value<R> {
        debug_assert!(
            self.bindings.is_bound(S::KIND),
            "converting from unbound representation {}",
            S::KIND
        );
        if S::KIND == R::KIND {
            return Value::with_bound(v.share().clone(), v.max_val());
        }
        let share = self.gate(|b| {
            let ring = b.arithmetic_bitlen();
            if R::KIND == Repr::Arithmetic && v.bitlen() < ring {
                let padding = b.put_const_input(S::KIND, 0, ring - v.bitlen());
                let mut wires = v.share().wires().to_vec();
                wires.extend_from_slice(padding.wires());
                b.convert(&Share::boolean(S::KIND, wires), R::KIND)
            } else {
                b.convert(v.share(), R::KIND)
            }
        });
        Value::with_bound(share, v.max_val())
    }
}

impl<R: BooleanRepresentation> Context<'_, R> {
    /// Bitwise `a AND b`.
    pub fn and(&self, a: &Value<R>, b: &Value<R>) -> Value<R> {
        let share = self.gate(|g| g.and(a.share(), b.share()));
        Value::with_bound(share, bounds::and(a.max_val(), b.max_val()))
    }

    /// Bitwise `a XOR b`.
    pub fn xor(&self, a: &Value<R>, b: &Value<R>) -> Value<R> {
        let share = self.gate(|g| g.xor(a.share(), b.share()));
        Value::with_bound(share, bounds::xor(a.max_val(), b.max_val()))
    }

    /// Bitwise `a OR b`.
    pub fn or(&self, a: &Value<R>, b: &Value<R>) -> Value<R> {
        let share = self.gate(|g| g.or(a.share(), b.share()));
        Value::with_bound(share, bounds::or(a.max_val(), b.max_val()))
    }

    /// Logical NOT of a single bit.
    pub fn not(&self, a: &Value<R>) -> Value<R> {
        assert_eq!(a.bitlen(), 1, "logical NOT of a multi-bit value");
        let share = self.gate(|g| g.not(a.share()));
        Value::with_bound(share, bounds::compare())
    }

    /// `a > b`.
    pub fn gt(&self, a: &Value<R>, b: &Value<R>) -> Value<R> {
        let share = self.gate(|g| g.gt(a.share(), b.share()));
        Value::with_bound(share, bounds::compare())
    }

    /// `a < b`.
    pub fn lt(&self, a: &Value<R>, b: &Value<R>) -> Value<R> {
        self.gt(b, a)
    }

    /// `a >= b`.
    pub fn ge(&self, a: &Value<R>, b: &Value<R>) -> Value<R> {
        let lt = self.lt(a, b);
        self.not(&lt)
    }

    /// `a <= b`.
    pub fn le(&self, a: &Value<R>, b: &Value<R>) -> Value<R> {
        let gt = self.gt(a, b);
        self.not(&gt)
    }

    /// `cond ? t : f` for a single-bit `cond`.
    pub fn if_else(&self, cond: &Value<R>, t: &Value<R>, f: &Value<R>) -> Value<R> {
        assert_eq!(cond.bitlen(), 1, "multiplexer condition must be a single bit");
        let share = self.gate(|g| g.mux(cond.share(), t.share(), f.share()));
        Value::with_bound(share, bounds::mux(t.max_val(), f.max_val()))
    }

    /// `hi ++ lo`: `lo` occupies the low bits, `hi` the bits above.
    pub fn concat(&self, hi: &Value<R>, lo: &Value<R>) -> Value<R> {
        let bitlen = hi.bitlen() + lo.bitlen();
        assert!(bitlen <= bounds::WORD_BITS, "concatenation of {bitlen} bits");
        let mut wires = lo.share().wires().to_vec();
        wires.extend_from_slice(hi.share().wires());
        Value::with_bound(
            Share::boolean(R::KIND, wires),
            bounds::concat(hi.max_val(), lo.max_val(), lo.bitlen()),
        )
    }

    /// Extends `v` to `bitlen` bits by padding with zero wires.
    pub fn bit_extend(&self, v: &Value<R>, bitlen: u32) -> Value<R> {
        if bitlen <= v.bitlen() {
            return v.clone();
        }
        let padding = self.constant_with_bitlen(0, bitlen - v.bitlen());
        let mut wires = v.share().wires().to_vec();
        wires.extend_from_slice(padding.share().wires());
        Value::with_bound(
            Share::boolean(R::KIND, wires),
            bounds::extend(v.max_val(), v.bitlen(), bitlen),
        )
    }

    /// Extends `v` to `bitlen` bits by repeating its top wire, turning a single bit into a mask.
    pub fn fill_extend(&self, v: &Value<R>, bitlen: u32) -> Value<R> {
        if bitlen <= v.bitlen() {
            return v.clone();
        }
        let mut wires = v.share().wires().to_vec();
        let top = wires[wires.len() - 1];
        wires.resize(bitlen as usize, top);
        Value::with_bound(
            Share::boolean(R::KIND, wires),
            bounds::extend(v.max_val(), v.bitlen(), bitlen),
        )
    }
}
