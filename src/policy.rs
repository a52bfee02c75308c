//! Input policies: what a table entry becomes inside the circuit.
//!
//! A [`Lift`] decides how one of this party's table values enters the circuit (secret-shared,
//! as a private garbled input, or as an arithmetic share). On top of that, an [`InputPolicy`]
//! turns an entry into the pair of flags the column sums need, and a [`NoPolicy`] extracts the
//! single "no" flag revealed for the winning column. A [`Selection`] additionally names the
//! boolean representation the summed counts are converted into before columns are compared.

use crate::{
    bounds::{bitlen_of, max_of_bitlen},
    repr::{Arithmetic, BooleanRepresentation, Garbled, Representation, Shared},
    select::SelectError,
    session::Context,
    table::{Encoding, Table},
    value::Value,
};

/// Brings one of this party's (shared) table values into the circuit.
pub trait Lift<'c> {
    /// Representation of the lifted values.
    type Repr: Representation;
    /// How the party's table encodes entries.
    const ENCODING: Encoding;

    /// The context values are created in.
    fn context(&self) -> &'c Context<'c, Self::Repr>;

    /// Lifts `value` (this party's share of it) as a value of `bitlen` bits bounded by `max_val`.
    fn lift(&self, value: u64, bitlen: u32, max_val: u64) -> Value<Self::Repr>;
}

/// Entries are XOR-shared between the parties and enter as shared boolean inputs.
#[derive(Debug, Clone, Copy)]
pub struct GmwInput<'c> {
    ctx: &'c Context<'c, Shared>,
}

impl<'c> GmwInput<'c> {
    /// Lifts into `ctx`.
    pub fn new(ctx: &'c Context<'c, Shared>) -> Self {
        GmwInput { ctx }
    }
}

impl<'c> Lift<'c> for GmwInput<'c> {
    type Repr = Shared;
    const ENCODING: Encoding = Encoding::Boolean;

    fn context(&self) -> &'c Context<'c, Shared> {
        self.ctx
    }

    fn lift(&self, value: u64, bitlen: u32, max_val: u64) -> Value<Shared> {
        self.ctx.shared_input(value, bitlen).narrow(max_val)
    }
}

/// Entries are XOR-shared between the parties. Garbled circuits only accept private inputs, so
/// each party supplies its share as its own input and the two are XORed inside the circuit.
#[derive(Debug, Clone, Copy)]
pub struct YaoInput<'c> {
    ctx: &'c Context<'c, Garbled>,
}

impl<'c> YaoInput<'c> {
    /// Lifts into `ctx`.
    pub fn new(ctx: &'c Context<'c, Garbled>) -> Self {
        YaoInput { ctx }
    }
}

impl<'c> Lift<'c> for YaoInput<'c> {
    type Repr = Garbled;
    const ENCODING: Encoding = Encoding::Boolean;

    fn context(&self) -> &'c Context<'c, Garbled> {
        self.ctx
    }

    fn lift(&self, value: u64, bitlen: u32, max_val: u64) -> Value<Garbled> {
        let own = self.ctx.input(value, bitlen);
        let peer = self.ctx.dummy_input(bitlen);
        self.ctx.xor(&own, &peer).narrow(max_val)
    }
}

/// Entries are additively shared 32-bit halves and enter as arithmetic shares.
#[derive(Debug, Clone, Copy)]
pub struct ArithInput<'c> {
    ctx: &'c Context<'c, Arithmetic>,
}

impl<'c> ArithInput<'c> {
    /// Lifts into `ctx`.
    pub fn new(ctx: &'c Context<'c, Arithmetic>) -> Self {
        ArithInput { ctx }
    }
}

impl<'c> Lift<'c> for ArithInput<'c> {
    type Repr = Arithmetic;
    const ENCODING: Encoding = Encoding::Arithmetic;

    fn context(&self) -> &'c Context<'c, Arithmetic> {
        self.ctx
    }

    fn lift(&self, value: u64, bitlen: u32, max_val: u64) -> Value<Arithmetic> {
        self.ctx.shared_input(value, bitlen).narrow(max_val)
    }
}

/// The (no, no-or-maybe) parts of an entry share under `encoding`.
fn split(entry: u64, encoding: Encoding) -> (u64, u64) {
    let flag_bits = encoding.flag_bits();
    (
        (entry >> flag_bits) & max_of_bitlen(flag_bits),
        entry & max_of_bitlen(flag_bits),
    )
}

/// Turns a table entry of row `row` into the values summed per column: first the "no" count
/// contribution, then the "no or maybe" count contribution.
pub trait InputPolicy<'c> {
    /// Representation the contributions are summed in.
    type Repr: Representation;

    /// The context the contributions are summed in.
    fn context(&self) -> &'c Context<'c, Self::Repr>;

    /// Lifts one entry.
    fn lift(&self, entry: u64, row: usize) -> (Value<Self::Repr>, Value<Self::Repr>);
}

/// Every participant counts once.
#[derive(Debug, Clone, Copy)]
pub struct NonWeighted<L> {
    lift: L,
}

impl<L> NonWeighted<L> {
    /// Counts entries lifted by `lift`.
    pub fn new(lift: L) -> Self {
        NonWeighted { lift }
    }
}

impl<'c, L: Lift<'c>> InputPolicy<'c> for NonWeighted<L> {
    type Repr = L::Repr;

    fn context(&self) -> &'c Context<'c, L::Repr> {
        self.lift.context()
    }

    fn lift(&self, entry: u64, _row: usize) -> (Value<L::Repr>, Value<L::Repr>) {
        let flag_bits = L::ENCODING.flag_bits();
        let max_val = max_of_bitlen(flag_bits);
        let (no, no_or_maybe) = split(entry, L::ENCODING);
        (
            self.lift.lift(no, flag_bits, max_val),
            self.lift.lift(no_or_maybe, flag_bits, max_val),
        )
    }
}

/// Every participant counts with their weight.
///
/// A 0/1 flag times a weight is computed by spreading the flag over the weight's bits and ANDing,
/// which avoids a multiplier.
#[derive(Debug, Clone)]
pub struct Weighted<'c, L: Lift<'c>> {
    lift: L,
    weights: Vec<Value<L::Repr>>,
    weight_bitlen: u32,
}

impl<'c, L: Lift<'c>> Weighted<'c, L>
where
    L::Repr: BooleanRepresentation,
{
    /// Lifts the weight of every row of `table` once.
    pub fn new(table: &Table, lift: L) -> Result<Self, SelectError> {
        if !table.is_weighted() {
            return Err(SelectError::MissingWeights);
        }
        let max_weight = table.max_weight() as u64;
        let weight_bitlen = bitlen_of(max_weight);
        let weights = table
            .weights()
            .iter()
            .map(|&w| lift.lift(w as u64, weight_bitlen, max_weight))
            .collect();
        Ok(Weighted {
            lift,
            weights,
            weight_bitlen,
        })
    }
}

impl<'c, L: Lift<'c>> InputPolicy<'c> for Weighted<'c, L>
where
    L::Repr: BooleanRepresentation,
{
    type Repr = L::Repr;

    fn context(&self) -> &'c Context<'c, L::Repr> {
        self.lift.context()
    }

    fn lift(&self, entry: u64, row: usize) -> (Value<L::Repr>, Value<L::Repr>) {
        let ctx = self.lift.context();
        let flag_bits = L::ENCODING.flag_bits();
        let (no, no_or_maybe) = split(entry, L::ENCODING);
        let weight = &self.weights[row];
        let weighted = |flag: u64| {
            let flag = self.lift.lift(flag, flag_bits, 1);
            let mask = ctx.fill_extend(&flag, self.weight_bitlen);
            ctx.and(&mask, weight)
        };
        (weighted(no), weighted(no_or_maybe))
    }
}

/// Sums in the arithmetic representation whatever the wrapped policy produces.
#[derive(Debug, Clone)]
pub struct ArithHybrid<'c, P> {
    inner: P,
    arith: &'c Context<'c, Arithmetic>,
}

impl<'c, P> ArithHybrid<'c, P> {
    /// Converts the contributions of `inner` into `arith`.
    pub fn new(inner: P, arith: &'c Context<'c, Arithmetic>) -> Self {
        ArithHybrid { inner, arith }
    }
}

impl<'c, P: InputPolicy<'c>> InputPolicy<'c> for ArithHybrid<'c, P> {
    type Repr = Arithmetic;

    fn context(&self) -> &'c Context<'c, Arithmetic> {
        self.arith
    }

    fn lift(&self, entry: u64, row: usize) -> (Value<Arithmetic>, Value<Arithmetic>) {
        let (no, no_or_maybe) = self.inner.lift(entry, row);
        (self.arith.convert(&no), self.arith.convert(&no_or_maybe))
    }
}

/// An input policy that also chooses where the column sums are compared.
pub trait Selection<'c>: InputPolicy<'c> {
    /// Representation the argmin across columns runs in.
    type Compare: BooleanRepresentation;

    /// The context the sums are converted into for the comparison.
    fn conversion(&self) -> &'c Context<'c, Self::Compare>;
}

impl<'c, L: Lift<'c>> Selection<'c> for NonWeighted<L>
where
    L::Repr: BooleanRepresentation,
{
    type Compare = L::Repr;

    fn conversion(&self) -> &'c Context<'c, L::Repr> {
        self.lift.context()
    }
}

impl<'c, L: Lift<'c>> Selection<'c> for Weighted<'c, L>
where
    L::Repr: BooleanRepresentation,
{
    type Compare = L::Repr;

    fn conversion(&self) -> &'c Context<'c, L::Repr> {
        self.lift.context()
    }
}

/// Sums in arithmetic, compares back where the flags were lifted.
impl<'c, P: Selection<'c>> Selection<'c> for ArithHybrid<'c, P> {
    type Compare = P::Compare;

    fn conversion(&self) -> &'c Context<'c, P::Compare> {
        self.inner.conversion()
    }
}

/// Compares the sums of the wrapped policy in `T`, whatever representation they were summed in.
#[derive(Debug, Clone)]
pub struct CompareIn<'c, P, T: Representation> {
    inner: P,
    target: &'c Context<'c, T>,
}

impl<'c, P, T: Representation> CompareIn<'c, P, T> {
    /// Compares the sums of `inner` in `target`.
    pub fn new(inner: P, target: &'c Context<'c, T>) -> Self {
        CompareIn { inner, target }
    }
}

impl<'c, P: InputPolicy<'c>, T: Representation> InputPolicy<'c> for CompareIn<'c, P, T> {
    type Repr = P::Repr;

    fn context(&self) -> &'c Context<'c, P::Repr> {
        self.inner.context()
    }

    fn lift(&self, entry: u64, row: usize) -> (Value<P::Repr>, Value<P::Repr>) {
        self.inner.lift(entry, row)
    }
}

impl<'c, P: InputPolicy<'c>, T: BooleanRepresentation> Selection<'c> for CompareIn<'c, P, T> {
    type Compare = T;

    fn conversion(&self) -> &'c Context<'c, T> {
        self.target
    }
}

/// Extracts the "no" flag of an entry.
pub trait NoPolicy<'c> {
    /// Representation of the flag.
    type Repr: Representation;

    /// The context the flag is created in.
    fn context(&self) -> &'c Context<'c, Self::Repr>;

    /// The "no" flag of one entry, bounded by 1.
    fn no_bit(&self, entry: u64) -> Value<Self::Repr>;
}

/// The "no" part of the entry, lifted on its own.
#[derive(Debug, Clone, Copy)]
pub struct GetNo<L> {
    lift: L,
}

impl<L> GetNo<L> {
    /// Extracts flags lifted by `lift`.
    pub fn new(lift: L) -> Self {
        GetNo { lift }
    }
}

impl<'c, L: Lift<'c>> NoPolicy<'c> for GetNo<L> {
    type Repr = L::Repr;

    fn context(&self) -> &'c Context<'c, L::Repr> {
        self.lift.context()
    }

    fn no_bit(&self, entry: u64) -> Value<L::Repr> {
        let flag_bits = L::ENCODING.flag_bits();
        let (no, _) = split(entry, L::ENCODING);
        self.lift.lift(no, flag_bits, 1)
    }
}
