//! A cleartext reference backend.
//!
//! [`PlainBackend`] records a netlist of single-bit boolean gates and arithmetic word gates and
//! evaluates it after exchanging every input contribution with the other party. It offers no
//! privacy whatsoever: it exists to test circuit descriptions, to count their cost and to pin
//! down the semantics a real secure-computation engine has to provide behind [`GateBuilder`].
//!
//! Boolean gates are lowered the way a garbling or GMW engine would see them: additions become
//! ripple-carry adders with one AND gate per bit, comparisons the carry-out of a subtraction and
//! multiplexers a single AND gate per bit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    backend::{BackendError, CircuitBackend, GateBuilder, Share, Stats, Wire},
    bounds::max_of_bitlen,
    channel::{Channel, MsgChannel, SimpleChannel},
    config::SessionConfig,
    repr::{Recipient, Repr, Role},
};

/// A [`PlainBackend`] without a peer, see [`PlainBackend::solo`].
pub type SoloBackend = PlainBackend<SimpleChannel>;

#[derive(Debug, Clone)]
enum Gate {
    /// Bit `bit` of an input word, or the whole word (reduced to the ring) for arithmetic inputs.
    Input { slot: usize, bit: Option<u32> },
    Const(u64),
    Xor(Wire, Wire),
    And(Wire, Wire),
    Not(Wire),
    AddWord(Wire, Wire),
    SubWord(Wire, Wire),
    MulWord(Wire, Wire),
    /// Bits (least significant first) to a ring element.
    Compose(Vec<Wire>),
    /// A single bit of a ring element.
    BitOf(Wire, u32),
    Output(Wire),
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Own(usize),
    Peer(usize),
    Shared(usize, Repr),
}

#[derive(Debug, Clone, Copy)]
enum Visibility {
    Clear(Recipient),
    Shared,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct InputMsg {
    inputs: Vec<u64>,
    shares: Vec<u64>,
}

/// Reference evaluator for two parties connected by a [`Channel`].
#[derive(Debug)]
pub struct PlainBackend<C: Channel> {
    role: Role,
    arithmetic_bitlen: u32,
    channel: Option<MsgChannel<C>>,
    gates: Vec<Gate>,
    depths: Vec<u32>,
    slots: Vec<Slot>,
    own_inputs: Vec<u64>,
    own_shares: Vec<u64>,
    peer_inputs: usize,
    outputs: HashMap<usize, Visibility>,
    zero: Option<Wire>,
    one: Option<Wire>,
    stats: Stats,
    values: Option<Vec<u64>>,
}

impl<C: Channel> PlainBackend<C> {
    /// Creates a backend for `role`, talking to the other party over `channel`.
    pub fn new(role: Role, config: &SessionConfig, channel: C) -> Self {
        Self::with_channel(role, config, Some(MsgChannel(channel)))
    }

    fn with_channel(role: Role, config: &SessionConfig, channel: Option<MsgChannel<C>>) -> Self {
        PlainBackend {
            role,
            arithmetic_bitlen: config.arithmetic_bitlen.clamp(1, 64),
            channel,
            gates: vec![],
            depths: vec![],
            slots: vec![],
            own_inputs: vec![],
            own_shares: vec![],
            peer_inputs: 0,
            outputs: HashMap::new(),
            zero: None,
            one: None,
            stats: Stats::default(),
            values: None,
        }
    }

    fn push(&mut self, gate: Gate, depth: u32) -> Wire {
        let wire = Wire(self.gates.len());
        self.gates.push(gate);
        self.depths.push(depth);
        self.stats.depth = self.stats.depth.max(depth);
        wire
    }

    fn depth(&self, w: Wire) -> u32 {
        self.depths[w.0]
    }

    fn zero(&mut self) -> Wire {
        match self.zero {
            Some(w) => w,
            None => {
                let w = self.push(Gate::Const(0), 0);
                self.zero = Some(w);
                w
            }
        }
    }

    fn one(&mut self) -> Wire {
        match self.one {
            Some(w) => w,
            None => {
                let w = self.push(Gate::Const(1), 0);
                self.one = Some(w);
                w
            }
        }
    }

    fn xor_bit(&mut self, a: Wire, b: Wire) -> Wire {
        self.stats.xor_gates += 1;
        let depth = self.depth(a).max(self.depth(b));
        self.push(Gate::Xor(a, b), depth)
    }

    fn and_bit(&mut self, a: Wire, b: Wire) -> Wire {
        self.stats.and_gates += 1;
        let depth = self.depth(a).max(self.depth(b)) + 1;
        self.push(Gate::And(a, b), depth)
    }

    fn not_bit(&mut self, a: Wire) -> Wire {
        self.stats.xor_gates += 1;
        let depth = self.depth(a);
        self.push(Gate::Not(a), depth)
    }

    /// The wires of `s`, zero-extended to `len`.
    fn padded(&mut self, s: &Share, len: usize) -> Vec<Wire> {
        let mut wires = s.wires.clone();
        if wires.len() < len {
            let zero = self.zero();
            wires.resize(len, zero);
        }
        wires
    }

    fn boolean_operands(&mut self, a: &Share, b: &Share) -> (Repr, Vec<Wire>, Vec<Wire>) {
        assert_eq!(a.repr, b.repr, "operands of different representations");
        assert!(a.repr.is_boolean(), "{} is not a boolean representation", a.repr);
        let len = a.wires.len().max(b.wires.len());
        let a_wires = self.padded(a, len);
        let b_wires = self.padded(b, len);
        (a.repr, a_wires, b_wires)
    }

    /// Ripple-carry addition of two equally long bit vectors, returning the sum and the carry-out.
    fn ripple_add(&mut self, a: &[Wire], b: &[Wire], carry_in: Option<Wire>) -> (Vec<Wire>, Wire) {
        let mut carry = carry_in;
        let mut sum = Vec::with_capacity(a.len());
        for (&x, &y) in a.iter().zip(b) {
            match carry {
                None => {
                    sum.push(self.xor_bit(x, y));
                    carry = Some(self.and_bit(x, y));
                }
                Some(c) => {
                    let xc = self.xor_bit(x, c);
                    let yc = self.xor_bit(y, c);
                    sum.push(self.xor_bit(xc, y));
                    let both = self.and_bit(xc, yc);
                    carry = Some(self.xor_bit(c, both));
                }
            }
        }
        let carry = match carry {
            Some(c) => c,
            None => self.zero(),
        };
        (sum, carry)
    }

    fn word_gate(&mut self, a: &Share, b: &Share, gate: fn(Wire, Wire) -> Gate) -> Share {
        assert_eq!(a.repr, b.repr, "operands of different representations");
        self.stats.arithmetic_gates += 1;
        let (x, y) = (a.wires[0], b.wires[0]);
        let interactive = matches!(gate(x, y), Gate::MulWord(..)) as u32;
        let depth = self.depth(x).max(self.depth(y)) + interactive;
        let w = self.push(gate(x, y), depth);
        Share::arithmetic(w, self.arithmetic_bitlen)
    }

    fn check_peer(&self, peer: &InputMsg) -> Result<(), BackendError> {
        if peer.inputs.len() != self.peer_inputs {
            return Err(BackendError::InputMismatch {
                kind: "private",
                expected: self.peer_inputs,
                actual: peer.inputs.len(),
            });
        }
        if peer.shares.len() != self.own_shares.len() {
            return Err(BackendError::InputMismatch {
                kind: "shared",
                expected: self.own_shares.len(),
                actual: peer.shares.len(),
            });
        }
        Ok(())
    }

    fn evaluate(&self, peer: &InputMsg) -> Vec<u64> {
        let mask = max_of_bitlen(self.arithmetic_bitlen);
        let slots: Vec<u64> = self
            .slots
            .iter()
            .map(|slot| match *slot {
                Slot::Own(i) => self.own_inputs[i],
                Slot::Peer(i) => peer.inputs[i],
                Slot::Shared(i, Repr::Arithmetic) => {
                    self.own_shares[i].wrapping_add(peer.shares[i]) & mask
                }
                Slot::Shared(i, _) => self.own_shares[i] ^ peer.shares[i],
            })
            .collect();
        let mut values: Vec<u64> = Vec::with_capacity(self.gates.len());
        for gate in &self.gates {
            let v = match gate {
                Gate::Input { slot, bit: Some(i) } => (slots[*slot] >> i) & 1,
                Gate::Input { slot, bit: None } => slots[*slot] & mask,
                Gate::Const(c) => *c,
                Gate::Xor(a, b) => values[a.0] ^ values[b.0],
                Gate::And(a, b) => values[a.0] & values[b.0],
                Gate::Not(a) => values[a.0] ^ 1,
                Gate::AddWord(a, b) => values[a.0].wrapping_add(values[b.0]) & mask,
                Gate::SubWord(a, b) => values[a.0].wrapping_sub(values[b.0]) & mask,
                Gate::MulWord(a, b) => values[a.0].wrapping_mul(values[b.0]) & mask,
                Gate::Compose(bits) => {
                    bits.iter()
                        .enumerate()
                        .fold(0, |acc, (i, w)| acc | (values[w.0] << i))
                        & mask
                }
                Gate::BitOf(w, i) => (values[w.0] >> i) & 1,
                Gate::Output(w) => values[w.0],
            };
            values.push(v);
        }
        values
    }
}

impl PlainBackend<SimpleChannel> {
    /// Creates a backend that runs without a peer: all of the peer's private inputs and shares are
    /// taken to be zero. Useful to evaluate a circuit description in a single process.
    pub fn solo(role: Role, config: &SessionConfig) -> Self {
        Self::with_channel(role, config, None)
    }
}

impl<C: Channel> GateBuilder for PlainBackend<C> {
    fn role(&self) -> Role {
        self.role
    }

    fn arithmetic_bitlen(&self) -> u32 {
        self.arithmetic_bitlen
    }

    fn put_input(&mut self, repr: Repr, value: u64, bitlen: u32, owner: Role) -> Share {
        let slot = self.slots.len();
        if owner == self.role {
            self.slots.push(Slot::Own(self.own_inputs.len()));
            self.own_inputs.push(value);
        } else {
            self.slots.push(Slot::Peer(self.peer_inputs));
            self.peer_inputs += 1;
        }
        self.input_share(repr, slot, bitlen)
    }

    fn put_shared_input(&mut self, repr: Repr, share: u64, bitlen: u32) -> Share {
        let slot = self.slots.len();
        self.slots.push(Slot::Shared(self.own_shares.len(), repr));
        self.own_shares.push(share);
        self.input_share(repr, slot, bitlen)
    }

    fn put_const_input(&mut self, repr: Repr, value: u64, bitlen: u32) -> Share {
        if repr.is_boolean() {
            let wires = (0..bitlen.min(64))
                .map(|i| match (value >> i) & 1 {
                    0 => self.zero(),
                    _ => self.one(),
                })
                .collect();
            Share::boolean(repr, wires)
        } else {
            let w = self.push(Gate::Const(value & max_of_bitlen(self.arithmetic_bitlen)), 0);
            Share::arithmetic(w, self.arithmetic_bitlen)
        }
    }

    fn put_output(&mut self, share: &Share, to: Recipient) -> Share {
        self.output_share(share, Visibility::Clear(to))
    }

    fn put_shared_output(&mut self, share: &Share) -> Share {
        self.output_share(share, Visibility::Shared)
    }

    fn and(&mut self, a: &Share, b: &Share) -> Share {
        assert_eq!(a.repr, b.repr, "operands of different representations");
        assert!(a.repr.is_boolean(), "AND is not available for arithmetic shares");
        // bits above the shorter operand are zero
        let wires = a
            .wires
            .iter()
            .zip(&b.wires)
            .map(|(&x, &y)| self.and_bit(x, y))
            .collect();
        Share::boolean(a.repr, wires)
    }

    fn xor(&mut self, a: &Share, b: &Share) -> Share {
        let (repr, a, b) = self.boolean_operands(a, b);
        let wires = a.iter().zip(&b).map(|(&x, &y)| self.xor_bit(x, y)).collect();
        Share::boolean(repr, wires)
    }

    fn or(&mut self, a: &Share, b: &Share) -> Share {
        let (repr, a, b) = self.boolean_operands(a, b);
        let wires = a
            .iter()
            .zip(&b)
            .map(|(&x, &y)| {
                let both = self.and_bit(x, y);
                let either = self.xor_bit(x, y);
                self.xor_bit(either, both)
            })
            .collect();
        Share::boolean(repr, wires)
    }

    fn not(&mut self, a: &Share) -> Share {
        assert!(a.repr.is_boolean(), "NOT is not available for arithmetic shares");
        let wires = a.wires.iter().map(|&x| self.not_bit(x)).collect();
        Share::boolean(a.repr, wires)
    }

    fn add(&mut self, a: &Share, b: &Share) -> Share {
        if a.repr == Repr::Arithmetic {
            return self.word_gate(a, b, Gate::AddWord);
        }
        let (repr, a, b) = self.boolean_operands(a, b);
        let (mut sum, carry) = self.ripple_add(&a, &b, None);
        if sum.len() < 64 {
            sum.push(carry);
        }
        Share::boolean(repr, sum)
    }

    fn sub(&mut self, a: &Share, b: &Share) -> Share {
        if a.repr == Repr::Arithmetic {
            return self.word_gate(a, b, Gate::SubWord);
        }
        let (repr, a, b) = self.boolean_operands(a, b);
        let not_b: Vec<Wire> = b.iter().map(|&y| self.not_bit(y)).collect();
        let one = self.one();
        let (diff, _) = self.ripple_add(&a, &not_b, Some(one));
        Share::boolean(repr, diff)
    }

    fn mul(&mut self, a: &Share, b: &Share) -> Share {
        if a.repr == Repr::Arithmetic {
            return self.word_gate(a, b, Gate::MulWord);
        }
        assert_eq!(a.repr, b.repr, "operands of different representations");
        let width = (a.wires.len() + b.wires.len()).min(64);
        let mut acc: Option<Vec<Wire>> = None;
        for (i, &y) in b.wires.iter().enumerate().take(width) {
            let zero = self.zero();
            let row: Vec<Wire> = (0..width)
                .map(|j| match j.checked_sub(i).and_then(|k| a.wires.get(k)) {
                    Some(&x) => self.and_bit(x, y),
                    None => zero,
                })
                .collect();
            acc = Some(match acc {
                None => row,
                Some(acc) => self.ripple_add(&acc, &row, None).0,
            });
        }
        let wires = match acc {
            Some(wires) => wires,
            None => vec![self.zero()],
        };
        Share::boolean(a.repr, wires)
    }

    fn gt(&mut self, a: &Share, b: &Share) -> Share {
        let (repr, a, b) = self.boolean_operands(a, b);
        let not_b: Vec<Wire> = b.iter().map(|&y| self.not_bit(y)).collect();
        let (_, carry) = self.ripple_add(&a, &not_b, None);
        Share::boolean(repr, vec![carry])
    }

    fn mux(&mut self, cond: &Share, t: &Share, f: &Share) -> Share {
        assert_eq!(cond.wires.len(), 1, "multiplexer condition must be a single bit");
        let c = cond.wires[0];
        let (repr, t, f) = self.boolean_operands(t, f);
        let wires = t
            .iter()
            .zip(&f)
            .map(|(&x, &y)| {
                let diff = self.xor_bit(x, y);
                let pick = self.and_bit(c, diff);
                self.xor_bit(y, pick)
            })
            .collect();
        Share::boolean(repr, wires)
    }

    fn convert(&mut self, share: &Share, to: Repr) -> Share {
        if share.repr == to {
            return share.clone();
        }
        self.stats.conversions += 1;
        match (share.repr.is_boolean(), to.is_boolean()) {
            (true, true) => Share::boolean(to, share.wires.clone()),
            (true, false) => {
                debug_assert!(share.bitlen >= self.arithmetic_bitlen);
                let bits: Vec<Wire> = share
                    .wires
                    .iter()
                    .copied()
                    .take(self.arithmetic_bitlen as usize)
                    .collect();
                let depth = bits.iter().map(|&w| self.depth(w)).max().unwrap_or(0) + 1;
                let w = self.push(Gate::Compose(bits), depth);
                Share::arithmetic(w, self.arithmetic_bitlen)
            }
            (false, true) => {
                let word = share.wires[0];
                let depth = self.depth(word) + 1;
                let wires = (0..self.arithmetic_bitlen)
                    .map(|i| self.push(Gate::BitOf(word, i), depth))
                    .collect();
                Share::boolean(to, wires)
            }
            (false, false) => unreachable!("only one arithmetic representation exists"),
        }
    }

    fn clear_value(&self, share: &Share) -> Option<u64> {
        let values = self.values.as_ref()?;
        let mut clear = 0;
        for (i, w) in share.wires.iter().enumerate() {
            let v = match self.outputs.get(&w.0)? {
                Visibility::Clear(to) if to.includes(self.role) => values[w.0],
                Visibility::Clear(_) => return None,
                Visibility::Shared if self.role == Role::Server => values[w.0],
                Visibility::Shared => 0,
            };
            clear |= v << i;
        }
        Some(clear)
    }
}

impl<C: Channel> PlainBackend<C> {
    fn input_share(&mut self, repr: Repr, slot: usize, bitlen: u32) -> Share {
        if repr.is_boolean() {
            let wires: Vec<Wire> = (0..bitlen.min(64))
                .map(|i| self.push(Gate::Input { slot, bit: Some(i) }, 0))
                .collect();
            self.stats.input_wires += wires.len();
            Share::boolean(repr, wires)
        } else {
            self.stats.input_wires += 1;
            let w = self.push(Gate::Input { slot, bit: None }, 0);
            Share::arithmetic(w, self.arithmetic_bitlen)
        }
    }

    fn output_share(&mut self, share: &Share, visibility: Visibility) -> Share {
        let wires: Vec<Wire> = share
            .wires
            .iter()
            .map(|&w| {
                let depth = self.depth(w);
                let out = self.push(Gate::Output(w), depth);
                self.outputs.insert(out.0, visibility);
                out
            })
            .collect();
        Share {
            repr: share.repr,
            wires,
            bitlen: share.bitlen,
        }
    }
}

impl<C: Channel> CircuitBackend for PlainBackend<C> {
    async fn execute(&mut self) -> Result<(), BackendError> {
        let own = InputMsg {
            inputs: self.own_inputs.clone(),
            shares: self.own_shares.clone(),
        };
        let peer = match &mut self.channel {
            Some(channel) => {
                channel.send("circuit inputs", &own).await?;
                channel.recv::<InputMsg>("circuit inputs").await?
            }
            None => InputMsg {
                inputs: vec![0; self.peer_inputs],
                shares: vec![0; self.own_shares.len()],
            },
        };
        self.check_peer(&peer)?;
        let values = self.evaluate(&peer);
        debug!(
            role = %self.role,
            gates = self.gates.len(),
            outputs = self.outputs.len(),
            "evaluated circuit"
        );
        self.values = Some(values);
        Ok(())
    }

    fn reset(&mut self) {
        self.gates.clear();
        self.depths.clear();
        self.slots.clear();
        self.own_inputs.clear();
        self.own_shares.clear();
        self.peer_inputs = 0;
        self.outputs.clear();
        self.zero = None;
        self.one = None;
        self.stats = Stats::default();
        self.values = None;
    }

    fn stats(&self) -> Stats {
        self.stats
    }
}
