//! Conservative upper bounds on the values a secret can hold.
//!
//! Every [`crate::value::Value`] carries a `max_val` bounding the value its wires can take. The
//! functions in this module compute the bound of a gate's result from the bounds of its operands.
//! The exact formulas matter: the bound decides how many wires the backend is asked for, and thus
//! the gate count of the whole circuit. [`xor`] is the one approximation that may undercount.

/// Number of bits of a native integer, the widest value the backends deal with.
pub const WORD_BITS: u32 = u64::BITS;

/// The largest value representable with `bitlen` bits.
pub fn max_of_bitlen(bitlen: u32) -> u64 {
    if bitlen >= WORD_BITS {
        u64::MAX
    } else {
        (1 << bitlen) - 1
    }
}

/// The number of bits needed to represent `max_val`, i.e. `ceil(log2(max_val + 1))`.
///
/// A value of 0 still occupies one wire.
pub fn bitlen_of(max_val: u64) -> u32 {
    (WORD_BITS - max_val.leading_zeros()).max(1)
}

/// Sets every bit below the highest set bit of `x`.
pub fn smear(mut x: u64) -> u64 {
    let mut shift = 1;
    while shift < WORD_BITS {
        x |= x >> shift;
        shift <<= 1;
    }
    x
}

/// Bound of `a AND b`.
pub fn and(a: u64, b: u64) -> u64 {
    a.min(b)
}

/// Bound of `a XOR b`.
///
/// Takes the larger operand and fills in every bit below the highest bit the two operands share.
/// Gate counts depend on this exact formula. It always needs as many bits as the wider operand, so
/// the result is never narrowed below the operands' wires, but for operands without common bits
/// (e.g. 8 and 7) the returned bound is below the true maximum.
pub fn xor(a: u64, b: u64) -> u64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    hi | smear(lo & hi)
}

/// Bound of `a OR b`, identical to [`xor`].
pub fn or(a: u64, b: u64) -> u64 {
    xor(a, b)
}

/// Bound of `a + b`, saturating.
pub fn add(a: u64, b: u64) -> u64 {
    a.saturating_add(b)
}

/// Bound of `a - b`. Subtraction is only used where the result stays non-negative.
pub fn sub(a: u64, _b: u64) -> u64 {
    a
}

/// Bound of `a * b`, saturating as soon as the operand widths exceed a native word.
pub fn mul(a: u64, b: u64) -> u64 {
    if bitlen_of(a) + bitlen_of(b) > WORD_BITS {
        u64::MAX
    } else {
        a * b
    }
}

/// Bound of a comparison or a logical NOT: a single bit.
pub fn compare() -> u64 {
    1
}

/// Bound of `cond ? t : f`.
pub fn mux(t: u64, f: u64) -> u64 {
    t.max(f)
}

/// Bound of `lhs ++ rhs`, where `rhs` occupies the low `rhs_bitlen` bits.
pub fn concat(lhs: u64, rhs: u64, rhs_bitlen: u32) -> u64 {
    let high = if rhs_bitlen >= WORD_BITS {
        if lhs == 0 { 0 } else { u64::MAX }
    } else if lhs > u64::MAX >> rhs_bitlen {
        u64::MAX
    } else {
        lhs << rhs_bitlen
    };
    high | rhs
}

/// Bound of extending a value of `old_bitlen` wires to `new_bitlen` wires.
pub fn extend(max_val: u64, old_bitlen: u32, new_bitlen: u32) -> u64 {
    if new_bitlen <= old_bitlen {
        return max_val;
    }
    concat(max_of_bitlen(new_bitlen - old_bitlen), max_val, old_bitlen)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn bitlen_boundaries() {
        assert_eq!(bitlen_of(0), 1);
        assert_eq!(bitlen_of(1), 1);
        assert_eq!(bitlen_of(2), 2);
        assert_eq!(bitlen_of(255), 8);
        assert_eq!(bitlen_of(256), 9);
        assert_eq!(bitlen_of(u64::MAX), 64);
        assert_eq!(max_of_bitlen(0), 0);
        assert_eq!(max_of_bitlen(8), 255);
        assert_eq!(max_of_bitlen(64), u64::MAX);
    }

    #[test]
    fn smear_fills_below_top_bit() {
        assert_eq!(smear(0), 0);
        assert_eq!(smear(1), 1);
        assert_eq!(smear(0b1000), 0b1111);
        assert_eq!(smear(0b1010_0000), 0b1111_1111);
        assert_eq!(smear(1 << 63), u64::MAX);
    }

    #[test]
    fn xor_bound_examples() {
        // no overlap: the larger operand alone
        assert_eq!(xor(0b1000, 0b0111), 0b1000);
        assert_eq!(xor(0b1000, 0), 0b1000);
        // overlap in bit 2 fills bits 0..=2
        assert_eq!(xor(0b1100, 0b0100), 0b1111);
        assert_eq!(xor(5, 4), 7);
        assert_eq!(xor(1, 1), 1);
        assert_eq!(or(2, 2), 3);
    }

    #[test]
    fn arithmetic_saturates() {
        assert_eq!(add(u64::MAX, 1), u64::MAX);
        assert_eq!(add(3, 4), 7);
        assert_eq!(sub(7, 100), 7);
        assert_eq!(mul(255, 255), 65025);
        assert_eq!(mul(1 << 40, 1 << 30), u64::MAX);
        // a zero bound still occupies one bit
        assert_eq!(mul(0, u64::MAX), u64::MAX);
        assert_eq!(mul(0, 1 << 62), 0);
    }

    #[test]
    fn concat_and_extend() {
        assert_eq!(concat(3, 5, 3), 0b11_101);
        assert_eq!(concat(1, 0, 1), 0b10);
        assert_eq!(concat(u64::MAX, 0, 1), u64::MAX);
        assert_eq!(extend(1, 1, 8), 255);
        assert_eq!(extend(5, 3, 3), 5);
        assert_eq!(extend(1, 1, 64), u64::MAX);
    }

    proptest! {
        #[test]
        fn bounds_are_never_undercounted(a in any::<u64>(), b in any::<u64>(), x in any::<u64>(), y in any::<u64>()) {
            let x = if a == u64::MAX { x } else { x % (a + 1) };
            let y = if b == u64::MAX { y } else { y % (b + 1) };
            prop_assert!(x & y <= and(a, b));
            prop_assert!(bitlen_of(x ^ y) <= bitlen_of(xor(a, b)));
            prop_assert!(bitlen_of(x | y) <= bitlen_of(or(a, b)));
            prop_assert!(x.saturating_add(y) <= add(a, b));
            prop_assert!(x.saturating_mul(y) <= mul(a, b));
            prop_assert!(x.max(y) <= mux(a, b));
        }

        #[test]
        fn xor_of_equal_bounds_is_safe(a in any::<u64>(), x in any::<u64>(), y in any::<u64>()) {
            let x = if a == u64::MAX { x } else { x % (a + 1) };
            let y = if a == u64::MAX { y } else { y % (a + 1) };
            prop_assert!(x ^ y <= xor(a, a));
            prop_assert!(x | y <= or(a, a));
        }

        #[test]
        fn bitlen_roundtrip(n in 1u32..=64) {
            prop_assert_eq!(bitlen_of(max_of_bitlen(n)), n);
        }
    }
}
