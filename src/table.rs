//! Poll tables: one row per participant, one column per time slot.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::bounds::{bitlen_of, max_of_bitlen};

/// A participant's answer for one time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entry {
    /// Available.
    Yes,
    /// Available if need be.
    Maybe,
    /// Not available.
    No,
}

impl Entry {
    /// The 2-bit code: bit 1 is set for "no", bit 0 for "no" or "maybe".
    pub fn code(self) -> u8 {
        match self {
            Entry::Yes => 0b00,
            Entry::Maybe => 0b01,
            Entry::No => 0b11,
        }
    }

    /// Decodes a 2-bit code. `0b10` is not a valid code.
    pub fn from_code(code: u8) -> Option<Entry> {
        match code {
            0b00 => Some(Entry::Yes),
            0b01 => Some(Entry::Maybe),
            0b11 => Some(Entry::No),
            _ => None,
        }
    }

    /// The table value of this entry under `encoding`.
    pub fn encode(self, encoding: Encoding) -> u64 {
        let flag_bits = encoding.flag_bits();
        let no = matches!(self, Entry::No) as u64;
        let no_or_maybe = !matches!(self, Entry::Yes) as u64;
        (no << flag_bits) | no_or_maybe
    }

    /// Decodes a plaintext table value.
    pub fn decode(value: u64, encoding: Encoding) -> Option<Entry> {
        let flag_bits = encoding.flag_bits();
        match (value >> flag_bits, value & max_of_bitlen(flag_bits)) {
            (0, 0) => Some(Entry::Yes),
            (0, 1) => Some(Entry::Maybe),
            (1, 1) => Some(Entry::No),
            _ => None,
        }
    }

    fn symbol(self) -> char {
        match self {
            Entry::Yes => 'Y',
            Entry::Maybe => '?',
            Entry::No => 'N',
        }
    }
}

/// How entries are stored in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// 2-bit codes, split into XOR shares.
    Boolean,
    /// Two 32-bit halves ("no" high, "no or maybe" low), each split into additive shares modulo
    /// `2^32`.
    Arithmetic,
}

impl Encoding {
    /// Bits per flag: the "no" flag sits right above the "no or maybe" flag.
    pub fn flag_bits(self) -> u32 {
        match self {
            Encoding::Boolean => 1,
            Encoding::Arithmetic => 32,
        }
    }
}

/// Errors raised when constructing a table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// The number of entries does not match the dimensions.
    #[error("expected {expected} entries, got {actual}")]
    EntryCount {
        /// `num_rows * num_columns`.
        expected: usize,
        /// Entries supplied.
        actual: usize,
    },
    /// The number of weights does not match the number of rows.
    #[error("expected {expected} weights, got {actual}")]
    WeightCount {
        /// `num_rows`.
        expected: usize,
        /// Weights supplied.
        actual: usize,
    },
    /// A weight does not fit the bits reserved for weights.
    #[error("weight {weight} of row {row} exceeds {max}")]
    WeightTooLarge {
        /// The offending row.
        row: usize,
        /// Its weight.
        weight: u32,
        /// The largest allowed weight.
        max: u64,
    },
    /// The maximum weight is zero.
    #[error("the maximum weight must be at least 1")]
    ZeroMaxWeight,
}

/// A grid of entries, stored row-major, with an optional weight per row.
///
/// Depending on who holds it, a table contains plaintext entries or one party's shares of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    entries: Vec<u64>,
    weights: Vec<u32>,
    num_rows: usize,
    num_columns: usize,
    max_weight: u32,
    encoding: Encoding,
}

impl Table {
    /// A table without weights.
    pub fn new(
        num_rows: usize,
        num_columns: usize,
        entries: Vec<u64>,
        encoding: Encoding,
    ) -> Result<Self, TableError> {
        if entries.len() != num_rows * num_columns {
            return Err(TableError::EntryCount {
                expected: num_rows * num_columns,
                actual: entries.len(),
            });
        }
        Ok(Table {
            entries,
            weights: vec![],
            num_rows,
            num_columns,
            max_weight: 1,
            encoding,
        })
    }

    /// A plaintext table built from answers.
    pub fn from_entries(
        num_rows: usize,
        num_columns: usize,
        entries: &[Entry],
        encoding: Encoding,
    ) -> Result<Self, TableError> {
        let entries = entries.iter().map(|e| e.encode(encoding)).collect();
        Table::new(num_rows, num_columns, entries, encoding)
    }

    /// An empty table whose rows are added one by one, see [`Table::add_row`].
    pub fn with_columns(num_columns: usize, encoding: Encoding) -> Self {
        Table {
            entries: vec![],
            weights: vec![],
            num_rows: 0,
            num_columns,
            max_weight: 1,
            encoding,
        }
    }

    /// Attaches one weight per row. Weights (or their shares) must fit in
    /// `bitlen_of(max_weight)` bits.
    pub fn with_weights(mut self, weights: Vec<u32>, max_weight: u32) -> Result<Self, TableError> {
        if max_weight == 0 {
            return Err(TableError::ZeroMaxWeight);
        }
        if weights.len() != self.num_rows {
            return Err(TableError::WeightCount {
                expected: self.num_rows,
                actual: weights.len(),
            });
        }
        let max = max_of_bitlen(bitlen_of(max_weight as u64));
        if let Some((row, &weight)) = weights
            .iter()
            .enumerate()
            .find(|&(_, &w)| w as u64 > max)
        {
            return Err(TableError::WeightTooLarge { row, weight, max });
        }
        self.weights = weights;
        self.max_weight = max_weight;
        Ok(self)
    }

    /// Appends a row of entries.
    pub fn add_row(&mut self, row: &[u64]) -> Result<(), TableError> {
        if row.len() != self.num_columns {
            return Err(TableError::EntryCount {
                expected: self.num_columns,
                actual: row.len(),
            });
        }
        self.entries.extend_from_slice(row);
        self.num_rows += 1;
        Ok(())
    }

    /// Number of participants.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of time slots.
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Upper bound of the weights.
    pub fn max_weight(&self) -> u32 {
        self.max_weight
    }

    /// How entries are stored.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// All entries, row-major.
    pub fn entries(&self) -> &[u64] {
        &self.entries
    }

    /// One weight per row, empty if the table is unweighted.
    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    /// Whether weights are attached.
    pub fn is_weighted(&self) -> bool {
        !self.weights.is_empty()
    }

    /// The entry of `row` in `column`.
    pub fn entry(&self, row: usize, column: usize) -> u64 {
        self.entries[row * self.num_columns + column]
    }

    /// The entries of `row`.
    pub fn row(&self, row: usize) -> &[u64] {
        let start = row * self.num_columns;
        &self.entries[start..start + self.num_columns]
    }

    /// The entries of `column`, top to bottom.
    pub fn column(&self, column: usize) -> Vec<u64> {
        self.entries
            .iter()
            .skip(column)
            .step_by(self.num_columns.max(1))
            .copied()
            .collect()
    }

    /// All columns, left to right.
    pub fn columns(&self) -> Vec<Vec<u64>> {
        (0..self.num_columns).map(|j| self.column(j)).collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8} |", "weight")?;
        for j in 0..self.num_columns {
            write!(f, " {j:>3}")?;
        }
        writeln!(f)?;
        for i in 0..self.num_rows {
            match self.weights.get(i) {
                Some(w) => write!(f, "{w:>8} |")?,
                None => write!(f, "{:>8} |", "-")?,
            }
            for &e in self.row(i) {
                match Entry::decode(e, self.encoding) {
                    Some(entry) => write!(f, " {:>3}", entry.symbol())?,
                    None => write!(f, " {e:>3x}")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// A plaintext table and the two parties' shares of it, see [`generate_tables`].
#[derive(Debug, Clone)]
pub struct GeneratedTables {
    /// The seed everything was derived from.
    pub seed: u64,
    /// The plaintext answers and weights.
    pub plain: Table,
    /// The server's shares.
    pub server: Table,
    /// The client's shares.
    pub client: Table,
}

/// Draws a random weighted poll and splits it into shares for both parties.
///
/// Weights are drawn from `1..=max_weight`. Boolean tables are split into XOR shares of the 2-bit
/// codes, arithmetic tables into additive shares of each 32-bit half. Weights are always XOR
/// shares. The result is fully determined by `seed`.
pub fn generate_tables(
    num_rows: usize,
    num_columns: usize,
    encoding: Encoding,
    max_weight: u32,
    seed: u64,
) -> Result<GeneratedTables, TableError> {
    if max_weight == 0 {
        return Err(TableError::ZeroMaxWeight);
    }
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let answers = [Entry::Yes, Entry::Maybe, Entry::No];
    let cells = num_rows * num_columns;
    let mut plain = Vec::with_capacity(cells);
    let mut server = Vec::with_capacity(cells);
    let mut client = Vec::with_capacity(cells);
    for _ in 0..cells {
        let value = answers[rng.random_range(0..answers.len())].encode(encoding);
        let (s, c) = match encoding {
            Encoding::Boolean => {
                let c = rng.random_range(0..4u64);
                (value ^ c, c)
            }
            Encoding::Arithmetic => {
                let (hi, lo) = ((value >> 32) as u32, value as u32);
                let (c_hi, c_lo): (u32, u32) = (rng.random(), rng.random());
                let s_hi = hi.wrapping_sub(c_hi);
                let s_lo = lo.wrapping_sub(c_lo);
                (
                    ((s_hi as u64) << 32) | s_lo as u64,
                    ((c_hi as u64) << 32) | c_lo as u64,
                )
            }
        };
        plain.push(value);
        server.push(s);
        client.push(c);
    }
    let weight_mask = max_of_bitlen(bitlen_of(max_weight as u64)) as u32;
    let mut plain_weights = Vec::with_capacity(num_rows);
    let mut server_weights = Vec::with_capacity(num_rows);
    let mut client_weights = Vec::with_capacity(num_rows);
    for _ in 0..num_rows {
        let w = rng.random_range(1..=max_weight);
        let c = rng.random_range(0..=weight_mask);
        plain_weights.push(w);
        server_weights.push(w ^ c);
        client_weights.push(c);
    }
    let table = |entries, weights| {
        Table::new(num_rows, num_columns, entries, encoding)?.with_weights(weights, max_weight)
    };
    Ok(GeneratedTables {
        seed,
        plain: table(plain, plain_weights)?,
        server: table(server, server_weights)?,
        client: table(client, client_weights)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_bit_slices() {
        for entry in [Entry::Yes, Entry::Maybe, Entry::No] {
            let e = entry.code();
            assert_eq!(e >> 1 == 1, entry == Entry::No);
            assert_eq!(e & 1 == 1, entry != Entry::Yes);
            assert_eq!(Entry::from_code(e), Some(entry));
            assert_eq!(entry.encode(Encoding::Boolean), e as u64);
            for encoding in [Encoding::Boolean, Encoding::Arithmetic] {
                assert_eq!(Entry::decode(entry.encode(encoding), encoding), Some(entry));
            }
        }
        assert_eq!(Entry::from_code(0b10), None);
        assert_eq!(Entry::No.encode(Encoding::Arithmetic), (1 << 32) | 1);
    }

    #[test]
    fn columns_are_strided() {
        let table = Table::new(2, 3, vec![0, 1, 3, 3, 0, 1], Encoding::Boolean).unwrap();
        assert_eq!(table.column(0), vec![0, 3]);
        assert_eq!(table.column(2), vec![3, 1]);
        assert_eq!(table.row(1), &[3, 0, 1]);
        assert_eq!(table.entry(1, 2), 1);
        assert_eq!(table.columns().len(), 3);
    }

    #[test]
    fn dimensions_are_checked() {
        assert_eq!(
            Table::new(2, 2, vec![0; 3], Encoding::Boolean),
            Err(TableError::EntryCount {
                expected: 4,
                actual: 3
            })
        );
        let table = Table::new(2, 1, vec![0; 2], Encoding::Boolean).unwrap();
        assert!(matches!(
            table.clone().with_weights(vec![1], 255),
            Err(TableError::WeightCount { .. })
        ));
        assert!(matches!(
            table.with_weights(vec![1, 8], 7),
            Err(TableError::WeightTooLarge { row: 1, .. })
        ));
    }

    #[test]
    fn rows_can_be_appended() {
        let mut table = Table::with_columns(2, Encoding::Boolean);
        table.add_row(&[0, 3]).unwrap();
        table.add_row(&[1, 1]).unwrap();
        assert!(table.add_row(&[1]).is_err());
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column(1), vec![3, 1]);
    }

    #[test]
    fn shares_recombine_to_the_plain_table() {
        for encoding in [Encoding::Boolean, Encoding::Arithmetic] {
            let t = generate_tables(7, 4, encoding, 255, 42).unwrap();
            for ((&p, &s), &c) in t
                .plain
                .entries()
                .iter()
                .zip(t.server.entries())
                .zip(t.client.entries())
            {
                let combined = match encoding {
                    Encoding::Boolean => s ^ c,
                    Encoding::Arithmetic => {
                        let hi = ((s >> 32) as u32).wrapping_add((c >> 32) as u32);
                        let lo = (s as u32).wrapping_add(c as u32);
                        ((hi as u64) << 32) | lo as u64
                    }
                };
                assert_eq!(combined, p);
                assert!(Entry::decode(p, encoding).is_some());
            }
            for ((&p, &s), &c) in t
                .plain
                .weights()
                .iter()
                .zip(t.server.weights())
                .zip(t.client.weights())
            {
                assert_eq!(s ^ c, p);
                assert!((1..=255).contains(&p));
            }
        }
    }

    #[test]
    fn generation_is_reproducible() {
        let a = generate_tables(5, 5, Encoding::Boolean, 10, 7).unwrap();
        let b = generate_tables(5, 5, Encoding::Boolean, 10, 7).unwrap();
        assert_eq!(a.plain, b.plain);
        assert_eq!(a.client, b.client);
    }

    #[test]
    fn display_shows_answers() {
        let answers = [Entry::Yes, Entry::Maybe, Entry::No];
        let table = Table::from_entries(1, 3, &answers, Encoding::Boolean)
            .unwrap()
            .with_weights(vec![4], 255)
            .unwrap();
        let rendered = table.to_string();
        let row = rendered.lines().nth(1).unwrap();
        assert!(row.trim_start().starts_with('4'));
        assert!(row.ends_with("Y   ?   N"));
    }
}
