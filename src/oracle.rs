//! Plaintext evaluation of a poll, to check what the circuits reveal.

use crate::{
    poll::PollOutcome,
    table::{Entry, Table},
};

/// A revealed outcome that disagrees with the plaintext evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The table holds a value that is not an entry, so it is not a plaintext table.
    #[error("row {row}, column {column} holds no valid entry")]
    NotPlaintext {
        /// Row of the value.
        row: usize,
        /// Column of the value.
        column: usize,
    },
    /// The table has no columns to pick from.
    #[error("the table has no columns")]
    NoColumns,
    /// The revealed winner differs.
    #[error("expected winner {expected}, got {actual} (seed {seed})")]
    WrongWinner {
        /// Plaintext winner.
        expected: usize,
        /// Revealed winner.
        actual: usize,
        /// Seed the poll was generated from.
        seed: u64,
    },
    /// The revealed "no" flags differ.
    #[error("expected no flags {expected:?}, got {actual:?} (seed {seed})")]
    WrongNoFlags {
        /// Plaintext flags.
        expected: Vec<bool>,
        /// Revealed flags.
        actual: Vec<bool>,
        /// Seed the poll was generated from.
        seed: u64,
    },
}

fn decoded(table: &Table) -> Result<Vec<Entry>, OracleError> {
    let columns = table.num_columns().max(1);
    table
        .entries()
        .iter()
        .enumerate()
        .map(|(i, &e)| {
            Entry::decode(e, table.encoding()).ok_or(OracleError::NotPlaintext {
                row: i / columns,
                column: i % columns,
            })
        })
        .collect()
}

/// `(no_count, no_or_maybe_count)` of every column of a plaintext table, counting each row with
/// its weight if `weighted`.
pub fn column_counts(table: &Table, weighted: bool) -> Result<Vec<(u64, u64)>, OracleError> {
    let entries = decoded(table)?;
    let mut counts = vec![(0u64, 0u64); table.num_columns()];
    for row in 0..table.num_rows() {
        let weight = match weighted {
            true => table.weights().get(row).copied().unwrap_or(1) as u64,
            false => 1,
        };
        for (column, count) in counts.iter_mut().enumerate() {
            match entries[row * table.num_columns() + column] {
                Entry::Yes => {}
                Entry::Maybe => count.1 += weight,
                Entry::No => {
                    count.0 += weight;
                    count.1 += weight;
                }
            }
        }
    }
    Ok(counts)
}

/// The column with the fewest "no" answers, then the fewest "no" or "maybe" answers, then the
/// lowest index.
pub fn expected_winner(table: &Table, weighted: bool) -> Result<usize, OracleError> {
    column_counts(table, weighted)?
        .iter()
        .enumerate()
        .min_by_key(|&(column, &counts)| (counts, column))
        .map(|(column, _)| column)
        .ok_or(OracleError::NoColumns)
}

/// The "no" flag of every row for `column`.
pub fn expected_no_flags(table: &Table, column: usize) -> Result<Vec<bool>, OracleError> {
    let entries = decoded(table)?;
    Ok((0..table.num_rows())
        .map(|row| entries[row * table.num_columns() + column] == Entry::No)
        .collect())
}

/// Checks a revealed outcome against the plaintext table it was computed from.
///
/// Empty `no_flags` are accepted, since a party that is not a recipient of the flags learns none.
pub fn check_outcome(
    table: &Table,
    weighted: bool,
    outcome: &PollOutcome,
    seed: u64,
) -> Result<(), OracleError> {
    let expected = expected_winner(table, weighted)?;
    if outcome.winner != expected {
        return Err(OracleError::WrongWinner {
            expected,
            actual: outcome.winner,
            seed,
        });
    }
    if outcome.no_flags.is_empty() {
        return Ok(());
    }
    let flags = expected_no_flags(table, expected)?;
    if outcome.no_flags != flags {
        return Err(OracleError::WrongNoFlags {
            expected: flags,
            actual: outcome.no_flags.clone(),
            seed,
        });
    }
    Ok(())
}
