//! The selection circuits: per-column sums with an argmin across columns, and the extraction of
//! the winning column's "no" flags.

use tracing::debug;

use crate::{
    policy::{InputPolicy, NoPolicy, Selection},
    reduce::reduce_indexed,
    repr::{BooleanRepresentation, Recipient},
    session::Context,
    table::Table,
    value::Value,
};

/// Errors raised while describing a selection circuit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    /// The table has no rows or no columns.
    #[error("cannot select from a {rows}x{columns} table")]
    EmptyTable {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        columns: usize,
    },
    /// A weighted policy was used with a table without weights.
    #[error("the table carries no weights")]
    MissingWeights,
    /// The requested column does not exist.
    #[error("column {column} out of range for {columns} columns")]
    ColumnOutOfRange {
        /// The requested column.
        column: usize,
        /// Number of columns.
        columns: usize,
    },
}

fn check_dimensions(table: &Table) -> Result<(), SelectError> {
    if table.num_rows() == 0 || table.num_columns() == 0 {
        return Err(SelectError::EmptyTable {
            rows: table.num_rows(),
            columns: table.num_columns(),
        });
    }
    Ok(())
}

/// Describes the circuit selecting the best column, comparing in the representation the policy
/// converts its sums into.
///
/// See [`column_sum_circuit_with`].
pub fn column_sum_circuit<'c, P: Selection<'c>>(
    table: &Table,
    policy: &P,
) -> Result<Value<P::Compare>, SelectError> {
    column_sum_circuit_with(table, policy, policy.conversion())
}

/// Describes the circuit selecting the best column and returns the output revealing its index to
/// both parties.
///
/// For every column, the policy's contributions are summed into `(no_count, no_or_maybe_count)`.
/// Both counts are converted into `target` and packed into one value with `no_count` in the high
/// bits, so that a single comparison orders columns lexicographically. The argmin keeps the left
/// operand unless it is strictly greater, so ties go to the lowest index.
pub fn column_sum_circuit_with<'c, P, T>(
    table: &Table,
    policy: &P,
    target: &Context<'_, T>,
) -> Result<Value<T>, SelectError>
where
    P: InputPolicy<'c>,
    T: BooleanRepresentation,
{
    check_dimensions(table)?;
    let sums = column_sums(table, policy);
    let best = reduce_indexed(
        &sums,
        |(index_l, value_l): (Value<T>, Value<T>), (index_r, value_r)| {
            let gt = target.gt(&value_l, &value_r);
            (
                target.if_else(&gt, &index_r, &index_l),
                target.if_else(&gt, &value_r, &value_l),
            )
        },
        |(no, no_or_maybe), column| {
            let packed = target.concat(&target.convert(no), &target.convert(no_or_maybe));
            (target.constant(column as u64), packed)
        },
    );
    let (index, packed) = best.ok_or(SelectError::EmptyTable {
        rows: table.num_rows(),
        columns: table.num_columns(),
    })?;
    debug!(
        columns = table.num_columns(),
        packed_bits = packed.bitlen(),
        index_bits = index.bitlen(),
        "described column selection"
    );
    Ok(target.output(&index, Recipient::All))
}

/// Describes the circuit revealing, for each row, whether the entry in `column` is "no".
///
/// Only the entries of `column` enter the circuit.
pub fn no_selector_circuit<'c, P: NoPolicy<'c>>(
    table: &Table,
    column: usize,
    policy: &P,
    to: Recipient,
) -> Result<Vec<Value<P::Repr>>, SelectError> {
    check_dimensions(table)?;
    if column >= table.num_columns() {
        return Err(SelectError::ColumnOutOfRange {
            column,
            columns: table.num_columns(),
        });
    }
    let ctx = policy.context();
    Ok(table
        .column(column)
        .into_iter()
        .map(|entry| ctx.output(&policy.no_bit(entry), to))
        .collect())
}

/// Sums the column's contributions without the argmin, revealing `(no_count, no_or_maybe_count)`
/// of every column to `to`. Used to inspect the aggregation on its own.
pub fn column_counts_circuit<'c, P: InputPolicy<'c>>(
    table: &Table,
    policy: &P,
    to: Recipient,
) -> Result<Vec<(Value<P::Repr>, Value<P::Repr>)>, SelectError> {
    check_dimensions(table)?;
    let ctx = policy.context();
    Ok(column_sums(table, policy)
        .iter()
        .map(|(no, no_or_maybe)| (ctx.output(no, to), ctx.output(no_or_maybe, to)))
        .collect())
}

/// `(no_count, no_or_maybe_count)` of every column, each summed along a balanced tree.
fn column_sums<'c, P: InputPolicy<'c>>(
    table: &Table,
    policy: &P,
) -> Vec<(Value<P::Repr>, Value<P::Repr>)> {
    let ctx = policy.context();
    table
        .columns()
        .iter()
        .filter_map(|column| {
            reduce_indexed(
                column,
                |(no_l, nom_l): (Value<P::Repr>, Value<P::Repr>), (no_r, nom_r)| {
                    (ctx.add(&no_l, &no_r), ctx.add(&nom_l, &nom_r))
                },
                |&entry, row| policy.lift(entry, row),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        backend::SoloBackend,
        config::SessionConfig,
        oracle::expected_winner,
        oracle::column_counts,
        policy::{
            ArithHybrid, ArithInput, CompareIn, GetNo, GmwInput, NonWeighted, Weighted, YaoInput,
        },
        repr::{Arithmetic, Garbled, Representation, Role, Shared},
        session::Session,
        table::{Encoding, Entry, generate_tables},
    };

    use Entry::{Maybe as M, No as N, Yes as Y};

    #[rustfmt::skip]
    const POLL: [Entry; 25] = [
        Y, N, M, N, Y,
        N, M, Y, N, Y,
        N, N, M, Y, Y,
        M, M, N, N, Y,
        Y, Y, N, M, Y,
    ];

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(f)
    }

    fn run<T: Representation>(describe: impl FnOnce(&Session<SoloBackend>) -> Value<T>) -> u64 {
        let mut s = Session::new(SoloBackend::solo(Role::Server, &SessionConfig::default()));
        let out = describe(&s);
        block_on(s.execute()).unwrap();
        s.clear_value(&out).unwrap()
    }

    fn counts<T: Representation>(
        describe: impl FnOnce(&Session<SoloBackend>) -> Vec<(Value<T>, Value<T>)>,
    ) -> Vec<(u64, u64)> {
        let mut s = Session::new(SoloBackend::solo(Role::Server, &SessionConfig::default()));
        let outs = describe(&s);
        block_on(s.execute()).unwrap();
        outs.iter()
            .map(|(no, nom)| (s.clear_value(no).unwrap(), s.clear_value(nom).unwrap()))
            .collect()
    }

    fn gmw_winner(table: &Table) -> u64 {
        run(|s| {
            let gmw = s.bind::<Shared>().unwrap();
            column_sum_circuit(table, &NonWeighted::new(GmwInput::new(&gmw))).unwrap()
        })
    }

    fn table(rows: usize, columns: usize, entries: &[Entry]) -> Table {
        Table::from_entries(rows, columns, entries, Encoding::Boolean).unwrap()
    }

    #[test]
    fn counts_per_column() {
        let table = table(5, 5, &POLL);
        let mut s = Session::new(SoloBackend::solo(Role::Server, &SessionConfig::default()));
        let outs = {
            let yao = s.bind::<Garbled>().unwrap();
            column_counts_circuit(&table, &NonWeighted::new(YaoInput::new(&yao)), Recipient::All)
                .unwrap()
        };
        block_on(s.execute()).unwrap();
        let counts: Vec<_> = outs
            .iter()
            .map(|(no, nom)| (s.clear_value(no).unwrap(), s.clear_value(nom).unwrap()))
            .collect();
        assert_eq!(counts, vec![(2, 3), (2, 4), (2, 4), (3, 4), (0, 0)]);
    }

    #[test]
    fn every_representation_picks_the_same_winner() {
        let boolean = table(5, 5, &POLL);
        let arithmetic = Table::from_entries(5, 5, &POLL, Encoding::Arithmetic).unwrap();
        assert_eq!(gmw_winner(&boolean), 4);
        let yao = run(|s| {
            let yao = s.bind::<Garbled>().unwrap();
            column_sum_circuit(&boolean, &NonWeighted::new(YaoInput::new(&yao))).unwrap()
        });
        assert_eq!(yao, 4);
        let hybrid = run(|s| {
            let gmw = s.bind::<Shared>().unwrap();
            let arith = s.bind::<Arithmetic>().unwrap();
            let policy = ArithHybrid::new(NonWeighted::new(GmwInput::new(&gmw)), &arith);
            column_sum_circuit(&boolean, &policy).unwrap()
        });
        assert_eq!(hybrid, 4);
        let arith_yao = run(|s| {
            let arith = s.bind::<Arithmetic>().unwrap();
            let yao = s.bind::<Garbled>().unwrap();
            let policy = CompareIn::new(NonWeighted::new(ArithInput::new(&arith)), &yao);
            column_sum_circuit(&arithmetic, &policy).unwrap()
        });
        assert_eq!(arith_yao, 4);
        let gmw_arith_yao = run(|s| {
            let gmw = s.bind::<Shared>().unwrap();
            let arith = s.bind::<Arithmetic>().unwrap();
            let yao = s.bind::<Garbled>().unwrap();
            let hybrid = ArithHybrid::new(NonWeighted::new(GmwInput::new(&gmw)), &arith);
            column_sum_circuit(&boolean, &CompareIn::new(hybrid, &yao)).unwrap()
        });
        assert_eq!(gmw_arith_yao, 4);
    }

    #[test]
    fn ties_go_to_the_lowest_index() {
        assert_eq!(gmw_winner(&table(2, 3, &[M, N, M, Y, Y, Y])), 0);
        assert_eq!(gmw_winner(&table(1, 4, &[N, N, N, N])), 0);
        assert_eq!(gmw_winner(&table(1, 4, &[N, Y, N, Y])), 1);
    }

    #[test]
    fn fewer_maybes_break_equal_no_counts() {
        assert_eq!(gmw_winner(&table(2, 2, &[N, N, M, Y])), 1);
        // no count dominates the maybe count
        assert_eq!(gmw_winner(&table(3, 2, &[N, M, Y, M, Y, M])), 1);
    }

    #[test]
    fn unit_weights_match_the_unweighted_count() {
        let weighted = table(5, 5, &POLL).with_weights(vec![1; 5], 1).unwrap();
        let winner = run(|s| {
            let gmw = s.bind::<Shared>().unwrap();
            let policy = Weighted::new(&weighted, GmwInput::new(&gmw)).unwrap();
            column_sum_circuit(&weighted, &policy).unwrap()
        });
        assert_eq!(winner, gmw_winner(&weighted));
    }

    #[test]
    fn weights_can_change_the_winner() {
        let weighted = table(2, 2, &[N, Y, Y, N]).with_weights(vec![10, 1], 255).unwrap();
        assert_eq!(gmw_winner(&weighted), 0);
        let winner = run(|s| {
            let yao = s.bind::<Garbled>().unwrap();
            let arith = s.bind::<Arithmetic>().unwrap();
            let policy = ArithHybrid::new(Weighted::new(&weighted, YaoInput::new(&yao)).unwrap(), &arith);
            column_sum_circuit(&weighted, &policy).unwrap()
        });
        assert_eq!(winner, 1);
    }

    #[test]
    fn no_flags_of_the_winner() {
        let table = table(5, 5, &POLL);
        for (column, expected) in [(0, [0, 1, 1, 0, 0]), (4, [0; 5]), (3, [1, 1, 0, 1, 0])] {
            let mut s = Session::new(SoloBackend::solo(Role::Client, &SessionConfig::default()));
            let flags = {
                let gmw = s.bind::<Shared>().unwrap();
                let policy = GetNo::new(GmwInput::new(&gmw));
                no_selector_circuit(&table, column, &policy, Recipient::Client).unwrap()
            };
            block_on(s.execute()).unwrap();
            let clear: Vec<_> = flags.iter().map(|f| s.clear_value(f).unwrap()).collect();
            assert_eq!(clear, expected);
        }
    }

    #[test]
    fn malformed_requests_are_rejected() {
        let s = Session::new(SoloBackend::solo(Role::Server, &SessionConfig::default()));
        let gmw = s.bind::<Shared>().unwrap();
        let empty = Table::with_columns(3, Encoding::Boolean);
        assert_eq!(
            column_sum_circuit(&empty, &NonWeighted::new(GmwInput::new(&gmw))).err(),
            Some(SelectError::EmptyTable { rows: 0, columns: 3 })
        );
        let table = table(1, 2, &[Y, N]);
        assert_eq!(
            no_selector_circuit(&table, 2, &GetNo::new(GmwInput::new(&gmw)), Recipient::All).err(),
            Some(SelectError::ColumnOutOfRange { column: 2, columns: 2 })
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn winner_is_the_plaintext_argmin(
            (rows, columns, codes) in (1usize..6, 1usize..6).prop_flat_map(|(rows, columns)| {
                (Just(rows), Just(columns), prop::collection::vec(0usize..3, rows * columns))
            })
        ) {
            let entries: Vec<Entry> = codes.iter().map(|&c| [Y, M, N][c]).collect();
            let table = table(rows, columns, &entries);
            let winner = run(|s| {
                let yao = s.bind::<Garbled>().unwrap();
                let arith = s.bind::<Arithmetic>().unwrap();
                let policy = ArithHybrid::new(NonWeighted::new(YaoInput::new(&yao)), &arith);
                column_sum_circuit(&table, &policy).unwrap()
            });
            prop_assert_eq!(winner as usize, expected_winner(&table, false).unwrap());
            prop_assert_eq!(gmw_winner(&table), winner);
        }

        #[test]
        fn counts_match_the_plaintext_count(rows in 1usize..8, columns in 1usize..6, seed in any::<u64>()) {
            // a maximum weight of 1 leaves every participant with weight 1
            let boolean = generate_tables(rows, columns, Encoding::Boolean, 1, seed).unwrap().plain;
            let expected = column_counts(&boolean, false).unwrap();
            prop_assert_eq!(&column_counts(&boolean, true).unwrap(), &expected);

            let gmw = counts(|s| {
                let gmw = s.bind::<Shared>().unwrap();
                let policy = NonWeighted::new(GmwInput::new(&gmw));
                column_counts_circuit(&boolean, &policy, Recipient::All).unwrap()
            });
            prop_assert_eq!(&gmw, &expected);
            let weighted = counts(|s| {
                let gmw = s.bind::<Shared>().unwrap();
                let policy = Weighted::new(&boolean, GmwInput::new(&gmw)).unwrap();
                column_counts_circuit(&boolean, &policy, Recipient::All).unwrap()
            });
            prop_assert_eq!(&weighted, &expected);
            let hybrid = counts(|s| {
                let yao = s.bind::<Garbled>().unwrap();
                let arith = s.bind::<Arithmetic>().unwrap();
                let policy = ArithHybrid::new(NonWeighted::new(YaoInput::new(&yao)), &arith);
                column_counts_circuit(&boolean, &policy, Recipient::All).unwrap()
            });
            prop_assert_eq!(&hybrid, &expected);
            let weighted_hybrid = counts(|s| {
                let yao = s.bind::<Garbled>().unwrap();
                let arith = s.bind::<Arithmetic>().unwrap();
                let policy = ArithHybrid::new(Weighted::new(&boolean, YaoInput::new(&yao)).unwrap(), &arith);
                column_counts_circuit(&boolean, &policy, Recipient::All).unwrap()
            });
            prop_assert_eq!(&weighted_hybrid, &expected);

            let arithmetic = generate_tables(rows, columns, Encoding::Arithmetic, 1, seed).unwrap().plain;
            let arith = counts(|s| {
                let arith = s.bind::<Arithmetic>().unwrap();
                let policy = NonWeighted::new(ArithInput::new(&arith));
                column_counts_circuit(&arithmetic, &policy, Recipient::All).unwrap()
            });
            prop_assert_eq!(arith, column_counts(&arithmetic, false).unwrap());
        }
    }
}
