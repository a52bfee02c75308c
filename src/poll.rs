//! Running a complete poll: select the winning time slot, then reveal who said "no" to it.

use std::{fmt, time::Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    backend::{BackendError, CircuitBackend, Stats},
    bounds::bitlen_of,
    config::SessionConfig,
    policy::{
        ArithHybrid, ArithInput, CompareIn, GetNo, GmwInput, NonWeighted, Weighted, YaoInput,
    },
    repr::{Arithmetic, Garbled, Recipient, Representation, Shared},
    select::{SelectError, column_sum_circuit, no_selector_circuit},
    session::{BindError, Session},
    table::{Encoding, Table},
    value::Value,
};

/// The ways of combining representations to evaluate a poll.
///
/// The name lists the representations in the order values pass through them: where entries are
/// lifted, where they are summed and where columns are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Secret-shared boolean throughout.
    Gmw,
    /// Garbled circuits throughout.
    Yao,
    /// Like [`Algorithm::Gmw`], weighting every participant.
    GmwWeighted,
    /// Like [`Algorithm::Yao`], weighting every participant.
    YaoWeighted,
    /// Flags in GMW, sums in arithmetic, comparisons in GMW.
    GmwHybrid,
    /// Flags in Yao, sums in arithmetic, comparisons in Yao.
    YaoHybrid,
    /// Weighted flags in GMW, sums in arithmetic, comparisons in GMW.
    GmwWeightedHybrid,
    /// Weighted flags in Yao, sums in arithmetic, comparisons in Yao.
    YaoWeightedHybrid,
    /// Arithmetic entries and sums, comparisons in GMW.
    ArithGmw,
    /// Arithmetic entries and sums, comparisons in Yao.
    ArithYao,
    /// Flags in GMW, sums in arithmetic, comparisons in Yao.
    GmwArithYao,
}

impl Algorithm {
    /// Every algorithm.
    pub const ALL: [Algorithm; 11] = [
        Algorithm::Gmw,
        Algorithm::Yao,
        Algorithm::GmwWeighted,
        Algorithm::YaoWeighted,
        Algorithm::GmwHybrid,
        Algorithm::YaoHybrid,
        Algorithm::GmwWeightedHybrid,
        Algorithm::YaoWeightedHybrid,
        Algorithm::ArithGmw,
        Algorithm::ArithYao,
        Algorithm::GmwArithYao,
    ];

    /// Whether participants count with their weight.
    pub fn is_weighted(self) -> bool {
        matches!(
            self,
            Algorithm::GmwWeighted
                | Algorithm::YaoWeighted
                | Algorithm::GmwWeightedHybrid
                | Algorithm::YaoWeightedHybrid
        )
    }

    /// How the parties' tables must encode entries.
    pub fn encoding(self) -> Encoding {
        match self {
            Algorithm::ArithGmw | Algorithm::ArithYao => Encoding::Arithmetic,
            _ => Encoding::Boolean,
        }
    }

    fn sums_in_arithmetic(self) -> bool {
        matches!(
            self,
            Algorithm::GmwHybrid
                | Algorithm::YaoHybrid
                | Algorithm::GmwWeightedHybrid
                | Algorithm::YaoWeightedHybrid
                | Algorithm::ArithGmw
                | Algorithm::ArithYao
                | Algorithm::GmwArithYao
        )
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Gmw => "gmw",
            Algorithm::Yao => "yao",
            Algorithm::GmwWeighted => "gmw-weighted",
            Algorithm::YaoWeighted => "yao-weighted",
            Algorithm::GmwHybrid => "gmw-hybrid",
            Algorithm::YaoHybrid => "yao-hybrid",
            Algorithm::GmwWeightedHybrid => "gmw-weighted-hybrid",
            Algorithm::YaoWeightedHybrid => "yao-weighted-hybrid",
            Algorithm::ArithGmw => "arith-gmw",
            Algorithm::ArithYao => "arith-yao",
            Algorithm::GmwArithYao => "gmw-arith-yao",
        };
        f.write_str(name)
    }
}

/// What a party learns from a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    /// Index of the winning time slot.
    pub winner: usize,
    /// Per participant, whether they answered "no" for the winner. Empty for a party that is not
    /// a recipient of the flags.
    pub no_flags: Vec<bool>,
}

/// Errors raised while running a poll.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// A representation was still bound.
    #[error(transparent)]
    Bind(#[from] BindError),
    /// The backend failed to execute a circuit.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The table does not fit the selection circuit.
    #[error(transparent)]
    Select(#[from] SelectError),
    /// An output that should have been revealed to this party was not.
    #[error("the {0} was not revealed to this party")]
    MissingOutput(&'static str),
    /// The revealed winner is not a column of the table.
    #[error("winner {winner} out of range for {columns} columns")]
    WinnerOutOfRange {
        /// The revealed index.
        winner: u64,
        /// Number of columns.
        columns: usize,
    },
    /// The arithmetic ring of the session cannot hold the values of this algorithm.
    #[error("{algorithm} needs an arithmetic ring of {required} bits, the session uses {actual}")]
    UnsupportedRing {
        /// The algorithm.
        algorithm: Algorithm,
        /// Ring width the algorithm needs.
        required: u32,
        /// Ring width of the session.
        actual: u32,
    },
    /// The table encodes entries differently than the algorithm expects.
    #[error("{algorithm} expects {expected:?} entries, the table holds {actual:?} entries")]
    EncodingMismatch {
        /// The algorithm.
        algorithm: Algorithm,
        /// Encoding the algorithm lifts.
        expected: Encoding,
        /// Encoding of the table.
        actual: Encoding,
    },
}

fn check_compatibility(
    table: &Table,
    algorithm: Algorithm,
    ring: u32,
) -> Result<(), PollError> {
    if table.encoding() != algorithm.encoding() {
        return Err(PollError::EncodingMismatch {
            algorithm,
            expected: algorithm.encoding(),
            actual: table.encoding(),
        });
    }
    let required = match algorithm.encoding() {
        // shares of the halves wrap at 32 bits
        Encoding::Arithmetic => Some(32).filter(|&bits| bits != ring),
        Encoding::Boolean if algorithm.sums_in_arithmetic() => {
            let weight = if algorithm.is_weighted() {
                table.max_weight() as u64
            } else {
                1
            };
            let bits = bitlen_of((table.num_rows() as u64).saturating_mul(weight));
            Some(bits).filter(|&bits| bits > ring)
        }
        Encoding::Boolean => None,
    };
    match required {
        Some(required) => Err(PollError::UnsupportedRing {
            algorithm,
            required,
            actual: ring,
        }),
        None => Ok(()),
    }
}

fn log_stats(phase: &str, stats: Stats) {
    info!(
        phase,
        and_gates = stats.and_gates,
        xor_gates = stats.xor_gates,
        arithmetic_gates = stats.arithmetic_gates,
        conversions = stats.conversions,
        input_wires = stats.input_wires,
        depth = stats.depth,
        "built circuit"
    );
}

/// Runs both phases of a poll for the party of `session`.
///
/// `table` holds this party's shares, encoded as [`Algorithm::encoding`] requires. The first phase
/// reveals the winning column to both parties, the second reveals the winner's "no" flags to
/// `config.no_recipient`. Both parties must call this with the same algorithm and configuration.
#[instrument(level = "info", skip_all, fields(role = %session.role(), %algorithm))]
pub async fn run_poll<B: CircuitBackend + 'static>(
    session: &mut Session<B>,
    table: &Table,
    algorithm: Algorithm,
    config: &SessionConfig,
) -> Result<PollOutcome, PollError> {
    let ring = session.arithmetic_bitlen();
    check_compatibility(table, algorithm, ring)?;
    session.reset();
    let to = config.no_recipient;
    match algorithm {
        Algorithm::Gmw => {
            let select = |s: &Session<B>| -> Result<_, PollError> {
                let gmw = s.bind::<Shared>()?;
                Ok(column_sum_circuit(table, &NonWeighted::new(GmwInput::new(&gmw)))?)
            };
            two_phases(session, table, to, select, |s, c| gmw_nos(s, table, c, to)).await
        }
        Algorithm::Yao => {
            let select = |s: &Session<B>| -> Result<_, PollError> {
                let yao = s.bind::<Garbled>()?;
                Ok(column_sum_circuit(table, &NonWeighted::new(YaoInput::new(&yao)))?)
            };
            two_phases(session, table, to, select, |s, c| yao_nos(s, table, c, to)).await
        }
        Algorithm::GmwWeighted => {
            let select = |s: &Session<B>| -> Result<_, PollError> {
                let gmw = s.bind::<Shared>()?;
                let policy = Weighted::new(table, GmwInput::new(&gmw))?;
                Ok(column_sum_circuit(table, &policy)?)
            };
            two_phases(session, table, to, select, |s, c| gmw_nos(s, table, c, to)).await
        }
        Algorithm::YaoWeighted => {
            let select = |s: &Session<B>| -> Result<_, PollError> {
                let yao = s.bind::<Garbled>()?;
                let policy = Weighted::new(table, YaoInput::new(&yao))?;
                Ok(column_sum_circuit(table, &policy)?)
            };
            two_phases(session, table, to, select, |s, c| yao_nos(s, table, c, to)).await
        }
        Algorithm::GmwHybrid => {
            let select = |s: &Session<B>| -> Result<_, PollError> {
                let gmw = s.bind::<Shared>()?;
                let arith = s.bind::<Arithmetic>()?;
                let policy = ArithHybrid::new(NonWeighted::new(GmwInput::new(&gmw)), &arith);
                Ok(column_sum_circuit(table, &policy)?)
            };
            two_phases(session, table, to, select, |s, c| gmw_nos(s, table, c, to)).await
        }
        Algorithm::YaoHybrid => {
            let select = |s: &Session<B>| -> Result<_, PollError> {
                let yao = s.bind::<Garbled>()?;
                let arith = s.bind::<Arithmetic>()?;
                let policy = ArithHybrid::new(NonWeighted::new(YaoInput::new(&yao)), &arith);
                Ok(column_sum_circuit(table, &policy)?)
            };
            two_phases(session, table, to, select, |s, c| yao_nos(s, table, c, to)).await
        }
        Algorithm::GmwWeightedHybrid => {
            let select = |s: &Session<B>| -> Result<_, PollError> {
                let gmw = s.bind::<Shared>()?;
                let arith = s.bind::<Arithmetic>()?;
                let policy = ArithHybrid::new(Weighted::new(table, GmwInput::new(&gmw))?, &arith);
                Ok(column_sum_circuit(table, &policy)?)
            };
            two_phases(session, table, to, select, |s, c| gmw_nos(s, table, c, to)).await
        }
        Algorithm::YaoWeightedHybrid => {
            let select = |s: &Session<B>| -> Result<_, PollError> {
                let yao = s.bind::<Garbled>()?;
                let arith = s.bind::<Arithmetic>()?;
                let policy = ArithHybrid::new(Weighted::new(table, YaoInput::new(&yao))?, &arith);
                Ok(column_sum_circuit(table, &policy)?)
            };
            two_phases(session, table, to, select, |s, c| yao_nos(s, table, c, to)).await
        }
        Algorithm::ArithGmw => {
            let select = |s: &Session<B>| -> Result<_, PollError> {
                let arith = s.bind::<Arithmetic>()?;
                let gmw = s.bind::<Shared>()?;
                let policy = CompareIn::new(NonWeighted::new(ArithInput::new(&arith)), &gmw);
                Ok(column_sum_circuit(table, &policy)?)
            };
            two_phases(session, table, to, select, |s, c| arith_nos(s, table, c, to)).await
        }
        Algorithm::ArithYao => {
            let select = |s: &Session<B>| -> Result<_, PollError> {
                let arith = s.bind::<Arithmetic>()?;
                let yao = s.bind::<Garbled>()?;
                let policy = CompareIn::new(NonWeighted::new(ArithInput::new(&arith)), &yao);
                Ok(column_sum_circuit(table, &policy)?)
            };
            two_phases(session, table, to, select, |s, c| arith_nos(s, table, c, to)).await
        }
        Algorithm::GmwArithYao => {
            let select = |s: &Session<B>| -> Result<_, PollError> {
                let gmw = s.bind::<Shared>()?;
                let arith = s.bind::<Arithmetic>()?;
                let yao = s.bind::<Garbled>()?;
                let hybrid = ArithHybrid::new(NonWeighted::new(GmwInput::new(&gmw)), &arith);
                Ok(column_sum_circuit(table, &CompareIn::new(hybrid, &yao))?)
            };
            two_phases(session, table, to, select, |s, c| gmw_nos(s, table, c, to)).await
        }
    }
}

fn gmw_nos<B: CircuitBackend + 'static>(
    s: &Session<B>,
    table: &Table,
    column: usize,
    to: Recipient,
) -> Result<Vec<Value<Shared>>, PollError> {
    let gmw = s.bind::<Shared>()?;
    Ok(no_selector_circuit(table, column, &GetNo::new(GmwInput::new(&gmw)), to)?)
}

fn yao_nos<B: CircuitBackend + 'static>(
    s: &Session<B>,
    table: &Table,
    column: usize,
    to: Recipient,
) -> Result<Vec<Value<Garbled>>, PollError> {
    let yao = s.bind::<Garbled>()?;
    Ok(no_selector_circuit(table, column, &GetNo::new(YaoInput::new(&yao)), to)?)
}

fn arith_nos<B: CircuitBackend + 'static>(
    s: &Session<B>,
    table: &Table,
    column: usize,
    to: Recipient,
) -> Result<Vec<Value<Arithmetic>>, PollError> {
    let arith = s.bind::<Arithmetic>()?;
    Ok(no_selector_circuit(table, column, &GetNo::new(ArithInput::new(&arith)), to)?)
}

/// Describes and executes the selection, then (for the revealed winner) the flag extraction.
async fn two_phases<B, T, N>(
    session: &mut Session<B>,
    table: &Table,
    no_recipient: Recipient,
    select: impl FnOnce(&Session<B>) -> Result<Value<T>, PollError>,
    extract: impl FnOnce(&Session<B>, usize) -> Result<Vec<Value<N>>, PollError>,
) -> Result<PollOutcome, PollError>
where
    B: CircuitBackend + 'static,
    T: Representation,
    N: Representation,
{
    let winner = select(session)?;
    log_stats("selection", session.stats());
    let start = Instant::now();
    session.execute().await?;
    let winner = session
        .clear_value(&winner)
        .ok_or(PollError::MissingOutput("winning column"))?;
    session.reset();
    info!(winner, elapsed = ?start.elapsed(), "selected winner");
    let column = usize::try_from(winner)
        .ok()
        .filter(|&column| column < table.num_columns())
        .ok_or(PollError::WinnerOutOfRange {
            winner,
            columns: table.num_columns(),
        })?;

    let flags = extract(session, column)?;
    log_stats("no flags", session.stats());
    let start = Instant::now();
    session.execute().await?;
    let no_flags = if no_recipient.includes(session.role()) {
        flags
            .iter()
            .map(|flag| session.clear_value(flag).map(|v| v != 0))
            .collect::<Option<Vec<_>>>()
            .ok_or(PollError::MissingOutput("no flags"))?
    } else {
        vec![]
    };
    session.reset();
    info!(elapsed = ?start.elapsed(), "revealed no flags");
    Ok(PollOutcome {
        winner: column,
        no_flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::SoloBackend, repr::Role, table::generate_tables};

    #[test]
    fn names_are_unique() {
        let names: std::collections::HashSet<String> =
            Algorithm::ALL.iter().map(|a| a.to_string()).collect();
        assert_eq!(names.len(), Algorithm::ALL.len());
    }

    #[test]
    fn incompatible_tables_are_rejected() {
        let t = generate_tables(3, 2, Encoding::Boolean, 255, 1).unwrap();
        assert!(matches!(
            check_compatibility(&t.server, Algorithm::ArithGmw, 32),
            Err(PollError::EncodingMismatch { .. })
        ));
        let t = generate_tables(3, 2, Encoding::Arithmetic, 255, 1).unwrap();
        assert!(matches!(
            check_compatibility(&t.server, Algorithm::ArithYao, 16),
            Err(PollError::UnsupportedRing { required: 32, .. })
        ));
        let t = generate_tables(300, 2, Encoding::Boolean, 255, 1).unwrap();
        assert!(matches!(
            check_compatibility(&t.server, Algorithm::GmwWeightedHybrid, 16),
            Err(PollError::UnsupportedRing { required: 17, .. })
        ));
        assert!(check_compatibility(&t.server, Algorithm::GmwHybrid, 16).is_ok());
        assert!(check_compatibility(&t.server, Algorithm::Gmw, 1).is_ok());
    }

    #[tokio::test]
    async fn solo_session_runs_both_phases() -> Result<(), PollError> {
        let config = SessionConfig {
            no_recipient: Recipient::All,
            ..SessionConfig::default()
        };
        // solo: the peer contributes zero shares, so the plain table is this party's share
        let t = generate_tables(6, 4, Encoding::Boolean, 255, 3).unwrap();
        let mut session = Session::new(SoloBackend::solo(Role::Client, &config));
        let outcome = run_poll(&mut session, &t.plain, Algorithm::Gmw, &config).await?;
        assert!(outcome.winner < 4);
        assert_eq!(outcome.no_flags.len(), 6);
        assert!(!session.is_bound(crate::repr::Repr::Shared));
        Ok(())
    }
}
