//! Oblivious selection of the best time slot of a scheduling poll, computed by two parties who
//! each hold a share of the participants' answers.
//!
//! Every participant answers "yes", "maybe" or "no" for every time slot. The winner is the slot
//! with the fewest (optionally weighted) "no" answers, ties broken by the fewest "no" or "maybe"
//! answers and then by the lowest index. Neither party learns anything beyond the winning slot
//! and, for that slot only, which participants answered "no".
//!
//! ## Main Components
//!
//! * [`session`]: binding the three value representations ([`repr`]) to a circuit backend and
//!   describing gates on [`value::Value`]s whose bounds are tracked by [`bounds`].
//! * [`policy`]: what a table entry becomes inside the circuit (directly lifted, weighted, or
//!   summed in the arithmetic representation).
//! * [`select`]: the column sums, the argmin across columns and the extraction of "no" flags,
//!   all folded along balanced trees ([`reduce`]).
//! * [`poll`]: the two-phase run of a complete poll with one of the [`poll::Algorithm`]s.
//! * [`backend`]: the interface a secure-computation engine implements, and a cleartext
//!   reference backend exchanging inputs over a [`channel`].
//! * [`table`], [`wire`], [`oracle`]: poll tables and their shares, the byte formats at the
//!   boundary, and a plaintext evaluation to check results against.
//!
//! ## Example
//!
//! ```ignore
//! use secpoll::{
//!     backend::PlainBackend,
//!     channel::SimpleChannel,
//!     config::SessionConfig,
//!     poll::{Algorithm, run_poll},
//!     repr::Role,
//!     session::Session,
//!     table::{Encoding, generate_tables},
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::default();
//! let tables = generate_tables(10, 5, Encoding::Boolean, config.max_weight, 42)?;
//! let (server_channel, client_channel) = SimpleChannel::pair();
//! let mut server = Session::new(PlainBackend::new(Role::Server, &config, server_channel));
//! let mut client = Session::new(PlainBackend::new(Role::Client, &config, client_channel));
//!
//! let (server_outcome, client_outcome) = tokio::try_join!(
//!     run_poll(&mut server, &tables.server, Algorithm::YaoWeighted, &config),
//!     run_poll(&mut client, &tables.client, Algorithm::YaoWeighted, &config),
//! )?;
//! assert_eq!(server_outcome.winner, client_outcome.winner);
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod backend;
pub mod bounds;
pub mod channel;
pub mod config;
pub mod oracle;
pub mod policy;
pub mod poll;
pub mod reduce;
pub mod repr;
pub mod select;
pub mod session;
pub mod table;
pub mod value;
pub mod wire;
