//! Settings shared by both parties of a poll computation.

use serde::{Deserialize, Serialize};

use crate::repr::Recipient;

/// Parameters both parties must agree on before building any circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Ring width (in bits) of the arithmetic representation.
    pub arithmetic_bitlen: u32,
    /// Largest weight a participant may carry in weighted polls.
    pub max_weight: u32,
    /// Who learns the per-participant "no" flags of the winning time slot.
    pub no_recipient: Recipient,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            arithmetic_bitlen: 32,
            max_weight: 255,
            no_recipient: Recipient::Server,
        }
    }
}
