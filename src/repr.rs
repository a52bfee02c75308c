//! Representation tags, party roles and output recipients.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three ways a secret value can be encoded by a circuit backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Repr {
    /// Garbled-circuit boolean representation (Yao): AND gates cost ciphertexts, XOR is free.
    Garbled,
    /// Secret-shared boolean representation (GMW): AND gates cost a round, XOR is local.
    Shared,
    /// Additive shares modulo `2^w`: ADD is local, MUL costs a multiplication triple.
    Arithmetic,
}

impl Repr {
    /// All representations, in binding-slot order.
    pub const ALL: [Repr; 3] = [Repr::Garbled, Repr::Shared, Repr::Arithmetic];

    /// Whether gates of this representation operate on single bits.
    pub fn is_boolean(self) -> bool {
        !matches!(self, Repr::Arithmetic)
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Repr::Garbled => 0,
            Repr::Shared => 1,
            Repr::Arithmetic => 2,
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repr::Garbled => f.write_str("yao"),
            Repr::Shared => f.write_str("gmw"),
            Repr::Arithmetic => f.write_str("arith"),
        }
    }
}

/// Type-level tag of a representation, used to keep values of different representations apart.
pub trait Representation: fmt::Debug + Copy + 'static {
    /// The runtime tag.
    const KIND: Repr;
}

/// Representations whose values are bundles of single-bit wires.
pub trait BooleanRepresentation: Representation {}

/// Type-level tag for [`Repr::Garbled`].
#[derive(Debug, Clone, Copy)]
pub struct Garbled;

/// Type-level tag for [`Repr::Shared`].
#[derive(Debug, Clone, Copy)]
pub struct Shared;

/// Type-level tag for [`Repr::Arithmetic`].
#[derive(Debug, Clone, Copy)]
pub struct Arithmetic;

impl Representation for Garbled {
    const KIND: Repr = Repr::Garbled;
}

impl Representation for Shared {
    const KIND: Repr = Repr::Shared;
}

impl Representation for Arithmetic {
    const KIND: Repr = Repr::Arithmetic;
}

impl BooleanRepresentation for Garbled {}
impl BooleanRepresentation for Shared {}

/// One of the two parties of the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The party hosting the poll.
    Server,
    /// The party helping the server.
    Client,
}

impl Role {
    /// The other party.
    pub fn peer(self) -> Role {
        match self {
            Role::Server => Role::Client,
            Role::Client => Role::Server,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => f.write_str("server"),
            Role::Client => f.write_str("client"),
        }
    }
}

/// Who learns a revealed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipient {
    /// Only the server.
    Server,
    /// Only the client.
    Client,
    /// Both parties.
    All,
}

impl Recipient {
    /// Whether `role` learns outputs addressed to this recipient.
    pub fn includes(self, role: Role) -> bool {
        matches!(
            (self, role),
            (Recipient::All, _) | (Recipient::Server, Role::Server) | (Recipient::Client, Role::Client)
        )
    }
}

impl From<Role> for Recipient {
    fn from(role: Role) -> Self {
        match role {
            Role::Server => Recipient::Server,
            Role::Client => Recipient::Client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients() {
        assert!(Recipient::All.includes(Role::Client));
        assert!(Recipient::Server.includes(Role::Server));
        assert!(!Recipient::Server.includes(Role::Client));
        assert_eq!(Recipient::from(Role::Client), Recipient::Client);
        assert_eq!(Role::Client.peer(), Role::Server);
    }
}
