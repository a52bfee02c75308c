//! Byte formats at the boundary of a poll: participant submissions in, results out.
//!
//! A submission stream starts with the number of time slots as a 4-byte big-endian integer,
//! followed by one encrypted block of [`RSA_BLOCK_LEN`] bytes per participant. A decrypted block
//! holds the participant's selections as base64 symbols, each carrying three 2-bit entry codes
//! (most significant first), terminated by NUL or by the number of time slots.
//!
//! A result is the winning column as a 4-byte big-endian integer followed by the "no" flags of the
//! winner, packed eight per byte with the first flag in the most significant bit.

use crate::{
    poll::PollOutcome,
    table::{Encoding, Entry, Table, TableError},
};

/// Size of one encrypted submission block (a 2048-bit RSA ciphertext).
pub const RSA_BLOCK_LEN: usize = 256;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Errors raised while decoding or assembling wire data.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A byte that is not part of the base64 alphabet.
    #[error("invalid selection symbol {symbol:#04x} at offset {offset}")]
    InvalidSymbol {
        /// The offending byte.
        symbol: u8,
        /// Its offset in the block.
        offset: usize,
    },
    /// A 2-bit code that is not an entry.
    #[error("invalid entry code {code:#b} for time slot {slot}")]
    InvalidEntry {
        /// The offending code.
        code: u8,
        /// Its time slot.
        slot: usize,
    },
    /// Fewer selections than time slots.
    #[error("expected {expected} selections, got {actual}")]
    Truncated {
        /// Number of time slots.
        expected: usize,
        /// Selections decoded.
        actual: usize,
    },
    /// The stream ended inside the header or a block.
    #[error("expected {expected} bytes, got {actual}")]
    ShortInput {
        /// Bytes needed.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },
    /// A block could not be decrypted.
    #[error("could not decrypt the submission of participant {participant}")]
    Decrypt {
        /// Row of the participant.
        participant: usize,
        /// The decryptor's error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The decoded selections do not form a table.
    #[error(transparent)]
    Table(#[from] TableError),
    /// The winning column does not fit the 4-byte result header.
    #[error("winner {0} does not fit in 32 bits")]
    WinnerTooLarge(usize),
}

fn symbol_value(symbol: u8) -> Option<u8> {
    match symbol {
        b'A'..=b'Z' => Some(symbol - b'A'),
        b'a'..=b'z' => Some(symbol - b'a' + 26),
        b'0'..=b'9' => Some(symbol - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decodes the selections of one participant for `num_slots` time slots.
///
/// Decoding stops at the first NUL byte or once `num_slots` entries are decoded; trailing codes of
/// the last symbol are ignored.
pub fn parse_selections(block: &[u8], num_slots: usize) -> Result<Vec<Entry>, WireError> {
    let mut entries = Vec::with_capacity(num_slots);
    for (offset, &symbol) in block.iter().enumerate() {
        if symbol == 0 || entries.len() >= num_slots {
            break;
        }
        let bits = symbol_value(symbol).ok_or(WireError::InvalidSymbol { symbol, offset })?;
        for shift in [4, 2, 0] {
            if entries.len() == num_slots {
                break;
            }
            let code = (bits >> shift) & 0b11;
            let entry = Entry::from_code(code).ok_or(WireError::InvalidEntry {
                code,
                slot: entries.len(),
            })?;
            entries.push(entry);
        }
    }
    if entries.len() < num_slots {
        return Err(WireError::Truncated {
            expected: num_slots,
            actual: entries.len(),
        });
    }
    Ok(entries)
}

/// Encodes selections as [`parse_selections`] reads them. The last symbol is padded with "yes".
pub fn encode_selections(entries: &[Entry]) -> String {
    entries
        .chunks(3)
        .map(|chunk| {
            let bits = chunk
                .iter()
                .zip([4, 2, 0])
                .fold(0u8, |bits, (entry, shift)| bits | (entry.code() << shift));
            ALPHABET[bits as usize] as char
        })
        .collect()
}

/// Reads the number of time slots from the start of a submission stream.
pub fn parse_header(bytes: &[u8]) -> Result<usize, WireError> {
    let header: [u8; 4] = bytes
        .get(..4)
        .and_then(|h| h.try_into().ok())
        .ok_or(WireError::ShortInput {
            expected: 4,
            actual: bytes.len(),
        })?;
    Ok(u32::from_be_bytes(header) as usize)
}

/// Recovers a participant's plaintext selections from an encrypted block.
pub trait Decryptor {
    /// Error raised for a block that cannot be decrypted.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decrypts one block of [`RSA_BLOCK_LEN`] bytes.
    fn decrypt(&self, block: &[u8]) -> Result<Vec<u8>, Self::Error>;
}

/// Builds the plaintext table of a submission stream, one row per encrypted block.
///
/// Any malformed block aborts the assembly.
pub fn assemble_table<D: Decryptor>(
    stream: &[u8],
    decryptor: &D,
    encoding: Encoding,
) -> Result<Table, WireError> {
    let num_slots = parse_header(stream)?;
    let blocks = &stream[4..];
    if blocks.len() % RSA_BLOCK_LEN != 0 {
        return Err(WireError::ShortInput {
            expected: blocks.len().next_multiple_of(RSA_BLOCK_LEN) + 4,
            actual: stream.len(),
        });
    }
    let mut table = Table::with_columns(num_slots, encoding);
    for (participant, block) in blocks.chunks_exact(RSA_BLOCK_LEN).enumerate() {
        let plain = decryptor
            .decrypt(block)
            .map_err(|e| WireError::Decrypt {
                participant,
                source: Box::new(e),
            })?;
        let row: Vec<u64> = parse_selections(&plain, num_slots)?
            .iter()
            .map(|e| e.encode(encoding))
            .collect();
        table.add_row(&row)?;
    }
    Ok(table)
}

/// Serializes what a party learned from a poll.
pub fn encode_outcome(outcome: &PollOutcome) -> Result<Vec<u8>, WireError> {
    let winner =
        u32::try_from(outcome.winner).map_err(|_| WireError::WinnerTooLarge(outcome.winner))?;
    let mut bytes = Vec::with_capacity(4 + outcome.no_flags.len().div_ceil(8));
    bytes.extend_from_slice(&winner.to_be_bytes());
    bytes.extend(outcome.no_flags.chunks(8).map(|chunk| {
        chunk
            .iter()
            .enumerate()
            .fold(0u8, |byte, (i, &flag)| byte | ((flag as u8) << (7 - i)))
    }));
    Ok(bytes)
}

/// Parses an encoded result carrying the flags of `num_participants` participants.
pub fn decode_outcome(bytes: &[u8], num_participants: usize) -> Result<PollOutcome, WireError> {
    let expected = 4 + num_participants.div_ceil(8);
    if bytes.len() < expected {
        return Err(WireError::ShortInput {
            expected,
            actual: bytes.len(),
        });
    }
    let winner = parse_header(bytes)?;
    let no_flags = (0..num_participants)
        .map(|i| bytes[4 + i / 8] & (0x80 >> (i % 8)) != 0)
        .collect();
    Ok(PollOutcome { winner, no_flags })
}
