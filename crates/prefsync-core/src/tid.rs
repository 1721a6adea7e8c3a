//! Timestamp identifiers (TIDs).
//!
//! A TID is 13 characters of base32-sortable text encoding a 64-bit value:
//! the top bit is zero, the next 53 bits are microseconds since the Unix
//! epoch, and the low 10 bits are a per-process clock id. TIDs generated by
//! one process are strictly increasing, so they sort in creation order.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::Rng;

use crate::model::validate::ValidationError;

const ALPHABET: &[u8; 32] = b"234567abcdefghijklmnopqrstuvwxyz";
const TID_LEN: usize = 13;
const CLOCK_ID_BITS: u32 = 10;

static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);
static CLOCK_ID: OnceLock<u64> = OnceLock::new();

/// A validated timestamp identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(String);

impl Tid {
    /// Generate the next TID for this process.
    #[must_use]
    pub fn next() -> Self {
        let clock_id = *CLOCK_ID.get_or_init(|| rand::thread_rng().gen_range(0..1 << CLOCK_ID_BITS));
        Self::from_parts(next_timestamp(), clock_id)
    }

    /// Shorthand for `Tid::next().to_string()`.
    #[must_use]
    pub fn next_str() -> String {
        Self::next().0
    }

    /// Build a TID from an explicit timestamp and clock id.
    #[must_use]
    pub fn from_parts(timestamp_micros: u64, clock_id: u64) -> Self {
        let value = ((timestamp_micros & ((1 << 53) - 1)) << CLOCK_ID_BITS)
            | (clock_id & ((1 << CLOCK_ID_BITS) - 1));
        Self(encode(value))
    }

    /// Microseconds since the Unix epoch encoded in this TID.
    #[must_use]
    pub fn timestamp_micros(&self) -> u64 {
        decode(&self.0) >> CLOCK_ID_BITS
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `raw` is a well-formed TID.
    #[must_use]
    pub fn is_valid(raw: &str) -> bool {
        raw.len() == TID_LEN
            && raw.bytes().all(|b| ALPHABET.contains(&b))
            // The top bit must be clear, which limits the first character.
            && raw.bytes().next().is_some_and(|b| b"234567abcdefghij".contains(&b))
    }
}

impl FromStr for Tid {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError::identifier(
                "tid",
                format!("`{raw}` is not a 13-character base32-sortable TID"),
            ))
        }
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn next_timestamp() -> u64 {
    let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default();
    let mut prev = LAST_TIMESTAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev.saturating_add(1));
        match LAST_TIMESTAMP.compare_exchange_weak(prev, next, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

fn encode(mut value: u64) -> String {
    let mut out = [ALPHABET[0]; TID_LEN];
    for slot in out.iter_mut().rev() {
        *slot = ALPHABET[usize::try_from(value & 31).unwrap_or_default()];
        value >>= 5;
    }
    out.iter().map(|&b| char::from(b)).collect()
}

fn decode(raw: &str) -> u64 {
    raw.bytes().fold(0_u64, |acc, b| {
        let digit = ALPHABET.iter().position(|&a| a == b).unwrap_or_default();
        (acc << 5) | u64::try_from(digit).unwrap_or_default()
    })
}
