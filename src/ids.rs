//! Identifier generation for sessions and bookings.
//!
//! Account, confirmation, and train numbers are part of the external contract
//! with persistence and UI layers, so their formats are fixed here: account
//! numbers are 8-digit numeric strings, confirmation numbers are 6-character
//! uppercase-alphanumeric strings, and train numbers are `TRN-` followed by a
//! 3-digit number.
//!
//! Generation goes through the [`IdSource`] trait rather than a process-wide
//! random generator, so session creation and handoff transition hooks can be
//! driven deterministically in tests (seed [`RandomIdSource`]).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CONFIRMATION_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CONFIRMATION_LEN: usize = 6;

/// A source of freshly generated identifiers.
///
/// Threaded through session creation and transition hooks; implementations
/// only need to honor the documented formats.
pub trait IdSource: Send {
    /// An 8-digit numeric account number.
    fn account_number(&mut self) -> String;

    /// A 6-character uppercase-alphanumeric confirmation number.
    fn confirmation_number(&mut self) -> String;

    /// A train number formatted `TRN-` plus a 3-digit number.
    fn train_number(&mut self) -> String;
}

/// The default [`IdSource`], backed by a seedable RNG.
pub struct RandomIdSource {
    rng: StdRng,
}

impl RandomIdSource {
    /// Creates a source seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a deterministic source for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomIdSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSource for RandomIdSource {
    fn account_number(&mut self) -> String {
        self.rng.gen_range(10_000_000u32..=99_999_999).to_string()
    }

    fn confirmation_number(&mut self) -> String {
        (0..CONFIRMATION_LEN)
            .map(|_| {
                let idx = self.rng.gen_range(0..CONFIRMATION_ALPHABET.len());
                CONFIRMATION_ALPHABET[idx] as char
            })
            .collect()
    }

    fn train_number(&mut self) -> String {
        format!("TRN-{}", self.rng.gen_range(100u32..=999))
    }
}
