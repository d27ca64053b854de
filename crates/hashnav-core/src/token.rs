#![forbid(unsafe_code)]

//! Request and history token generation.
//!
//! Every HTTP call carries a cache-breaker token to defeat stale cached
//! responses, and every forward navigation mints a fresh history
//! identifier so a later back-navigation never collides with newer saved
//! state. Both come from one [`TokenGenerator`].
//!
//! Tokens are opaque: the only guarantees are that two tokens from the
//! same generator differ, and that tokens from generators booted at
//! different times are overwhelmingly likely to differ. The encoding
//! keeps them short enough for URLs by offsetting the boot time against
//! a recent epoch.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Recent epoch subtracted from the boot time to shorten token prefixes.
const TOKEN_EPOCH_MS: u64 = 1_704_067_200_000; // 2024-01-01T00:00:00Z

/// Separator characters that cannot appear in a lowercase hex string,
/// keeping the prefix/counter boundary unambiguous.
const SEPARATORS: &[u8] = b"_-ghjkmnpqrstvwxyz";

/// Generates probably-unique, monotonically distinguishable tokens.
///
/// The clock is injected: construction takes the boot timestamp in
/// milliseconds rather than reading ambient time, so hosts and tests
/// control token reproducibility.
pub struct TokenGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl TokenGenerator {
    /// Create a generator seeded with the boot time in milliseconds
    /// since the Unix epoch.
    #[must_use]
    pub fn new(boot_ms: u64) -> Self {
        let offset = boot_ms.saturating_sub(TOKEN_EPOCH_MS);
        let sep = SEPARATORS[(boot_ms % SEPARATORS.len() as u64) as usize] as char;
        Self {
            prefix: format!("{offset:x}{sep}"),
            counter: AtomicU64::new(0),
        }
    }

    /// Produce the next token.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{n:x}", self.prefix)
    }

    /// The boot-derived prefix shared by every token from this
    /// generator.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGenerator")
            .field("prefix", &self.prefix)
            .field("issued", &self.counter.load(Ordering::Relaxed))
            .finish()
    }
}
