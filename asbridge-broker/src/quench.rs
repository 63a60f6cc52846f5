//! Backpressure state returned by the Broker's drain/deliver operations.

use std::time::Instant;

/// The three quench states the Broker can hand the SCM (§4.1).
///
/// `Blocked` and `Unlimited` are sentinels, not timestamps — keeping
/// them as separate enum variants (rather than `Instant::MIN`/`MAX`
/// sentinels) makes the SCM's `match` exhaustive and impossible to
/// confuse with a real deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quench {
    /// `to_wm_data` is at or above the hard depth cap. The SCM must
    /// not read from any tunnel until the WM drains.
    Blocked,
    /// No quench in effect; the SCM may read freely.
    Unlimited,
    /// Quench is active until this instant.
    At(Instant),
}

impl Quench {
    /// Whether reads from tunnels should be suspended right now.
    pub fn is_blocking(&self, now: Instant) -> bool {
        match self {
            Quench::Blocked => true,
            Quench::Unlimited => false,
            Quench::At(deadline) => *deadline > now,
        }
    }

    /// The deadline to use for the SCM's select timeout, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Quench::At(deadline) => Some(*deadline),
            Quench::Blocked | Quench::Unlimited => None,
        }
    }
}
