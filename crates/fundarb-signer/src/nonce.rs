//! Nonces for signed exchange actions.
//!
//! The exchange accepts a nonce only if it is unused for the signing address
//! and lies inside `(server_time - 2 days, server_time + 1 day)`. Nonces here
//! are exchange-clock milliseconds, bumped by one whenever two actions land on
//! the same tick, so an approval and the L1 actions that follow it in one
//! flow never share a value.

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

/// How far behind the exchange clock a nonce may be.
pub const NONCE_WINDOW_BEHIND_MS: u64 = 2 * 24 * 60 * 60 * 1000;
/// How far ahead of the exchange clock a nonce may be.
pub const NONCE_WINDOW_AHEAD_MS: u64 = 24 * 60 * 60 * 1000;

const DRIFT_WARN_MS: i64 = 2_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NonceError {
    #[error("nonce {nonce} outside the exchange window around {server_time_ms}")]
    OutsideWindow { nonce: u64, server_time_ms: u64 },
}

/// Issues action nonces. Injected into [`crate::ExchangeActionSigner`].
pub trait NonceSource: Send + Sync {
    /// Strictly greater than every nonce previously returned by this source.
    fn next_nonce(&self) -> Result<u64, NonceError>;

    /// Exchange clock reading (the `time` field of `clearinghouseState`).
    ///
    /// Sources that do not follow the exchange clock ignore it.
    fn observe_server_time(&self, _server_time_ms: u64) -> ClockSync {
        ClockSync::default()
    }
}

/// Result of aligning with the exchange clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockSync {
    /// `server - local`; positive when the exchange is ahead.
    pub drift_ms: i64,
}

impl ClockSync {
    pub fn is_significant(&self) -> bool {
        self.drift_ms.abs() > DRIFT_WARN_MS
    }
}

/// Whether the exchange would accept `nonce` at `server_time_ms`.
pub fn check_window(nonce: u64, server_time_ms: u64) -> Result<(), NonceError> {
    let lower = server_time_ms.saturating_sub(NONCE_WINDOW_BEHIND_MS);
    let upper = server_time_ms.saturating_add(NONCE_WINDOW_AHEAD_MS);
    if nonce > lower && nonce < upper {
        Ok(())
    } else {
        Err(NonceError::OutsideWindow {
            nonce,
            server_time_ms,
        })
    }
}

/// Millisecond clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct Sequence {
    last: u64,
    offset_ms: i64,
    synced: bool,
}

/// Timestamp nonces that follow the exchange clock once it has been observed.
///
/// Before the first [`NonceSource::observe_server_time`] the local clock is
/// trusted as is and no window check is possible.
pub struct ExchangeNonces<C: Clock = SystemClock> {
    clock: C,
    sequence: Mutex<Sequence>,
}

impl<C: Clock> ExchangeNonces<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            sequence: Mutex::new(Sequence::default()),
        }
    }

    /// Local clock shifted by the last observed drift.
    pub fn exchange_time_ms(&self) -> u64 {
        let offset = self.sequence.lock().offset_ms;
        self.clock.now_ms().saturating_add_signed(offset)
    }

    pub fn last_issued(&self) -> Option<u64> {
        let last = self.sequence.lock().last;
        (last > 0).then_some(last)
    }

    pub fn is_synced(&self) -> bool {
        self.sequence.lock().synced
    }
}

impl ExchangeNonces<SystemClock> {
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> NonceSource for ExchangeNonces<C> {
    fn next_nonce(&self) -> Result<u64, NonceError> {
        let mut sequence = self.sequence.lock();
        let now = self.clock.now_ms().saturating_add_signed(sequence.offset_ms);
        let nonce = sequence.last.saturating_add(1).max(now);

        // A sequence run far ahead (e.g. issued under a fast local clock)
        // would be rejected; refuse it here instead.
        if sequence.synced {
            check_window(nonce, now)?;
        }
        sequence.last = nonce;
        Ok(nonce)
    }

    fn observe_server_time(&self, server_time_ms: u64) -> ClockSync {
        let local = self.clock.now_ms();
        let sync = ClockSync {
            drift_ms: server_time_ms as i64 - local as i64,
        };

        let mut sequence = self.sequence.lock();
        sequence.offset_ms = sync.drift_ms;
        sequence.synced = true;
        drop(sequence);

        if sync.is_significant() {
            warn!(drift_ms = sync.drift_ms, "Local clock differs from exchange clock");
        } else {
            debug!(drift_ms = sync.drift_ms, "Aligned with exchange clock");
        }
        sync
    }
}
