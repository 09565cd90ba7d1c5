//! # Global orchestrator configuration.
//!
//! Provides [`Config`] centralized settings for the orchestrator.
//!
//! Config is used in two ways:
//! 1. **Orchestrator creation**: `Orchestrator::builder(config)`
//! 2. **Request defaults**: handshake peers, feature bits and the expect timeout
//!
//! ## Sentinel values
//! - `expect_timeout = 0s` → the built-in default (5s) is used
//! - `history_capacity = 0` → no `RecentEvents` ring is attached

use std::time::Duration;

use crate::runner::PeerIdentity;

/// Default wait bound for expected responses.
pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Global configuration for the orchestrator.
///
/// Defines:
/// - **Event system**: bus ring capacity, recent-events ring size
/// - **Correlation**: how long to wait for an expected response
/// - **Handshake defaults**: peers and additional feature bits
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus ring shared by all live subscriptions.
    ///
    /// A subscriber that falls more than `subscriber_capacity` events behind loses
    /// its oldest pending events. Minimum value is 1; the bus rounds it up to a power of two.
    pub subscriber_capacity: usize,

    /// Maximum wait for an expected response.
    ///
    /// - `Duration::ZERO` = use [`DEFAULT_EXPECT_TIMEOUT`]
    /// - `> 0` = applied to every `ExpectMessage` step and correlated exchange
    pub expect_timeout: Duration,

    /// Counterparty of the first handshake connection (`"03"` by convention).
    pub primary_peer: PeerIdentity,

    /// Counterparty of the second handshake connection (`"02"` by convention).
    pub secondary_peer: PeerIdentity,

    /// Feature bits added to the `init` sent on the second handshake connection.
    pub additional_feature_bits: Vec<u32>,

    /// Number of recent events kept for diagnostics (`0` = disabled).
    pub history_capacity: usize,
}

impl Config {
    /// Returns the effective expect timeout.
    #[inline]
    pub fn expect_timeout(&self) -> Duration {
        if self.expect_timeout == Duration::ZERO {
            DEFAULT_EXPECT_TIMEOUT
        } else {
            self.expect_timeout
        }
    }

    /// Returns the expect timeout in milliseconds (saturating).
    #[inline]
    pub fn expect_timeout_ms(&self) -> u64 {
        self.expect_timeout().as_millis().min(u128::from(u64::MAX)) as u64
    }

    /// Returns the subscriber capacity clamped to a minimum of 1.
    #[inline]
    pub fn subscriber_capacity_clamped(&self) -> usize {
        self.subscriber_capacity.max(1)
    }

    /// Returns the recent-events ring size as an `Option`.
    ///
    /// - `None` → no ring
    /// - `Some(n)` → keep the last `n` events
    #[inline]
    pub fn history_limit(&self) -> Option<usize> {
        match self.history_capacity {
            0 => None,
            n => Some(n),
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `subscriber_capacity = 256`
    /// - `expect_timeout = 5s`
    /// - `primary_peer = "03"`, `secondary_peer = "02"`
    /// - `additional_feature_bits = [99]`
    /// - `history_capacity = 512`
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
            expect_timeout: DEFAULT_EXPECT_TIMEOUT,
            primary_peer: PeerIdentity::new("03"),
            secondary_peer: PeerIdentity::new("02"),
            additional_feature_bits: vec![99],
            history_capacity: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_means_default() {
        let cfg = Config {
            expect_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert_eq!(cfg.expect_timeout(), DEFAULT_EXPECT_TIMEOUT);
        assert_eq!(cfg.expect_timeout_ms(), 5_000);
    }

    #[test]
    fn test_sentinels() {
        let cfg = Config {
            subscriber_capacity: 0,
            history_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.subscriber_capacity_clamped(), 1);
        assert_eq!(cfg.history_limit(), None);
    }
}
