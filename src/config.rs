//! # Global runtime configuration.
//!
//! [`Config`] defines the supervisor's behavior: mailbox and event-bus
//! capacities and the bounded timeouts applied to replicated reads and
//! writes. Timeouts are enforced on the issuing side; a timed-out read
//! during synchronization counts as "no data", never as a fatal error.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use ownervisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.owner_write_timeout = Duration::from_secs(3);
//!
//! assert_eq!(cfg.mailbox_capacity, 256);
//! ```

use std::time::Duration;

/// Global configuration for the ownership supervisor.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the supervisor command mailbox.
    pub mailbox_capacity: usize,
    /// Capacity of the ownership event bus channel.
    pub bus_capacity: usize,
    /// Timeout for the local reads issued during initial synchronization.
    pub sync_read_timeout: Duration,
    /// Timeout for steady-state owner-register writes (local consistency).
    pub owner_write_timeout: Duration,
    /// Timeout for the majority read preceding a candidate cleanup.
    pub clear_read_timeout: Duration,
    /// Timeout for each majority candidate removal during cleanup.
    pub clear_remove_timeout: Duration,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `mailbox_capacity = 256`
    /// - `bus_capacity = 1024`
    /// - `sync_read_timeout = 5s`
    /// - `owner_write_timeout = 5s`
    /// - `clear_read_timeout = 15s`
    /// - `clear_remove_timeout = 10s`
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            bus_capacity: 1024,
            sync_read_timeout: Duration::from_secs(5),
            owner_write_timeout: Duration::from_secs(5),
            clear_read_timeout: Duration::from_secs(15),
            clear_remove_timeout: Duration::from_secs(10),
        }
    }
}
