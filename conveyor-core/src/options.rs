//! Runtime tunables for operators, batchers, and the reliable transport.
//!
//! This module centralizes every knob the chain runtime and transport layer
//! expose, following the same builder shape libzmq-style socket options use:
//! a `Default` baseline plus `with_*` setters that consume and return `Self`.

use std::time::Duration;

/// Default channel slack (buffered capacity) for an operator's input/output
/// bus, mirroring the original stream runtime's `CHAN_SLACK`.
pub const DEFAULT_CHAN_SLACK: usize = 100;

/// Default transport high water mark: the number of unacknowledged frames a
/// client may have outstanding before it stops accepting new input.
pub const DEFAULT_HWM: usize = 20_000;

/// Default ack timeout: how long a client waits for any ack before treating
/// the connection as dead and reconnecting.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default interval between reconnect attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Default maximum number of reconnect attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 100;

/// Default divisor applied to the transport's high water mark to decide when
/// the server should send an immediate ack rather than wait for the
/// coalescing timer.
pub const DEFAULT_ACK_HWM_DIVISOR: usize = 2;

/// Default server-side ack coalescing window.
pub const DEFAULT_ACK_COALESCE_INTERVAL: Duration = Duration::from_millis(100);

/// Runtime tunables shared across chains, batchers, worker pools, and the
/// reliable transport.
///
/// # Examples
///
/// ```
/// use conveyor_core::options::Tunables;
/// use std::time::Duration;
///
/// let tunables = Tunables::default()
///     .with_chan_slack(256)
///     .with_hwm(5_000);
/// ```
#[derive(Debug, Clone)]
pub struct Tunables {
    /// Capacity of each operator's bounded input/output bus.
    pub chan_slack: usize,

    /// Transport high water mark (unacknowledged frames a client may hold).
    pub hwm: usize,

    /// How long the client transport waits for an ack before reconnecting.
    pub ack_timeout: Duration,

    /// Flat interval between reconnect attempts.
    pub retry_interval: Duration,

    /// Maximum reconnect attempts before the client gives up.
    pub max_retries: u32,

    /// Divisor applied to `hwm`: once `last_received - last_acked` exceeds
    /// `hwm / ack_hwm_divisor`, the server sends an ack immediately instead
    /// of waiting for the coalescing timer.
    pub ack_hwm_divisor: usize,

    /// Server-side ack coalescing window.
    pub ack_coalesce_interval: Duration,

    /// Number of parallel workers a worker pool spins up by default.
    /// `None` means "use the number of available CPUs".
    pub default_worker_count: Option<usize>,

    /// Minimum time a batcher waits after receiving its first item before it
    /// is allowed to flush (unless outstanding capacity forces it sooner).
    pub batch_wait_after_first_item: Duration,

    /// Minimum time a batcher waits between successive flushes.
    pub batch_wait_between_flushes: Duration,

    /// Maximum time a batcher holds a partial (leftover) batch before
    /// flushing it regardless of size.
    pub batch_wait_for_leftover: Duration,

    /// Whether the server soft-closes (stops its listener but drains
    /// existing connections) when the last active connection disconnects.
    pub server_soft_close_on_last_exit: bool,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            chan_slack: DEFAULT_CHAN_SLACK,
            hwm: DEFAULT_HWM,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            ack_hwm_divisor: DEFAULT_ACK_HWM_DIVISOR,
            ack_coalesce_interval: DEFAULT_ACK_COALESCE_INTERVAL,
            default_worker_count: None,
            batch_wait_after_first_item: Duration::from_secs(1),
            batch_wait_between_flushes: Duration::from_secs(1),
            batch_wait_for_leftover: Duration::from_secs(1),
            server_soft_close_on_last_exit: false,
        }
    }
}

impl Tunables {
    /// Create new tunables with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the operator bus channel slack.
    #[must_use]
    pub const fn with_chan_slack(mut self, slack: usize) -> Self {
        self.chan_slack = slack;
        self
    }

    /// Set the transport high water mark.
    #[must_use]
    pub const fn with_hwm(mut self, hwm: usize) -> Self {
        self.hwm = hwm;
        self
    }

    /// Set the client ack timeout.
    #[must_use]
    pub const fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the flat retry interval between reconnect attempts.
    #[must_use]
    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the maximum number of reconnect attempts.
    #[must_use]
    pub const fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the ack high-water-mark divisor.
    #[must_use]
    pub const fn with_ack_hwm_divisor(mut self, divisor: usize) -> Self {
        self.ack_hwm_divisor = divisor;
        self
    }

    /// Set the server ack coalescing window.
    #[must_use]
    pub const fn with_ack_coalesce_interval(mut self, interval: Duration) -> Self {
        self.ack_coalesce_interval = interval;
        self
    }

    /// Set an explicit default worker pool size.
    #[must_use]
    pub const fn with_default_worker_count(mut self, count: usize) -> Self {
        self.default_worker_count = Some(count);
        self
    }

    /// Set the three batcher timers at once.
    #[must_use]
    pub const fn with_batch_timers(
        mut self,
        after_first_item: Duration,
        between_flushes: Duration,
        for_leftover: Duration,
    ) -> Self {
        self.batch_wait_after_first_item = after_first_item;
        self.batch_wait_between_flushes = between_flushes;
        self.batch_wait_for_leftover = for_leftover;
        self
    }

    /// Enable or disable soft-close-on-last-connection-exit for the server
    /// transport.
    #[must_use]
    pub const fn with_server_soft_close_on_last_exit(mut self, enabled: bool) -> Self {
        self.server_soft_close_on_last_exit = enabled;
        self
    }

    /// Resolve the effective worker pool size: the explicit override, or the
    /// number of available CPUs (never less than one).
    #[must_use]
    pub fn resolved_worker_count(&self) -> usize {
        self.default_worker_count.unwrap_or_else(num_cpus::get).max(1)
    }

    /// The ack threshold at which the server sends an immediate ack instead
    /// of waiting for the coalescing timer.
    #[must_use]
    pub const fn ack_threshold(&self) -> usize {
        self.hwm / self.ack_hwm_divisor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tunables() {
        let t = Tunables::default();
        assert_eq!(t.chan_slack, 100);
        assert_eq!(t.hwm, 20_000);
        assert_eq!(t.ack_timeout, Duration::from_millis(10_000));
        assert_eq!(t.retry_interval, Duration::from_secs(1));
        assert_eq!(t.max_retries, 100);
        assert_eq!(t.ack_hwm_divisor, 2);
    }

    #[test]
    fn test_builder_pattern() {
        let t = Tunables::new()
            .with_chan_slack(256)
            .with_hwm(5_000)
            .with_max_retries(10);

        assert_eq!(t.chan_slack, 256);
        assert_eq!(t.hwm, 5_000);
        assert_eq!(t.max_retries, 10);
    }

    #[test]
    fn test_ack_threshold() {
        let t = Tunables::new().with_hwm(20_000).with_ack_hwm_divisor(2);
        assert_eq!(t.ack_threshold(), 10_000);
    }

    #[test]
    fn test_resolved_worker_count_override() {
        let t = Tunables::new().with_default_worker_count(4);
        assert_eq!(t.resolved_worker_count(), 4);
    }

    #[test]
    fn test_resolved_worker_count_default_is_at_least_one() {
        let t = Tunables::new();
        assert!(t.resolved_worker_count() >= 1);
    }
}
