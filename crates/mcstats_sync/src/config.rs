//! Configuration for the sync orchestrator.

use mcstats_transfer::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for periodic statistics-database syncs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Path of the statistics database on the remote server.
    pub remote_path: String,
    /// Local mirror path the database is downloaded to.
    pub local_path: PathBuf,
    /// Interval between periodic syncs.
    pub interval: Duration,
    /// Retry policy for one sync call (attempts and backoff).
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Creates a configuration with the default interval (300 s) and retry
    /// policy (3 attempts, 5 s initial backoff doubled per retry, 30 s cap).
    pub fn new(remote_path: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            remote_path: remote_path.into(),
            local_path: local_path.into(),
            interval: Duration::from_secs(300),
            retry: RetryPolicy::new(3)
                .with_initial_delay(Duration::from_secs(5))
                .with_backoff_multiplier(2.0)
                .with_max_delay(Duration::from_secs(30)),
        }
    }

    /// Sets the sync interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::new("/srv/stats.db", "./data/player-statistics.db");
        assert_eq!(config.remote_path, "/srv/stats.db");
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(5));
        assert_eq!(config.retry.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new("/srv/stats.db", "/var/lib/mcstats/stats.db")
            .with_interval(Duration::from_secs(60))
            .with_retry(RetryPolicy::new(1));
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 1);
    }
}
