//! Remote file-source abstraction.

use crate::error::{TransferError, TransferResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Metadata observed for a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteFileStat {
    /// Size of the remote file in bytes.
    pub size: u64,
}

/// A source of remote files.
///
/// This trait abstracts the remote endpoint, allowing for different
/// implementations (SFTP, mock for testing). Implementations own their
/// connection lifecycle: `connect` establishes or reuses a live handle,
/// `close` tears it down and is idempotent.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Establishes a connection, or reuses one that is still alive.
    async fn connect(&self) -> TransferResult<()>;

    /// Returns metadata for the remote file at `path`.
    async fn stat(&self, path: &str) -> TransferResult<RemoteFileStat>;

    /// Streams the remote file at `path` into the local file at `dest`,
    /// returning the number of bytes written.
    async fn fetch(&self, path: &str, dest: &Path) -> TransferResult<u64>;

    /// Whether a connection handle is currently held.
    fn is_connected(&self) -> bool;

    /// Tears down the connection. Never fails; closing an already-closed
    /// source is a no-op.
    async fn close(&self);
}

/// A mock file source for testing.
///
/// Serves a configurable byte payload and supports scripted failures,
/// artificial fetch latency (driven by the tokio clock, so paused-time
/// tests work), and counters for observing negotiation and concurrency.
#[derive(Default)]
pub struct MockFileSource {
    content: Mutex<Vec<u8>>,
    reported_size: Mutex<Option<u64>>,
    fetch_delay: Mutex<Duration>,
    fail_fetches: AtomicUsize,
    reject_host_key: AtomicBool,
    transport_alive: AtomicBool,
    connected: AtomicBool,
    negotiations: AtomicUsize,
    fetch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFileSource {
    /// Creates a mock with no content and a reported size of zero.
    pub fn new() -> Self {
        Self {
            reported_size: Mutex::new(Some(0)),
            ..Self::default()
        }
    }

    /// Creates a mock serving the given bytes, with a matching reported size.
    pub fn with_content(bytes: &[u8]) -> Self {
        let mock = Self::new();
        mock.set_content(bytes);
        mock
    }

    /// Replaces the served bytes and reports their true size.
    pub fn set_content(&self, bytes: &[u8]) {
        *self.content.lock() = bytes.to_vec();
        *self.reported_size.lock() = Some(bytes.len() as u64);
    }

    /// Overrides the size reported by `stat`. `None` makes `stat` fail as
    /// if the remote file were missing.
    pub fn set_reported_size(&self, size: Option<u64>) {
        *self.reported_size.lock() = size;
    }

    /// Makes every fetch sleep for `delay` before writing.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock() = delay;
    }

    /// Makes the next `n` fetch calls fail with a transfer error.
    pub fn fail_next_fetches(&self, n: usize) {
        self.fail_fetches.store(n, Ordering::SeqCst);
    }

    /// Makes `connect` fail with a host-key mismatch.
    pub fn set_reject_host_key(&self, reject: bool) {
        self.reject_host_key.store(reject, Ordering::SeqCst);
    }

    /// Severs the underlying transport: the handle no longer reports
    /// itself alive, so the next `connect` performs a full negotiation.
    pub fn sever(&self) {
        self.transport_alive.store(false, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Number of full connection negotiations performed.
    pub fn negotiations(&self) -> usize {
        self.negotiations.load(Ordering::SeqCst)
    }

    /// Number of fetch calls made.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed in flight at once.
    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_scripted_failure(&self) -> bool {
        let mut remaining = self.fail_fetches.load(Ordering::SeqCst);
        while remaining > 0 {
            match self.fail_fetches.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(current) => remaining = current,
            }
        }
        false
    }

    async fn fetch_inner(&self, dest: &Path) -> TransferResult<u64> {
        let delay = *self.fetch_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.take_scripted_failure() {
            return Err(TransferError::Transfer("scripted fetch failure".into()));
        }
        let content = self.content.lock().clone();
        std::fs::write(dest, &content)?;
        Ok(content.len() as u64)
    }
}

#[async_trait]
impl FileSource for MockFileSource {
    async fn connect(&self) -> TransferResult<()> {
        if self.connected.load(Ordering::SeqCst) && self.transport_alive.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.negotiations.fetch_add(1, Ordering::SeqCst);
        if self.reject_host_key.load(Ordering::SeqCst) {
            return Err(TransferError::HostKeyMismatch {
                expected: "aa".repeat(16),
                actual: "bb".repeat(16),
            });
        }
        self.transport_alive.store(true, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stat(&self, path: &str) -> TransferResult<RemoteFileStat> {
        let size = (*self.reported_size.lock())
            .ok_or_else(|| TransferError::File(format!("remote file not found: {path}")))?;
        Ok(RemoteFileStat { size })
    }

    async fn fetch(&self, _path: &str, dest: &Path) -> TransferResult<u64> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let result = self.fetch_inner(dest).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_reuses_live_handle() {
        let mock = MockFileSource::new();
        mock.connect().await.unwrap();
        mock.connect().await.unwrap();
        assert_eq!(mock.negotiations(), 1);
        assert!(mock.is_connected());
    }

    #[tokio::test]
    async fn severed_transport_renegotiates() {
        let mock = MockFileSource::new();
        mock.connect().await.unwrap();
        mock.sever();
        assert!(!mock.is_connected());
        mock.connect().await.unwrap();
        assert_eq!(mock.negotiations(), 2);
    }

    #[tokio::test]
    async fn host_key_rejection_leaves_no_handle() {
        let mock = MockFileSource::new();
        mock.set_reject_host_key(true);
        let err = mock.connect().await.unwrap_err();
        assert!(matches!(err, TransferError::HostKeyMismatch { .. }));
        assert!(!mock.is_connected());
    }

    #[tokio::test]
    async fn missing_remote_file() {
        let mock = MockFileSource::new();
        mock.set_reported_size(None);
        let err = mock.stat("/srv/stats.db").await.unwrap_err();
        assert!(matches!(err, TransferError::File(_)));
    }

    #[tokio::test]
    async fn scripted_failures_consume() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let mock = MockFileSource::with_content(b"payload");
        mock.fail_next_fetches(1);

        assert!(mock.fetch("/srv/stats.db", &dest).await.is_err());
        let written = mock.fetch("/srv/stats.db", &dest).await.unwrap();
        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }
}
