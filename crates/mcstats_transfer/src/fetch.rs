//! Atomic download of a single remote file.

use crate::error::{TransferError, TransferResult};
use crate::source::FileSource;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Downloads one remote file to a local path with an atomic commit.
///
/// The file is staged into a temporary sibling of the destination (same
/// directory, hence same filesystem), its size verified against the remote
/// stat, and only then renamed over the destination. At any observable
/// instant the destination either does not exist or holds a complete,
/// size-verified download; readers never see a partial write.
///
/// Concurrent downloads would race on the destination; callers must
/// serialize access (the sync orchestrator holds a process-wide lock).
pub struct AtomicFetcher<S: FileSource> {
    source: Arc<S>,
}

impl<S: FileSource> AtomicFetcher<S> {
    /// Creates a fetcher over the given source.
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// The underlying file source.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Downloads `remote` to `local`, returning the number of bytes in the
    /// committed file.
    ///
    /// On success the connection stays cached in the source for reuse; on
    /// any failure it is closed so the next attempt starts from a clean
    /// handle, and the staged temporary file is removed. The previous
    /// contents of `local`, if any, survive every failure mode.
    pub async fn download(&self, remote: &str, local: &Path) -> TransferResult<u64> {
        self.source.connect().await?;
        match self.download_connected(remote, local).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                self.source.close().await;
                Err(e)
            }
        }
    }

    async fn download_connected(&self, remote: &str, local: &Path) -> TransferResult<u64> {
        let dir = match local.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        // Staged in the destination directory so the final rename cannot
        // cross a filesystem boundary.
        let staging = NamedTempFile::new_in(dir)?;
        debug!(remote, staging = %staging.path().display(), "downloading remote file");

        match self.transfer_into(remote, &staging).await {
            Ok(bytes) => {
                staging
                    .persist(local)
                    .map_err(|e| TransferError::Io(e.error))?;
                info!(remote, local = %local.display(), bytes, "remote file downloaded and committed");
                Ok(bytes)
            }
            Err(e) => {
                if let Err(cleanup_err) = staging.close() {
                    warn!(error = %cleanup_err, "failed to remove staging file");
                }
                Err(e)
            }
        }
    }

    async fn transfer_into(&self, remote: &str, staging: &NamedTempFile) -> TransferResult<u64> {
        let stat = self.source.stat(remote).await?;
        let streamed = self.source.fetch(remote, staging.path()).await?;

        // The on-disk length is the ground truth for the integrity check.
        let written = staging.as_file().metadata()?.len();
        if written != stat.size {
            return Err(TransferError::File(format!(
                "size mismatch for {remote}: expected {}, got {written}",
                stat.size
            )));
        }
        debug!(remote, streamed, written, "download size verified");
        Ok(written)
    }
}
