//! Sync-once command implementation.

use crate::config::FileConfig;
use mcstats_sync::{SyncManager, SyncOutcome};
use mcstats_transfer::SftpSession;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Runs a single sync and reports whether a new file was committed.
pub async fn run(config_path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let (sftp, sync) = FileConfig::load(config_path)?.into_configs()?;

    let source = Arc::new(SftpSession::new(sftp));
    let manager = SyncManager::new(sync, source);

    let outcome = manager.sync_now().await;
    manager.stop_periodic(Duration::from_secs(5)).await;

    match outcome {
        SyncOutcome::Completed => println!("✓ Statistics database synced"),
        SyncOutcome::Failed => println!("✗ Sync failed, see log for details"),
        SyncOutcome::ShuttingDown => println!("✗ Sync interrupted"),
    }
    Ok(outcome.is_success())
}
