//! Run command implementation: the periodic sync daemon.

use crate::config::FileConfig;
use mcstats_sync::SyncManager;
use mcstats_transfer::SftpSession;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How long a graceful stop may take before the loop task is aborted.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the periodic sync daemon until interrupted.
pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (sftp, sync) = FileConfig::load(config_path)?.into_configs()?;

    info!(
        host = %sftp.host,
        port = sftp.port,
        remote = %sync.remote_path,
        local = %sync.local_path.display(),
        "starting statistics sync daemon"
    );

    let source = Arc::new(SftpSession::new(sftp));
    let manager = Arc::new(SyncManager::new(sync, source));
    manager.start_periodic();

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    manager.stop_periodic(SHUTDOWN_TIMEOUT).await;

    Ok(())
}
