//! SFTP transfer session backed by libssh2.

use crate::cache::StatCache;
use crate::config::SftpConfig;
use crate::error::{TransferError, TransferResult};
use crate::source::{FileSource, RemoteFileStat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One live authenticated connection: SSH transport plus SFTP subsystem.
/// Either both are present or the slot is empty; no half-open state.
struct SftpConnection {
    session: ssh2::Session,
    sftp: ssh2::Sftp,
}

type ConnectionSlot = Arc<Mutex<Option<SftpConnection>>>;

/// An SFTP session to the remote statistics host.
///
/// The connection handle is established lazily on first use and reused
/// while the transport still answers a keepalive probe. All libssh2 calls
/// are blocking and run on the tokio blocking pool; `fetch` is additionally
/// bounded by the configured operation timeout.
pub struct SftpSession {
    config: SftpConfig,
    conn: ConnectionSlot,
    cache: StatCache,
}

impl SftpSession {
    /// Creates a session from the given configuration. No connection is
    /// made until the first operation.
    pub fn new(config: SftpConfig) -> Self {
        let cache = StatCache::new(config.stat_cache_ttl);
        Self {
            config,
            conn: Arc::new(Mutex::new(None)),
            cache,
        }
    }

    async fn run_blocking<T, F>(f: F) -> TransferResult<T>
    where
        F: FnOnce() -> TransferResult<T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| TransferError::Transfer(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl FileSource for SftpSession {
    async fn connect(&self) -> TransferResult<()> {
        let config = self.config.clone();
        let conn = Arc::clone(&self.conn);
        Self::run_blocking(move || connect_blocking(&config, &conn)).await
    }

    async fn stat(&self, path: &str) -> TransferResult<RemoteFileStat> {
        if let Some(stat) = self.cache.get(path) {
            debug!(path, size = stat.size, "remote stat served from cache");
            return Ok(stat);
        }
        let conn = Arc::clone(&self.conn);
        let remote = path.to_owned();
        let stat = Self::run_blocking(move || stat_blocking(&conn, &remote)).await?;
        self.cache.insert(path, stat);
        Ok(stat)
    }

    async fn fetch(&self, path: &str, dest: &Path) -> TransferResult<u64> {
        let conn = Arc::clone(&self.conn);
        let remote = path.to_owned();
        let dest: PathBuf = dest.to_owned();
        let task = tokio::task::spawn_blocking(move || fetch_blocking(&conn, &remote, &dest));

        match tokio::time::timeout(self.config.operation_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(TransferError::Transfer(format!(
                "transfer task failed: {join_err}"
            ))),
            Err(_) => {
                warn!(
                    path,
                    timeout_secs = self.config.operation_timeout.as_secs(),
                    "sftp fetch timed out"
                );
                Err(TransferError::Timeout)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.lock().is_some()
    }

    async fn close(&self) {
        // A fresh handle starts with fresh metadata.
        self.cache.clear();
        let conn = Arc::clone(&self.conn);
        // Best effort; a failed disconnect still drops the handle.
        let _ = tokio::task::spawn_blocking(move || teardown(&conn)).await;
    }
}

fn connect_blocking(
    config: &SftpConfig,
    conn: &Mutex<Option<SftpConnection>>,
) -> TransferResult<()> {
    let mut guard = conn.lock();

    if let Some(existing) = guard.as_ref() {
        if existing.session.keepalive_send().is_ok() {
            debug!(host = %config.host, "reusing live sftp connection");
            return Ok(());
        }
        debug!(host = %config.host, "sftp connection is stale, reconnecting");
        *guard = None;
    }

    info!(
        host = %config.host,
        port = config.port,
        user = %config.username,
        "connecting to sftp server"
    );
    let connection = establish(config)?;
    *guard = Some(connection);
    info!(host = %config.host, "sftp connection established");
    Ok(())
}

/// Builds a fully-connected handle, or nothing: any failure drops the
/// partially-negotiated transport before returning.
fn establish(config: &SftpConfig) -> TransferResult<SftpConnection> {
    let endpoint = format!("{}:{}", config.host, config.port);
    let addr = endpoint
        .to_socket_addrs()
        .map_err(|e| TransferError::Connection(format!("failed to resolve {endpoint}: {e}")))?
        .next()
        .ok_or_else(|| TransferError::Connection(format!("no addresses for {endpoint}")))?;

    let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)
        .map_err(|e| TransferError::Connection(format!("tcp connect to {endpoint} failed: {e}")))?;

    let mut session = ssh2::Session::new()
        .map_err(|e| TransferError::Connection(format!("failed to create ssh session: {e}")))?;
    session.set_tcp_stream(stream);
    session.set_timeout(config.operation_timeout.as_millis().min(u32::MAX as u128) as u32);
    session
        .handshake()
        .map_err(|e| TransferError::Connection(format!("ssh handshake failed: {e}")))?;

    verify_host_key(config, &session)?;
    authenticate(config, &session)?;

    let sftp = session
        .sftp()
        .map_err(|e| TransferError::Connection(format!("failed to open sftp subsystem: {e}")))?;

    Ok(SftpConnection { session, sftp })
}

/// Checks the presented host key against the configured trust record.
/// With no fingerprint configured the key is accepted with a warning.
fn verify_host_key(config: &SftpConfig, session: &ssh2::Session) -> TransferResult<()> {
    let Some(expected) = &config.host_key_fingerprint else {
        warn!(
            host = %config.host,
            "no host key fingerprint configured, proceeding without verification"
        );
        return Ok(());
    };

    let digest = session
        .host_key_hash(ssh2::HashType::Md5)
        .ok_or_else(|| TransferError::Connection("server presented no host key digest".into()))?;

    if !expected.matches(digest) {
        return Err(TransferError::HostKeyMismatch {
            expected: expected.as_hex().to_owned(),
            actual: hex::encode(digest),
        });
    }
    debug!(host = %config.host, "host key fingerprint verified");
    Ok(())
}

/// Authenticates with the private key and/or password, in that order.
fn authenticate(config: &SftpConfig, session: &ssh2::Session) -> TransferResult<()> {
    if let Some(key_path) = &config.private_key_path {
        match session.userauth_pubkey_file(&config.username, None, key_path, None) {
            Ok(()) => {}
            Err(e) if config.password.is_some() => {
                debug!(error = %e, "private key auth failed, trying password");
            }
            Err(e) => {
                return Err(TransferError::Authentication(format!(
                    "private key authentication failed: {e}"
                )));
            }
        }
    }

    if !session.authenticated() {
        let Some(password) = &config.password else {
            return Err(TransferError::Authentication(
                "no password or private key configured".into(),
            ));
        };
        session
            .userauth_password(&config.username, password)
            .map_err(|e| {
                TransferError::Authentication(format!("password authentication failed: {e}"))
            })?;
    }

    if !session.authenticated() {
        return Err(TransferError::Authentication(
            "server rejected credentials".into(),
        ));
    }
    Ok(())
}

fn stat_blocking(
    conn: &Mutex<Option<SftpConnection>>,
    remote: &str,
) -> TransferResult<RemoteFileStat> {
    let guard = conn.lock();
    let connection = guard
        .as_ref()
        .ok_or_else(|| TransferError::Connection("not connected".into()))?;

    let stat = connection
        .sftp
        .stat(Path::new(remote))
        .map_err(|e| TransferError::File(format!("failed to stat remote file {remote}: {e}")))?;
    let size = stat
        .size
        .ok_or_else(|| TransferError::File(format!("remote file {remote} reported no size")))?;

    Ok(RemoteFileStat { size })
}

fn fetch_blocking(
    conn: &Mutex<Option<SftpConnection>>,
    remote: &str,
    dest: &Path,
) -> TransferResult<u64> {
    let guard = conn.lock();
    let connection = guard
        .as_ref()
        .ok_or_else(|| TransferError::Connection("not connected".into()))?;

    let mut remote_file = connection
        .sftp
        .open(Path::new(remote))
        .map_err(|e| TransferError::File(format!("failed to open remote file {remote}: {e}")))?;
    let mut local = std::fs::File::create(dest)?;

    let bytes = std::io::copy(&mut remote_file, &mut local)
        .map_err(|e| TransferError::Transfer(format!("transfer of {remote} failed: {e}")))?;
    local.sync_all()?;

    debug!(remote, bytes, "remote file streamed to local path");
    Ok(bytes)
}

fn teardown(conn: &Mutex<Option<SftpConnection>>) {
    if let Some(existing) = conn.lock().take() {
        let _ = existing.session.disconnect(None, "closing", None);
        debug!("sftp connection closed");
    }
}
