//! Configuration for the SFTP transfer session.

use crate::trust::HostKeyFingerprint;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for connecting to the remote SFTP endpoint.
#[derive(Debug, Clone)]
pub struct SftpConfig {
    /// Remote host name or address.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// Username for authentication.
    pub username: String,
    /// Password, if password authentication is used.
    pub password: Option<String>,
    /// Path to a private key file, if key authentication is used.
    pub private_key_path: Option<PathBuf>,
    /// Expected host key fingerprint. When absent the presented key is
    /// accepted with a warning.
    pub host_key_fingerprint: Option<HostKeyFingerprint>,
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Timeout for a single SFTP operation (stat, fetch).
    pub operation_timeout: Duration,
    /// How long remote stat results stay cached.
    pub stat_cache_ttl: Duration,
}

impl SftpConfig {
    /// Creates a configuration with default port and timeouts.
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            password: None,
            private_key_path: None,
            host_key_fingerprint: None,
            connect_timeout: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(120),
            stat_cache_ttl: Duration::from_secs(300),
        }
    }

    /// Sets the remote port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the private key path.
    pub fn with_private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    /// Sets the expected host key fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: HostKeyFingerprint) -> Self {
        self.host_key_fingerprint = Some(fingerprint);
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-operation timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sets the stat cache TTL.
    pub fn with_stat_cache_ttl(mut self, ttl: Duration) -> Self {
        self.stat_cache_ttl = ttl;
        self
    }
}
