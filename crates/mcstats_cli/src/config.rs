//! TOML configuration file loading.

use mcstats_sync::SyncConfig;
use mcstats_transfer::{InvalidFingerprint, RetryPolicy, SftpConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML or is missing required keys.
    #[error("invalid config file {path:?}: {source}")]
    Parse {
        /// Path of the rejected file.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// The configured host key fingerprint is not a hex digest.
    #[error(transparent)]
    Fingerprint(#[from] InvalidFingerprint),
}

/// The on-disk configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Remote endpoint settings.
    pub sftp: SftpSection,
    /// Sync schedule and mirror settings.
    pub sync: SyncSection,
}

/// The `[sftp]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SftpSection {
    /// Remote host name or address.
    pub host: String,
    /// Remote port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username for authentication.
    pub username: String,
    /// Password, if password authentication is used.
    pub password: Option<String>,
    /// Path to a private key file, if key authentication is used.
    pub private_key_path: Option<PathBuf>,
    /// Expected MD5 host key fingerprint, hex with or without colons.
    pub host_key_fingerprint: Option<String>,
    /// Timeout for establishing the TCP connection, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Timeout for a single SFTP operation, in seconds.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
    /// How long remote stat results stay cached, in seconds.
    #[serde(default = "default_stat_cache_ttl_secs")]
    pub stat_cache_ttl_secs: u64,
}

/// The `[sync]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSection {
    /// Path of the statistics database on the remote server.
    pub remote_path: String,
    /// Local mirror path the database is downloaded to.
    pub local_path: PathBuf,
    /// Interval between periodic syncs, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Attempts per sync before it is reported as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_operation_timeout_secs() -> u64 {
    120
}

fn default_stat_cache_ttl_secs() -> u64 {
    300
}

fn default_interval_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

impl FileConfig {
    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Converts the file representation into the library configurations.
    pub fn into_configs(self) -> Result<(SftpConfig, SyncConfig), ConfigError> {
        let mut sftp = SftpConfig::new(self.sftp.host, self.sftp.username)
            .with_port(self.sftp.port)
            .with_connect_timeout(Duration::from_secs(self.sftp.connect_timeout_secs))
            .with_operation_timeout(Duration::from_secs(self.sftp.operation_timeout_secs))
            .with_stat_cache_ttl(Duration::from_secs(self.sftp.stat_cache_ttl_secs));
        if let Some(password) = self.sftp.password {
            sftp = sftp.with_password(password);
        }
        if let Some(path) = self.sftp.private_key_path {
            sftp = sftp.with_private_key(path);
        }
        if let Some(raw) = self.sftp.host_key_fingerprint {
            sftp = sftp.with_fingerprint(raw.parse()?);
        }

        let sync = SyncConfig::new(self.sync.remote_path, self.sync.local_path)
            .with_interval(Duration::from_secs(self.sync.interval_secs))
            .with_retry(
                RetryPolicy::new(self.sync.max_attempts)
                    .with_initial_delay(Duration::from_secs(5))
                    .with_backoff_multiplier(2.0)
                    .with_max_delay(Duration::from_secs(30)),
            );

        Ok((sftp, sync))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [sftp]
        host = "mc.example.net"
        port = 2022
        username = "stats"
        password = "hunter2"
        host_key_fingerprint = "16:27:ac:a5:76:28:2d:36:63:1b:56:4d:eb:df:a6:48"
        connect_timeout_secs = 10

        [sync]
        remote_path = "/srv/minecraft/stats.db"
        local_path = "/var/lib/mcstats/player-statistics.db"
        interval_secs = 120
        max_attempts = 5
    "#;

    const MINIMAL: &str = r#"
        [sftp]
        host = "mc.example.net"
        username = "stats"

        [sync]
        remote_path = "/srv/minecraft/stats.db"
        local_path = "/var/lib/mcstats/player-statistics.db"
    "#;

    #[test]
    fn parses_full_config() {
        let file: FileConfig = toml::from_str(FULL).unwrap();
        let (sftp, sync) = file.into_configs().unwrap();

        assert_eq!(sftp.host, "mc.example.net");
        assert_eq!(sftp.port, 2022);
        assert_eq!(sftp.password.as_deref(), Some("hunter2"));
        assert_eq!(
            sftp.host_key_fingerprint.unwrap().as_hex(),
            "1627aca576282d36631b564debdfa648"
        );
        assert_eq!(sftp.connect_timeout, Duration::from_secs(10));
        assert_eq!(sync.interval, Duration::from_secs(120));
        assert_eq!(sync.retry.max_attempts, 5);
    }

    #[test]
    fn applies_defaults() {
        let file: FileConfig = toml::from_str(MINIMAL).unwrap();
        let (sftp, sync) = file.into_configs().unwrap();

        assert_eq!(sftp.port, 22);
        assert!(sftp.password.is_none());
        assert!(sftp.host_key_fingerprint.is_none());
        assert_eq!(sftp.connect_timeout, Duration::from_secs(30));
        assert_eq!(sftp.operation_timeout, Duration::from_secs(120));
        assert_eq!(sync.interval, Duration::from_secs(300));
        assert_eq!(sync.retry.max_attempts, 3);
    }

    #[test]
    fn rejects_bad_fingerprint() {
        let raw = MINIMAL.replace(
            "username = \"stats\"",
            "username = \"stats\"\nhost_key_fingerprint = \"not hex\"",
        );
        let file: FileConfig = toml::from_str(&raw).unwrap();
        assert!(matches!(
            file.into_configs(),
            Err(ConfigError::Fingerprint(_))
        ));
    }

    #[test]
    fn rejects_unknown_keys() {
        let raw = MINIMAL.replace("[sync]", "passwrod = \"oops\"\n\n[sync]");
        assert!(toml::from_str::<FileConfig>(&raw).is_err());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = FileConfig::load(Path::new("/nonexistent/mcstats.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
