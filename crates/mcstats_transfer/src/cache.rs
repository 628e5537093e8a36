//! TTL-bounded cache for remote file metadata.

use crate::source::RemoteFileStat;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry {
    stat: RemoteFileStat,
    expires_at: Instant,
}

/// In-memory cache of remote stat results, keyed by remote path.
///
/// Entries are invalidated purely by expiry; writes to the remote file are
/// not observed, so the TTL bounds how stale a cached size can be.
pub struct StatCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl StatCache {
    /// Creates a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the cached stat for `path` if it has not expired.
    ///
    /// Expired entries are dropped on access.
    pub fn get(&self, path: &str) -> Option<RemoteFileStat> {
        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(path) {
                if entry.expires_at > Instant::now() {
                    return Some(entry.stat);
                }
            } else {
                return None;
            }
        }
        self.entries.write().remove(path);
        None
    }

    /// Caches a stat result for `path`.
    pub fn insert(&self, path: &str, stat: RemoteFileStat) {
        let entry = CacheEntry {
            stat,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().insert(path.to_owned(), entry);
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
