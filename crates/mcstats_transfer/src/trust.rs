//! Host-key trust record.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a configured fingerprint is not a valid hex digest.
#[derive(Debug, Error)]
#[error("invalid host key fingerprint: {0}")]
pub struct InvalidFingerprint(pub String);

/// The expected MD5 fingerprint of the remote host key.
///
/// Stored normalized: lowercase hex with colons stripped, so both
/// `16:27:ac:a5:76:28:2d:36:63:1b:56:4d:eb:df:a6:48` and
/// `1627ACA576282D36631B564DEBDFA648` configure the same record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKeyFingerprint(String);

impl HostKeyFingerprint {
    /// Parses and normalizes a fingerprint string.
    pub fn new(raw: &str) -> Result<Self, InvalidFingerprint> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| *c != ':')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if normalized.is_empty()
            || normalized.len() % 2 != 0
            || !normalized.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(InvalidFingerprint(raw.to_owned()));
        }

        Ok(Self(normalized))
    }

    /// Returns true if the given raw digest matches this fingerprint.
    pub fn matches(&self, digest: &[u8]) -> bool {
        hex::encode(digest) == self.0
    }

    /// The normalized hex form.
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl FromStr for HostKeyFingerprint {
    type Err = InvalidFingerprint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for HostKeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_colons_and_case() {
        let colons = HostKeyFingerprint::new("16:27:AC:a5:76:28:2d:36:63:1b:56:4d:eb:df:a6:48")
            .unwrap();
        let plain = HostKeyFingerprint::new("1627aca576282d36631b564debdfa648").unwrap();
        assert_eq!(colons, plain);
        assert_eq!(colons.as_hex(), "1627aca576282d36631b564debdfa648");
    }

    #[test]
    fn matches_raw_digest() {
        let fp = HostKeyFingerprint::new("00:ff:10:2a").unwrap();
        assert!(fp.matches(&[0x00, 0xff, 0x10, 0x2a]));
        assert!(!fp.matches(&[0x00, 0xff, 0x10, 0x2b]));
        assert!(!fp.matches(&[0x00, 0xff, 0x10]));
    }

    #[test]
    fn rejects_invalid_input() {
        assert!(HostKeyFingerprint::new("").is_err());
        assert!(HostKeyFingerprint::new("::").is_err());
        assert!(HostKeyFingerprint::new("zz:aa").is_err());
        assert!(HostKeyFingerprint::new("abc").is_err()); // odd length
    }

    #[test]
    fn parses_from_str() {
        let fp: HostKeyFingerprint = " AA:bb ".parse().unwrap();
        assert_eq!(fp.to_string(), "aabb");
    }
}
