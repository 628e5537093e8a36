//! # mcstats transfer layer
//!
//! SFTP transfer session and atomic file fetcher for the mcstats
//! statistics mirror.
//!
//! This crate provides:
//! - An authenticated, host-key-verified SFTP session with connection reuse
//! - A TTL-bounded cache of remote file metadata
//! - Atomic download via a staged temporary file and a single rename commit
//! - A generic retry wrapper with exponential backoff and cancellable waits
//!
//! ## Key invariants
//!
//! - A connection handle is either fully connected or fully closed, never
//!   half-open; any verification failure tears the whole handle down
//! - The local mirror path only ever holds a complete, size-verified file
//! - Downloads are not internally retried; the caller owns the retry policy

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod fetch;
mod retry;
mod session;
mod source;
mod trust;

pub use cache::StatCache;
pub use config::SftpConfig;
pub use error::{TransferError, TransferResult};
pub use fetch::AtomicFetcher;
pub use retry::{RetryError, RetryPolicy, Retryable, with_retries};
pub use session::SftpSession;
pub use source::{FileSource, MockFileSource, RemoteFileStat};
pub use trust::{HostKeyFingerprint, InvalidFingerprint};
