//! # McStats Sync
//!
//! Periodic sync orchestration for the McStats statistics cache.
//!
//! This crate provides:
//! - Single-flight sync execution (concurrent requests queue, never overlap)
//! - Periodic background loop with an immediate first run
//! - Cooperative shutdown that interrupts interval and backoff waits
//! - Retry delegation to the transfer layer's retry engine
//!
//! ## Architecture
//!
//! [`SyncManager`] owns an [`AtomicFetcher`](mcstats_transfer::AtomicFetcher)
//! and serializes every download behind one async mutex. The periodic loop
//! and on-demand [`SyncManager::sync_now`] calls share that lock, so at most
//! one transfer is in flight at any time.
//!
//! ## Key Invariants
//!
//! - At most one download runs at a time
//! - The first periodic run starts immediately, not after one interval
//! - Shutdown interrupts waits promptly instead of draining them
//! - A failed iteration never terminates the periodic loop

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod manager;

pub use config::SyncConfig;
pub use manager::{SyncManager, SyncOutcome};
