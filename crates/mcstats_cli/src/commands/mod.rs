//! CLI command implementations.

pub mod run;
pub mod sync_once;
