//! Soundcheck Common Library
//!
//! Shared value types for the soundcheck harness: the harness environment,
//! build-info labels, debug snapshots and synthetic test-user fixtures.

pub mod build_info;
pub mod env;
pub mod error;
pub mod fixtures;
pub mod snapshot;

// Re-export commonly used types
pub use build_info::{BuildInfo, Commit};
pub use env::{Credentials, HarnessEnv};
pub use error::{Error, Result};
pub use snapshot::*;

/// Soundcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
