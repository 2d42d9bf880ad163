//! deedsync common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the deedsync workspace.
//!
//! # Example
//!
//! ```no_run
//! use deedsync_common::logging::{init_logging, LogConfig};
//! use deedsync_common::Result;
//!
//! fn main() -> Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{DeedsyncError, Result};
