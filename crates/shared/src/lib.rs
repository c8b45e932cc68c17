//! # Shared
//! Logging shared by the backup binary and its tests.
//!

#![warn(missing_docs)]

mod logger;
#[cfg(feature = "test")]
pub mod test;

pub use logger::{LoggerError, init_logger};
