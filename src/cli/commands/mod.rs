//! Command implementations for the drainpool CLI
//!
//! Each command is organized into its own module.

pub mod config;
pub mod run;
pub mod version;
