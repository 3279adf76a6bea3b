//! Core types for xenia-manager
//!
//! This crate provides the error handling, configuration
//! and logging infrastructure shared by the other crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{Result, VfsError, XmError};
