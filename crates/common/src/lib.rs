//! Common utilities for limec crates.
//!
//! This crate provides shared infrastructure used across the limec workspace:
//!
//! - [`debug`] - Per-module logging controlled via `LIMEC_DEBUG` environment variable
//! - [`diag`] - Structured diagnostics with severity and source line

pub mod debug;
pub mod diag;

pub use debug::{create_logger, Logger};
pub use diag::{Diagnostic, Severity};
