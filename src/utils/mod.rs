//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `poprelay` crate.
//!
//! - `error`: the crate-wide `RelayError` and `Result` alias.
//! - `logging`: tracing subscriber setup.
//! - `shutdown`: the stop signal shared by every long-lived task.

pub mod error;
pub mod logging;
pub mod shutdown;

pub use error::{RelayError, Result};

#[cfg(test)]
mod tests;
