// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line interface.
//!
//! Argument parsing, the `predict` command and console logging macros.

/// CLI arguments.
pub mod args;

/// Console logging macros and verbosity.
pub mod logging;

/// Prediction logic.
pub mod predict;
