//! fragsql - SQL fragments and plan introspection for a table-SQL engine.
//!
//! This library exposes the core modules for use by the binary and in
//! integration tests.

pub mod cli;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod explain;
pub mod fragment;
pub mod logging;

pub use environment::FragmentEnvironment;
pub use error::{FragsqlError, Result};
