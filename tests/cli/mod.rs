//! Binary tests for the fragsql command line.

pub mod cli_test;
pub mod common;
