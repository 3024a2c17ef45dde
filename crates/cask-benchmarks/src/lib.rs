//! Cask benchmarking suite
//!
//! Benchmarks for digest throughput and for the cache engine's write, read
//! and copy paths.

pub mod common;

pub use common::*;
