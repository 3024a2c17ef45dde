//! Core data types for cask.

pub mod integrity;

pub use integrity::{Algorithm, Hash, Integrity};
