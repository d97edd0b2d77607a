//! Infrastructure implementations.
//!
//! Contains port trait implementations, the in-memory stores, and
//! environment configuration.

pub mod clock;
pub mod config;
pub mod memory_store;
pub mod ports;
