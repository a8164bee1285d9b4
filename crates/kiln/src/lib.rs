//! kiln library — workload driver for the `kiln-memory` pools.

pub mod app;
pub mod config;
pub mod errors;
pub mod version;
