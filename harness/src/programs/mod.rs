//! Device programs used by fixtures and lock tests.

pub mod host_apis;
pub mod tiled_sum;
