//! Shared helpers for the lock tests and the fixture binary.

pub mod build_helpers;
