//! Speck harness: host-side execution around the kernel crate.
//!
//! The harness supplies what a real runtime would: a [`context::Context`]
//! with an image catalog, a [`queue::Queue`] that dispatches kernels on
//! threads, and a deterministic [`backend::ReferenceCompiler`]. Programs
//! provide image and device data only; specialization, freezing, and the
//! stage machine all live in the kernel.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod context;
pub mod contract;
pub mod error;
pub mod programs;
pub mod queue;

pub use error::DispatchError;
