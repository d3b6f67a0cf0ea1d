//! Speck Kernel: specialization constants for device-code bundles.
//!
//! # API Surface
//!
//! - [`constant::SpecializationId`] -- declare a typed constant with a default
//! - [`bundle::KernelBundle`] -- an image set with its own constant store
//! - [`build::BuildPipeline`] -- `Input -> Object -> Executable` through a
//!   [`build::DeviceCompiler`]
//! - [`dispatch::DispatchTarget`] -- read frozen constants inside a dispatch
//!
//! # Module Dependency Direction
//!
//! `constant` ← `bundle` ← `build`, `dispatch`
//!
//! `proof` (canonical JSON, content hashes) depends on nothing and is used by
//! `bundle` and `build`. No cycles. No I/O anywhere in this crate.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod build;
pub mod bundle;
pub mod constant;
pub mod dispatch;
pub mod error;
pub mod proof;

pub use error::SpecConstError;
