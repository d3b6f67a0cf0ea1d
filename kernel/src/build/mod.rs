//! Build module: constant blob, device-compiler boundary, manifest, pipeline.
//!
//! Depends on `constant`, `bundle` and `proof`.

pub mod blob;
pub mod compiler;
pub mod manifest;
pub mod pipeline;

pub use compiler::{CompileRequest, CompilerDiagnostic, DeviceCompiler, LinkRequest};
pub use pipeline::{BuildOptions, BuildPipeline};
