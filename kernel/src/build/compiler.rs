//! Device-compiler boundary.
//!
//! The pipeline calls the backend exactly once per stage transition: one
//! `compile` call for `Input -> Object` covering every image, one `link` call
//! for `Object -> Executable` covering every module. The constant blob is an
//! immutable side input to both.

use crate::bundle::{CompiledModule, DeviceDescriptor, DeviceImage};
use crate::constant::ConstantToken;

/// Input to [`DeviceCompiler::compile`].
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub images: &'a [DeviceImage],
    pub devices: &'a [DeviceDescriptor],
    /// Serialized frozen store (see [`super::blob`]).
    pub blob: &'a [u8],
    /// Backend-specific option string, passed through untouched.
    pub options: &'a str,
}

/// Input to [`DeviceCompiler::link`].
#[derive(Debug, Clone, Copy)]
pub struct LinkRequest<'a> {
    pub objects: &'a [CompiledModule],
    pub devices: &'a [DeviceDescriptor],
    pub blob: &'a [u8],
    pub options: &'a str,
}

/// Why the backend refused to produce an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerDiagnostic {
    /// Device code references a constant that is not in the blob.
    UnresolvedConstant { token: ConstantToken, image: String },
    /// Any other backend failure, with the backend's message.
    Failed { message: String },
}

/// A device-code compiler.
///
/// Implementations must honor the blob bit-for-bit: the value a kernel
/// observes for a constant is exactly the bytes in the blob entry for its
/// token.
pub trait DeviceCompiler: Send + Sync {
    /// Stable backend identifier for diagnostics and manifests.
    fn backend_id(&self) -> &str;

    /// Compile every image to object form.
    ///
    /// Must return exactly one module per image, in image order.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerDiagnostic`] if any image cannot be compiled.
    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<CompiledModule>, CompilerDiagnostic>;

    /// Link object modules into executable form for the request's devices.
    ///
    /// Must return exactly one module per object, in object order.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerDiagnostic`] if linking fails.
    fn link(&self, request: &LinkRequest<'_>) -> Result<Vec<CompiledModule>, CompilerDiagnostic>;
}
