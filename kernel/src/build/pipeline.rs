//! `BuildPipeline`: drives bundles through `Input -> Object -> Executable`.
//!
//! Every step works on a copy. The bundle passed in is never modified, and
//! on any error no bundle is produced, so a failed step leaves the caller
//! exactly where it was.
//!
//! The constant values visible to the backend are the ones in the store at
//! the moment it is frozen inside [`BuildPipeline::compile`]. Nothing written
//! to the input bundle afterwards reaches the compiled code.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::blob::encode_blob;
use super::compiler::{CompileRequest, CompilerDiagnostic, DeviceCompiler, LinkRequest};
use super::manifest::{build_manifest, ManifestInput};
use crate::bundle::{BuildManifest, BundleOp, BundleState, CompiledModule, KernelBundle};
use crate::constant::ConstantStore;
use crate::error::SpecConstError;
use crate::proof::hash::{canonical_hash, ContentHash, HashDomain};

const DEFAULT_MAX_BLOB_BYTES: usize = 1_048_576;

/// Build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Passed to the backend untouched.
    pub backend_options: String,
    /// Record a [`BuildManifest`] on each produced bundle.
    pub emit_manifest: bool,
    /// Upper bound on the serialized constant blob. Checked before the
    /// backend is invoked.
    pub max_blob_bytes: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            backend_options: String::new(),
            emit_manifest: true,
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
        }
    }
}

/// A device compiler plus build options.
pub struct BuildPipeline<'c> {
    compiler: &'c dyn DeviceCompiler,
    options: BuildOptions,
}

impl<'c> BuildPipeline<'c> {
    /// Pipeline with default options.
    #[must_use]
    pub fn new(compiler: &'c dyn DeviceCompiler) -> Self {
        Self::with_options(compiler, BuildOptions::default())
    }

    #[must_use]
    pub fn with_options(compiler: &'c dyn DeviceCompiler, options: BuildOptions) -> Self {
        Self { compiler, options }
    }

    #[must_use]
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// `Input -> Object`: freeze a copy of the store and compile every image.
    ///
    /// # Errors
    ///
    /// - [`SpecConstError::InvalidState`] unless `bundle` is `Input`.
    /// - [`SpecConstError::BuildFailure`] if the blob exceeds
    ///   `max_blob_bytes` or the backend fails.
    /// - [`SpecConstError::UnresolvedConstant`] if device code references a
    ///   constant absent from the store.
    pub fn compile(&self, bundle: &KernelBundle) -> Result<KernelBundle, SpecConstError> {
        let _span = tracing::info_span!("compile", bundle = %bundle.id()).entered();
        bundle.machine().guard(BundleOp::Compile)?;

        let mut store = bundle.store().clone();
        store.freeze()?;
        let (blob, digest) = self.serialize(&store)?;
        debug!(
            constants = store.len(),
            blob_bytes = blob.len(),
            blob_digest = %digest,
            "constant store frozen"
        );

        let request = CompileRequest {
            images: bundle.images(),
            devices: bundle.devices(),
            blob: &blob,
            options: &self.options.backend_options,
        };
        let modules = self
            .compiler
            .compile(&request)
            .map_err(|d| self.reject(d))?;
        self.check_modules(&modules, bundle.images().len(), BundleState::Object, &digest)?;

        let manifest = self.manifest(bundle, &store, BundleState::Object, &digest)?;
        let object = bundle.advanced(BundleState::Object, Arc::new(store), modules, manifest)?;
        info!(object = %object.id(), images = object.modules().len(), "compiled");
        Ok(object)
    }

    /// `Object -> Executable`: link the object modules for the bundle's devices.
    ///
    /// # Errors
    ///
    /// - [`SpecConstError::InvalidState`] unless `bundle` is `Object`.
    /// - [`SpecConstError::BuildFailure`] or
    ///   [`SpecConstError::UnresolvedConstant`] from the backend.
    pub fn link(&self, bundle: &KernelBundle) -> Result<KernelBundle, SpecConstError> {
        let _span = tracing::info_span!("link", bundle = %bundle.id()).entered();
        bundle.machine().guard(BundleOp::Link)?;

        let store = bundle.shared_store();
        let (blob, digest) = self.serialize(&store)?;

        let request = LinkRequest {
            objects: bundle.modules(),
            devices: bundle.devices(),
            blob: &blob,
            options: &self.options.backend_options,
        };
        let modules = self.compiler.link(&request).map_err(|d| self.reject(d))?;
        self.check_modules(&modules, bundle.modules().len(), BundleState::Executable, &digest)?;

        let manifest = self.manifest(bundle, &store, BundleState::Executable, &digest)?;
        let executable = bundle.advanced(BundleState::Executable, store, modules, manifest)?;
        info!(executable = %executable.id(), "linked");
        Ok(executable)
    }

    /// Bring `bundle` to `Executable`: compile then link from `Input`,
    /// link only from `Object`.
    ///
    /// # Errors
    ///
    /// Any error from [`compile`](Self::compile) or [`link`](Self::link);
    /// [`SpecConstError::InvalidState`] for an already executable bundle.
    pub fn build(&self, bundle: &KernelBundle) -> Result<KernelBundle, SpecConstError> {
        match bundle.state() {
            BundleState::Input => {
                let object = self.compile(bundle)?;
                self.link(&object)
            }
            BundleState::Object | BundleState::Executable => self.link(bundle),
        }
    }

    fn serialize(&self, store: &ConstantStore) -> Result<(Vec<u8>, ContentHash), SpecConstError> {
        let blob = encode_blob(store).map_err(|e| self.failure(e.to_string()))?;
        if blob.len() > self.options.max_blob_bytes {
            return Err(self.failure(format!(
                "constant blob is {} bytes, limit is {}",
                blob.len(),
                self.options.max_blob_bytes
            )));
        }
        let digest = canonical_hash(HashDomain::ConstantBlob, &blob);
        Ok((blob, digest))
    }

    fn check_modules(
        &self,
        modules: &[CompiledModule],
        expected: usize,
        stage: BundleState,
        digest: &ContentHash,
    ) -> Result<(), SpecConstError> {
        if modules.len() != expected {
            return Err(self.failure(format!(
                "backend returned {} modules, expected {expected}",
                modules.len()
            )));
        }
        if let Some(m) = modules.iter().find(|m| m.stage != stage) {
            return Err(self.failure(format!(
                "module {:?} is in the {} stage, expected {stage}",
                m.image, m.stage
            )));
        }
        if let Some(m) = modules.iter().find(|m| &m.blob_digest != digest) {
            return Err(self.failure(format!(
                "module {:?} was specialized with blob {}, expected {digest}",
                m.image, m.blob_digest
            )));
        }
        Ok(())
    }

    fn manifest(
        &self,
        bundle: &KernelBundle,
        store: &ConstantStore,
        stage: BundleState,
        digest: &ContentHash,
    ) -> Result<Option<BuildManifest>, SpecConstError> {
        if !self.options.emit_manifest {
            return Ok(None);
        }
        build_manifest(&ManifestInput {
            backend: self.compiler.backend_id(),
            stage,
            images: bundle.images(),
            devices: bundle.devices(),
            store,
            blob_digest: digest,
        })
        .map(Some)
        .map_err(|e| self.failure(e.to_string()))
    }

    fn reject(&self, diagnostic: CompilerDiagnostic) -> SpecConstError {
        warn!(backend = self.compiler.backend_id(), ?diagnostic, "backend rejected build");
        match diagnostic {
            CompilerDiagnostic::UnresolvedConstant { token, image } => {
                SpecConstError::UnresolvedConstant { token, image }
            }
            CompilerDiagnostic::Failed { message } => self.failure(message),
        }
    }

    fn failure(&self, diagnostic: String) -> SpecConstError {
        SpecConstError::BuildFailure {
            backend: self.compiler.backend_id().to_string(),
            diagnostic,
        }
    }
}
