//! Reference device compiler.
//!
//! `ReferenceCompiler` does no code generation. Its "object code" is a
//! canonical JSON record of which constant bytes each image was specialized
//! with, which makes specialization observable in tests and fixtures:
//!
//! ```text
//! {"backend":"reference","blob_digest":"sha256:...","constants":[{"token":N,"value_hex":".."}],
//!  "image":"..","kernels":[".."],"stage":"object"}
//! ```
//!
//! Linking re-emits the object record with `stage` set to `executable`, the
//! target device ids, and the digest of the object payload.
//!
//! The compiler resolves every kernel reference against the blob and fails
//! with `UnresolvedConstant` for the first one it cannot find.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use speck_kernel::build::blob::{decode_blob, BlobEntry};
use speck_kernel::build::{CompileRequest, CompilerDiagnostic, DeviceCompiler, LinkRequest};
use speck_kernel::bundle::{BundleState, CompiledModule, DeviceImage};
use speck_kernel::constant::ConstantToken;
use speck_kernel::proof::canon::canonical_json_bytes;
use speck_kernel::proof::hash::{canonical_hash, ContentHash, HashDomain};

/// Backend id reported in diagnostics and manifests.
pub const REFERENCE_BACKEND_ID: &str = "reference";

/// Deterministic in-process compiler.
#[derive(Debug, Default)]
pub struct ReferenceCompiler {
    failures: BTreeMap<String, String>,
    compile_calls: AtomicUsize,
    link_calls: AtomicUsize,
}

impl ReferenceCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every compile of `image` fail with `message`.
    #[must_use]
    pub fn failing_on(mut self, image: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(image.into(), message.into());
        self
    }

    /// Number of `compile` invocations so far.
    #[must_use]
    pub fn compile_calls(&self) -> usize {
        self.compile_calls.load(Ordering::SeqCst)
    }

    /// Number of `link` invocations so far.
    #[must_use]
    pub fn link_calls(&self) -> usize {
        self.link_calls.load(Ordering::SeqCst)
    }

    fn object_for(
        image: &DeviceImage,
        blob: &BTreeMap<ConstantToken, &[u8]>,
        digest: &ContentHash,
    ) -> Result<CompiledModule, CompilerDiagnostic> {
        let mut used: BTreeSet<ConstantToken> = image.constants().iter().map(|c| c.token()).collect();
        for kernel in image.kernels() {
            for &token in &kernel.references {
                if !blob.contains_key(&token) {
                    return Err(CompilerDiagnostic::UnresolvedConstant {
                        token,
                        image: image.name().to_string(),
                    });
                }
                used.insert(token);
            }
        }

        let constants: Vec<serde_json::Value> = used
            .iter()
            .filter_map(|t| blob.get(t).map(|bytes| (t, bytes)))
            .map(|(t, bytes)| serde_json::json!({ "token": t.raw(), "value_hex": hex::encode(bytes) }))
            .collect();
        let kernels: Vec<&str> = image.kernels().iter().map(|k| k.name.as_str()).collect();

        let record = serde_json::json!({
            "backend": REFERENCE_BACKEND_ID,
            "blob_digest": digest.as_str(),
            "constants": constants,
            "image": image.name(),
            "kernels": kernels,
            "stage": BundleState::Object.as_str(),
        });
        Ok(CompiledModule {
            image: image.name().to_string(),
            stage: BundleState::Object,
            payload: encode_record(&record)?,
            blob_digest: digest.clone(),
        })
    }
}

impl DeviceCompiler for ReferenceCompiler {
    fn backend_id(&self) -> &str {
        REFERENCE_BACKEND_ID
    }

    fn compile(&self, request: &CompileRequest<'_>) -> Result<Vec<CompiledModule>, CompilerDiagnostic> {
        self.compile_calls.fetch_add(1, Ordering::SeqCst);
        let entries = decode(request.blob)?;
        let blob: BTreeMap<ConstantToken, &[u8]> =
            entries.iter().map(|e| (e.token, e.bytes.as_slice())).collect();
        let digest = canonical_hash(HashDomain::ConstantBlob, request.blob);

        request
            .images
            .iter()
            .map(|image| {
                if let Some(message) = self.failures.get(image.name()) {
                    return Err(CompilerDiagnostic::Failed {
                        message: message.clone(),
                    });
                }
                Self::object_for(image, &blob, &digest)
            })
            .collect()
    }

    fn link(&self, request: &LinkRequest<'_>) -> Result<Vec<CompiledModule>, CompilerDiagnostic> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        decode(request.blob)?;
        let digest = canonical_hash(HashDomain::ConstantBlob, request.blob);
        let device_ids: Vec<u32> = request.devices.iter().map(|d| d.id.0).collect();

        request
            .objects
            .iter()
            .map(|object| {
                if object.stage != BundleState::Object {
                    return Err(failed(format!(
                        "cannot link {:?}: it is in the {} stage",
                        object.image, object.stage
                    )));
                }
                let mut record: serde_json::Value = serde_json::from_slice(&object.payload)
                    .map_err(|e| failed(format!("unreadable object {:?}: {e}", object.image)))?;
                let fields = record
                    .as_object_mut()
                    .ok_or_else(|| failed(format!("object {:?} is not a record", object.image)))?;
                fields.insert("stage".into(), BundleState::Executable.as_str().into());
                fields.insert("devices".into(), device_ids.clone().into());
                fields.insert(
                    "object_digest".into(),
                    canonical_hash(HashDomain::ModulePayload, &object.payload)
                        .as_str()
                        .into(),
                );
                Ok(CompiledModule {
                    image: object.image.clone(),
                    stage: BundleState::Executable,
                    payload: encode_record(&record)?,
                    blob_digest: digest.clone(),
                })
            })
            .collect()
    }
}

/// The value bytes `module` was specialized with for `token`, if any.
///
/// Reads the reference backend's payload record; returns `None` for any
/// other payload.
#[must_use]
pub fn embedded_value(module: &CompiledModule, token: ConstantToken) -> Option<Vec<u8>> {
    let record: serde_json::Value = serde_json::from_slice(&module.payload).ok()?;
    record["constants"]
        .as_array()?
        .iter()
        .find(|c| c["token"].as_u64() == Some(token.raw()))
        .and_then(|c| c["value_hex"].as_str())
        .and_then(|h| hex::decode(h).ok())
}

fn decode(blob: &[u8]) -> Result<Vec<BlobEntry>, CompilerDiagnostic> {
    decode_blob(blob).map_err(|e| failed(format!("malformed constant blob: {e}")))
}

fn encode_record(record: &serde_json::Value) -> Result<Vec<u8>, CompilerDiagnostic> {
    canonical_json_bytes(record).map_err(|e| failed(e.to_string()))
}

fn failed(message: String) -> CompilerDiagnostic {
    CompilerDiagnostic::Failed { message }
}
