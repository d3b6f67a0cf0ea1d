//! Build manifest: a canonical JSON record of what a build consumed.
//!
//! The manifest names the backend, the target devices, the images and their
//! kernels, every constant with its final bytes, and the blob digest. It is
//! content-addressed under [`HashDomain::BuildManifest`].

use crate::bundle::{BuildManifest, BundleState, DeviceDescriptor, DeviceImage};
use crate::constant::ConstantStore;
use crate::proof::canon::{canonical_json_bytes, CanonError};
use crate::proof::hash::{canonical_hash, ContentHash, HashDomain};

/// Schema tag embedded in every manifest.
pub const MANIFEST_SCHEMA: &str = "speck.build_manifest.v1";

/// Everything a manifest records about one build step.
#[derive(Debug, Clone, Copy)]
pub struct ManifestInput<'a> {
    pub backend: &'a str,
    pub stage: BundleState,
    pub images: &'a [DeviceImage],
    pub devices: &'a [DeviceDescriptor],
    pub store: &'a ConstantStore,
    pub blob_digest: &'a ContentHash,
}

/// Produce the canonical manifest for `input`.
///
/// # Errors
///
/// Returns [`CanonError`] if canonical serialization fails (cannot happen
/// for the integer-only values written here).
pub fn build_manifest(input: &ManifestInput<'_>) -> Result<BuildManifest, CanonError> {
    let constants: Vec<serde_json::Value> = input
        .store
        .entries()
        .map(|e| {
            serde_json::json!({
                "token": e.descriptor.token().raw(),
                "label": e.descriptor.label(),
                "type": e.descriptor.type_descriptor().type_name(),
                "size": e.descriptor.type_descriptor().size(),
                "is_set": e.is_set,
                "value_hex": hex::encode(e.value),
            })
        })
        .collect();

    let devices: Vec<serde_json::Value> = input
        .devices
        .iter()
        .map(|d| {
            serde_json::json!({
                "id": d.id.0,
                "kind": d.kind.as_str(),
                "name": d.name,
            })
        })
        .collect();

    let images: Vec<serde_json::Value> = input
        .images
        .iter()
        .map(|i| {
            let kernels: Vec<&str> = i.kernels().iter().map(|k| k.name.as_str()).collect();
            serde_json::json!({ "name": i.name(), "kernels": kernels })
        })
        .collect();

    let value = serde_json::json!({
        "backend": input.backend,
        "blob_digest": input.blob_digest.as_str(),
        "constants": constants,
        "devices": devices,
        "images": images,
        "schema": MANIFEST_SCHEMA,
        "stage": input.stage.as_str(),
    });

    let bytes = canonical_json_bytes(&value)?;
    let digest = canonical_hash(HashDomain::BuildManifest, &bytes);
    Ok(BuildManifest { bytes, digest })
}
