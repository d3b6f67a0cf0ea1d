//! Build outputs carried by a bundle: compiled modules and the build manifest.

use crate::bundle::state::BundleState;
use crate::proof::hash::ContentHash;

/// Opaque artifact returned by the device compiler for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    /// Name of the image this module was produced from.
    pub image: String,
    /// Stage the artifact belongs to (`Object` or `Executable`).
    pub stage: BundleState,
    /// Backend-defined bytes. The runtime never interprets them.
    pub payload: Vec<u8>,
    /// Digest of the constant blob the artifact was specialized with.
    pub blob_digest: ContentHash,
}

/// Canonical JSON record of a build and its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildManifest {
    /// Canonical JSON bytes.
    pub bytes: Vec<u8>,
    /// `canonical_hash(HashDomain::BuildManifest, bytes)`.
    pub digest: ContentHash,
}
