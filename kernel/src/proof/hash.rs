//! Content hashes with domain separation.
//!
//! **Exactly one place defines content hashing.** Blob digests, module
//! digests and manifest digests all route through [`canonical_hash`].
//!
//! Algorithm: SHA-256 over `domain_prefix ++ data`.
//! Result format: `"sha256:<hex_digest>"`.

use sha2::{Digest, Sha256};

/// A content-addressed hash with algorithm identifier.
///
/// Invariant: the inner string contains exactly one `:` separator with
/// non-empty substrings on both sides (enforced by [`ContentHash::parse`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash {
    full: String,
    colon: usize,
}

impl ContentHash {
    /// Parse from `"algorithm:hex"` format.
    ///
    /// Returns `None` if the colon is missing or either side is empty.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let colon = s.find(':')?;
        if colon == 0 || colon == s.len() - 1 || s[colon + 1..].contains(':') {
            return None;
        }
        Some(Self {
            full: s.to_string(),
            colon,
        })
    }

    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.full[..self.colon]
    }

    #[must_use]
    pub fn hex_digest(&self) -> &str {
        &self.full[self.colon + 1..]
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}

/// Typed domain separator. Each variant maps to a unique null-terminated prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashDomain {
    /// The serialized constant blob handed to the device compiler.
    ConstantBlob,
    /// Backend artifacts (`CompiledModule::payload`).
    ModulePayload,
    /// Canonical build manifests.
    BuildManifest,
}

impl HashDomain {
    /// All variants in declaration order.
    pub const ALL: &'static [HashDomain] = &[
        Self::ConstantBlob,
        Self::ModulePayload,
        Self::BuildManifest,
    ];

    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::ConstantBlob => b"SPECK::CONSTANT_BLOB::V1\0",
            Self::ModulePayload => b"SPECK::MODULE_PAYLOAD::V1\0",
            Self::BuildManifest => b"SPECK::BUILD_MANIFEST::V1\0",
        }
    }
}

/// Compute the canonical hash of `data` under `domain`.
#[must_use]
pub fn canonical_hash(domain: HashDomain, data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(data);
    let full = format!("sha256:{}", hex::encode(hasher.finalize()));
    ContentHash { full, colon: 6 }
}
