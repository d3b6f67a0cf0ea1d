//! Typed specialization-constant errors.
//!
//! Every fallible kernel operation returns [`SpecConstError`]. A failing
//! operation leaves the bundle and its store exactly as they were before the
//! call; no variant is ever produced after a partial mutation.

use crate::constant::identity::describe;
use crate::constant::ConstantToken;

/// Failure of a constant, bundle, or build operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecConstError {
    /// The requested Rust type disagrees with the constant's declared type.
    TypeMismatch {
        token: ConstantToken,
        declared: &'static str,
        requested: &'static str,
    },
    /// The constant is not declared by any image in this bundle.
    UnknownConstant { token: ConstantToken },
    /// The operation is not legal in the bundle's current stage, or the
    /// surrounding execution context forbids it.
    InvalidState { detail: String },
    /// Device code references a constant the frozen store does not carry.
    UnresolvedConstant { token: ConstantToken, image: String },
    /// The device compiler rejected the build. `diagnostic` is the backend's
    /// message verbatim.
    BuildFailure { backend: String, diagnostic: String },
}

impl SpecConstError {
    #[must_use]
    pub fn invalid_state(detail: impl Into<String>) -> Self {
        Self::InvalidState {
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for SpecConstError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch {
                token,
                declared,
                requested,
            } => write!(
                f,
                "type mismatch for constant {}: declared {declared}, requested {requested}",
                describe(*token)
            ),
            Self::UnknownConstant { token } => {
                write!(f, "constant {} is not declared by this bundle", describe(*token))
            }
            Self::InvalidState { detail } => write!(f, "invalid state: {detail}"),
            Self::UnresolvedConstant { token, image } => write!(
                f,
                "image {image:?} references constant {} which is absent from the store",
                describe(*token)
            ),
            Self::BuildFailure {
                backend,
                diagnostic,
            } => write!(f, "build failed in backend {backend:?}: {diagnostic}"),
        }
    }
}

impl std::error::Error for SpecConstError {}
