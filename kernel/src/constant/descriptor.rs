//! Tokens and type descriptors: the untyped face of a declared constant.
//!
//! A [`ConstantDescriptor`] is what the store, the blob encoder and the
//! device images see. The typed face is [`super::SpecializationId`].

use std::any::TypeId;
use std::fmt;

use bytemuck::Pod;

/// Process-wide unique identifier of a declared constant.
///
/// Allocated from a monotonic counter the first time an identity is used.
/// Tokens are never reused and never derived from addresses. `Ord` gives the
/// blob its deterministic entry order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstantToken(u64);

impl ConstantToken {
    /// Wrap a raw token value.
    ///
    /// Only the blob decoder and tests should need this; declared identities
    /// obtain their token from the registry.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw token value (blob wire form).
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ConstantToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConstantToken({})", self.0)
    }
}

impl fmt::Display for ConstantToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout of a constant's value type.
///
/// Two descriptors match only when their `TypeId`s match. Size and alignment
/// are carried for the blob and for diagnostics; they are implied by the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    size: usize,
    align: usize,
}

impl TypeDescriptor {
    /// Descriptor for `T`. The `Pod` bound is the trivially-copyable marker.
    #[must_use]
    pub fn of<T: Pod>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
        }
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn align(&self) -> usize {
        self.align
    }

    /// True if a value of the `other` type may be stored under `self`.
    #[must_use]
    pub fn accepts(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// Registry row for a declared constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantDescriptor {
    token: ConstantToken,
    label: Option<&'static str>,
    ty: TypeDescriptor,
    default_bytes: Vec<u8>,
}

impl ConstantDescriptor {
    /// Build a descriptor from a token, optional label, and typed default.
    #[must_use]
    pub fn new<T: Pod>(token: ConstantToken, label: Option<&'static str>, default: T) -> Self {
        Self {
            token,
            label,
            ty: TypeDescriptor::of::<T>(),
            default_bytes: bytemuck::bytes_of(&default).to_vec(),
        }
    }

    #[must_use]
    pub const fn token(&self) -> ConstantToken {
        self.token
    }

    /// The label given at declaration, if any.
    #[must_use]
    pub const fn declared_label(&self) -> Option<&'static str> {
        self.label
    }

    /// Diagnostic label; falls back to the token when none was declared.
    #[must_use]
    pub fn label(&self) -> String {
        self.label
            .map_or_else(|| self.token.to_string(), ToString::to_string)
    }

    #[must_use]
    pub const fn type_descriptor(&self) -> &TypeDescriptor {
        &self.ty
    }

    /// Default value bytes. Length always equals `type_descriptor().size()`.
    #[must_use]
    pub fn default_bytes(&self) -> &[u8] {
        &self.default_bytes
    }
}
