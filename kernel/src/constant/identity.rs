//! `SpecializationId<T>`: a declared constant with a typed default.
//!
//! Identities are declared as statics:
//!
//! ```
//! use speck_kernel::constant::SpecializationId;
//!
//! static TILE_WIDTH: SpecializationId<u32> = SpecializationId::labeled("TILE_WIDTH", 16);
//! assert_eq!(TILE_WIDTH.default_value(), 16);
//! ```
//!
//! The token is allocated lazily from a process-wide counter on first use and
//! the descriptor is recorded in the registry at the same moment. Nothing
//! depends on static initialization order or on the address of the static.
//! Two identities with the same type and default are still distinct constants.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use bytemuck::Pod;
use parking_lot::RwLock;

use super::descriptor::{ConstantDescriptor, ConstantToken};

/// Token 0 is never allocated.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

static REGISTRY: OnceLock<RwLock<BTreeMap<ConstantToken, ConstantDescriptor>>> = OnceLock::new();

fn registry() -> &'static RwLock<BTreeMap<ConstantToken, ConstantDescriptor>> {
    REGISTRY.get_or_init(|| RwLock::new(BTreeMap::new()))
}

/// Look up the descriptor registered for `token`.
#[must_use]
pub fn lookup(token: ConstantToken) -> Option<ConstantDescriptor> {
    registry().read().get(&token).cloned()
}

/// Diagnostic name for `token`: `LABEL (#n)` for a registered labeled
/// identity, otherwise the bare `#n`.
#[must_use]
pub fn describe(token: ConstantToken) -> String {
    lookup(token)
        .and_then(|d| d.declared_label())
        .map_or_else(|| token.to_string(), |label| format!("{label} ({token})"))
}

/// A declared specialization constant of type `T`.
///
/// Immutable after construction; safe to share across threads.
pub struct SpecializationId<T: Pod> {
    label: Option<&'static str>,
    default: T,
    token: OnceLock<ConstantToken>,
    _ty: PhantomData<fn() -> T>,
}

impl<T: Pod> SpecializationId<T> {
    /// Declare an unlabeled constant with the given default.
    #[must_use]
    pub const fn new(default: T) -> Self {
        Self {
            label: None,
            default,
            token: OnceLock::new(),
            _ty: PhantomData,
        }
    }

    /// Declare a constant with a diagnostic label.
    ///
    /// The label is not part of identity: two identities with the same label
    /// are still distinct.
    #[must_use]
    pub const fn labeled(label: &'static str, default: T) -> Self {
        Self {
            label: Some(label),
            default,
            token: OnceLock::new(),
            _ty: PhantomData,
        }
    }

    /// This identity's token, allocating and registering it on first call.
    pub fn token(&self) -> ConstantToken {
        *self.token.get_or_init(|| {
            let token = ConstantToken::from_raw(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));
            registry()
                .write()
                .insert(token, ConstantDescriptor::new(token, self.label, self.default));
            token
        })
    }

    /// The declared default value.
    #[must_use]
    pub fn default_value(&self) -> T {
        self.default
    }

    /// The untyped descriptor (allocates the token if needed).
    pub fn descriptor(&self) -> ConstantDescriptor {
        ConstantDescriptor::new(self.token(), self.label, self.default)
    }
}

impl<T: Pod> PartialEq for SpecializationId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.token() == other.token()
    }
}

impl<T: Pod> Eq for SpecializationId<T> {}

impl<T: Pod> fmt::Debug for SpecializationId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecializationId")
            .field("label", &self.label)
            .field("token", &self.token.get())
            .field("type", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}
