//! Bundle module: `KernelBundle`, its stage machine, images, and build outputs.
//!
//! Depends on `constant` and `proof`. Does not import from `build` or
//! `dispatch`.

pub mod artifact;
pub mod image;
pub mod state;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::Pod;

use crate::constant::{ConstantStore, ConstantToken, SpecializationId, TypeDescriptor};
use crate::error::SpecConstError;

pub use artifact::{BuildManifest, CompiledModule};
pub use image::{DeviceDescriptor, DeviceId, DeviceImage, DeviceKind, KernelEntry};
pub use state::{BundleOp, BundleState, BundleStateMachine};

static NEXT_BUNDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique bundle identifier, for logs and manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BundleId(u64);

impl BundleId {
    fn next() -> Self {
        Self(NEXT_BUNDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BundleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bundle-{}", self.0)
    }
}

/// A unit of device code with its own constant store.
///
/// Cloning an `Input` bundle gives an independent copy of its constants
/// (the store is copied on first write) under a fresh [`BundleId`]. Past
/// `Input` the store is frozen, so clones share it and keep the id.
#[derive(Debug)]
pub struct KernelBundle {
    id: BundleId,
    machine: BundleStateMachine,
    devices: Vec<DeviceDescriptor>,
    images: Vec<DeviceImage>,
    store: Arc<ConstantStore>,
    modules: Vec<CompiledModule>,
    manifest: Option<BuildManifest>,
}

impl Clone for KernelBundle {
    fn clone(&self) -> Self {
        Self {
            id: if self.store.is_frozen() {
                self.id
            } else {
                BundleId::next()
            },
            machine: self.machine,
            devices: self.devices.clone(),
            images: self.images.clone(),
            store: Arc::clone(&self.store),
            modules: self.modules.clone(),
            manifest: self.manifest.clone(),
        }
    }
}

impl KernelBundle {
    /// Create an `Input` bundle over `images` for `devices`.
    ///
    /// The store is pre-filled with the default of every constant any image
    /// declares.
    ///
    /// # Errors
    ///
    /// - [`SpecConstError::InvalidState`] if `devices` is empty.
    /// - [`SpecConstError::TypeMismatch`] if two images declare one token with
    ///   different types.
    pub fn new_input(
        images: Vec<DeviceImage>,
        devices: Vec<DeviceDescriptor>,
    ) -> Result<Self, SpecConstError> {
        if devices.is_empty() {
            return Err(SpecConstError::invalid_state(
                "a bundle needs at least one device",
            ));
        }
        let store = ConstantStore::from_descriptors(images.iter().flat_map(|i| i.constants()))?;
        Ok(Self {
            id: BundleId::next(),
            machine: BundleStateMachine::new(),
            devices,
            images,
            store: Arc::new(store),
            modules: Vec::new(),
            manifest: None,
        })
    }

    #[must_use]
    pub const fn id(&self) -> BundleId {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> BundleState {
        self.machine.state()
    }

    #[must_use]
    pub const fn machine(&self) -> &BundleStateMachine {
        &self.machine
    }

    #[must_use]
    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    #[must_use]
    pub fn images(&self) -> &[DeviceImage] {
        &self.images
    }

    #[must_use]
    pub fn store(&self) -> &ConstantStore {
        &self.store
    }

    /// Compiled artifacts. Empty for `Input` bundles.
    #[must_use]
    pub fn modules(&self) -> &[CompiledModule] {
        &self.modules
    }

    /// Manifest of the build that produced this bundle, if one was emitted.
    #[must_use]
    pub fn manifest(&self) -> Option<&BuildManifest> {
        self.manifest.as_ref()
    }

    /// Whether any image in the bundle declares a constant.
    #[must_use]
    pub fn contains_specialization_constants(&self) -> bool {
        !self.store.is_empty()
    }

    /// Whether the bundle's images declare `id`.
    pub fn contains<T: Pod>(&self, id: &SpecializationId<T>) -> bool {
        self.store.has(id.token())
    }

    /// Whether `id` was explicitly set on this bundle.
    pub fn has_override<T: Pod>(&self, id: &SpecializationId<T>) -> bool {
        self.store.is_set(id.token())
    }

    /// Current host-side value of `id` (default if unset).
    ///
    /// # Errors
    ///
    /// [`SpecConstError::UnknownConstant`] or [`SpecConstError::TypeMismatch`].
    pub fn get<T: Pod>(&self, id: &SpecializationId<T>) -> Result<T, SpecConstError> {
        self.store.get(id)
    }

    /// Set `id` to `value`. Legal only in the `Input` stage.
    ///
    /// # Errors
    ///
    /// - [`SpecConstError::InvalidState`] outside `Input`.
    /// - [`SpecConstError::UnknownConstant`] if not declared by the bundle.
    /// - [`SpecConstError::TypeMismatch`] on type disagreement.
    pub fn set<T: Pod>(&mut self, id: &SpecializationId<T>, value: T) -> Result<(), SpecConstError> {
        self.set_raw(
            id.token(),
            &TypeDescriptor::of::<T>(),
            bytemuck::bytes_of(&value),
        )
    }

    /// Untyped form of [`set`](Self::set), for callers that carry values
    /// as descriptor-tagged bytes.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn set_raw(
        &mut self,
        token: ConstantToken,
        ty: &TypeDescriptor,
        bytes: &[u8],
    ) -> Result<(), SpecConstError> {
        self.machine.guard(BundleOp::SetConstant)?;
        if !self.store.has(token) {
            return Err(SpecConstError::UnknownConstant { token });
        }
        Arc::make_mut(&mut self.store).set_raw(token, ty, bytes)
    }

    /// Drop the override for `id`, restoring its default.
    ///
    /// # Errors
    ///
    /// - [`SpecConstError::InvalidState`] outside `Input`.
    /// - [`SpecConstError::UnknownConstant`] if not declared by the bundle.
    pub fn reset<T: Pod>(&mut self, id: &SpecializationId<T>) -> Result<(), SpecConstError> {
        self.machine.guard(BundleOp::ResetConstant)?;
        let token = id.token();
        if !self.store.has(token) {
            return Err(SpecConstError::UnknownConstant { token });
        }
        Arc::make_mut(&mut self.store).reset(token)
    }

    #[must_use]
    pub fn has_kernel(&self, name: &str) -> bool {
        self.images.iter().any(|i| i.has_kernel(name))
    }

    /// All kernel names across images, in image order.
    #[must_use]
    pub fn kernel_names(&self) -> Vec<&str> {
        self.images
            .iter()
            .flat_map(|i| i.kernels().iter().map(|k| k.name.as_str()))
            .collect()
    }

    /// Shared handle on the store, for dispatches that outlive a borrow of
    /// the bundle.
    #[must_use]
    pub fn shared_store(&self) -> Arc<ConstantStore> {
        Arc::clone(&self.store)
    }

    /// The bundle that results from advancing this one to `to` with a new
    /// (frozen) store and artifacts. `self` is not modified; the result gets
    /// a fresh id.
    pub(crate) fn advanced(
        &self,
        to: BundleState,
        store: Arc<ConstantStore>,
        modules: Vec<CompiledModule>,
        manifest: Option<BuildManifest>,
    ) -> Result<Self, SpecConstError> {
        if !store.is_frozen() {
            return Err(SpecConstError::invalid_state(
                "a bundle past the input stage must carry a frozen store",
            ));
        }
        let mut machine = self.machine;
        machine.advance(to)?;
        Ok(Self {
            id: BundleId::next(),
            machine,
            devices: self.devices.clone(),
            images: self.images.clone(),
            store,
            modules,
            manifest: manifest.or_else(|| self.manifest.clone()),
        })
    }
}
