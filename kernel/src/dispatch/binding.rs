//! Kernel execution binding: read access to constants inside a dispatch.
//!
//! A [`DispatchTarget`] is taken from an `Executable` bundle when a dispatch
//! is enqueued. It holds the bundle's frozen store by shared reference so the
//! dispatch may run on another thread after the bundle borrow ends.
//!
//! The kernel body only ever sees a [`KernelHandler`] borrowed from the
//! target for the duration of [`DispatchTarget::run`]; the handler cannot
//! escape the call.

use std::sync::Arc;

use bytemuck::Pod;

use crate::bundle::{BundleId, BundleOp, KernelBundle};
use crate::constant::{ConstantStore, SpecializationId};
use crate::error::SpecConstError;

/// Everything a dispatch needs from an executable bundle.
#[derive(Debug, Clone)]
pub struct DispatchTarget {
    bundle: BundleId,
    kernel: String,
    store: Arc<ConstantStore>,
}

impl DispatchTarget {
    /// Select `kernel` from `bundle` for dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`SpecConstError::InvalidState`] if the bundle is not
    /// `Executable` or does not define `kernel`.
    pub fn new(bundle: &KernelBundle, kernel: &str) -> Result<Self, SpecConstError> {
        bundle.machine().guard(BundleOp::Dispatch)?;
        if !bundle.has_kernel(kernel) {
            return Err(SpecConstError::invalid_state(format!(
                "kernel {kernel:?} is not defined by {}",
                bundle.id()
            )));
        }
        Ok(Self {
            bundle: bundle.id(),
            kernel: kernel.to_string(),
            store: bundle.shared_store(),
        })
    }

    #[must_use]
    pub const fn bundle(&self) -> BundleId {
        self.bundle
    }

    #[must_use]
    pub fn kernel_name(&self) -> &str {
        &self.kernel
    }

    /// Run `body` with a handler scoped to this call.
    pub fn run<R>(&self, body: impl FnOnce(&KernelHandler<'_>) -> R) -> R {
        let handler = KernelHandler {
            kernel: &self.kernel,
            store: &self.store,
        };
        body(&handler)
    }
}

/// Device-side view of the constants of the dispatched bundle.
#[derive(Debug, Clone, Copy)]
pub struct KernelHandler<'d> {
    kernel: &'d str,
    store: &'d ConstantStore,
}

impl KernelHandler<'_> {
    /// Value of `id` as frozen at build time.
    ///
    /// # Errors
    ///
    /// - [`SpecConstError::UnknownConstant`] if the bundle's images never
    ///   declared `id`. No default is substituted.
    /// - [`SpecConstError::TypeMismatch`] if the declared type differs.
    pub fn get_specialization_constant<T: Pod>(
        &self,
        id: &SpecializationId<T>,
    ) -> Result<T, SpecConstError> {
        self.store.get(id)
    }

    /// Whether the dispatched bundle declares `id`.
    pub fn contains<T: Pod>(&self, id: &SpecializationId<T>) -> bool {
        self.store.has(id.token())
    }

    #[must_use]
    pub fn kernel_name(&self) -> &str {
        self.kernel
    }
}
