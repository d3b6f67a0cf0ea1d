//! Execution context and bundle acquisition.
//!
//! A [`Context`] is the catalog of device images available to a process plus
//! the devices it may target. Bundles are acquired from it in the `Input`
//! stage, restricted to images whose targets cover every requested device.

use std::collections::BTreeSet;

use tracing::debug;

use speck_kernel::bundle::{DeviceDescriptor, DeviceId, DeviceImage, KernelBundle};
use speck_kernel::SpecConstError;

use crate::contract::DeviceProgram;

/// Devices plus the image catalog.
#[derive(Debug, Clone)]
pub struct Context {
    devices: Vec<DeviceDescriptor>,
    images: Vec<DeviceImage>,
}

impl Context {
    #[must_use]
    pub fn new(devices: Vec<DeviceDescriptor>, images: Vec<DeviceImage>) -> Self {
        Self { devices, images }
    }

    /// Context exposing exactly what `program` declares.
    #[must_use]
    pub fn from_program(program: &dyn DeviceProgram) -> Self {
        Self::new(program.devices(), program.images())
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
    pub fn device(&self, id: DeviceId) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|d| d.id == id)
    }

    fn check_devices(&self, devices: &[DeviceDescriptor]) -> Result<(), SpecConstError> {
        for device in devices {
            if !self.devices.contains(device) {
                return Err(SpecConstError::invalid_state(format!(
                    "device {} is not part of this context",
                    device.id
                )));
            }
        }
        Ok(())
    }

    fn compatible_images<'a>(
        &'a self,
        devices: &'a [DeviceDescriptor],
    ) -> impl Iterator<Item = &'a DeviceImage> + 'a {
        self.images.iter().filter(move |i| i.supports_all(devices))
    }
}

/// Acquire an `Input` bundle holding every image compatible with `devices`.
///
/// # Errors
///
/// Returns [`SpecConstError::InvalidState`] if `devices` is empty or names a
/// device outside `ctx`, and [`SpecConstError::TypeMismatch`] if two images
/// declare the same constant with different types.
pub fn acquire_bundle(
    ctx: &Context,
    devices: &[DeviceDescriptor],
) -> Result<KernelBundle, SpecConstError> {
    ctx.check_devices(devices)?;
    let images: Vec<DeviceImage> = ctx.compatible_images(devices).cloned().collect();
    let bundle = KernelBundle::new_input(images, devices.to_vec())?;
    debug!(bundle = %bundle.id(), images = bundle.images().len(), "acquired input bundle");
    Ok(bundle)
}

/// Acquire an `Input` bundle holding only the compatible images that define
/// at least one of `kernels`.
///
/// # Errors
///
/// As [`acquire_bundle`], plus [`SpecConstError::InvalidState`] if a named
/// kernel is not defined by any compatible image.
pub fn acquire_bundle_for_kernels(
    ctx: &Context,
    devices: &[DeviceDescriptor],
    kernels: &[&str],
) -> Result<KernelBundle, SpecConstError> {
    ctx.check_devices(devices)?;
    let wanted: BTreeSet<&str> = kernels.iter().copied().collect();
    let images: Vec<DeviceImage> = ctx
        .compatible_images(devices)
        .filter(|i| i.kernels().iter().any(|k| wanted.contains(k.name.as_str())))
        .cloned()
        .collect();
    for name in &wanted {
        if !images.iter().any(|i| i.has_kernel(name)) {
            return Err(SpecConstError::invalid_state(format!(
                "kernel {name:?} is not available for the requested devices"
            )));
        }
    }
    let bundle = KernelBundle::new_input(images, devices.to_vec())?;
    debug!(
        bundle = %bundle.id(),
        images = bundle.images().len(),
        kernels = ?kernels,
        "acquired input bundle for kernels"
    );
    Ok(bundle)
}
