//! Program contract: what a device program supplies to the harness.
//!
//! A program is pure data. It names its images and the devices it expects to
//! run on; the harness owns bundle acquisition, building, and dispatch.

use speck_kernel::bundle::{DeviceDescriptor, DeviceImage};

/// A set of device images plus the devices they are meant for.
pub trait DeviceProgram {
    /// Stable identifier, used in logs and fixture output.
    fn program_id(&self) -> &str;

    /// Device images in catalog order.
    fn images(&self) -> Vec<DeviceImage>;

    /// Devices the program's context exposes.
    fn devices(&self) -> Vec<DeviceDescriptor>;
}
