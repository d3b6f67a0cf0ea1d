//! `HostApis`: the host-API scenario program.
//!
//! Four constants with default 42. `SPEC_CONST_1` is never placed in any
//! image, so no bundle declares it. `SPEC_CONST_2` and `SPEC_CONST_3` are
//! each read by one kernel. `SPEC_CONST_4` is only ever queried on the host.

use bytemuck::{Pod, Zeroable};

use speck_kernel::bundle::{DeviceDescriptor, DeviceImage, DeviceKind};
use speck_kernel::constant::SpecializationId;

use crate::contract::DeviceProgram;

/// Aggregate constant type.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TestPair {
    pub a: i32,
    pub b: i32,
}

pub static SPEC_CONST_1: SpecializationId<i32> = SpecializationId::labeled("SpecConst1", 42);
pub static SPEC_CONST_2: SpecializationId<i32> = SpecializationId::labeled("SpecConst2", 42);
pub static SPEC_CONST_3: SpecializationId<TestPair> =
    SpecializationId::labeled("SpecConst3", TestPair { a: 42, b: 42 });
pub static SPEC_CONST_4: SpecializationId<i16> = SpecializationId::labeled("SpecConst4", 42);

/// Reads no constants.
pub const EMPTY_KERNEL: &str = "empty_kernel";
/// Reads `SPEC_CONST_2`.
pub const READ_C2_KERNEL: &str = "read_spec_const_2";
/// Reads `SPEC_CONST_3`.
pub const READ_C3_KERNEL: &str = "read_spec_const_3";

pub struct HostApis;

impl DeviceProgram for HostApis {
    #[allow(clippy::unnecessary_literal_bound)]
    fn program_id(&self) -> &str {
        "host_apis"
    }

    fn images(&self) -> Vec<DeviceImage> {
        let portable = |image: DeviceImage| {
            image
                .with_target(DeviceKind::Cpu)
                .with_target(DeviceKind::Gpu)
        };
        vec![
            portable(DeviceImage::new("host_apis.empty").with_kernel(EMPTY_KERNEL, &[])),
            portable(
                DeviceImage::new("host_apis.c2")
                    .with_kernel(READ_C2_KERNEL, &[SPEC_CONST_2.descriptor()]),
            ),
            portable(
                DeviceImage::new("host_apis.c3")
                    .with_kernel(READ_C3_KERNEL, &[SPEC_CONST_3.descriptor()]),
            ),
        ]
    }

    fn devices(&self) -> Vec<DeviceDescriptor> {
        vec![
            DeviceDescriptor::new(0, DeviceKind::Cpu, "cpu0"),
            DeviceDescriptor::new(1, DeviceKind::Gpu, "gpu0"),
        ]
    }
}
