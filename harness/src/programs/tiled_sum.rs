//! `TiledSum`: a small program whose kernel output depends on its constants.
//!
//! The kernel splits its input into tiles of `TILE` elements and returns the
//! per-tile sums multiplied by `SCALE`.

use speck_kernel::bundle::{DeviceDescriptor, DeviceImage, DeviceKind};
use speck_kernel::constant::SpecializationId;
use speck_kernel::dispatch::KernelHandler;
use speck_kernel::SpecConstError;

use crate::contract::DeviceProgram;

pub static TILE: SpecializationId<u32> = SpecializationId::labeled("TILE", 4);
pub static SCALE: SpecializationId<i64> = SpecializationId::labeled("SCALE", 1);

pub const TILED_SUM_KERNEL: &str = "tiled_sum";

pub struct TiledSum;

impl DeviceProgram for TiledSum {
    #[allow(clippy::unnecessary_literal_bound)]
    fn program_id(&self) -> &str {
        "tiled_sum"
    }

    fn images(&self) -> Vec<DeviceImage> {
        vec![DeviceImage::new("tiled_sum.main")
            .with_kernel(TILED_SUM_KERNEL, &[TILE.descriptor(), SCALE.descriptor()])
            .with_target(DeviceKind::Cpu)
            .with_target(DeviceKind::Accelerator)]
    }

    fn devices(&self) -> Vec<DeviceDescriptor> {
        vec![
            DeviceDescriptor::new(0, DeviceKind::Cpu, "cpu0"),
            DeviceDescriptor::new(1, DeviceKind::Accelerator, "acc0"),
        ]
    }
}

/// Kernel body for [`TILED_SUM_KERNEL`]. A `TILE` of zero is treated as one.
/// Sums and scaling wrap on overflow.
///
/// # Errors
///
/// Returns [`SpecConstError`] if the dispatched bundle lacks either constant.
pub fn tiled_sum(kh: &KernelHandler<'_>, input: &[i64]) -> Result<Vec<i64>, SpecConstError> {
    let tile = kh.get_specialization_constant(&TILE)?.max(1);
    let scale = kh.get_specialization_constant(&SCALE)?;
    let tile = usize::try_from(tile).unwrap_or(usize::MAX);
    Ok(input
        .chunks(tile)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0_i64, |acc, v| acc.wrapping_add(*v))
                .wrapping_mul(scale)
        })
        .collect())
}
