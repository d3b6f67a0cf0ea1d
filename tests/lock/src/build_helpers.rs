//! Build helpers shared by lock tests and `build_fixture`.
//!
//! Everything here goes through the public kernel and harness APIs only, so
//! a lock test exercises exactly what an application would.

use std::sync::Arc;

use speck_harness::backend::ReferenceCompiler;
use speck_harness::context::{acquire_bundle, Context};
use speck_harness::contract::DeviceProgram;
use speck_harness::programs::tiled_sum::{tiled_sum, TiledSum, SCALE, TILE, TILED_SUM_KERNEL};
use speck_harness::queue::{Queue, QueueConfig};
use speck_harness::DispatchError;
use speck_kernel::build::blob::encode_blob;
use speck_kernel::build::{BuildPipeline, DeviceCompiler};
use speck_kernel::bundle::{DeviceId, KernelBundle};
use speck_kernel::SpecConstError;

/// Input sequence the fixture feeds to the tiled-sum kernel.
pub const FIXTURE_INPUT: [i64; 10] = [3, 1, 4, 1, 5, 9, 2, 6, 5, 3];

/// Deterministic record of one tiled-sum build and dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureReport {
    pub blob_hex: String,
    pub blob_digest: String,
    pub manifest_digest: String,
    pub result: Vec<i64>,
}

impl FixtureReport {
    /// `key=value` lines, in a fixed order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let result: Vec<String> = self.result.iter().map(ToString::to_string).collect();
        vec![
            format!("blob_hex={}", self.blob_hex),
            format!("blob_digest={}", self.blob_digest),
            format!("manifest_digest={}", self.manifest_digest),
            format!("result={}", result.join(",")),
        ]
    }
}

/// A context for `program` plus a queue on device `device`, backed by a
/// fresh reference compiler the caller can inspect.
///
/// # Errors
///
/// Returns [`DispatchError::UnknownDevice`] if `program` has no such device.
pub fn reference_queue(
    program: &dyn DeviceProgram,
    device: u32,
) -> Result<(Queue, Arc<ReferenceCompiler>), DispatchError> {
    let compiler = Arc::new(ReferenceCompiler::new());
    let backend: Arc<dyn DeviceCompiler> = Arc::clone(&compiler) as Arc<dyn DeviceCompiler>;
    let queue = Queue::new(
        Arc::new(Context::from_program(program)),
        backend,
        QueueConfig {
            device: Some(DeviceId(device)),
            ..QueueConfig::default()
        },
    )?;
    Ok((queue, compiler))
}

/// Acquire a tiled-sum bundle on `queue`'s device, set both constants, and
/// build it with `compiler`.
///
/// # Errors
///
/// Any acquisition, set, or build error.
pub fn build_tiled_sum(
    queue: &Queue,
    compiler: &ReferenceCompiler,
    tile: u32,
    scale: i64,
) -> Result<KernelBundle, SpecConstError> {
    let mut input = acquire_bundle(queue.context(), std::slice::from_ref(queue.device()))?;
    input.set(&TILE, tile)?;
    input.set(&SCALE, scale)?;
    BuildPipeline::new(compiler).build(&input)
}

/// Build the tiled-sum program with `tile` and `scale`, dispatch it on the
/// CPU device over [`FIXTURE_INPUT`], and report the result.
///
/// # Errors
///
/// Any error from building or dispatching.
pub fn run_tiled_sum_fixture(tile: u32, scale: i64) -> Result<FixtureReport, DispatchError> {
    let (queue, compiler) = reference_queue(&TiledSum, 0)?;
    let executable = build_tiled_sum(&queue, &compiler, tile, scale)?;

    let blob = encode_blob(executable.store()).map_err(|e| SpecConstError::BuildFailure {
        backend: compiler.backend_id().to_string(),
        diagnostic: e.to_string(),
    })?;
    let blob_digest = executable
        .modules()
        .first()
        .map(|m| m.blob_digest.as_str().to_string())
        .unwrap_or_default();
    let manifest_digest = executable
        .manifest()
        .map(|m| m.digest.as_str().to_string())
        .unwrap_or_default();

    let result = queue
        .submit(|cgh| {
            cgh.use_kernel_bundle(&executable)?;
            cgh.single_task(TILED_SUM_KERNEL, |kh| tiled_sum(kh, &FIXTURE_INPUT))
        })?
        .wait()??;

    Ok(FixtureReport {
        blob_hex: hex::encode(blob),
        blob_digest,
        manifest_digest,
        result,
    })
}
