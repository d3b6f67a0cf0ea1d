//! Builds and dispatches the tiled-sum program and prints deterministic output.
//!
//! Used by the cross-process lock test to check that the constant blob, its
//! digest, the build manifest, and the kernel result do not depend on the
//! process environment (cwd, locale, env vars, log level).
//!
//! Usage: `build_fixture [tile] [scale]` (defaults 3 and 2).
//! Output: four `key=value` lines on stdout:
//!   `blob_hex`=...
//!   `blob_digest=sha256`:...
//!   `manifest_digest=sha256`:...
//!   `result`=a,b,...
//!
//! Logs go to stderr, filtered by `RUST_LOG`.

use lock_tests::build_helpers::run_tiled_sum_fixture;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let tile: u32 = args
        .get(1)
        .map_or(Ok(3), |s| s.parse())
        .expect("tile must be a u32");
    let scale: i64 = args
        .get(2)
        .map_or(Ok(2), |s| s.parse())
        .expect("scale must be an i64");

    let report = run_tiled_sum_fixture(tile, scale)
        .unwrap_or_else(|e| panic!("fixture build failed (tile={tile}, scale={scale}): {e}"));
    tracing::info!(result = ?report.result, "fixture complete");
    for line in report.lines() {
        println!("{line}");
    }
}
