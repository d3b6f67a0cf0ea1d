//! Cross-process determinism of `build_fixture`.
//!
//! Spawns the fixture under several environment variants and asserts that
//! stdout is byte-identical. Constant tokens, blob bytes, digests, and the
//! kernel result must not depend on cwd, locale, unrelated env vars, or the
//! log filter.

use std::path::Path;
use std::process::Command;

fn binary_path() -> &'static str {
    env!("CARGO_BIN_EXE_build_fixture")
}

/// Run the fixture with `args` in `work_dir` under `env_overrides` and
/// return stdout.
fn run_variant(work_dir: &Path, args: &[&str], env_overrides: &[(&str, &str)]) -> String {
    let bin = binary_path();
    let mut command = Command::new(bin);
    command.args(args).current_dir(work_dir);
    command
        .env_remove("LC_ALL")
        .env_remove("LC_COLLATE")
        .env_remove("LANG")
        .env_remove("LANGUAGE")
        .env_remove("RUST_LOG");
    for &(key, val) in env_overrides {
        command.env(key, val);
    }

    let output = command.output().unwrap_or_else(|e| {
        panic!(
            "failed to spawn {bin} (work_dir={}, overrides={env_overrides:?}): {e}",
            work_dir.display()
        )
    });
    assert!(
        output.status.success(),
        "build_fixture exited with {}: stderr={}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout is valid UTF-8")
}

fn workspace_root() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .expect("workspace root exists")
}

#[test]
fn crossproc_determinism_env_variants() {
    let root = workspace_root();
    let baseline = run_variant(root, &[], &[]);
    let lines: Vec<&str> = baseline.lines().collect();
    assert_eq!(lines.len(), 4, "unexpected output: {baseline}");
    assert!(lines[0].starts_with("blob_hex=53504b43"), "blob magic missing");
    assert!(lines[1].starts_with("blob_digest=sha256:"));
    assert!(lines[2].starts_with("manifest_digest=sha256:"));
    assert_eq!(lines[3], "result=16,30,26,6");

    let scratch = tempfile::tempdir().unwrap();
    let variant_cwd = run_variant(scratch.path(), &[], &[]);
    assert_eq!(baseline, variant_cwd, "output differs when cwd changes");

    let variant_locale = run_variant(root, &[], &[("LC_ALL", "C"), ("LANG", "C")]);
    assert_eq!(baseline, variant_locale, "output differs when LC_ALL=C LANG=C");

    let variant_noise = run_variant(
        root,
        &[],
        &[
            ("SPECK_NOISE", "should_not_matter"),
            ("TZ", "America/New_York"),
            ("HOME", "/nonexistent"),
        ],
    );
    assert_eq!(baseline, variant_noise, "output differs with spurious env vars");

    let variant_logging = run_variant(root, &[], &[("RUST_LOG", "debug")]);
    assert_eq!(baseline, variant_logging, "output differs when logging is enabled");
}

#[test]
fn crossproc_output_tracks_arguments() {
    let root = workspace_root();
    let explicit_defaults = run_variant(root, &["3", "2"], &[]);
    assert_eq!(explicit_defaults, run_variant(root, &[], &[]));

    let other = run_variant(root, &["4", "1"], &[]);
    assert_ne!(explicit_defaults, other);
    assert!(other.lines().any(|l| l == "result=9,22,8"));
}
