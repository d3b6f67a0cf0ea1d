//! In-process determinism of the constant blob, its digest, and the manifest.

use lock_tests::build_helpers::{build_tiled_sum, reference_queue, run_tiled_sum_fixture};
use speck_harness::programs::tiled_sum::{TiledSum, SCALE, TILE};
use speck_kernel::build::blob::{decode_blob, encode_blob};
use speck_kernel::proof::hash::{canonical_hash, ContentHash, HashDomain};

#[test]
fn repeated_builds_are_identical() {
    let first = run_tiled_sum_fixture(3, 2).unwrap();
    let second = run_tiled_sum_fixture(3, 2).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.result, vec![16, 30, 26, 6]);
}

#[test]
fn different_values_change_every_digest() {
    let a = run_tiled_sum_fixture(3, 2).unwrap();
    let b = run_tiled_sum_fixture(3, 3).unwrap();
    assert_ne!(a.blob_hex, b.blob_hex);
    assert_ne!(a.blob_digest, b.blob_digest);
    assert_ne!(a.manifest_digest, b.manifest_digest);
}

#[test]
fn reported_digest_covers_the_blob() {
    let report = run_tiled_sum_fixture(5, 1).unwrap();
    let blob = hex::decode(&report.blob_hex).unwrap();
    let digest = ContentHash::parse(&report.blob_digest).unwrap();
    assert_eq!(digest.algorithm(), "sha256");
    assert_eq!(digest, canonical_hash(HashDomain::ConstantBlob, &blob));
}

#[test]
fn blob_lists_every_constant_in_token_order() {
    let (queue, compiler) = reference_queue(&TiledSum, 0).unwrap();
    let exec = build_tiled_sum(&queue, &compiler, 6, -4).unwrap();
    let entries = decode_blob(&encode_blob(exec.store()).unwrap()).unwrap();

    assert_eq!(entries.len(), 2);
    assert!(entries.windows(2).all(|w| w[0].token < w[1].token));
    let tile = entries.iter().find(|e| e.token == TILE.token()).unwrap();
    let scale = entries.iter().find(|e| e.token == SCALE.token()).unwrap();
    assert_eq!(tile.bytes, 6_u32.to_ne_bytes());
    assert_eq!(scale.bytes, (-4_i64).to_ne_bytes());
}
