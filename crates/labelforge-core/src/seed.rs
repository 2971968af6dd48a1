//! Seed derivation and configuration hashing.
//!
//! All random decisions in the pipeline flow from BLAKE3-derived sub-seeds so
//! that reruns with the same release seed produce identical output regardless
//! of worker count or scheduling.

use crate::release::ReleaseConfig;

/// Derives the seed for one augmentation config of one source image.
///
/// ```text
/// config_seed = truncate_u64(BLAKE3(release_seed || image_id || config_index))
/// ```
pub fn derive_config_seed(release_seed: u64, image_id: &str, config_index: u32) -> u64 {
    let mut input = Vec::with_capacity(12 + image_id.len());
    input.extend_from_slice(&release_seed.to_le_bytes());
    input.extend_from_slice(image_id.as_bytes());
    input.extend_from_slice(&config_index.to_le_bytes());
    truncate_u64(&blake3::hash(&input))
}

/// Derives the seed for one transform step inside a config.
///
/// The step seed feeds range-parameter resolution and any stochastic pixel
/// work (noise, cutout holes, perspective corner jitter), keeping the engine
/// pure per call.
pub fn derive_step_seed(config_seed: u64, transform_id: &str) -> u64 {
    let mut input = Vec::with_capacity(8 + transform_id.len());
    input.extend_from_slice(&config_seed.to_le_bytes());
    input.extend_from_slice(transform_id.as_bytes());
    truncate_u64(&blake3::hash(&input))
}

fn truncate_u64(hash: &blake3::Hash) -> u64 {
    let bytes: [u8; 8] = hash.as_bytes()[0..8].try_into().expect("hash is 32 bytes");
    u64::from_le_bytes(bytes)
}

/// BLAKE3 fingerprint of a release configuration.
///
/// Struct field order fixes the serialization, so hashing the JSON directly
/// is stable without a canonicalization pass.
pub fn config_hash(config: &ReleaseConfig) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(config)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

/// BLAKE3 hash of arbitrary bytes as a 64-char hex string.
pub fn blake3_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
