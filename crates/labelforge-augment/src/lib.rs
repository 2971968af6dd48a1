//! labelforge augmentation backend
//!
//! This crate turns enabled transformation records into concrete per-image
//! plans and applies them. The planner resolves every range parameter and
//! derives per-step seeds up front; the engine then composes each geometric
//! stage into a single homography that it applies to the image pixels and
//! the annotation geometry alike, so labels always match what happened to
//! the pixels.
//!
//! # Determinism
//!
//! - PCG32 streams seeded from BLAKE3-derived sub-seeds
//! - Bilinear sampling with a fixed kernel
//! - PNG output with fixed encoder settings
//!
//! Given the same release seed and configuration, the planner emits the same
//! plans and the engine emits byte-identical labels and pixels, regardless
//! of worker count.

pub mod clip;
pub mod engine;
pub mod geometry;
pub mod io;
pub mod photometric;
pub mod planner;
pub mod rng;
pub mod warp;

// Re-export main types for convenience
pub use engine::{
    apply, emit_original, transform_annotations, AugmentationResult, EngineError, EngineInput,
};
pub use geometry::Homography;
pub use io::{augmented_file_name, load_rgba, original_file_name, save_rgba, ImageIoError};
pub use planner::{AugmentationConfig, PlanError, Planner, ResolvedStep};
pub use rng::DeterministicRng;
