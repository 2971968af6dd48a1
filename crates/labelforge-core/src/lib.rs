//! labelforge core data model
//!
//! This crate provides the shared types of the release generation pipeline:
//! the pixel-space annotation model, the transform catalog with parameter
//! validation, the release configuration and its persisted record, the
//! progress/warning types, and BLAKE3 seed derivation.
//!
//! # Overview
//!
//! A release is driven by a [`ReleaseConfig`] (a declarative JSON document)
//! plus a set of enabled PENDING [`TransformationRecord`]s. The planner in
//! `labelforge-augment` expands those into per-image configurations, the
//! engine applies them to images and annotations together, and
//! `labelforge-export` writes the chosen format. Everything downstream keys
//! its randomness off [`seed::derive_config_seed`] so a release is
//! reproducible given its seed.
//!
//! # Example
//!
//! ```
//! use labelforge_core::{ReleaseConfig, TaskType, ExportFormat};
//!
//! let config = ReleaseConfig::builder("street-v1", "proj-1", TaskType::ObjectDetection)
//!     .description("nightly export")
//!     .dataset("ds-street")
//!     .export_format(ExportFormat::YoloDetection)
//!     .images_per_original(4)
//!     .seed(42)
//!     .build();
//!
//! let result = config.validate();
//! assert!(result.is_ok());
//! ```

pub mod annotation;
pub mod error;
pub mod progress;
pub mod record;
pub mod release;
pub mod seed;
pub mod transform;

// Re-export commonly used types at the crate root
pub use annotation::{polygon_area, Annotation, BoundingBox, Polygon, MIN_ANNOTATION_AREA};
pub use error::{
    ErrorCode, ReleaseError, ValidationError, ValidationResult, ValidationWarning, WarningCode,
};
pub use progress::{ProcessingStep, ReleaseProgress, ReleaseWarning};
pub use record::{ImageRecord, SplitSection, TransformStatus, TransformationRecord};
pub use release::{
    ExportFormat, OutputImageFormat, Release, ReleaseConfig, ReleaseConfigBuilder, ReleaseStatus,
    SamplingStrategy, TaskType,
};
pub use seed::{blake3_hex, config_hash, derive_config_seed, derive_step_seed};
pub use transform::{
    default_for, enum_param_specs, param_specs, validate_parameters, EnumParamSpec, ParamSpec,
    TransformKind,
};
