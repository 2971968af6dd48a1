//! Persisted records consumed by the pipeline: images, datasets, and
//! transformation records.

use serde::{Deserialize, Serialize};

use crate::transform::TransformKind;

/// Dataset split a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitSection {
    Train,
    Val,
    Test,
}

impl SplitSection {
    /// Returns the split as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitSection::Train => "train",
            SplitSection::Val => "val",
            SplitSection::Test => "test",
        }
    }

    /// Returns all splits in canonical order.
    pub fn all() -> &'static [SplitSection] {
        &[SplitSection::Train, SplitSection::Val, SplitSection::Test]
    }
}

impl std::fmt::Display for SplitSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SplitSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(SplitSection::Train),
            "val" => Ok(SplitSection::Val),
            "test" => Ok(SplitSection::Test),
            _ => Err(format!("unknown split section: {}", s)),
        }
    }
}

/// A source image row as exposed by the store.
///
/// Read-only during a release; the pipeline never mutates image rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Stable image id.
    pub id: String,
    /// Owning dataset id.
    pub dataset_id: String,
    /// Owning dataset display name (used to prefix output file names).
    pub dataset_name: String,
    /// Original file name, extension included.
    pub filename: String,
    /// Path to the image file, relative to the project root or absolute.
    pub file_path: String,
    pub width: u32,
    pub height: u32,
    pub split_section: SplitSection,
    pub is_labeled: bool,
}

impl ImageRecord {
    /// The file stem of the source image (filename without extension).
    pub fn stem(&self) -> &str {
        std::path::Path::new(&self.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.filename)
    }

    /// The extension of the source image, lowercased, without the dot.
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| "png".to_string())
    }
}

/// Lifecycle state of a transformation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransformStatus {
    /// Created by the editor, waiting to be consumed by a release.
    Pending,
    /// Consumed; `release_id` points at the release that used it.
    Completed,
}

impl TransformStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformStatus::Pending => "PENDING",
            TransformStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for TransformStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted intention to apply a named transform with parameters.
///
/// Created by the external editor with `PENDING` status; the pipeline
/// atomically flips consumed records to `COMPLETED` and assigns the
/// `release_id` once the release ZIP exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRecord {
    pub id: String,
    pub transformation_type: TransformKind,
    /// Per-kind parameters; values may be scalars or `{min, max}` ranges.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    pub is_enabled: bool,
    pub order_index: i32,
    pub release_version: String,
    pub status: TransformStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_id: Option<String>,
}

impl TransformationRecord {
    /// Creates an enabled PENDING record.
    pub fn pending(
        id: impl Into<String>,
        transformation_type: TransformKind,
        parameters: serde_json::Map<String, serde_json::Value>,
        order_index: i32,
        release_version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            transformation_type,
            parameters,
            is_enabled: true,
            order_index,
            release_version: release_version.into(),
            status: TransformStatus::Pending,
            release_id: None,
        }
    }
}
