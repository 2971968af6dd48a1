//! Serialized engine output as consumed by the emitters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use labelforge_core::{Annotation, SplitSection};

/// One output image with its annotations, detached from the engine.
///
/// Annotations are in the output image's pixel space; `width`/`height` are
/// the dimensions of the file on disk and the only legal normalization
/// denominators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportItem {
    /// Unique id of the output image within the release.
    pub image_id: String,
    /// Id of the source image this output came from.
    pub source_image_id: String,
    pub dataset_id: String,
    pub file_name: String,
    /// Staged location of the image file.
    pub image_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub split: SplitSection,
    pub annotations: Vec<Annotation>,
    pub is_original: bool,
}

impl ExportItem {
    /// File stem of the output image (label files share it).
    pub fn stem(&self) -> &str {
        std::path::Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }
}
