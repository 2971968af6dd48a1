//! Release packaging: staging layout, metadata documents, README, and the
//! final ZIP.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

use labelforge_core::{
    Annotation, Release, ReleaseWarning, SplitSection, TransformationRecord,
};

use crate::item::ExportItem;

/// Errors from packaging.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Creates the staging skeleton: `images/{split}`, `labels/{split}`,
/// `metadata/`.
pub fn create_staging_skeleton(staging_root: &Path) -> std::io::Result<()> {
    for split in SplitSection::all() {
        fs::create_dir_all(image_dir(staging_root, *split))?;
        fs::create_dir_all(staging_root.join("labels").join(split.as_str()))?;
    }
    fs::create_dir_all(staging_root.join("metadata"))?;
    Ok(())
}

/// Sub-directory for one split's images.
pub fn image_dir(staging_root: &Path, split: SplitSection) -> PathBuf {
    staging_root.join("images").join(split.as_str())
}

/// Aggregate statistics carried in `release_config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_images: u64,
    pub train_images: u64,
    pub val_images: u64,
    pub test_images: u64,
    pub original_images: u64,
    pub augmented_images: u64,
    /// Annotation count per unified class name.
    pub class_counts: BTreeMap<String, u64>,
    /// Output image count per source dataset.
    pub dataset_counts: BTreeMap<String, u64>,
}

impl DatasetStats {
    /// Computes the stats snapshot from the exported items.
    pub fn from_items(items: &[ExportItem]) -> Self {
        let mut stats = DatasetStats::default();
        for item in items {
            stats.total_images += 1;
            match item.split {
                SplitSection::Train => stats.train_images += 1,
                SplitSection::Val => stats.val_images += 1,
                SplitSection::Test => stats.test_images += 1,
            }
            if item.is_original {
                stats.original_images += 1;
            } else {
                stats.augmented_images += 1;
            }
            *stats.dataset_counts.entry(item.dataset_id.clone()).or_default() += 1;
            for ann in &item.annotations {
                *stats
                    .class_counts
                    .entry(ann.class_name().to_string())
                    .or_default() += 1;
            }
        }
        stats
    }
}

/// The `metadata/release_config.json` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfigDoc {
    pub release_name: String,
    pub release_id: String,
    pub date: String,
    /// BLAKE3 fingerprint of the release configuration.
    pub config_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub export_format: String,
    pub task_type: String,
    pub image_format: String,
    pub multiplier: u32,
    pub include_original: bool,
    pub sampling_strategy: String,
    pub preserve_original_splits: bool,
    pub classes: Vec<String>,
    pub dataset_stats: DatasetStats,
    /// The exact transform list used, verbatim.
    pub transforms: Vec<TransformationRecord>,
    pub source_dataset_ids: Vec<String>,
    /// Skipped items and other non-fatal incidents.
    pub warnings: Vec<ReleaseWarning>,
}

impl ReleaseConfigDoc {
    /// Builds the document from the finished release.
    pub fn new(
        release: &Release,
        classes: Vec<String>,
        stats: DatasetStats,
        transforms: Vec<TransformationRecord>,
        warnings: Vec<ReleaseWarning>,
    ) -> Self {
        Self {
            release_name: release.name.clone(),
            release_id: release.id.clone(),
            date: release.created_at.to_rfc3339(),
            config_hash: labelforge_core::config_hash(&release.config).unwrap_or_default(),
            description: release.description.clone(),
            export_format: release.export_format.to_string(),
            task_type: release.task_type.to_string(),
            image_format: release.config.output_format.to_string(),
            multiplier: release.config.images_per_original,
            include_original: release.config.include_original,
            sampling_strategy: release.config.sampling_strategy.to_string(),
            preserve_original_splits: release.config.preserve_original_splits,
            classes,
            dataset_stats: stats,
            transforms,
            source_dataset_ids: release.datasets_used.clone(),
            warnings,
        }
    }
}

/// Normalized snapshot suitable for re-ingest, `metadata/annotations.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationsSnapshot {
    pub images: Vec<SnapshotImage>,
    pub annotations: Vec<SnapshotAnnotation>,
    pub classes: Vec<SnapshotClass>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotImage {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub file_path: String,
    pub split: SplitSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotAnnotation {
    pub id: u64,
    pub image_id: String,
    pub class_id: u32,
    pub class_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<[f64; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotClass {
    pub id: u32,
    pub name: String,
}

/// Builds the annotations snapshot from the exported items.
pub fn build_snapshot(items: &[ExportItem], classes: &[String]) -> AnnotationsSnapshot {
    let mut annotations = Vec::new();
    let mut next_id = 0u64;
    for item in items {
        for ann in &item.annotations {
            let envelope = ann.envelope();
            let (kind, bbox, points) = match ann {
                Annotation::Bbox(_) => (
                    "bbox",
                    Some([envelope.x_min, envelope.y_min, envelope.x_max, envelope.y_max]),
                    None,
                ),
                Annotation::Polygon(p) => ("polygon", None, Some(p.points.clone())),
            };
            annotations.push(SnapshotAnnotation {
                id: next_id,
                image_id: item.image_id.clone(),
                class_id: ann.class_id(),
                class_name: ann.class_name().to_string(),
                kind: kind.to_string(),
                bbox,
                points,
                confidence: ann.confidence(),
            });
            next_id += 1;
        }
    }

    AnnotationsSnapshot {
        images: items
            .iter()
            .map(|item| SnapshotImage {
                id: item.image_id.clone(),
                name: item.file_name.clone(),
                width: item.width,
                height: item.height,
                file_path: format!("images/{}/{}", item.split.as_str(), item.file_name),
                split: item.split,
            })
            .collect(),
        annotations,
        classes: classes
            .iter()
            .enumerate()
            .map(|(i, name)| SnapshotClass {
                id: i as u32,
                name: name.clone(),
            })
            .collect(),
    }
}

/// Writes `release_config.json`, `annotations.json`, and `README.md` into
/// the staging tree.
pub fn write_metadata(
    staging_root: &Path,
    doc: &ReleaseConfigDoc,
    snapshot: &AnnotationsSnapshot,
) -> Result<(), PackageError> {
    let metadata_dir = staging_root.join("metadata");
    fs::create_dir_all(&metadata_dir)?;
    fs::write(
        metadata_dir.join("release_config.json"),
        serde_json::to_string_pretty(doc)?,
    )?;
    fs::write(
        metadata_dir.join("annotations.json"),
        serde_json::to_string_pretty(snapshot)?,
    )?;
    fs::write(staging_root.join("README.md"), render_readme(doc))?;
    Ok(())
}

fn render_readme(doc: &ReleaseConfigDoc) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", doc.release_name));
    if let Some(description) = &doc.description {
        out.push_str(&format!("{}\n\n", description));
    }
    out.push_str(&format!("- Generated: {}\n", doc.date));
    out.push_str(&format!("- Export format: {}\n", doc.export_format));
    out.push_str(&format!("- Task: {}\n", doc.task_type));
    out.push_str(&format!(
        "- Images: {} total ({} train / {} val / {} test)\n",
        doc.dataset_stats.total_images,
        doc.dataset_stats.train_images,
        doc.dataset_stats.val_images,
        doc.dataset_stats.test_images
    ));
    out.push_str(&format!(
        "- Originals: {}, augmented: {}\n",
        doc.dataset_stats.original_images, doc.dataset_stats.augmented_images
    ));
    out.push_str(&format!("- Classes ({}):\n", doc.classes.len()));
    for (i, class) in doc.classes.iter().enumerate() {
        out.push_str(&format!("  - {}: {}\n", i, class));
    }
    out
}

/// Zips the staging tree into `zip_path` with DEFLATE compression.
///
/// Entries are added in sorted path order so the archive layout is stable.
pub fn zip_directory(staging_root: &Path, zip_path: &Path) -> Result<u64, PackageError> {
    if let Some(parent) = zip_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut files: Vec<PathBuf> = WalkDir::new(staging_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();

    let file = fs::File::create(zip_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let mut entries = 0u64;
    let mut buffer = Vec::new();
    for path in files {
        let rel = path
            .strip_prefix(staging_root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        writer.start_file(rel, options)?;
        let mut f = fs::File::open(&path)?;
        buffer.clear();
        f.read_to_end(&mut buffer)?;
        writer.write_all(&buffer)?;
        entries += 1;
    }
    writer.finish()?;

    info!(zip = %zip_path.display(), entries, "release packaged");
    Ok(entries)
}

/// Removes the staging tree; missing directories are fine.
pub fn clean_staging(staging_root: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(staging_root) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
