//! Shared fixtures for the end-to-end release pipeline tests.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};

use labelforge_cli::MemoryStore;
use labelforge_core::{
    Annotation, BoundingBox, ImageRecord, Polygon, SplitSection, TransformKind,
    TransformationRecord,
};

/// Writes a deterministic gradient PNG under the project root and returns
/// its relative path.
pub fn write_png(project_root: &Path, rel_path: &str, w: u32, h: u32) -> PathBuf {
    let img = RgbaImage::from_fn(w, h, |x, y| {
        Rgba([(x % 251) as u8, (y % 241) as u8, ((x + y) % 253) as u8, 255])
    });
    let path = project_root.join(rel_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    labelforge_augment::save_rgba(&img, &path, "png").unwrap();
    PathBuf::from(rel_path)
}

/// Builds an image record pointing at a file relative to the project root.
pub fn image_record(
    id: &str,
    dataset: &str,
    rel_path: &str,
    w: u32,
    h: u32,
    split: SplitSection,
) -> ImageRecord {
    ImageRecord {
        id: id.to_string(),
        dataset_id: dataset.to_string(),
        dataset_name: dataset.to_string(),
        filename: Path::new(rel_path)
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string(),
        file_path: rel_path.to_string(),
        width: w,
        height: h,
        split_section: split,
        is_labeled: true,
    }
}

pub fn bbox(x_min: f64, y_min: f64, x_max: f64, y_max: f64, class: &str) -> Annotation {
    Annotation::Bbox(BoundingBox::new(x_min, y_min, x_max, y_max, 0, class))
}

pub fn polygon(points: Vec<[f64; 2]>, class: &str) -> Annotation {
    Annotation::Polygon(Polygon::new(points, 0, class))
}

/// Seeds one image with annotations into the store and writes its file.
pub fn seed_image(
    store: &MemoryStore,
    project_root: &Path,
    id: &str,
    dataset: &str,
    w: u32,
    h: u32,
    split: SplitSection,
    annotations: Vec<Annotation>,
) {
    let rel = format!("sources/{dataset}/{id}.png");
    write_png(project_root, &rel, w, h);
    store.add_image(image_record(id, dataset, &rel, w, h, split));
    store.add_annotations(id, annotations);
}

/// Enabled PENDING transform with JSON parameters.
pub fn transform(
    id: &str,
    kind: TransformKind,
    params: serde_json::Value,
    order: i32,
    version: &str,
) -> TransformationRecord {
    TransformationRecord::pending(
        id,
        kind,
        params.as_object().cloned().unwrap_or_default(),
        order,
        version,
    )
}

/// Opens the release ZIP produced for a project.
pub fn open_zip(path: &Path) -> zip::ZipArchive<File> {
    zip::ZipArchive::new(File::open(path).unwrap_or_else(|e| {
        panic!("cannot open zip {}: {}", path.display(), e);
    }))
    .unwrap()
}

/// All entry names of a ZIP.
pub fn zip_names(archive: &mut zip::ZipArchive<File>) -> Vec<String> {
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Reads one ZIP entry as text.
pub fn read_zip_text(archive: &mut zip::ZipArchive<File>, name: &str) -> String {
    let mut entry = archive
        .by_name(name)
        .unwrap_or_else(|e| panic!("missing zip entry '{}': {}", name, e));
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    text
}

/// Reads one ZIP entry as bytes.
pub fn read_zip_bytes(archive: &mut zip::ZipArchive<File>, name: &str) -> Vec<u8> {
    let mut entry = archive
        .by_name(name)
        .unwrap_or_else(|e| panic!("missing zip entry '{}': {}", name, e));
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    bytes
}

/// Parses the re-ingest snapshot from a release ZIP.
pub fn read_snapshot(
    archive: &mut zip::ZipArchive<File>,
) -> labelforge_export::AnnotationsSnapshot {
    serde_json::from_str(&read_zip_text(archive, "metadata/annotations.json")).unwrap()
}

/// Parses `metadata/release_config.json` from a release ZIP.
pub fn read_release_config(
    archive: &mut zip::ZipArchive<File>,
) -> labelforge_export::ReleaseConfigDoc {
    serde_json::from_str(&read_zip_text(archive, "metadata/release_config.json")).unwrap()
}

/// YOLO label lines parsed into floats.
pub fn parse_yolo_lines(text: &str) -> Vec<Vec<f64>> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.split_whitespace().map(|t| t.parse().unwrap()).collect())
        .collect()
}
