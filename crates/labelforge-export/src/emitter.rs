//! Format selection and label emission.
//!
//! The emitter owns the engine/export boundary invariant: every label file
//! normalizes by the dimensions of the image that was actually written to
//! disk, which the items carry as `width`/`height`.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use labelforge_core::{ExportFormat, SplitSection, TaskType};

use crate::classes::ClassTable;
use crate::coco;
use crate::csv;
use crate::item::ExportItem;
use crate::voc;
use crate::yolo;

/// Errors from the export stage.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
}

/// Summary returned by [`emit`].
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    /// The concrete format after `auto` resolution.
    pub format: ExportFormat,
    /// Unified class names in id order.
    pub classes: Vec<String>,
    /// Label files written (per-image files; 1 for CSV).
    pub label_files: usize,
}

/// Resolves `auto` into a concrete format from the task and annotation mix.
pub fn resolve_format(
    requested: ExportFormat,
    task: TaskType,
    items: &[ExportItem],
) -> ExportFormat {
    if requested != ExportFormat::Auto {
        return requested;
    }
    let any_polygon = items
        .iter()
        .any(|i| i.annotations.iter().any(|a| a.is_polygon()));
    match (task, any_polygon) {
        (TaskType::Segmentation, true) => ExportFormat::YoloSegmentation,
        (TaskType::Segmentation, false) => ExportFormat::Coco,
        (TaskType::ObjectDetection, false) => ExportFormat::YoloDetection,
        (TaskType::ObjectDetection, true) => ExportFormat::Coco,
    }
}

/// Sub-directory for one split's label files.
pub fn label_dir(staging_root: &Path, split: SplitSection) -> std::path::PathBuf {
    staging_root.join("labels").join(split.as_str())
}

/// Writes all label artifacts for the release into the staging tree and
/// remaps every annotation onto the unified class table.
pub fn emit(
    items: &mut [ExportItem],
    requested: ExportFormat,
    task: TaskType,
    description: &str,
    staging_root: &Path,
) -> Result<ExportOutcome, ExportError> {
    let table = ClassTable::collect(items.iter().flat_map(|i| &i.annotations));
    for item in items.iter_mut() {
        table.remap(&mut item.annotations);
    }

    let format = resolve_format(requested, task, items);
    info!(%format, classes = table.len(), items = items.len(), "emitting labels");

    for split in SplitSection::all() {
        fs::create_dir_all(label_dir(staging_root, *split))?;
    }

    let mut label_files = 0usize;
    match format {
        ExportFormat::YoloDetection => {
            for item in items.iter() {
                yolo::write_detection_labels(item, &table, &label_dir(staging_root, item.split))?;
                label_files += 1;
            }
            fs::write(staging_root.join("data.yaml"), yolo::data_yaml(&table)?)?;
        }
        ExportFormat::YoloSegmentation => {
            for item in items.iter() {
                yolo::write_segmentation_labels(
                    item,
                    &table,
                    &label_dir(staging_root, item.split),
                )?;
                label_files += 1;
            }
            fs::write(staging_root.join("data.yaml"), yolo::data_yaml(&table)?)?;
        }
        ExportFormat::Coco => {
            let include_box_segmentation = task == TaskType::Segmentation;
            for split in SplitSection::all() {
                let split_items: Vec<ExportItem> = items
                    .iter()
                    .filter(|i| i.split == *split)
                    .cloned()
                    .collect();
                if split_items.is_empty() {
                    continue;
                }
                let dataset =
                    coco::build_coco(&split_items, &table, description, include_box_segmentation);
                let path = label_dir(staging_root, *split).join("_annotations.coco.json");
                fs::write(path, serde_json::to_string_pretty(&dataset)?)?;
                label_files += 1;
            }
        }
        ExportFormat::PascalVoc => {
            let include_polygons = task == TaskType::Segmentation;
            for item in items.iter() {
                voc::write_voc_xml(item, &label_dir(staging_root, item.split), include_polygons)?;
                label_files += 1;
            }
        }
        ExportFormat::Csv => {
            csv::write_csv(items, &table, &staging_root.join("annotations.csv"))?;
            label_files = 1;
        }
        ExportFormat::Auto => unreachable!("auto was resolved above"),
    }

    Ok(ExportOutcome {
        format,
        classes: table.names().to_vec(),
        label_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelforge_core::{Annotation, BoundingBox, Polygon};
    use pretty_assertions::assert_eq;

    fn bbox_item(name: &str, class: &str) -> ExportItem {
        ExportItem {
            image_id: name.to_string(),
            source_image_id: "img-1".into(),
            dataset_id: "ds-1".into(),
            file_name: format!("{name}.png"),
            image_path: format!("images/train/{name}.png").into(),
            width: 100,
            height: 100,
            split: SplitSection::Train,
            annotations: vec![Annotation::Bbox(BoundingBox::new(
                10.0, 10.0, 50.0, 50.0, 99, class,
            ))],
            is_original: false,
        }
    }

    fn polygon_item(name: &str, class: &str) -> ExportItem {
        let mut item = bbox_item(name, class);
        item.annotations = vec![Annotation::Polygon(Polygon::new(
            vec![[0.0, 0.0], [40.0, 0.0], [20.0, 30.0]],
            99,
            class,
        ))];
        item
    }

    #[test]
    fn test_auto_resolution_table() {
        let boxes = vec![bbox_item("a", "car")];
        let polys = vec![polygon_item("a", "car")];

        use ExportFormat::*;
        use TaskType::*;
        assert_eq!(resolve_format(Auto, Segmentation, &polys), YoloSegmentation);
        assert_eq!(resolve_format(Auto, Segmentation, &boxes), Coco);
        assert_eq!(resolve_format(Auto, ObjectDetection, &boxes), YoloDetection);
        assert_eq!(resolve_format(Auto, ObjectDetection, &polys), Coco);
        assert_eq!(resolve_format(Csv, Segmentation, &polys), Csv);
    }

    #[test]
    fn test_emit_yolo_detection_writes_labels_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let mut items = vec![bbox_item("a", "car"), bbox_item("b", "person")];
        let outcome = emit(
            &mut items,
            ExportFormat::YoloDetection,
            TaskType::ObjectDetection,
            "test",
            dir.path(),
        )
        .unwrap();

        assert_eq!(outcome.format, ExportFormat::YoloDetection);
        assert_eq!(outcome.classes, vec!["car", "person"]);
        assert_eq!(outcome.label_files, 2);
        assert!(dir.path().join("labels/train/a.txt").exists());
        assert!(dir.path().join("data.yaml").exists());
        // Remapped onto the unified table
        assert_eq!(items[1].annotations[0].class_id(), 1);
    }

    #[test]
    fn test_emit_coco_groups_by_split() {
        let dir = tempfile::tempdir().unwrap();
        let mut val_item = bbox_item("v", "car");
        val_item.split = SplitSection::Val;
        let mut items = vec![bbox_item("a", "car"), val_item];

        let outcome = emit(
            &mut items,
            ExportFormat::Coco,
            TaskType::ObjectDetection,
            "test",
            dir.path(),
        )
        .unwrap();
        assert_eq!(outcome.label_files, 2);
        assert!(dir
            .path()
            .join("labels/train/_annotations.coco.json")
            .exists());
        assert!(dir.path().join("labels/val/_annotations.coco.json").exists());
    }

    #[test]
    fn test_emit_csv_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut items = vec![bbox_item("a", "car")];
        let outcome = emit(
            &mut items,
            ExportFormat::Csv,
            TaskType::ObjectDetection,
            "test",
            dir.path(),
        )
        .unwrap();
        assert_eq!(outcome.label_files, 1);
        assert!(dir.path().join("annotations.csv").exists());
    }
}
