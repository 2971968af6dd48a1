//! YOLO detection and segmentation label files, plus `data.yaml`.
//!
//! All coordinates are normalized into [0, 1] by the *output* image
//! dimensions recorded on the item, never the source dimensions.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use labelforge_core::Annotation;

use crate::classes::ClassTable;
use crate::item::ExportItem;

/// Writes the detection label file for one item: `class cx cy w h` lines.
///
/// Returns the number of label lines written. Degenerate boxes are dropped;
/// an item without annotations still gets an empty label file.
pub fn write_detection_labels(
    item: &ExportItem,
    table: &ClassTable,
    labels_dir: &Path,
) -> std::io::Result<usize> {
    let (w, h) = (item.width as f64, item.height as f64);
    let mut lines = Vec::new();
    for ann in &item.annotations {
        // Polygons export their axis-aligned envelope
        let b = ann.envelope();
        if b.width() <= 0.0 || b.height() <= 0.0 {
            continue;
        }
        let class_id = table.id_of(ann.class_name()).unwrap_or(ann.class_id());
        let cx = (b.x_min + b.x_max) / 2.0 / w;
        let cy = (b.y_min + b.y_max) / 2.0 / h;
        let bw = b.width() / w;
        let bh = b.height() / h;
        lines.push(format!("{} {:.6} {:.6} {:.6} {:.6}", class_id, cx, cy, bw, bh));
    }
    write_label_file(item, labels_dir, &lines)?;
    Ok(lines.len())
}

/// Writes the segmentation label file for one item:
/// `class x1 y1 x2 y2 ...` lines with normalized vertices.
///
/// Bounding boxes fall back to their four corners so segmentation exports
/// never produce empty files for box-only images.
pub fn write_segmentation_labels(
    item: &ExportItem,
    table: &ClassTable,
    labels_dir: &Path,
) -> std::io::Result<usize> {
    let (w, h) = (item.width as f64, item.height as f64);
    let mut lines = Vec::new();
    for ann in &item.annotations {
        let ring = ann.vertex_ring();
        if ring.len() < 3 {
            continue;
        }
        let class_id = table.id_of(ann.class_name()).unwrap_or(ann.class_id());
        let mut line = class_id.to_string();
        for [x, y] in ring {
            line.push_str(&format!(
                " {:.6} {:.6}",
                (x / w).clamp(0.0, 1.0),
                (y / h).clamp(0.0, 1.0)
            ));
        }
        lines.push(line);
    }
    write_label_file(item, labels_dir, &lines)?;
    Ok(lines.len())
}

fn write_label_file(item: &ExportItem, labels_dir: &Path, lines: &[String]) -> std::io::Result<()> {
    let path = labels_dir.join(format!("{}.txt", item.stem()));
    let mut file = fs::File::create(path)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct DataYaml<'a> {
    train: &'a str,
    val: &'a str,
    test: &'a str,
    nc: usize,
    names: &'a [String],
}

/// Renders `data.yaml` for the YOLO formats.
pub fn data_yaml(table: &ClassTable) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&DataYaml {
        train: "./images/train",
        val: "./images/val",
        test: "./images/test",
        nc: table.len(),
        names: table.names(),
    })
}

/// Convenience check used by tests and the emitter: true when every
/// annotation on the item normalizes into [0, 1].
pub fn coordinates_normalized(item: &ExportItem) -> bool {
    let (w, h) = (item.width as f64, item.height as f64);
    item.annotations.iter().all(|ann| match ann {
        Annotation::Bbox(b) => {
            b.x_min >= 0.0 && b.y_min >= 0.0 && b.x_max <= w && b.y_max <= h
        }
        Annotation::Polygon(p) => p
            .points
            .iter()
            .all(|&[x, y]| x >= 0.0 && y >= 0.0 && x <= w && y <= h),
    })
}
