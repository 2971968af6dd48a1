//! COCO JSON export.
//!
//! One JSON document per split with `images`, `annotations`, and
//! `categories`. Integer ids are assigned deterministically: images in item
//! order, annotations in encounter order, categories from the unified class
//! table.

use serde::{Deserialize, Serialize};

use labelforge_core::Annotation;

use crate::classes::ClassTable;
use crate::item::ExportItem;

#[derive(Debug, Serialize, Deserialize)]
pub struct CocoInfo {
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CocoImage {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub file_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CocoCategory {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CocoAnnotation {
    pub id: u32,
    pub image_id: u32,
    pub category_id: u32,
    /// Pixel-space [x, y, width, height].
    pub bbox: [f64; 4],
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub segmentation: Vec<Vec<f64>>,
    pub area: f64,
    pub iscrowd: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CocoDataset {
    pub info: CocoInfo,
    pub images: Vec<CocoImage>,
    pub annotations: Vec<CocoAnnotation>,
    pub categories: Vec<CocoCategory>,
}

/// Builds a COCO document from the given items.
///
/// `include_box_segmentation` turns bounding boxes into four-corner
/// segmentations (used for segmentation-task releases so box-only images
/// still carry masks).
pub fn build_coco(
    items: &[ExportItem],
    table: &ClassTable,
    description: &str,
    include_box_segmentation: bool,
) -> CocoDataset {
    let categories = table
        .names()
        .iter()
        .enumerate()
        .map(|(i, name)| CocoCategory {
            id: i as u32,
            name: name.clone(),
        })
        .collect();

    let mut images = Vec::with_capacity(items.len());
    let mut annotations = Vec::new();
    let mut next_annotation_id = 0u32;

    for (image_index, item) in items.iter().enumerate() {
        let image_id = image_index as u32;
        images.push(CocoImage {
            id: image_id,
            width: item.width,
            height: item.height,
            file_name: item.file_name.clone(),
        });

        for ann in &item.annotations {
            let envelope = ann.envelope();
            let segmentation = match ann {
                Annotation::Polygon(p) => vec![flatten_ring(&p.points)],
                Annotation::Bbox(b) if include_box_segmentation => {
                    vec![flatten_ring(&b.corners())]
                }
                Annotation::Bbox(_) => Vec::new(),
            };
            let area = match ann {
                Annotation::Polygon(p) => p.area(),
                Annotation::Bbox(b) => b.area(),
            };
            annotations.push(CocoAnnotation {
                id: next_annotation_id,
                image_id,
                category_id: table.id_of(ann.class_name()).unwrap_or(ann.class_id()),
                bbox: [
                    envelope.x_min,
                    envelope.y_min,
                    envelope.width(),
                    envelope.height(),
                ],
                segmentation,
                area,
                iscrowd: 0,
            });
            next_annotation_id += 1;
        }
    }

    CocoDataset {
        info: CocoInfo {
            description: description.to_string(),
        },
        images,
        annotations,
        categories,
    }
}

fn flatten_ring(points: &[[f64; 2]]) -> Vec<f64> {
    points.iter().flat_map(|&[x, y]| [x, y]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelforge_core::{BoundingBox, Polygon, SplitSection};
    use pretty_assertions::assert_eq;

    fn item(name: &str, annotations: Vec<Annotation>) -> ExportItem {
        ExportItem {
            image_id: name.to_string(),
            source_image_id: "img-1".into(),
            dataset_id: "ds-1".into(),
            file_name: format!("{name}.png"),
            image_path: format!("images/train/{name}.png").into(),
            width: 640,
            height: 480,
            split: SplitSection::Train,
            annotations,
            is_original: false,
        }
    }

    #[test]
    fn test_ids_are_deterministic() {
        let items = vec![
            item(
                "a",
                vec![Annotation::Bbox(BoundingBox::new(10.0, 20.0, 110.0, 70.0, 0, "car"))],
            ),
            item(
                "b",
                vec![
                    Annotation::Bbox(BoundingBox::new(0.0, 0.0, 10.0, 10.0, 0, "person")),
                    Annotation::Bbox(BoundingBox::new(5.0, 5.0, 20.0, 20.0, 0, "car")),
                ],
            ),
        ];
        let table = ClassTable::collect(items.iter().flat_map(|i| &i.annotations));
        let coco = build_coco(&items, &table, "test release", false);

        assert_eq!(coco.images.len(), 2);
        assert_eq!(coco.images[0].id, 0);
        assert_eq!(coco.images[1].id, 1);
        assert_eq!(coco.annotations.len(), 3);
        assert_eq!(coco.annotations[2].id, 2);
        assert_eq!(coco.annotations[2].image_id, 1);

        // categories from the unified table: car=0, person=1
        assert_eq!(coco.categories[0].name, "car");
        assert_eq!(coco.annotations[0].category_id, 0);
        assert_eq!(coco.annotations[1].category_id, 1);
    }

    #[test]
    fn test_bbox_is_xywh_pixels() {
        let items = vec![item(
            "a",
            vec![Annotation::Bbox(BoundingBox::new(10.0, 20.0, 110.0, 70.0, 0, "car"))],
        )];
        let table = ClassTable::collect(items.iter().flat_map(|i| &i.annotations));
        let coco = build_coco(&items, &table, "", false);
        assert_eq!(coco.annotations[0].bbox, [10.0, 20.0, 100.0, 50.0]);
        assert_eq!(coco.annotations[0].area, 5000.0);
    }

    #[test]
    fn test_polygon_segmentation_flattened() {
        let items = vec![item(
            "a",
            vec![Annotation::Polygon(Polygon::new(
                vec![[0.0, 0.0], [10.0, 0.0], [10.0, 8.0]],
                0,
                "sign",
            ))],
        )];
        let table = ClassTable::collect(items.iter().flat_map(|i| &i.annotations));
        let coco = build_coco(&items, &table, "", false);
        assert_eq!(
            coco.annotations[0].segmentation,
            vec![vec![0.0, 0.0, 10.0, 0.0, 10.0, 8.0]]
        );
        assert_eq!(coco.annotations[0].area, 40.0);
    }

    #[test]
    fn test_box_segmentation_fallback() {
        let items = vec![item(
            "a",
            vec![Annotation::Bbox(BoundingBox::new(1.0, 2.0, 3.0, 4.0, 0, "car"))],
        )];
        let table = ClassTable::collect(items.iter().flat_map(|i| &i.annotations));

        let without = build_coco(&items, &table, "", false);
        assert!(without.annotations[0].segmentation.is_empty());

        let with = build_coco(&items, &table, "", true);
        assert_eq!(
            with.annotations[0].segmentation,
            vec![vec![1.0, 2.0, 3.0, 2.0, 3.0, 4.0, 1.0, 4.0]]
        );
    }
}
