//! CSV export: one file for the whole release.
//!
//! Rows are `image,class_name,class_id,type,x,y,w,h,points` with pixel
//! coordinates; polygons carry their flattened vertices in `points`.

use std::path::Path;

use labelforge_core::Annotation;

use crate::classes::ClassTable;
use crate::item::ExportItem;

/// Writes the release-wide CSV file. Returns the number of rows.
pub fn write_csv(
    items: &[ExportItem],
    table: &ClassTable,
    path: &Path,
) -> Result<usize, ::csv::Error> {
    let mut writer = ::csv::Writer::from_path(path)?;
    writer.write_record([
        "image",
        "class_name",
        "class_id",
        "type",
        "x",
        "y",
        "w",
        "h",
        "points",
    ])?;

    let mut rows = 0usize;
    for item in items {
        for ann in &item.annotations {
            let b = ann.envelope();
            let class_id = table.id_of(ann.class_name()).unwrap_or(ann.class_id());
            let (kind, points) = match ann {
                Annotation::Bbox(_) => ("bbox", String::new()),
                Annotation::Polygon(p) => ("polygon", flatten_points(&p.points)),
            };
            let row = vec![
                item.file_name.clone(),
                ann.class_name().to_string(),
                class_id.to_string(),
                kind.to_string(),
                format!("{:.2}", b.x_min),
                format!("{:.2}", b.y_min),
                format!("{:.2}", b.width()),
                format!("{:.2}", b.height()),
                points,
            ];
            writer.write_record(&row)?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

fn flatten_points(points: &[[f64; 2]]) -> String {
    points
        .iter()
        .map(|[x, y]| format!("{:.2} {:.2}", x, y))
        .collect::<Vec<_>>()
        .join(" ")
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
            width: 100,
            height: 100,
            split: SplitSection::Train,
            annotations,
            is_original: false,
        }
    }

    #[test]
    fn test_rows_for_boxes_and_polygons() {
        let items = vec![
            item(
                "a",
                vec![Annotation::Bbox(BoundingBox::new(1.0, 2.0, 11.0, 22.0, 0, "car"))],
            ),
            item(
                "b",
                vec![Annotation::Polygon(Polygon::new(
                    vec![[0.0, 0.0], [10.0, 0.0], [5.0, 8.0]],
                    0,
                    "sign",
                ))],
            ),
        ];
        let table = ClassTable::collect(items.iter().flat_map(|i| &i.annotations));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.csv");

        let rows = write_csv(&items, &table, &path).unwrap();
        assert_eq!(rows, 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "image,class_name,class_id,type,x,y,w,h,points");
        assert_eq!(lines[1], "a.png,car,0,bbox,1.00,2.00,10.00,20.00,");
        assert_eq!(
            lines[2],
            "b.png,sign,1,polygon,0.00,0.00,10.00,8.00,0.00 0.00 10.00 0.00 5.00 8.00"
        );
    }
}
