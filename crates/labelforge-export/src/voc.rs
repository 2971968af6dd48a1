//! Pascal VOC XML export: one `<annotation>` document per image.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use labelforge_core::Annotation;

use crate::item::ExportItem;

/// Escapes the five XML-reserved characters.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders the VOC document for one item.
///
/// Objects always carry a pixel `<bndbox>`; when `include_polygons` is set
/// (segmentation task), polygon annotations additionally flatten their
/// vertices into a `<polygon>` element.
pub fn render_voc_xml(item: &ExportItem, include_polygons: bool) -> String {
    let mut xml = String::new();
    // Infallible writes into a String
    let _ = writeln!(xml, "<annotation>");
    let _ = writeln!(xml, "  <folder>images</folder>");
    let _ = writeln!(xml, "  <filename>{}</filename>", escape(&item.file_name));
    let _ = writeln!(xml, "  <size>");
    let _ = writeln!(xml, "    <width>{}</width>", item.width);
    let _ = writeln!(xml, "    <height>{}</height>", item.height);
    let _ = writeln!(xml, "    <depth>3</depth>");
    let _ = writeln!(xml, "  </size>");
    let _ = writeln!(xml, "  <segmented>0</segmented>");

    for ann in &item.annotations {
        let b = ann.envelope();
        let _ = writeln!(xml, "  <object>");
        let _ = writeln!(xml, "    <name>{}</name>", escape(ann.class_name()));
        let _ = writeln!(xml, "    <pose>Unspecified</pose>");
        let _ = writeln!(xml, "    <truncated>0</truncated>");
        let _ = writeln!(xml, "    <difficult>0</difficult>");
        let _ = writeln!(xml, "    <bndbox>");
        let _ = writeln!(xml, "      <xmin>{:.0}</xmin>", b.x_min);
        let _ = writeln!(xml, "      <ymin>{:.0}</ymin>", b.y_min);
        let _ = writeln!(xml, "      <xmax>{:.0}</xmax>", b.x_max);
        let _ = writeln!(xml, "      <ymax>{:.0}</ymax>", b.y_max);
        let _ = writeln!(xml, "    </bndbox>");
        if include_polygons {
            if let Annotation::Polygon(p) = ann {
                let _ = writeln!(xml, "    <polygon>");
                for (i, [x, y]) in p.points.iter().enumerate() {
                    let _ = writeln!(xml, "      <x{}>{:.2}</x{}>", i + 1, x, i + 1);
                    let _ = writeln!(xml, "      <y{}>{:.2}</y{}>", i + 1, y, i + 1);
                }
                let _ = writeln!(xml, "    </polygon>");
            }
        }
        let _ = writeln!(xml, "  </object>");
    }

    let _ = writeln!(xml, "</annotation>");
    xml
}

/// Writes the VOC XML for one item into `labels_dir`.
pub fn write_voc_xml(
    item: &ExportItem,
    labels_dir: &Path,
    include_polygons: bool,
) -> std::io::Result<()> {
    let path = labels_dir.join(format!("{}.xml", item.stem()));
    fs::write(path, render_voc_xml(item, include_polygons))
}
