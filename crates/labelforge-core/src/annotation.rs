//! Pixel-space annotation model.
//!
//! Annotations enter the pipeline in pixel coordinates relative to the source
//! image. The augmentation engine never mutates its inputs; it emits fresh
//! annotations in the coordinates of the output image.

use serde::{Deserialize, Serialize};

/// Minimum area in square pixels below which a transformed annotation is
/// dropped.
pub const MIN_ANNOTATION_AREA: f64 = 1.0;

/// An axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub class_id: u32,
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl BoundingBox {
    /// Creates a new bounding box.
    pub fn new(
        x_min: f64,
        y_min: f64,
        x_max: f64,
        y_max: f64,
        class_id: u32,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
            class_id,
            class_name: class_name.into(),
            confidence: None,
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// The four corners in clockwise order starting from the top-left.
    pub fn corners(&self) -> [[f64; 2]; 4] {
        [
            [self.x_min, self.y_min],
            [self.x_max, self.y_min],
            [self.x_max, self.y_max],
            [self.x_min, self.y_max],
        ]
    }

    /// Checks the box invariants against the given canvas size.
    pub fn is_valid_for(&self, width: f64, height: f64) -> bool {
        self.x_min >= 0.0
            && self.y_min >= 0.0
            && self.x_min < self.x_max
            && self.y_min < self.y_max
            && self.x_max <= width
            && self.y_max <= height
    }

    /// Clips the box to `[0, width] x [0, height]`.
    ///
    /// Returns `None` when the clipped box degenerates (area below
    /// [`MIN_ANNOTATION_AREA`] or an edge shorter than one pixel).
    pub fn clipped_to(&self, width: f64, height: f64) -> Option<BoundingBox> {
        let x_min = self.x_min.max(0.0);
        let y_min = self.y_min.max(0.0);
        let x_max = self.x_max.min(width);
        let y_max = self.y_max.min(height);

        let clipped = BoundingBox {
            x_min,
            y_min,
            x_max,
            y_max,
            class_id: self.class_id,
            class_name: self.class_name.clone(),
            confidence: self.confidence,
        };
        if clipped.width() >= 1.0 && clipped.height() >= 1.0 && clipped.area() >= MIN_ANNOTATION_AREA
        {
            Some(clipped)
        } else {
            None
        }
    }
}

/// A polygon annotation in pixel coordinates.
///
/// At least three vertices; winding may be reversed by mirroring transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<[f64; 2]>,
    pub class_id: u32,
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Polygon {
    /// Creates a new polygon.
    pub fn new(points: Vec<[f64; 2]>, class_id: u32, class_name: impl Into<String>) -> Self {
        Self {
            points,
            class_id,
            class_name: class_name.into(),
            confidence: None,
        }
    }

    /// Shoelace area (always non-negative; winding-insensitive).
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// The axis-aligned envelope of the vertices.
    pub fn envelope(&self) -> BoundingBox {
        let mut x_min = f64::INFINITY;
        let mut y_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for &[x, y] in &self.points {
            x_min = x_min.min(x);
            y_min = y_min.min(y);
            x_max = x_max.max(x);
            y_max = y_max.max(y);
        }
        BoundingBox {
            x_min,
            y_min,
            x_max,
            y_max,
            class_id: self.class_id,
            class_name: self.class_name.clone(),
            confidence: self.confidence,
        }
    }

    /// Checks that all vertices lie within the canvas and the vertex count
    /// is at least three.
    pub fn is_valid_for(&self, width: f64, height: f64) -> bool {
        self.points.len() >= 3
            && self
                .points
                .iter()
                .all(|&[x, y]| x >= 0.0 && x <= width && y >= 0.0 && y <= height)
    }
}

/// Shoelace area of an arbitrary vertex ring.
pub fn polygon_area(points: &[[f64; 2]]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..points.len() {
        let [x1, y1] = points[i];
        let [x2, y2] = points[(i + 1) % points.len()];
        sum += x1 * y2 - x2 * y1;
    }
    (sum / 2.0).abs()
}

/// An annotation attached to an image: either a bounding box or a polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    Bbox(BoundingBox),
    Polygon(Polygon),
}

impl Annotation {
    pub fn class_id(&self) -> u32 {
        match self {
            Annotation::Bbox(b) => b.class_id,
            Annotation::Polygon(p) => p.class_id,
        }
    }

    pub fn class_name(&self) -> &str {
        match self {
            Annotation::Bbox(b) => &b.class_name,
            Annotation::Polygon(p) => &p.class_name,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            Annotation::Bbox(b) => b.confidence,
            Annotation::Polygon(p) => p.confidence,
        }
    }

    /// Rewrites the class id (used when remapping to the unified class table).
    pub fn set_class_id(&mut self, id: u32) {
        match self {
            Annotation::Bbox(b) => b.class_id = id,
            Annotation::Polygon(p) => p.class_id = id,
        }
    }

    /// The axis-aligned envelope of the annotation.
    pub fn envelope(&self) -> BoundingBox {
        match self {
            Annotation::Bbox(b) => b.clone(),
            Annotation::Polygon(p) => p.envelope(),
        }
    }

    /// The vertex ring of the annotation; boxes yield their four corners.
    ///
    /// This is the polygon<->bbox fallback used by segmentation exports: a
    /// box becomes a rectangle polygon *before* transformation so it rides
    /// the same geometric pipeline as the image.
    pub fn vertex_ring(&self) -> Vec<[f64; 2]> {
        match self {
            Annotation::Bbox(b) => b.corners().to_vec(),
            Annotation::Polygon(p) => p.points.clone(),
        }
    }

    pub fn is_polygon(&self) -> bool {
        matches!(self, Annotation::Polygon(_))
    }

    /// Checks geometric validity against the given canvas size.
    pub fn is_valid_for(&self, width: f64, height: f64) -> bool {
        match self {
            Annotation::Bbox(b) => b.is_valid_for(width, height),
            Annotation::Polygon(p) => p.is_valid_for(width, height),
        }
    }
}
