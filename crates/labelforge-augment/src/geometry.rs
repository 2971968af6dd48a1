//! 3x3 homographies over pixel coordinates.
//!
//! Coordinates are continuous with the origin at the top-left corner and y
//! growing downward; a positive rotation angle turns clockwise on screen.
//! Pixel index `i` covers the span `[i, i+1)`, so a canvas of width `w` spans
//! `[0, w]` and a horizontal flip is the reflection `x' = w - x`.

/// A 3x3 projective transform, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    pub m: [[f64; 3]; 3],
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            m: [[1.0, 0.0, tx], [0.0, 1.0, ty], [0.0, 0.0, 1.0]],
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            m: [[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Clockwise rotation (y-down screen coordinates) about the origin.
    pub fn rotate_deg(angle_deg: f64) -> Self {
        let rad = angle_deg.to_radians();
        let (sin, cos) = rad.sin_cos();
        Self {
            m: [[cos, -sin, 0.0], [sin, cos, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Horizontal shear: `x' = x + t * y`.
    pub fn shear_x(t: f64) -> Self {
        Self {
            m: [[1.0, t, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Vertical shear: `y' = y + t * x`.
    pub fn shear_y(t: f64) -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [t, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Reflection about the vertical center line of a canvas `width` wide.
    pub fn reflect_horizontal(width: f64) -> Self {
        Self {
            m: [[-1.0, 0.0, width], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Reflection about the horizontal center line of a canvas `height` tall.
    pub fn reflect_vertical(height: f64) -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, -1.0, height], [0.0, 0.0, 1.0]],
        }
    }

    /// Matrix product `self * other` (apply `other` first, then `self`).
    pub fn compose(&self, other: &Homography) -> Homography {
        let a = &self.m;
        let b = &other.m;
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Homography { m: out }
    }

    /// Applies the homography to a point with perspective divide.
    pub fn apply(&self, point: [f64; 2]) -> [f64; 2] {
        let [x, y] = point;
        let m = &self.m;
        let w = m[2][0] * x + m[2][1] * y + m[2][2];
        let w = if w.abs() < 1e-12 { 1e-12 } else { w };
        [
            (m[0][0] * x + m[0][1] * y + m[0][2]) / w,
            (m[1][0] * x + m[1][1] * y + m[1][2]) / w,
        ]
    }

    /// Applies the homography to every point of a ring.
    pub fn apply_ring(&self, points: &[[f64; 2]]) -> Vec<[f64; 2]> {
        points.iter().map(|&p| self.apply(p)).collect()
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse via the adjugate; `None` for singular matrices.
    pub fn inverse(&self) -> Option<Homography> {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return None;
        }
        let m = &self.m;
        let inv_det = 1.0 / det;
        let mut out = [[0.0; 3]; 3];
        out[0][0] = (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det;
        out[0][1] = (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det;
        out[0][2] = (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det;
        out[1][0] = (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det;
        out[1][1] = (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det;
        out[1][2] = (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det;
        out[2][0] = (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det;
        out[2][1] = (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det;
        out[2][2] = (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det;
        Some(Homography { m: out })
    }

    /// True when the bottom row is (0, 0, 1), i.e. the transform is affine.
    pub fn is_affine(&self) -> bool {
        self.m[2][0] == 0.0 && self.m[2][1] == 0.0 && self.m[2][2] == 1.0
    }

    /// Homography mapping the unit square to a quad.
    ///
    /// `quad` lists the images of (0,0), (1,0), (1,1), (0,1) in that order.
    pub fn unit_square_to_quad(quad: [[f64; 2]; 4]) -> Option<Homography> {
        let [[x0, y0], [x1, y1], [x2, y2], [x3, y3]] = quad;

        let dx1 = x1 - x2;
        let dx2 = x3 - x2;
        let dy1 = y1 - y2;
        let dy2 = y3 - y2;
        let sx = x0 - x1 + x2 - x3;
        let sy = y0 - y1 + y2 - y3;

        if sx.abs() < 1e-12 && sy.abs() < 1e-12 {
            // Affine case
            return Some(Homography {
                m: [
                    [x1 - x0, x3 - x0, x0],
                    [y1 - y0, y3 - y0, y0],
                    [0.0, 0.0, 1.0],
                ],
            });
        }

        let denom = dx1 * dy2 - dx2 * dy1;
        if denom.abs() < 1e-12 {
            return None;
        }
        let g = (sx * dy2 - dx2 * sy) / denom;
        let h = (dx1 * sy - sx * dy1) / denom;

        Some(Homography {
            m: [
                [x1 - x0 + g * x1, x3 - x0 + h * x3, x0],
                [y1 - y0 + g * y1, y3 - y0 + h * y3, y0],
                [g, h, 1.0],
            ],
        })
    }

    /// Homography mapping the rectangle `[0,w] x [0,h]` to a quad
    /// (corner order: top-left, top-right, bottom-right, bottom-left).
    pub fn rect_to_quad(w: f64, h: f64, quad: [[f64; 2]; 4]) -> Option<Homography> {
        let unit = Homography::unit_square_to_quad(quad)?;
        Some(unit.compose(&Homography::scale(1.0 / w, 1.0 / h)))
    }
}

/// Axis-aligned envelope of a set of points as (x_min, y_min, x_max, y_max).
pub fn envelope(points: &[[f64; 2]]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut y_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for &[x, y] in points {
        x_min = x_min.min(x);
        y_min = y_min.min(y);
        x_max = x_max.max(x);
        y_max = y_max.max(y);
    }
    (x_min, y_min, x_max, y_max)
}
