//! Polygon clipping against the output canvas.

use labelforge_core::polygon_area;

#[derive(Clone, Copy)]
enum Edge {
    Left,
    Right(f64),
    Top,
    Bottom(f64),
}

impl Edge {
    fn inside(&self, p: [f64; 2]) -> bool {
        match *self {
            Edge::Left => p[0] >= 0.0,
            Edge::Right(w) => p[0] <= w,
            Edge::Top => p[1] >= 0.0,
            Edge::Bottom(h) => p[1] <= h,
        }
    }

    /// Intersection of segment a-b with this boundary line.
    fn intersect(&self, a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
        match *self {
            Edge::Left => intersect_vertical(a, b, 0.0),
            Edge::Right(w) => intersect_vertical(a, b, w),
            Edge::Top => intersect_horizontal(a, b, 0.0),
            Edge::Bottom(h) => intersect_horizontal(a, b, h),
        }
    }
}

fn intersect_vertical(a: [f64; 2], b: [f64; 2], x: f64) -> [f64; 2] {
    let t = (x - a[0]) / (b[0] - a[0]);
    [x, a[1] + t * (b[1] - a[1])]
}

fn intersect_horizontal(a: [f64; 2], b: [f64; 2], y: f64) -> [f64; 2] {
    let t = (y - a[1]) / (b[1] - a[1]);
    [a[0] + t * (b[0] - a[0]), y]
}

/// Clips a vertex ring against the rectangle `[0,w] x [0,h]` using
/// Sutherland-Hodgman.
///
/// The clip region is convex, so the result is a single ring; an empty
/// vector means the polygon lies entirely outside the canvas.
pub fn clip_ring_to_rect(ring: &[[f64; 2]], w: f64, h: f64) -> Vec<[f64; 2]> {
    if ring.len() < 3 {
        return Vec::new();
    }

    let mut current = ring.to_vec();
    for edge in [Edge::Left, Edge::Right(w), Edge::Top, Edge::Bottom(h)] {
        if current.is_empty() {
            break;
        }
        let mut next = Vec::with_capacity(current.len() + 4);
        for i in 0..current.len() {
            let a = current[i];
            let b = current[(i + 1) % current.len()];
            match (edge.inside(a), edge.inside(b)) {
                (true, true) => next.push(b),
                (true, false) => next.push(edge.intersect(a, b)),
                (false, true) => {
                    next.push(edge.intersect(a, b));
                    next.push(b);
                }
                (false, false) => {}
            }
        }
        current = next;
    }

    dedup_ring(current)
}

/// Removes consecutive duplicate vertices produced by clipping at corners.
fn dedup_ring(ring: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    if ring.is_empty() {
        return ring;
    }
    let mut out: Vec<[f64; 2]> = Vec::with_capacity(ring.len());
    for p in ring {
        if let Some(last) = out.last() {
            if (last[0] - p[0]).abs() < 1e-9 && (last[1] - p[1]).abs() < 1e-9 {
                continue;
            }
        }
        out.push(p);
    }
    if out.len() >= 2 {
        let first = out[0];
        let last = out[out.len() - 1];
        if (first[0] - last[0]).abs() < 1e-9 && (first[1] - last[1]).abs() < 1e-9 {
            out.pop();
        }
    }
    out
}

/// Clips a ring and applies the degeneracy rules: at least three vertices
/// and an area of at least `min_area` square pixels.
pub fn clip_ring_checked(
    ring: &[[f64; 2]],
    w: f64,
    h: f64,
    min_area: f64,
) -> Option<Vec<[f64; 2]>> {
    let clipped = clip_ring_to_rect(ring, w, h);
    if clipped.len() >= 3 && polygon_area(&clipped) >= min_area {
        Some(clipped)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fully_inside_is_unchanged() {
        let ring = vec![[10.0, 10.0], [50.0, 10.0], [50.0, 40.0], [10.0, 40.0]];
        let clipped = clip_ring_to_rect(&ring, 100.0, 100.0);
        assert_eq!(clipped, ring);
    }

    #[test]
    fn test_fully_outside_is_empty() {
        let ring = vec![[110.0, 10.0], [150.0, 10.0], [150.0, 40.0], [110.0, 40.0]];
        assert!(clip_ring_to_rect(&ring, 100.0, 100.0).is_empty());
    }

    #[test]
    fn test_half_overlap_is_cut_at_the_edge() {
        let ring = vec![[-20.0, 0.0], [20.0, 0.0], [20.0, 10.0], [-20.0, 10.0]];
        let clipped = clip_ring_to_rect(&ring, 100.0, 100.0);
        assert_eq!(polygon_area(&clipped), 200.0);
        assert!(clipped.iter().all(|p| p[0] >= 0.0));
    }

    #[test]
    fn test_triangle_cut_by_corner() {
        let ring = vec![[-10.0, 50.0], [50.0, -10.0], [50.0, 50.0]];
        let clipped = clip_ring_to_rect(&ring, 100.0, 100.0);
        assert!(clipped.len() >= 3);
        assert!(clipped
            .iter()
            .all(|p| p[0] >= -1e-9 && p[1] >= -1e-9 && p[0] <= 100.0 && p[1] <= 100.0));
    }

    #[test]
    fn test_checked_drops_tiny_area() {
        let sliver = vec![[0.0, 0.0], [0.5, 0.0], [0.5, 1.0], [0.0, 1.0]];
        assert!(clip_ring_checked(&sliver, 100.0, 100.0, 1.0).is_none());
    }
}
