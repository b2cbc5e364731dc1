use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A point in the units the owning `ScanSystem` was created with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Region of interest a camera is constrained to. `Unconstrained` has no
/// vertices; `Rectangular` is a convenience constructor that always produces
/// four vertices in consistent winding order; `Polygonal` is caller-supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WindowKind {
    Unconstrained,
    Rectangular,
    Polygonal,
}

/// Immutable once constructed; replacing a head's window means constructing
/// a new `ScanWindow` and calling `ScanHead::set_window`, which sets the
/// Window dirty flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanWindow {
    kind: WindowKind,
    vertices: Vec<Point2D>,
}

impl ScanWindow {
    pub fn unconstrained() -> Self {
        Self {
            kind: WindowKind::Unconstrained,
            vertices: Vec::new(),
        }
    }

    /// `top`/`bottom`/`left`/`right` are in the system's configured units.
    pub fn rectangular(top: f64, bottom: f64, left: f64, right: f64) -> Result<Self, ModelError> {
        if !(top > bottom && right > left) {
            return Err(ModelError::DegenerateRectangle);
        }
        Ok(Self {
            kind: WindowKind::Rectangular,
            vertices: vec![
                Point2D::new(left, top),
                Point2D::new(right, top),
                Point2D::new(right, bottom),
                Point2D::new(left, bottom),
            ],
        })
    }

    pub fn polygonal(vertices: Vec<Point2D>) -> Result<Self, ModelError> {
        if polygon_self_intersects(&vertices) {
            return Err(ModelError::SelfIntersectingWindow);
        }
        Ok(Self {
            kind: WindowKind::Polygonal,
            vertices,
        })
    }

    pub fn kind(&self) -> &WindowKind {
        &self.kind
    }

    pub fn vertices(&self) -> &[Point2D] {
        &self.vertices
    }

    /// Coarse proxy for the per-row readout cost the phase scheduler needs:
    /// the number of image rows the window spans is approximated here by
    /// its vertical extent. Exact row mapping is a geometry-helper concern
    /// (out of scope); this keeps the scheduler's contract satisfiable
    /// without that collaborator.
    pub fn vertical_extent(&self) -> f64 {
        match self.kind {
            WindowKind::Unconstrained => f64::INFINITY,
            _ => {
                let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
                for v in &self.vertices {
                    min_y = min_y.min(v.y);
                    max_y = max_y.max(v.y);
                }
                max_y - min_y
            }
        }
    }
}

/// Segment-intersection check over consecutive polygon edges (including the
/// closing edge). O(n^2); window polygons are small (single digits to low
/// tens of vertices) so this is not a hot path.
fn polygon_self_intersects(vertices: &[Point2D]) -> bool {
    let n = vertices.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        let a1 = vertices[i];
        let a2 = vertices[(i + 1) % n];
        for j in (i + 1)..n {
            // Adjacent edges (including wraparound) share an endpoint by
            // construction and are not considered intersecting.
            if j == i || (j + 1) % n == i {
                continue;
            }
            let b1 = vertices[j];
            let b2 = vertices[(j + 1) % n];
            if segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

fn orientation(p: Point2D, q: Point2D, r: Point2D) -> f64 {
    (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y)
}

fn on_segment(p: Point2D, q: Point2D, r: Point2D) -> bool {
    q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
}

fn segments_intersect(p1: Point2D, q1: Point2D, p2: Point2D, q2: Point2D) -> bool {
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if (o1 > 0.0) != (o2 > 0.0) && (o3 > 0.0) != (o4 > 0.0) && o1 != 0.0 && o2 != 0.0 {
        return true;
    }

    (o1 == 0.0 && on_segment(p1, p2, q1))
        || (o2 == 0.0 && on_segment(p1, q2, q1))
        || (o3 == 0.0 && on_segment(p2, p1, q2))
        || (o4 == 0.0 && on_segment(p2, q1, q2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangular_requires_top_above_bottom_and_right_of_left() {
        assert!(ScanWindow::rectangular(30.0, -30.0, -30.0, 30.0).is_ok());
        assert_eq!(
            ScanWindow::rectangular(-30.0, 30.0, -30.0, 30.0),
            Err(ModelError::DegenerateRectangle)
        );
    }

    #[test]
    fn simple_square_polygon_is_accepted() {
        let vertices = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(0.0, 10.0),
        ];
        assert!(ScanWindow::polygonal(vertices).is_ok());
    }

    #[test]
    fn bowtie_polygon_is_rejected_as_self_intersecting() {
        let vertices = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(0.0, 10.0),
        ];
        assert_eq!(
            ScanWindow::polygonal(vertices),
            Err(ModelError::SelfIntersectingWindow)
        );
    }
}
