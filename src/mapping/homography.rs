//! Projective (homography) mapping between the unit square and a quad
//!
//! Each render-mesh cell is drawn by inverting the unit-square-to-cell mapping
//! for every destination pixel.

use glam::Vec2;

const EPSILON: f64 = 1e-10;

/// 3x3 homography matrix (row-major)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    pub matrix: [[f64; 3]; 3],
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Mapping from the unit square onto a quad.
    ///
    /// Corners are [top-left, top-right, bottom-right, bottom-left], matching
    /// (0,0), (1,0), (1,1), (0,1). Returns `None` for degenerate quads.
    pub fn unit_square_to_quad(corners: [Vec2; 4]) -> Option<Self> {
        let [x0, x1, x2, x3] = corners.map(|c| c.x as f64);
        let [y0, y1, y2, y3] = corners.map(|c| c.y as f64);

        let dx3 = x0 - x1 + x2 - x3;
        let dy3 = y0 - y1 + y2 - y3;

        let matrix = if dx3.abs() < EPSILON && dy3.abs() < EPSILON {
            // Parallelogram: affine is enough
            [
                [x1 - x0, x3 - x0, x0],
                [y1 - y0, y3 - y0, y0],
                [0.0, 0.0, 1.0],
            ]
        } else {
            let dx1 = x1 - x2;
            let dx2 = x3 - x2;
            let dy1 = y1 - y2;
            let dy2 = y3 - y2;

            let den = dx1 * dy2 - dx2 * dy1;
            if den.abs() < EPSILON {
                return None;
            }
            let g = (dx3 * dy2 - dx2 * dy3) / den;
            let h = (dx1 * dy3 - dx3 * dy1) / den;

            [
                [x1 - x0 + g * x1, x3 - x0 + h * x3, x0],
                [y1 - y0 + g * y1, y3 - y0 + h * y3, y0],
                [g, h, 1.0],
            ]
        };

        let homography = Self { matrix };
        if homography.determinant().abs() < EPSILON {
            return None;
        }
        Some(homography)
    }

    fn determinant(&self) -> f64 {
        let m = &self.matrix;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse mapping, or `None` if the matrix is singular
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < EPSILON {
            return None;
        }
        let m = &self.matrix;
        let inv_det = 1.0 / det;

        let matrix = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
            ],
        ];
        Some(Self { matrix })
    }

    /// Transform a point. Returns `None` for points mapped to infinity.
    pub fn transform_point(&self, point: Vec2) -> Option<Vec2> {
        let m = &self.matrix;
        let (px, py) = (point.x as f64, point.y as f64);
        let x = m[0][0] * px + m[0][1] * py + m[0][2];
        let y = m[1][0] * px + m[1][1] * py + m[1][2];
        let w = m[2][0] * px + m[2][1] * py + m[2][2];
        if w.abs() < EPSILON {
            return None;
        }
        Some(Vec2::new((x / w) as f32, (y / w) as f32))
    }
}
