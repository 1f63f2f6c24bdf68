//! Bicubic bezier patch driven by a 4x4 control net
//!
//! The horizontal and vertical forces scale how far each handle sits from the
//! edge point it belongs to. A force of 0 leaves the net untouched, -1 collapses
//! the handles onto their anchors, +1 doubles their reach.

use glam::Vec2;

use super::mesh::ControlMesh;

/// Control points per axis of a bezier surface
pub const BEZIER_NET_SIZE: usize = 4;

/// Cubic Bernstein weights at `t`
fn bernstein(t: f32) -> [f32; 4] {
    let mt = 1.0 - t;
    [mt * mt * mt, 3.0 * mt * mt * t, 3.0 * mt * t * t, t * t * t]
}

/// Control net after applying the force parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierPatch {
    net: [[Vec2; BEZIER_NET_SIZE]; BEZIER_NET_SIZE],
}

impl BezierPatch {
    /// Build a patch from a 4x4 control mesh. Returns `None` for any other size.
    pub fn from_mesh(
        mesh: &ControlMesh,
        horizontal_force: f32,
        vertical_force: f32,
    ) -> Option<Self> {
        if mesh.rows() != BEZIER_NET_SIZE || mesh.cols() != BEZIER_NET_SIZE {
            return None;
        }

        let mut net = [[Vec2::ZERO; BEZIER_NET_SIZE]; BEZIER_NET_SIZE];
        for (row, line) in net.iter_mut().enumerate() {
            for (col, point) in line.iter_mut().enumerate() {
                *point = mesh.point_at(row, col);
            }
        }

        // Horizontal handles belong to the nearest column edge
        let h_scale = 1.0 + horizontal_force;
        for line in net.iter_mut() {
            let (left, right) = (line[0], line[3]);
            line[1] = left + (line[1] - left) * h_scale;
            line[2] = right + (line[2] - right) * h_scale;
        }

        // Vertical handles belong to the nearest row edge
        let v_scale = 1.0 + vertical_force;
        for col in 0..BEZIER_NET_SIZE {
            let (top, bottom) = (net[0][col], net[3][col]);
            net[1][col] = top + (net[1][col] - top) * v_scale;
            net[2][col] = bottom + (net[2][col] - bottom) * v_scale;
        }

        Some(Self { net })
    }

    /// Evaluate the patch at (u, v) in 0.0-1.0
    pub fn evaluate(&self, u: f32, v: f32) -> Vec2 {
        let bu = bernstein(u);
        let bv = bernstein(v);

        let mut point = Vec2::ZERO;
        for (row, wv) in bv.iter().enumerate() {
            for (col, wu) in bu.iter().enumerate() {
                point += self.net[row][col] * (wu * wv);
            }
        }
        point
    }

    /// Evaluate on a uniform `points` x `points` grid
    pub fn tessellate(&self, points: usize) -> Vec<Vec2> {
        let steps = (points.max(2) - 1) as f32;
        let mut out = Vec::with_capacity(points * points);
        for row in 0..points {
            let v = row as f32 / steps;
            for col in 0..points {
                let u = col as f32 / steps;
                out.push(self.evaluate(u, v));
            }
        }
        out
    }
}
