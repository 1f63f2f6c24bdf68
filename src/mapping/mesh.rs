//! Control mesh for surface deformation
//!
//! A row-major grid of canvas-space points. Quad surfaces edit this grid
//! directly; bezier surfaces use a fixed 4x4 grid as their patch control net.

use glam::Vec2;

use super::error::MappingError;

/// Fewest points allowed along either axis
pub const MIN_POINTS_PER_AXIS: usize = 2;

/// Points per axis after one resolution increase (a midpoint between every neighbor pair)
pub fn next_resolution(points: usize) -> usize {
    points * 2 - 1
}

/// Points per axis after one resolution decrease.
///
/// Exact inverse of [`next_resolution`] whenever `points - 1` is even.
pub fn prev_resolution(points: usize) -> usize {
    ((points - 1).div_ceil(2) + 1).max(MIN_POINTS_PER_AXIS)
}

/// One cell of a mesh, ready to be warped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshCell {
    pub row: usize,
    pub col: usize,
    /// Corner positions: [top-left, top-right, bottom-right, bottom-left]
    pub corners: [Vec2; 4],
}

/// Grid of control points (row-major: index = row * cols + col)
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMesh {
    rows: usize,
    cols: usize,
    points: Vec<Vec2>,
}

impl ControlMesh {
    /// Create an evenly spaced grid centered on `center`
    pub fn create_grid(
        rows: usize,
        cols: usize,
        center: Vec2,
        spacing: f32,
    ) -> Result<Self, MappingError> {
        if rows < MIN_POINTS_PER_AXIS || cols < MIN_POINTS_PER_AXIS {
            return Err(MappingError::InvalidResolution { rows, cols });
        }

        let origin = center
            - Vec2::new(
                (cols - 1) as f32 * spacing / 2.0,
                (rows - 1) as f32 * spacing / 2.0,
            );

        let mut points = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                points.push(origin + Vec2::new(col as f32, row as f32) * spacing);
            }
        }

        Ok(Self { rows, cols, points })
    }

    /// Build a mesh from an existing row-major point list
    pub fn from_points(rows: usize, cols: usize, points: Vec<Vec2>) -> Result<Self, MappingError> {
        if rows < MIN_POINTS_PER_AXIS || cols < MIN_POINTS_PER_AXIS {
            return Err(MappingError::InvalidResolution { rows, cols });
        }
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            MappingError::InvalidLayout(format!("{}x{} mesh is too large", rows, cols))
        })?;
        if points.len() != expected {
            return Err(MappingError::InvalidLayout(format!(
                "expected {} points for a {}x{} mesh, found {}",
                expected,
                rows,
                cols,
                points.len()
            )));
        }
        Ok(Self { rows, cols, points })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get a point by row-major index
    pub fn point(&self, index: usize) -> Option<Vec2> {
        self.points.get(index).copied()
    }

    /// Get a point by grid coordinates
    pub fn point_at(&self, row: usize, col: usize) -> Vec2 {
        self.points[row.min(self.rows - 1) * self.cols + col.min(self.cols - 1)]
    }

    /// Move one point. Positions are not clamped to the canvas.
    ///
    /// Returns false if the index is out of range.
    pub fn move_point(&mut self, index: usize, position: Vec2) -> bool {
        match self.points.get_mut(index) {
            Some(point) => {
                *point = position;
                true
            }
            None => false,
        }
    }

    /// Move every point by `delta`
    pub fn translate(&mut self, delta: Vec2) {
        for point in &mut self.points {
            *point += delta;
        }
    }

    /// Index of the point nearest to `cursor`, if it lies within `tolerance`
    pub fn hit_test(&self, cursor: Vec2, tolerance: f32) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, point) in self.points.iter().enumerate() {
            let dist = point.distance(cursor);
            if dist <= tolerance && best.map_or(true, |(_, d)| dist < d) {
                best = Some((index, dist));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Bilinear position at grid coordinates (`gx` in 0..=cols-1, `gy` in 0..=rows-1)
    fn sample_grid(&self, gx: f32, gy: f32) -> Vec2 {
        let gx = gx.clamp(0.0, (self.cols - 1) as f32);
        let gy = gy.clamp(0.0, (self.rows - 1) as f32);

        let ix = (gx.floor() as usize).min(self.cols - 1);
        let iy = (gy.floor() as usize).min(self.rows - 1);
        let tx = gx - ix as f32;
        let ty = gy - iy as f32;

        let p00 = self.point_at(iy, ix);
        let p10 = self.point_at(iy, ix + 1);
        let p01 = self.point_at(iy + 1, ix);
        let p11 = self.point_at(iy + 1, ix + 1);

        let top = p00 + (p10 - p00) * tx;
        let bottom = p01 + (p11 - p01) * tx;
        top + (bottom - top) * ty
    }

    /// Sample the mesh at normalized coordinates (0.0-1.0 across the grid)
    pub fn sample(&self, u: f32, v: f32) -> Vec2 {
        self.sample_grid(u * (self.cols - 1) as f32, v * (self.rows - 1) as f32)
    }

    /// Resample onto a `rows` x `cols` grid at uniform parameters.
    ///
    /// Source nodes that land on the new grid keep their exact position.
    fn resampled(&self, rows: usize, cols: usize) -> Self {
        let mut points = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            let gy = (row * (self.rows - 1)) as f32 / (rows - 1) as f32;
            for col in 0..cols {
                let gx = (col * (self.cols - 1)) as f32 / (cols - 1) as f32;
                points.push(self.sample_grid(gx, gy));
            }
        }
        Self { rows, cols, points }
    }

    /// Insert a midpoint row/column between every neighbor pair.
    ///
    /// Returns false (mesh unchanged) if the result would exceed `max_points_per_axis`.
    pub fn increase_resolution(&mut self, max_points_per_axis: usize) -> bool {
        let rows = next_resolution(self.rows);
        let cols = next_resolution(self.cols);
        if rows > max_points_per_axis || cols > max_points_per_axis {
            return false;
        }
        *self = self.resampled(rows, cols);
        true
    }

    /// Drop to [`prev_resolution`] points per axis, keeping the corners.
    ///
    /// Returns false (mesh unchanged) if already at the minimum.
    pub fn decrease_resolution(&mut self) -> bool {
        if self.rows <= MIN_POINTS_PER_AXIS && self.cols <= MIN_POINTS_PER_AXIS {
            return false;
        }
        let rows = prev_resolution(self.rows);
        let cols = prev_resolution(self.cols);
        *self = self.resampled(rows, cols);
        true
    }

    /// The four corner points: [top-left, top-right, bottom-right, bottom-left]
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.point_at(0, 0),
            self.point_at(0, self.cols - 1),
            self.point_at(self.rows - 1, self.cols - 1),
            self.point_at(self.rows - 1, 0),
        ]
    }

    /// Boundary points in clockwise order starting at the top-left corner
    pub fn outline(&self) -> Vec<Vec2> {
        let mut outline = Vec::with_capacity(2 * (self.rows + self.cols));
        for col in 0..self.cols {
            outline.push(self.point_at(0, col));
        }
        for row in 1..self.rows {
            outline.push(self.point_at(row, self.cols - 1));
        }
        for col in (0..self.cols - 1).rev() {
            outline.push(self.point_at(self.rows - 1, col));
        }
        for row in (1..self.rows - 1).rev() {
            outline.push(self.point_at(row, 0));
        }
        outline
    }

    /// Whether `point` lies inside the mesh boundary (even-odd rule)
    pub fn contains(&self, point: Vec2) -> bool {
        let outline = self.outline();
        let mut inside = false;
        let mut j = outline.len() - 1;

        for i in 0..outline.len() {
            let pi = outline[i];
            let pj = outline[j];

            if ((pi.y > point.y) != (pj.y > point.y))
                && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
            {
                inside = !inside;
            }
            j = i;
        }

        inside
    }

    /// Iterate over the grid cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = MeshCell> + '_ {
        (0..self.rows - 1).flat_map(move |row| {
            (0..self.cols - 1).map(move |col| MeshCell {
                row,
                col,
                corners: [
                    self.point_at(row, col),
                    self.point_at(row, col + 1),
                    self.point_at(row + 1, col + 1),
                    self.point_at(row + 1, col),
                ],
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> ControlMesh {
        ControlMesh::create_grid(n, n, Vec2::new(100.0, 100.0), 10.0).unwrap()
    }

    #[test]
    fn test_create_grid_centered() {
        let mesh = grid(3);
        assert_eq!(mesh.len(), 9);
        assert_eq!(mesh.point_at(0, 0), Vec2::new(90.0, 90.0));
        assert_eq!(mesh.point_at(1, 1), Vec2::new(100.0, 100.0));
        assert_eq!(mesh.point_at(2, 2), Vec2::new(110.0, 110.0));
    }

    #[test]
    fn test_create_grid_rejects_coarse_resolution() {
        let err = ControlMesh::create_grid(1, 4, Vec2::ZERO, 10.0).unwrap_err();
        assert!(matches!(err, MappingError::InvalidResolution { rows: 1, cols: 4 }));
    }

    #[test]
    fn test_from_points_checks_count() {
        let err = ControlMesh::from_points(2, 2, vec![Vec2::ZERO; 3]).unwrap_err();
        assert!(matches!(err, MappingError::InvalidLayout(_)));
    }

    #[test]
    fn test_from_points_overflowing_size() {
        let err = ControlMesh::from_points(usize::MAX, 2, vec![Vec2::ZERO; 4]).unwrap_err();
        assert!(matches!(err, MappingError::InvalidLayout(_)));
    }

    #[test]
    fn test_resolution_steps() {
        assert_eq!(next_resolution(6), 11);
        assert_eq!(prev_resolution(11), 6);
        assert_eq!(prev_resolution(6), 4);
        assert_eq!(prev_resolution(3), 2);
        assert_eq!(prev_resolution(2), 2);
    }

    #[test]
    fn test_increase_keeps_existing_points() {
        let mut mesh = grid(3);
        mesh.move_point(4, Vec2::new(104.0, 97.0));
        let before = mesh.clone();

        assert!(mesh.increase_resolution(65));
        assert_eq!(mesh.rows(), 5);
        assert_eq!(mesh.cols(), 5);

        for row in 0..3 {
            for col in 0..3 {
                assert_eq!(mesh.point_at(row * 2, col * 2), before.point_at(row, col));
            }
        }
        // Inserted midpoint between (0,0) and (0,1)
        assert_eq!(mesh.point_at(0, 1), Vec2::new(95.0, 90.0));
    }

    #[test]
    fn test_decrease_after_increase_restores_mesh() {
        let mut mesh = grid(6);
        mesh.move_point(7, Vec2::new(50.0, 20.0));
        mesh.move_point(35, Vec2::new(300.0, 310.0));
        let before = mesh.clone();

        assert!(mesh.increase_resolution(65));
        assert!(mesh.decrease_resolution());
        assert_eq!(mesh.len(), before.len());
        for (a, b) in mesh.points().iter().zip(before.points()) {
            assert!(a.distance(*b) < 1e-4);
        }
    }

    #[test]
    fn test_increase_respects_maximum() {
        let mut mesh = grid(6);
        assert!(!mesh.increase_resolution(10));
        assert_eq!(mesh.rows(), 6);
    }

    #[test]
    fn test_decrease_at_minimum_is_noop() {
        let mut mesh = grid(2);
        assert!(!mesh.decrease_resolution());
        assert_eq!(mesh.len(), 4);
    }

    #[test]
    fn test_decrease_keeps_corners() {
        let mut mesh = grid(6);
        mesh.move_point(0, Vec2::new(-20.0, -30.0));
        let corners = mesh.corners();
        assert!(mesh.decrease_resolution());
        assert_eq!(mesh.rows(), 4);
        assert_eq!(mesh.corners(), corners);
    }

    #[test]
    fn test_hit_test_nearest_within_tolerance() {
        let mesh = grid(3);
        assert_eq!(mesh.hit_test(Vec2::new(101.0, 99.0), 5.0), Some(4));
        assert_eq!(mesh.hit_test(Vec2::new(95.0, 95.0), 5.0), None);
    }

    #[test]
    fn test_move_point_unclamped() {
        let mut mesh = grid(2);
        assert!(mesh.move_point(3, Vec2::new(-500.0, 9000.0)));
        assert_eq!(mesh.point(3), Some(Vec2::new(-500.0, 9000.0)));
        assert!(!mesh.move_point(4, Vec2::ZERO));
    }

    #[test]
    fn test_contains_and_outline() {
        let mesh = grid(3);
        assert_eq!(mesh.outline().len(), 8);
        assert!(mesh.contains(Vec2::new(100.0, 100.0)));
        assert!(!mesh.contains(Vec2::new(150.0, 100.0)));
    }

    #[test]
    fn test_cells() {
        let mesh = grid(3);
        let cells: Vec<_> = mesh.cells().collect();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[3].corners[2], Vec2::new(110.0, 110.0));
    }
}
