//! CPU rasterization: warping frames through a mesh and drawing the
//! calibration overlay

use glam::Vec2;
use image::{Rgba, RgbaImage};

use super::homography::Homography;
use super::mesh::ControlMesh;

/// Slack on the unit-square test so neighboring cells leave no seams
const CELL_EDGE_SLACK: f32 = 1e-3;

/// Warp `frame` onto `canvas` through every cell of `mesh`.
///
/// Cell (row, col) shows the matching sub-rectangle of the frame, mapped with
/// a perspective transform. Degenerate cells are skipped.
pub fn warp_mesh(canvas: &mut RgbaImage, frame: &RgbaImage, mesh: &ControlMesh) {
    if frame.width() == 0 || frame.height() == 0 {
        return;
    }
    let cols = (mesh.cols() - 1) as f32;
    let rows = (mesh.rows() - 1) as f32;

    for cell in mesh.cells() {
        let u0 = cell.col as f32 / cols;
        let v0 = cell.row as f32 / rows;
        let source = [u0, v0, (cell.col + 1) as f32 / cols, (cell.row + 1) as f32 / rows];
        warp_cell(canvas, frame, cell.corners, source);
    }
}

/// Warp one frame region (`[u0, v0, u1, v1]`, normalized) onto a quad
fn warp_cell(canvas: &mut RgbaImage, frame: &RgbaImage, corners: [Vec2; 4], source: [f32; 4]) {
    let Some(inverse) = Homography::unit_square_to_quad(corners).and_then(|h| h.inverse()) else {
        return;
    };

    let min = corners.iter().fold(Vec2::splat(f32::MAX), |acc, c| acc.min(*c));
    let max = corners.iter().fold(Vec2::splat(f32::MIN), |acc, c| acc.max(*c));

    let x0 = min.x.floor().max(0.0) as u32;
    let y0 = min.y.floor().max(0.0) as u32;
    let x1 = (max.x.ceil().max(0.0) as u32).min(canvas.width());
    let y1 = (max.y.ceil().max(0.0) as u32).min(canvas.height());

    let [u0, v0, u1, v1] = source;
    let frame_size = Vec2::new(frame.width() as f32, frame.height() as f32);

    for y in y0..y1 {
        for x in x0..x1 {
            let pixel_center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let Some(st) = inverse.transform_point(pixel_center) else {
                continue;
            };
            if st.x < -CELL_EDGE_SLACK
                || st.x > 1.0 + CELL_EDGE_SLACK
                || st.y < -CELL_EDGE_SLACK
                || st.y > 1.0 + CELL_EDGE_SLACK
            {
                continue;
            }

            let uv = Vec2::new(u0 + st.x * (u1 - u0), v0 + st.y * (v1 - v0));
            let texel = sample_bilinear(frame, uv * frame_size - Vec2::splat(0.5));
            blend_pixel(canvas, x, y, texel);
        }
    }
}

/// Bilinear sample at texel coordinates, clamped to the frame edge
pub fn sample_bilinear(frame: &RgbaImage, position: Vec2) -> Rgba<u8> {
    if frame.width() == 0 || frame.height() == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let last_x = frame.width() - 1;
    let last_y = frame.height() - 1;
    let px = position.x.clamp(0.0, last_x as f32);
    let py = position.y.clamp(0.0, last_y as f32);

    let ix = (px.floor() as u32).min(last_x);
    let iy = (py.floor() as u32).min(last_y);
    let nx = (ix + 1).min(last_x);
    let ny = (iy + 1).min(last_y);
    let tx = px - ix as f32;
    let ty = py - iy as f32;

    let p00 = frame.get_pixel(ix, iy).0;
    let p10 = frame.get_pixel(nx, iy).0;
    let p01 = frame.get_pixel(ix, ny).0;
    let p11 = frame.get_pixel(nx, ny).0;

    let mut out = [0u8; 4];
    for channel in 0..4 {
        let top = p00[channel] as f32 + (p10[channel] as f32 - p00[channel] as f32) * tx;
        let bottom = p01[channel] as f32 + (p11[channel] as f32 - p01[channel] as f32) * tx;
        out[channel] = (top + (bottom - top) * ty).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Source-over blend of one pixel
pub fn blend_pixel(canvas: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    if x >= canvas.width() || y >= canvas.height() {
        return;
    }
    let alpha = color.0[3] as f32 / 255.0;
    if alpha <= 0.0 {
        return;
    }
    let dst = canvas.get_pixel_mut(x, y);
    if alpha >= 1.0 {
        *dst = color;
        return;
    }

    let dst_alpha = dst.0[3] as f32 / 255.0;
    let out_alpha = alpha + dst_alpha * (1.0 - alpha);
    for channel in 0..3 {
        let src = color.0[channel] as f32 * alpha;
        let below = dst.0[channel] as f32 * dst_alpha * (1.0 - alpha);
        dst.0[channel] = ((src + below) / out_alpha).round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_alpha * 255.0).round() as u8;
}

/// Clip a segment to the `[0, width] x [0, height]` box (Liang-Barsky).
///
/// Runs in f64 so far off-canvas endpoints keep sub-pixel precision.
fn clip_segment(from: Vec2, to: Vec2, width: u32, height: u32) -> Option<(Vec2, Vec2)> {
    let from = from.as_dvec2();
    let delta = to.as_dvec2() - from;
    let (mut t0, mut t1) = (0.0f64, 1.0f64);

    let edges = [
        (-delta.x, from.x),
        (delta.x, width as f64 - from.x),
        (-delta.y, from.y),
        (delta.y, height as f64 - from.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some(((from + delta * t0).as_vec2(), (from + delta * t1).as_vec2()))
}

/// Draw a one-pixel line (DDA), clipped to the canvas
pub fn draw_line(canvas: &mut RgbaImage, from: Vec2, to: Vec2, color: Rgba<u8>) {
    if !from.is_finite() || !to.is_finite() {
        return;
    }
    let Some((from, to)) = clip_segment(from, to, canvas.width(), canvas.height()) else {
        return;
    };
    let delta = to - from;
    let steps = delta.x.abs().max(delta.y.abs()).ceil().max(1.0);
    let step = delta / steps;
    let mut point = from;
    for _ in 0..=(steps as u32) {
        if point.x >= 0.0 && point.y >= 0.0 {
            blend_pixel(canvas, point.x as u32, point.y as u32, color);
        }
        point += step;
    }
}

/// Draw a filled square handle centered on `center`.
///
/// Handles entirely off the canvas are skipped.
pub fn draw_handle(canvas: &mut RgbaImage, center: Vec2, half_size: i32, color: Rgba<u8>) {
    let half = half_size.max(0) as i64;
    let reach = half as f32 + 1.0;
    if !center.is_finite()
        || center.x < -reach
        || center.y < -reach
        || center.x > canvas.width() as f32 + reach
        || center.y > canvas.height() as f32 + reach
    {
        return;
    }

    let cx = center.x.round() as i64;
    let cy = center.y.round() as i64;
    for y in (cy - half)..=(cy + half) {
        for x in (cx - half)..=(cx + half) {
            if x >= 0 && y >= 0 {
                blend_pixel(canvas, x as u32, y as u32, color);
            }
        }
    }
}

/// Draw every row and column line of a mesh
pub fn draw_mesh_lines(canvas: &mut RgbaImage, mesh: &ControlMesh, color: Rgba<u8>) {
    for row in 0..mesh.rows() {
        for col in 0..mesh.cols() {
            let point = mesh.point_at(row, col);
            if col + 1 < mesh.cols() {
                draw_line(canvas, point, mesh.point_at(row, col + 1), color);
            }
            if row + 1 < mesh.rows() {
                draw_line(canvas, point, mesh.point_at(row + 1, col), color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warp_fills_quad_interior() {
        let mut canvas = RgbaImage::new(100, 100);
        let frame = RgbaImage::from_pixel(8, 8, Rgba([200, 10, 10, 255]));
        let mesh = ControlMesh::create_grid(2, 2, Vec2::new(50.0, 50.0), 40.0).unwrap();

        warp_mesh(&mut canvas, &frame, &mesh);

        assert_eq!(canvas.get_pixel(50, 50).0, [200, 10, 10, 255]);
        assert_eq!(canvas.get_pixel(5, 5).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_warp_maps_frame_halves_to_mesh_halves() {
        let mut frame = RgbaImage::from_pixel(2, 1, Rgba([255, 0, 0, 255]));
        frame.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let mut canvas = RgbaImage::new(100, 100);
        let mesh = ControlMesh::create_grid(2, 2, Vec2::new(50.0, 50.0), 80.0).unwrap();

        warp_mesh(&mut canvas, &frame, &mesh);

        assert_eq!(canvas.get_pixel(15, 50).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(85, 50).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_warp_clips_to_canvas() {
        let mut canvas = RgbaImage::new(20, 20);
        let frame = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let mesh = ControlMesh::create_grid(3, 3, Vec2::new(0.0, 0.0), 50.0).unwrap();
        warp_mesh(&mut canvas, &frame, &mesh);
        assert_eq!(canvas.get_pixel(10, 10).0, [1, 2, 3, 255]);
    }

    #[test]
    fn test_blend_half_alpha() {
        let mut canvas = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        blend_pixel(&mut canvas, 0, 0, Rgba([255, 255, 255, 128]));
        let p = canvas.get_pixel(0, 0).0;
        assert!(p[0] > 120 && p[0] < 135);
        assert_eq!(p[3], 255);
    }

    #[test]
    fn test_long_line_clipped_not_dropped() {
        let mut canvas = RgbaImage::new(100, 100);
        let white = Rgba([255, 255, 255, 255]);
        draw_line(&mut canvas, Vec2::new(-1.0e6, 50.0), Vec2::new(1.0e6, 50.0), white);
        assert_eq!(canvas.get_pixel(0, 50).0, white.0);
        assert_eq!(canvas.get_pixel(50, 50).0, white.0);
        assert_eq!(canvas.get_pixel(99, 50).0, white.0);
        assert_eq!(canvas.get_pixel(50, 49).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_line_outside_canvas_draws_nothing() {
        let mut canvas = RgbaImage::new(10, 10);
        let white = Rgba([255, 255, 255, 255]);
        draw_line(&mut canvas, Vec2::new(-50.0, -5.0), Vec2::new(50.0, -5.0), white);
        draw_line(&mut canvas, Vec2::new(3.0e9, 5.0), Vec2::new(4.0e9, 5.0), white);
        assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_handle_far_off_canvas_is_skipped() {
        let mut canvas = RgbaImage::new(10, 10);
        let white = Rgba([255, 255, 255, 255]);
        draw_handle(&mut canvas, Vec2::new(3.0e9, 5.0), 3, white);
        draw_handle(&mut canvas, Vec2::new(-3.0e9, -3.0e9), 3, white);
        draw_handle(&mut canvas, Vec2::new(f32::MAX, f32::MAX), 3, white);
        assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0, 0]));

        // Partly visible handle on the right edge
        draw_handle(&mut canvas, Vec2::new(11.0, 5.0), 3, white);
        assert_eq!(canvas.get_pixel(9, 5).0, white.0);
    }

    #[test]
    fn test_draw_handle_and_line() {
        let mut canvas = RgbaImage::new(10, 10);
        let white = Rgba([255, 255, 255, 255]);
        draw_handle(&mut canvas, Vec2::new(0.0, 0.0), 1, white);
        assert_eq!(canvas.get_pixel(1, 1).0, white.0);
        draw_line(&mut canvas, Vec2::new(0.0, 5.0), Vec2::new(9.0, 5.0), white);
        assert_eq!(canvas.get_pixel(9, 5).0, white.0);
    }
}
