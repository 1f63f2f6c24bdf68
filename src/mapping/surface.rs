//! Surface definition
//!
//! A Surface is one projection target: a control mesh, a type tag, a render
//! resolution, an optional bound sketch and (for bezier surfaces) two force
//! parameters.

use glam::Vec2;
use image::RgbaImage;

use super::bezier::{BezierPatch, BEZIER_NET_SIZE};
use super::error::MappingError;
use super::mesh::{self, ControlMesh, MIN_POINTS_PER_AXIS};
use super::raster;
use super::source::{SourceId, SourceRegistry};

/// Unique identifier for a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SurfaceId(pub u32);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Surface {}", self.0)
    }
}

/// Surface type, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// Grid of perspective-mapped cells
    Quad,
    /// Bicubic bezier patch
    Bezier,
}

impl SurfaceKind {
    /// Name used in layout files
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceKind::Quad => "QUAD",
            SurfaceKind::Bezier => "BEZIER",
        }
    }

    /// Parse a layout-file name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("QUAD") {
            Some(SurfaceKind::Quad)
        } else if name.eq_ignore_ascii_case("BEZIER") {
            Some(SurfaceKind::Bezier)
        } else {
            None
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            SurfaceKind::Quad => "Quad",
            SurfaceKind::Bezier => "Bezier",
        }
    }
}

/// Bezier force axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceAxis {
    Horizontal,
    Vertical,
}

/// Whether rendering asks the sketch for a new frame first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePull {
    /// Call `draw()` before reading the frame
    Fresh,
    /// Use whatever frame the sketch currently holds
    Latest,
}

/// A projection surface
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    id: SurfaceId,
    kind: SurfaceKind,
    mesh: ControlMesh,
    /// Quad: control points per axis. Bezier: render points per axis.
    resolution: usize,
    source: Option<SourceId>,
    horizontal_force: f32,
    vertical_force: f32,
}

impl Surface {
    /// Create a surface centered on `center`, `size` pixels across
    pub fn new(
        id: SurfaceId,
        kind: SurfaceKind,
        resolution: usize,
        center: Vec2,
        size: f32,
    ) -> Result<Self, MappingError> {
        if resolution < MIN_POINTS_PER_AXIS {
            return Err(MappingError::InvalidResolution {
                rows: resolution,
                cols: resolution,
            });
        }

        let net_points = match kind {
            SurfaceKind::Quad => resolution,
            SurfaceKind::Bezier => BEZIER_NET_SIZE,
        };
        let spacing = size / (net_points - 1) as f32;
        let mesh = ControlMesh::create_grid(net_points, net_points, center, spacing)?;

        Ok(Self {
            id,
            kind,
            mesh,
            resolution,
            source: None,
            horizontal_force: 0.0,
            vertical_force: 0.0,
        })
    }

    /// Rebuild a surface from persisted parts
    pub fn from_parts(
        id: SurfaceId,
        kind: SurfaceKind,
        mesh: ControlMesh,
        resolution: usize,
        forces: (f32, f32),
    ) -> Result<Self, MappingError> {
        if resolution < MIN_POINTS_PER_AXIS {
            return Err(MappingError::InvalidResolution {
                rows: resolution,
                cols: resolution,
            });
        }
        match kind {
            SurfaceKind::Quad => {
                if mesh.rows() != resolution || mesh.cols() != resolution {
                    return Err(MappingError::InvalidLayout(format!(
                        "{}: quad resolution {} does not match a {}x{} mesh",
                        id,
                        resolution,
                        mesh.rows(),
                        mesh.cols()
                    )));
                }
            }
            SurfaceKind::Bezier => {
                if mesh.rows() != BEZIER_NET_SIZE || mesh.cols() != BEZIER_NET_SIZE {
                    return Err(MappingError::InvalidLayout(format!(
                        "{}: bezier control net must be {}x{}",
                        id, BEZIER_NET_SIZE, BEZIER_NET_SIZE
                    )));
                }
            }
        }
        if !forces.0.is_finite() || !forces.1.is_finite() {
            return Err(MappingError::InvalidLayout(format!("{}: non-finite force", id)));
        }

        let (horizontal_force, vertical_force) = match kind {
            SurfaceKind::Quad => (0.0, 0.0),
            SurfaceKind::Bezier => forces,
        };

        Ok(Self {
            id,
            kind,
            mesh,
            resolution,
            source: None,
            horizontal_force,
            vertical_force,
        })
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn mesh(&self) -> &ControlMesh {
        &self.mesh
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn source(&self) -> Option<SourceId> {
        self.source
    }

    pub fn horizontal_force(&self) -> f32 {
        self.horizontal_force
    }

    pub fn vertical_force(&self) -> f32 {
        self.vertical_force
    }

    /// Bind a sketch. `None` leaves the current binding in place.
    pub fn bind_source(&mut self, source: Option<SourceId>) {
        if let Some(source) = source {
            self.source = Some(source);
        }
    }

    pub fn unbind_source(&mut self) {
        self.source = None;
    }

    /// Move one control point
    pub fn move_point(&mut self, index: usize, position: Vec2) -> bool {
        self.mesh.move_point(index, position)
    }

    /// Move the whole surface
    pub fn translate(&mut self, delta: Vec2) {
        self.mesh.translate(delta);
    }

    /// Adjust a bezier force by `delta`, clamped to +/- `max_force`.
    ///
    /// Quad surfaces ignore this and return false.
    pub fn set_force(&mut self, axis: ForceAxis, delta: f32, max_force: f32) -> bool {
        if self.kind != SurfaceKind::Bezier {
            return false;
        }
        let force = match axis {
            ForceAxis::Horizontal => &mut self.horizontal_force,
            ForceAxis::Vertical => &mut self.vertical_force,
        };
        *force = (*force + delta).clamp(-max_force, max_force);
        true
    }

    /// One resolution step up. Returns false if already at `max_points_per_axis`.
    pub fn increase_resolution(&mut self, max_points_per_axis: usize) -> bool {
        match self.kind {
            SurfaceKind::Quad => {
                let changed = self.mesh.increase_resolution(max_points_per_axis);
                self.resolution = self.mesh.rows();
                changed
            }
            SurfaceKind::Bezier => {
                let next = mesh::next_resolution(self.resolution);
                if next > max_points_per_axis {
                    return false;
                }
                self.resolution = next;
                true
            }
        }
    }

    /// One resolution step down. Returns false if already at the minimum.
    pub fn decrease_resolution(&mut self) -> bool {
        match self.kind {
            SurfaceKind::Quad => {
                let changed = self.mesh.decrease_resolution();
                self.resolution = self.mesh.rows();
                changed
            }
            SurfaceKind::Bezier => {
                if self.resolution <= MIN_POINTS_PER_AXIS {
                    return false;
                }
                self.resolution = mesh::prev_resolution(self.resolution);
                true
            }
        }
    }

    /// The fine mesh used for drawing
    pub fn render_mesh(&self) -> ControlMesh {
        match self.kind {
            SurfaceKind::Quad => self.mesh.clone(),
            SurfaceKind::Bezier => {
                let patch =
                    BezierPatch::from_mesh(&self.mesh, self.horizontal_force, self.vertical_force);
                match patch {
                    Some(patch) => {
                        let points = patch.tessellate(self.resolution);
                        ControlMesh::from_points(self.resolution, self.resolution, points)
                            .unwrap_or_else(|_| self.mesh.clone())
                    }
                    None => self.mesh.clone(),
                }
            }
        }
    }

    /// Whether `point` lies inside the surface as drawn
    pub fn contains(&self, point: Vec2) -> bool {
        self.render_mesh().contains(point)
    }

    /// Draw the bound sketch's frame warped onto `canvas`.
    ///
    /// Returns false (and touches neither canvas nor sketch) when unbound.
    pub fn render(
        &self,
        canvas: &mut RgbaImage,
        sources: &mut SourceRegistry,
        pull: FramePull,
    ) -> bool {
        let Some(source_id) = self.source else {
            return false;
        };
        let Some(sketch) = sources.get_mut(source_id) else {
            return false;
        };

        if pull == FramePull::Fresh {
            sketch.draw();
        }
        raster::warp_mesh(canvas, sketch.frame(), &self.render_mesh());
        true
    }
}
