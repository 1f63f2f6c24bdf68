//! Mapping engine
//!
//! Owns the surfaces, the registered sketches and the calibrate/render mode.
//! The host forwards input events and asks for one composited frame per tick.

use std::path::{Path, PathBuf};

use glam::Vec2;
use image::{imageops, Rgba, RgbaImage};

use super::error::{MappingError, UnresolvedBinding};
use super::input::{Key, KeyEvent, KeyPhase, PointerEvent, PointerPhase};
use super::layout::LayoutDocument;
use super::raster;
use super::registry::SurfaceRegistry;
use super::source::{Sketch, SourceId, SourceRegistry};
use super::surface::{ForceAxis, FramePull, SurfaceId, SurfaceKind};
use crate::settings::MapperSettings;

const CANVAS_CLEAR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const MESH_LINE: Rgba<u8> = Rgba([255, 255, 255, 96]);
const SELECTED_MESH_LINE: Rgba<u8> = Rgba([255, 220, 0, 160]);
const HANDLE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const SELECTED_HANDLE: Rgba<u8> = Rgba([255, 220, 0, 255]);
const HANDLE_HALF_SIZE: i32 = 3;

/// Engine mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Editing: overlay visible, pointer edits geometry
    #[default]
    Calibrate,
    /// Performance: warped output only
    Render,
}

/// What the current pointer drag is moving
#[derive(Debug, Clone, Copy, PartialEq)]
enum DragTarget {
    Point { surface: SurfaceId, index: usize },
    Surface { surface: SurfaceId, last: Vec2 },
}

pub struct MappingEngine {
    settings: MapperSettings,
    mode: Mode,
    registry: SurfaceRegistry,
    sources: SourceRegistry,
    background: Option<RgbaImage>,
    layout_path: Option<PathBuf>,
    initialized: bool,
    drag: Option<DragTarget>,
    canvas: RgbaImage,
    unresolved: Vec<UnresolvedBinding>,
}

impl MappingEngine {
    /// Engine for a canvas of the given size with default settings
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_settings(MapperSettings::with_canvas(width, height))
    }

    pub fn with_settings(mut settings: MapperSettings) -> Self {
        settings.clamp();
        let canvas =
            RgbaImage::from_pixel(settings.canvas_width, settings.canvas_height, CANVAS_CLEAR);
        let layout_path = settings.layout_file.as_ref().map(PathBuf::from);
        Self {
            settings,
            mode: Mode::default(),
            registry: SurfaceRegistry::new(),
            sources: SourceRegistry::new(),
            background: None,
            layout_path,
            initialized: false,
            drag: None,
            canvas,
            unresolved: Vec::new(),
        }
    }

    pub fn settings(&self) -> &MapperSettings {
        &self.settings
    }

    pub fn width(&self) -> u32 {
        self.settings.canvas_width
    }

    pub fn height(&self) -> u32 {
        self.settings.canvas_height
    }

    fn center(&self) -> Vec2 {
        Vec2::new(self.width() as f32 / 2.0, self.height() as f32 / 2.0)
    }

    /// Layout file loaded by `initialize()`
    pub fn set_layout_path(&mut self, path: impl Into<PathBuf>) {
        self.layout_path = Some(path.into());
    }

    pub fn layout_path(&self) -> Option<&Path> {
        self.layout_path.as_deref()
    }

    pub fn registry(&self) -> &SurfaceRegistry {
        &self.registry
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    // ========== Sources ==========

    /// Register a sketch. A lone existing surface is bound to it.
    pub fn add_source(&mut self, sketch: Box<dyn Sketch>) -> SourceId {
        let id = self.sources.add(sketch);
        if self.registry.len() == 1 {
            if let Some(surface) = self.registry.surfaces_mut().next() {
                surface.bind_source(Some(id));
            }
        }
        id
    }

    /// Unregister a sketch and unbind every surface that showed it
    pub fn remove_source(&mut self, id: SourceId) -> Option<Box<dyn Sketch>> {
        let sketch = self.sources.remove(id)?;
        for surface in self.registry.surfaces_mut() {
            if surface.source() == Some(id) {
                surface.unbind_source();
            }
        }
        Some(sketch)
    }

    /// Labels of registered sketches, in registration order
    pub fn source_labels(&self) -> Vec<&str> {
        self.sources.labels()
    }

    // ========== Lifecycle and mode ==========

    /// Load the configured layout, or create the default surface.
    ///
    /// Runs once; later calls do nothing.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        if let Some(path) = self.settings.background_image.clone() {
            if let Err(e) = self.set_background_image(Path::new(&path)) {
                tracing::warn!("Failed to load background image {:?}: {}", path, e);
            }
        }

        match self.layout_path.clone() {
            Some(path) => {
                if let Err(e) = self.load_layout(&path) {
                    tracing::warn!("Failed to load layout {:?}: {}", path, e);
                }
            }
            None => self.create_default_surface(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Replace all surfaces with one quad at the canvas center
    fn create_default_surface(&mut self) {
        self.registry = SurfaceRegistry::new();
        self.drag = None;
        self.unresolved.clear();
        match self.registry.create_surface(
            SurfaceKind::Quad,
            self.settings.initial_resolution,
            self.center(),
            self.settings.surface_size,
        ) {
            Ok(id) => {
                let first = self.sources.first();
                if let Some(surface) = self.registry.get_mut(id) {
                    surface.bind_source(first);
                }
                self.registry.set_most_recent(Some(id));
            }
            Err(e) => tracing::warn!("Failed to create default surface: {}", e),
        }
    }

    /// Switch between calibrate and render mode
    pub fn toggle_calibration(&mut self) {
        self.mode = match self.mode {
            Mode::Calibrate => Mode::Render,
            Mode::Render => Mode::Calibrate,
        };
        self.drag = None;
        tracing::info!("Mode: {:?}", self.mode);
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the host should show its editing panel
    pub fn editing_ui_visible(&self) -> bool {
        self.mode == Mode::Calibrate
    }

    // ========== Selection queries ==========

    /// Id and type of the most recently active surface
    pub fn active_surface(&self) -> Option<(SurfaceId, SurfaceKind)> {
        self.registry.active().map(|s| (s.id(), s.kind()))
    }

    pub fn selected(&self) -> Vec<SurfaceId> {
        self.registry.selected()
    }

    /// Select surfaces from the host panel
    pub fn select_surfaces(&mut self, ids: impl IntoIterator<Item = SurfaceId>) {
        self.registry.select(ids);
    }

    // ========== Operator commands ==========

    /// Create a surface at the canvas center bound to the first sketch
    pub fn create_surface(&mut self, kind: SurfaceKind) -> Result<SurfaceId, MappingError> {
        let id = self.registry.create_surface(
            kind,
            self.settings.initial_resolution,
            self.center(),
            self.settings.surface_size,
        )?;
        let first = self.sources.first();
        if let Some(surface) = self.registry.get_mut(id) {
            surface.bind_source(first);
        }
        self.registry.select([id]);
        Ok(id)
    }

    pub fn delete_surface(&mut self, id: SurfaceId) -> bool {
        if self.drag_surface() == Some(id) {
            self.drag = None;
        }
        self.registry.delete_surface(id).is_some()
    }

    /// Delete the most recently active surface and clear the selection
    pub fn delete_active_surface(&mut self) -> Option<SurfaceId> {
        let id = self.registry.active()?.id();
        self.delete_surface(id);
        self.registry.clear_selection();
        Some(id)
    }

    pub fn increase_resolution(&mut self) -> bool {
        let max = self.settings.max_points_per_axis;
        let Some(surface) = self.registry.active_mut() else {
            return false;
        };
        let changed = surface.increase_resolution(max);
        if changed {
            tracing::debug!("{} resolution now {}", surface.id(), surface.resolution());
        } else {
            tracing::debug!("{} already at maximum resolution", surface.id());
        }
        changed
    }

    pub fn decrease_resolution(&mut self) -> bool {
        let Some(surface) = self.registry.active_mut() else {
            return false;
        };
        let changed = surface.decrease_resolution();
        if changed {
            tracing::debug!("{} resolution now {}", surface.id(), surface.resolution());
        } else {
            tracing::debug!("{} already at minimum resolution", surface.id());
        }
        changed
    }

    /// Nudge a bezier force of the active surface by `steps` force steps
    pub fn adjust_force(&mut self, axis: ForceAxis, steps: i32) -> bool {
        let delta = steps as f32 * self.settings.force_step;
        let max = self.settings.max_force;
        self.registry
            .active_mut()
            .map(|s| s.set_force(axis, delta, max))
            .unwrap_or(false)
    }

    /// Bind the active surface to the sketch with the given label
    pub fn bind_active_source(&mut self, label: &str) -> bool {
        let Some(source) = self.sources.find_by_label(label) else {
            tracing::warn!("No sketch named '{}'", label);
            return false;
        };
        match self.registry.active_mut() {
            Some(surface) => {
                surface.bind_source(Some(source));
                true
            }
            None => false,
        }
    }

    /// Load a reference image shown behind surfaces while calibrating
    pub fn set_background_image(&mut self, path: &Path) -> Result<(), MappingError> {
        let image = image::open(path)?.to_rgba8();
        let image = if image.dimensions() == self.canvas.dimensions() {
            image
        } else {
            imageops::resize(
                &image,
                self.width(),
                self.height(),
                imageops::FilterType::Triangle,
            )
        };
        self.background = Some(image);
        tracing::info!("Background image set from {:?}", path);
        Ok(())
    }

    pub fn clear_background_image(&mut self) {
        self.background = None;
    }

    // ========== Input ==========

    fn drag_surface(&self) -> Option<SurfaceId> {
        match self.drag {
            Some(DragTarget::Point { surface, .. }) | Some(DragTarget::Surface { surface, .. }) => {
                Some(surface)
            }
            None => None,
        }
    }

    /// Handle a pointer event, then forward it to every sketch
    pub fn handle_pointer(&mut self, event: &PointerEvent) {
        match self.mode {
            Mode::Calibrate => self.calibrate_pointer(event),
            Mode::Render => {
                if event.is_double_release() {
                    self.toggle_calibration();
                }
            }
        }
        self.sources.broadcast_pointer(event);
    }

    fn calibrate_pointer(&mut self, event: &PointerEvent) {
        let cursor = event.position;
        match event.phase {
            PointerPhase::Press => {
                if let Some((surface, index)) =
                    self.registry.topmost_point_hit(cursor, self.settings.hit_tolerance)
                {
                    self.registry.select([surface]);
                    self.drag = Some(DragTarget::Point { surface, index });
                } else if let Some(surface) = self.registry.topmost_body_hit(cursor) {
                    self.registry.select([surface]);
                    self.drag = Some(DragTarget::Surface { surface, last: cursor });
                } else {
                    self.registry.clear_selection();
                    self.drag = None;
                }
            }
            PointerPhase::Drag => match self.drag {
                Some(DragTarget::Point { surface, index }) => {
                    if let Some(s) = self.registry.get_mut(surface) {
                        s.move_point(index, cursor);
                    }
                }
                Some(DragTarget::Surface { surface, last }) => {
                    if let Some(s) = self.registry.get_mut(surface) {
                        s.translate(cursor - last);
                    }
                    self.drag = Some(DragTarget::Surface { surface, last: cursor });
                }
                None => {}
            },
            PointerPhase::Release => self.drag = None,
        }
    }

    /// Handle a key event, then forward it to every sketch
    pub fn handle_key(&mut self, event: &KeyEvent) {
        let delete_pressed = event.phase == KeyPhase::Press && event.key == Key::Delete;
        if self.mode == Mode::Calibrate && delete_pressed {
            if let Some(id) = self.delete_active_surface() {
                tracing::debug!("Delete key removed {}", id);
            }
        }
        self.sources.broadcast_key(event);
    }

    // ========== Output ==========

    /// Composite one frame.
    ///
    /// Calibrate: background, surfaces with their sketches' current frames,
    /// then the editing overlay. Render: each surface asks its sketch for a
    /// new frame and only warped output is drawn.
    pub fn render_frame(&mut self) -> &RgbaImage {
        if !self.initialized {
            self.initialize();
        }

        for pixel in self.canvas.pixels_mut() {
            *pixel = CANVAS_CLEAR;
        }

        let pull = match self.mode {
            Mode::Calibrate => FramePull::Latest,
            Mode::Render => FramePull::Fresh,
        };

        if self.mode == Mode::Calibrate {
            if let Some(background) = &self.background {
                imageops::overlay(&mut self.canvas, background, 0, 0);
            }
        }

        for surface in self.registry.surfaces() {
            surface.render(&mut self.canvas, &mut self.sources, pull);
        }

        if self.mode == Mode::Calibrate {
            self.draw_overlay();
        }

        &self.canvas
    }

    /// The most recently composited frame
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    fn draw_overlay(&mut self) {
        for surface in self.registry.surfaces() {
            let selected = self.registry.is_selected(surface.id());
            let (line, handle) = if selected {
                (SELECTED_MESH_LINE, SELECTED_HANDLE)
            } else {
                (MESH_LINE, HANDLE)
            };

            if surface.kind() == SurfaceKind::Bezier {
                raster::draw_mesh_lines(&mut self.canvas, &surface.render_mesh(), MESH_LINE);
            }
            raster::draw_mesh_lines(&mut self.canvas, surface.mesh(), line);
            for point in surface.mesh().points() {
                raster::draw_handle(&mut self.canvas, *point, HANDLE_HALF_SIZE, handle);
            }
        }
    }

    // ========== Persistence ==========

    pub fn save_layout(&self, path: &Path) -> Result<(), MappingError> {
        LayoutDocument::from_registry(&self.registry, &self.sources).save_to_file(path)
    }

    /// Replace all surfaces with the ones in `path`.
    ///
    /// On failure the engine falls back to the default single surface.
    pub fn load_layout(&mut self, path: &Path) -> Result<Vec<UnresolvedBinding>, MappingError> {
        let max_points = self.settings.max_points_per_axis;
        let loaded = LayoutDocument::load_from_file(path)
            .and_then(|doc| doc.into_registry(&self.sources, max_points));
        match loaded {
            Ok((registry, unresolved)) => {
                self.registry = registry;
                self.drag = None;
                self.unresolved = unresolved.clone();
                Ok(unresolved)
            }
            Err(e) => {
                self.create_default_surface();
                Err(e)
            }
        }
    }

    /// Source labels from the last load that matched no sketch
    pub fn unresolved_bindings(&self) -> &[UnresolvedBinding] {
        &self.unresolved
    }
}
