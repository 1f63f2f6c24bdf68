//! Surface registry: ownership, identity, selection

use std::collections::BTreeSet;

use glam::Vec2;

use super::error::MappingError;
use super::surface::{Surface, SurfaceId, SurfaceKind};

/// All surfaces, in paint order (first created is drawn first)
#[derive(Debug, Clone, Default)]
pub struct SurfaceRegistry {
    surfaces: Vec<Surface>,
    selected: BTreeSet<SurfaceId>,
    /// Last surface touched by a selection event
    most_recent: Option<SurfaceId>,
    /// Next id to hand out; never decremented
    next_id: u32,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from loaded surfaces. The id counter continues after the highest id.
    pub fn from_surfaces(surfaces: Vec<Surface>) -> Self {
        let next_id = surfaces.iter().map(|s| s.id().0 + 1).max().unwrap_or(0);
        let most_recent = surfaces.first().map(|s| s.id());
        Self {
            surfaces,
            selected: BTreeSet::new(),
            most_recent,
            next_id,
        }
    }

    /// Create a surface and append it on top of the stack
    pub fn create_surface(
        &mut self,
        kind: SurfaceKind,
        resolution: usize,
        center: Vec2,
        size: f32,
    ) -> Result<SurfaceId, MappingError> {
        let id = SurfaceId(self.next_id);
        let surface = Surface::new(id, kind, resolution, center, size)?;
        self.next_id += 1;
        self.surfaces.push(surface);
        tracing::info!("Created {} {} at ({}, {})", kind.display_name(), id, center.x, center.y);
        Ok(id)
    }

    /// Remove a surface. Absent ids are ignored.
    pub fn delete_surface(&mut self, id: SurfaceId) -> Option<Surface> {
        let index = self.surfaces.iter().position(|s| s.id() == id)?;
        self.selected.remove(&id);
        if self.most_recent == Some(id) {
            self.most_recent = None;
        }
        tracing::info!("Deleted {}", id);
        Some(self.surfaces.remove(index))
    }

    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.iter().find(|s| s.id() == id)
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.surfaces.iter_mut().find(|s| s.id() == id)
    }

    /// Surfaces in paint order
    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn surfaces_mut(&mut self) -> impl Iterator<Item = &mut Surface> {
        self.surfaces.iter_mut()
    }

    pub fn ids(&self) -> Vec<SurfaceId> {
        self.surfaces.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Replace the selection. The last id becomes the most recently active surface.
    pub fn select(&mut self, ids: impl IntoIterator<Item = SurfaceId>) {
        self.selected.clear();
        for id in ids {
            self.selected.insert(id);
            self.most_recent = Some(id);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn selected(&self) -> Vec<SurfaceId> {
        self.selected.iter().copied().collect()
    }

    pub fn is_selected(&self, id: SurfaceId) -> bool {
        self.selected.contains(&id)
    }

    /// Most recently active surface, if it is still alive
    pub fn active(&self) -> Option<&Surface> {
        self.most_recent.and_then(|id| self.get(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut Surface> {
        let id = self.most_recent?;
        self.get_mut(id)
    }

    pub fn set_most_recent(&mut self, id: Option<SurfaceId>) {
        self.most_recent = id;
    }

    /// Topmost control point within `tolerance` of `cursor`.
    ///
    /// Surfaces are tested from last created to first.
    pub fn topmost_point_hit(&self, cursor: Vec2, tolerance: f32) -> Option<(SurfaceId, usize)> {
        self.surfaces
            .iter()
            .rev()
            .find_map(|s| s.mesh().hit_test(cursor, tolerance).map(|index| (s.id(), index)))
    }

    /// Topmost surface whose drawn area contains `cursor`
    pub fn topmost_body_hit(&self, cursor: Vec2) -> Option<SurfaceId> {
        self.surfaces
            .iter()
            .rev()
            .find(|s| s.contains(cursor))
            .map(|s| s.id())
    }
}
