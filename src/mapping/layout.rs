//! Layout persistence
//!
//! Saves the surface registry to a versioned XML document and rebuilds it.
//! Source bindings are stored by sketch label and re-resolved on load.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use glam::Vec2;
use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};

use super::error::{MappingError, UnresolvedBinding};
use super::mesh::ControlMesh;
use super::registry::SurfaceRegistry;
use super::source::SourceRegistry;
use super::surface::{Surface, SurfaceId, SurfaceKind};

/// Layout format version written by this build
pub const LAYOUT_VERSION: u32 = 1;

/// A saved set of surfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "SketchMapperLayout")]
pub struct LayoutDocument {
    #[serde(rename = "@version")]
    pub version: u32,

    #[serde(rename = "surface", default)]
    pub surfaces: Vec<SurfaceRecord>,
}

/// One saved surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRecord {
    #[serde(rename = "@id")]
    pub id: u32,

    /// "QUAD" or "BEZIER"
    #[serde(rename = "@type")]
    pub kind: String,

    #[serde(rename = "@resolution")]
    pub resolution: usize,

    #[serde(rename = "@rows")]
    pub rows: usize,

    #[serde(rename = "@cols")]
    pub cols: usize,

    #[serde(rename = "@horizontalForce", default)]
    pub horizontal_force: f32,

    #[serde(rename = "@verticalForce", default)]
    pub vertical_force: f32,

    /// Label of the bound sketch
    #[serde(rename = "@source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(rename = "point", default)]
    pub points: Vec<PointRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    #[serde(rename = "@x")]
    pub x: f32,
    #[serde(rename = "@y")]
    pub y: f32,
}

impl From<Vec2> for PointRecord {
    fn from(p: Vec2) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<PointRecord> for Vec2 {
    fn from(p: PointRecord) -> Self {
        Vec2::new(p.x, p.y)
    }
}

impl SurfaceRecord {
    fn from_surface(surface: &Surface, sources: &SourceRegistry) -> Self {
        let mesh = surface.mesh();
        Self {
            id: surface.id().0,
            kind: surface.kind().as_str().to_string(),
            resolution: surface.resolution(),
            rows: mesh.rows(),
            cols: mesh.cols(),
            horizontal_force: surface.horizontal_force(),
            vertical_force: surface.vertical_force(),
            source: surface
                .source()
                .and_then(|id| sources.label(id))
                .map(str::to_string),
            points: mesh.points().iter().copied().map(PointRecord::from).collect(),
        }
    }

    fn to_surface(&self, max_points_per_axis: usize) -> Result<Surface, MappingError> {
        let id = SurfaceId(self.id);
        let kind = SurfaceKind::parse(&self.kind).ok_or_else(|| {
            MappingError::InvalidLayout(format!("{}: unknown surface type '{}'", id, self.kind))
        })?;
        let largest = self.rows.max(self.cols).max(self.resolution);
        if largest > max_points_per_axis {
            return Err(MappingError::InvalidLayout(format!(
                "{}: {} points per axis exceeds the maximum of {}",
                id, largest, max_points_per_axis
            )));
        }
        if self.points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(MappingError::InvalidLayout(format!("{}: non-finite point", id)));
        }
        let points = self.points.iter().copied().map(Vec2::from).collect();
        let mesh = ControlMesh::from_points(self.rows, self.cols, points)?;
        Surface::from_parts(
            id,
            kind,
            mesh,
            self.resolution,
            (self.horizontal_force, self.vertical_force),
        )
    }
}

impl LayoutDocument {
    /// Snapshot a registry
    pub fn from_registry(registry: &SurfaceRegistry, sources: &SourceRegistry) -> Self {
        Self {
            version: LAYOUT_VERSION,
            surfaces: registry
                .surfaces()
                .iter()
                .map(|s| SurfaceRecord::from_surface(s, sources))
                .collect(),
        }
    }

    /// Validate the whole document and build a fresh registry.
    ///
    /// Meshes and render resolutions larger than `max_points_per_axis` are
    /// rejected. Source labels with no matching sketch leave the surface
    /// unbound and are returned alongside the registry.
    pub fn into_registry(
        &self,
        sources: &SourceRegistry,
        max_points_per_axis: usize,
    ) -> Result<(SurfaceRegistry, Vec<UnresolvedBinding>), MappingError> {
        if self.version != LAYOUT_VERSION {
            return Err(MappingError::UnsupportedVersion {
                found: self.version,
                expected: LAYOUT_VERSION,
            });
        }

        let mut seen = HashSet::new();
        let mut surfaces = Vec::with_capacity(self.surfaces.len());
        let mut unresolved = Vec::new();

        for record in &self.surfaces {
            if !seen.insert(record.id) {
                return Err(MappingError::InvalidLayout(format!(
                    "duplicate surface id {}",
                    record.id
                )));
            }
            let mut surface = record.to_surface(max_points_per_axis)?;
            if let Some(label) = &record.source {
                match sources.find_by_label(label) {
                    Some(source) => surface.bind_source(Some(source)),
                    None => unresolved.push(UnresolvedBinding {
                        surface: surface.id(),
                        label: label.clone(),
                    }),
                }
            }
            surfaces.push(surface);
        }

        for binding in &unresolved {
            tracing::warn!(
                "{}: no sketch named '{}', loading unbound",
                binding.surface,
                binding.label
            );
        }

        Ok((SurfaceRegistry::from_surfaces(surfaces), unresolved))
    }

    pub fn to_xml(&self) -> Result<String, MappingError> {
        let xml = to_string(self)?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml))
    }

    pub fn from_xml(xml: &str) -> Result<Self, MappingError> {
        Ok(from_str(xml)?)
    }

    /// Write to disk. Nothing is written if serialization fails.
    pub fn save_to_file(&self, path: &Path) -> Result<(), MappingError> {
        let xml = self.to_xml()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, xml)?;
        tracing::info!("Saved layout ({} surfaces) to {:?}", self.surfaces.len(), path);
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, MappingError> {
        let contents = fs::read_to_string(path)?;
        let document = Self::from_xml(&contents)?;
        tracing::info!("Loaded layout ({} surfaces) from {:?}", document.surfaces.len(), path);
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::source::tests::MockSketch;
    use crate::mapping::surface::ForceAxis;

    const MAX_POINTS: usize = 65;

    fn sources() -> SourceRegistry {
        let mut sources = SourceRegistry::new();
        let (a, _) = MockSketch::new("circles", [255, 0, 0, 255]);
        let (b, _) = MockSketch::new("lines", [0, 0, 255, 255]);
        sources.add(Box::new(a));
        sources.add(Box::new(b));
        sources
    }

    fn sample_registry(sources: &SourceRegistry) -> SurfaceRegistry {
        let mut registry = SurfaceRegistry::new();
        let quad = registry
            .create_surface(SurfaceKind::Quad, 3, Vec2::new(200.0, 200.0), 100.0)
            .unwrap();
        let bezier = registry
            .create_surface(SurfaceKind::Bezier, 6, Vec2::new(500.0, 300.0), 150.0)
            .unwrap();

        let surface = registry.get_mut(quad).unwrap();
        surface.move_point(4, Vec2::new(213.25, 187.5));
        surface.bind_source(sources.find_by_label("lines"));

        let surface = registry.get_mut(bezier).unwrap();
        surface.set_force(ForceAxis::Horizontal, 0.35, 1.0);
        surface.set_force(ForceAxis::Vertical, -0.2, 1.0);
        surface.bind_source(sources.find_by_label("circles"));
        registry
    }

    #[test]
    fn test_round_trip_preserves_surfaces() {
        let sources = sources();
        let registry = sample_registry(&sources);

        let xml = LayoutDocument::from_registry(&registry, &sources).to_xml().unwrap();
        let document = LayoutDocument::from_xml(&xml).unwrap();
        let (loaded, unresolved) = document.into_registry(&sources, MAX_POINTS).unwrap();

        assert!(unresolved.is_empty());
        assert_eq!(loaded.surfaces(), registry.surfaces());
    }

    #[test]
    fn test_save_load_save_is_stable() {
        let sources = sources();
        let registry = sample_registry(&sources);
        let path = std::env::temp_dir().join("sketch_mapper_layout_stable.xml");

        let first = LayoutDocument::from_registry(&registry, &sources);
        first.save_to_file(&path).unwrap();
        let (loaded, _) = LayoutDocument::load_from_file(&path)
            .unwrap()
            .into_registry(&sources, MAX_POINTS)
            .unwrap();
        let second = LayoutDocument::from_registry(&loaded, &sources);
        let _ = std::fs::remove_file(&path);

        assert_eq!(first.to_xml().unwrap(), second.to_xml().unwrap());
    }

    #[test]
    fn test_xml_shape() {
        let sources = sources();
        let registry = sample_registry(&sources);
        let xml = LayoutDocument::from_registry(&registry, &sources).to_xml().unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<SketchMapperLayout version=\"1\">"));
        assert!(xml.contains("type=\"BEZIER\""));
        assert!(xml.contains("source=\"lines\""));
        assert!(xml.contains("<point x=\"213.25\" y=\"187.5\""));
    }

    #[test]
    fn test_unknown_label_loads_unbound() {
        let sources = sources();
        let registry = sample_registry(&sources);
        let document = LayoutDocument::from_registry(&registry, &sources);

        let mut fewer = SourceRegistry::new();
        let (only, _) = MockSketch::new("circles", [0; 4]);
        fewer.add(Box::new(only));

        let (loaded, unresolved) = document.into_registry(&fewer, MAX_POINTS).unwrap();
        assert_eq!(
            unresolved,
            vec![UnresolvedBinding {
                surface: SurfaceId(0),
                label: "lines".to_string(),
            }]
        );
        assert_eq!(loaded.get(SurfaceId(0)).unwrap().source(), None);
        assert!(loaded.get(SurfaceId(1)).unwrap().source().is_some());
    }

    #[test]
    fn test_version_mismatch() {
        let xml = "<SketchMapperLayout version=\"2\"></SketchMapperLayout>";
        let err = LayoutDocument::from_xml(xml)
            .unwrap()
            .into_registry(&SourceRegistry::new(), MAX_POINTS)
            .unwrap_err();
        assert!(matches!(
            err,
            MappingError::UnsupportedVersion { found: 2, expected: 1 }
        ));
    }

    #[test]
    fn test_corrupt_file() {
        let path = std::env::temp_dir().join("sketch_mapper_layout_corrupt.xml");
        std::fs::write(&path, "<SketchMapperLayout version=\"1\"><surface id=").unwrap();
        let result = LayoutDocument::load_from_file(&path);
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("sketch_mapper_layout_missing_nope.xml");
        let err = LayoutDocument::load_from_file(&path).unwrap_err();
        assert!(matches!(err, MappingError::Io(_)));
    }

    #[test]
    fn test_point_count_mismatch_rejected() {
        let xml = r#"<SketchMapperLayout version="1">
            <surface id="0" type="QUAD" resolution="2" rows="2" cols="2">
                <point x="0" y="0"/><point x="1" y="0"/><point x="1" y="1"/>
            </surface>
        </SketchMapperLayout>"#;
        let err = LayoutDocument::from_xml(xml)
            .unwrap()
            .into_registry(&SourceRegistry::new(), MAX_POINTS)
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidLayout(_)));
    }

    #[test]
    fn test_duplicate_ids_and_unknown_type_rejected() {
        let duplicate = r#"<SketchMapperLayout version="1">
            <surface id="3" type="QUAD" resolution="2" rows="2" cols="2">
                <point x="0" y="0"/><point x="1" y="0"/><point x="0" y="1"/><point x="1" y="1"/>
            </surface>
            <surface id="3" type="QUAD" resolution="2" rows="2" cols="2">
                <point x="0" y="0"/><point x="1" y="0"/><point x="0" y="1"/><point x="1" y="1"/>
            </surface>
        </SketchMapperLayout>"#;
        let unknown = duplicate.replacen("type=\"QUAD\"", "type=\"TRIANGLE\"", 1);

        for xml in [duplicate.to_string(), unknown] {
            let err = LayoutDocument::from_xml(&xml)
                .unwrap()
                .into_registry(&SourceRegistry::new(), MAX_POINTS)
                .unwrap_err();
            assert!(matches!(err, MappingError::InvalidLayout(_)));
        }
    }

    fn load_str(xml: &str) -> Result<SurfaceRegistry, MappingError> {
        LayoutDocument::from_xml(xml)?
            .into_registry(&SourceRegistry::new(), MAX_POINTS)
            .map(|(registry, _)| registry)
    }

    #[test]
    fn test_oversized_mesh_rejected() {
        let xml = r#"<SketchMapperLayout version="1">
            <surface id="0" type="QUAD" resolution="4294967296" rows="4294967296" cols="4294967296">
                <point x="0" y="0"/>
            </surface>
        </SketchMapperLayout>"#;
        assert!(matches!(load_str(xml), Err(MappingError::InvalidLayout(_))));
    }

    #[test]
    fn test_bezier_resolution_above_maximum_rejected() {
        let points: String = (0..16)
            .map(|i| format!("<point x=\"{}\" y=\"{}\"/>", (i % 4) * 10, (i / 4) * 10))
            .collect();
        let layout = |resolution: usize| {
            format!(
                r#"<SketchMapperLayout version="1">
                    <surface id="0" type="BEZIER" resolution="{}" rows="4" cols="4">{}</surface>
                </SketchMapperLayout>"#,
                resolution, points
            )
        };

        assert!(matches!(load_str(&layout(3000)), Err(MappingError::InvalidLayout(_))));
        let registry = load_str(&layout(MAX_POINTS)).unwrap();
        assert_eq!(registry.surfaces()[0].resolution(), MAX_POINTS);
    }

    #[test]
    fn test_loaded_registry_continues_ids() {
        let sources = sources();
        let registry = sample_registry(&sources);
        let document = LayoutDocument::from_registry(&registry, &sources);
        let (mut loaded, _) = document.into_registry(&sources, MAX_POINTS).unwrap();
        let id = loaded
            .create_surface(SurfaceKind::Quad, 2, Vec2::ZERO, 10.0)
            .unwrap();
        assert_eq!(id, SurfaceId(2));
    }
}
