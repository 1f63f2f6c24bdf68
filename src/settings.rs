//! Settings management for Sketch Mapper
//!
//! Engine tunables stored as an XML file in the user config directory.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "SketchMapperSettings")]
pub struct MapperSettings {
    /// Output canvas width in pixels
    #[serde(rename = "canvasWidth", default = "default_canvas_width")]
    pub canvas_width: u32,

    /// Output canvas height in pixels
    #[serde(rename = "canvasHeight", default = "default_canvas_height")]
    pub canvas_height: u32,

    /// Points per axis for newly created surfaces (2-65)
    #[serde(rename = "initialResolution", default = "default_initial_resolution")]
    pub initial_resolution: usize,

    /// Width and height of newly created surfaces in pixels
    #[serde(rename = "surfaceSize", default = "default_surface_size")]
    pub surface_size: f32,

    /// Pointer distance (pixels) within which a control point is grabbed
    #[serde(rename = "hitTolerance", default = "default_hit_tolerance")]
    pub hit_tolerance: f32,

    /// Bezier force change per adjustment
    #[serde(rename = "forceStep", default = "default_force_step")]
    pub force_step: f32,

    /// Bezier forces are clamped to +/- this value
    #[serde(rename = "maxForce", default = "default_max_force")]
    pub max_force: f32,

    /// Upper bound on mesh points per axis
    #[serde(rename = "maxPointsPerAxis", default = "default_max_points_per_axis")]
    pub max_points_per_axis: usize,

    /// Layout file loaded by `initialize()`
    #[serde(rename = "layoutFile", default, skip_serializing_if = "Option::is_none")]
    pub layout_file: Option<String>,

    /// Reference image shown behind surfaces in calibrate mode
    #[serde(rename = "backgroundImage", default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
}

fn default_canvas_width() -> u32 {
    800
}

fn default_canvas_height() -> u32 {
    600
}

fn default_initial_resolution() -> usize {
    6
}

fn default_surface_size() -> f32 {
    200.0
}

fn default_hit_tolerance() -> f32 {
    10.0
}

fn default_force_step() -> f32 {
    0.05
}

fn default_max_force() -> f32 {
    1.0
}

fn default_max_points_per_axis() -> usize {
    65
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
            initial_resolution: default_initial_resolution(),
            surface_size: default_surface_size(),
            hit_tolerance: default_hit_tolerance(),
            force_step: default_force_step(),
            max_force: default_max_force(),
            max_points_per_axis: default_max_points_per_axis(),
            layout_file: None,
            background_image: None,
        }
    }
}

impl MapperSettings {
    /// Settings for a given canvas size, everything else default
    pub fn with_canvas(width: u32, height: u32) -> Self {
        Self {
            canvas_width: width,
            canvas_height: height,
            ..Default::default()
        }
    }

    /// Bring every value into its valid range
    pub fn clamp(&mut self) {
        self.canvas_width = self.canvas_width.max(1);
        self.canvas_height = self.canvas_height.max(1);
        self.max_points_per_axis = self.max_points_per_axis.clamp(2, 257);
        self.initial_resolution = self.initial_resolution.clamp(2, self.max_points_per_axis);
        if !self.surface_size.is_finite() || self.surface_size <= 0.0 {
            self.surface_size = default_surface_size();
        }
        if !self.hit_tolerance.is_finite() || self.hit_tolerance < 0.0 {
            self.hit_tolerance = default_hit_tolerance();
        }
        if !self.max_force.is_finite() || self.max_force < 0.0 {
            self.max_force = default_max_force();
        }
        if !self.force_step.is_finite() || self.force_step <= 0.0 {
            self.force_step = default_force_step();
        }
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(SettingsError::Io)?;
        let mut settings: Self = from_str(&contents).map_err(SettingsError::XmlParse)?;
        settings.clamp();
        Ok(settings)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let xml = to_string(self).map_err(SettingsError::XmlWrite)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);
        fs::write(path, formatted).map_err(SettingsError::Io)?;
        Ok(())
    }

    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("SketchMapper");
            p.push("settings.xml");
            p
        })
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(settings) => {
                tracing::info!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                tracing::warn!("Failed to load settings from {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    XmlParse(quick_xml::DeError),
    XmlWrite(quick_xml::SeError),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::XmlParse(e) => write!(f, "XML parse error: {}", e),
            SettingsError::XmlWrite(e) => write!(f, "XML write error: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = MapperSettings::default();
        assert_eq!(settings.initial_resolution, 6);
        assert_eq!(settings.canvas_width, 800);
        assert!(settings.layout_file.is_none());
    }

    #[test]
    fn test_clamp() {
        let mut settings = MapperSettings {
            initial_resolution: 1,
            canvas_width: 0,
            force_step: -1.0,
            ..Default::default()
        };
        settings.clamp();
        assert_eq!(settings.initial_resolution, 2);
        assert_eq!(settings.canvas_width, 1);
        assert_eq!(settings.force_step, 0.05);
    }

    #[test]
    fn test_save_load_round_trip() {
        let path = std::env::temp_dir().join("sketch_mapper_settings_test.xml");
        let settings = MapperSettings {
            layout_file: Some("layout.xml".to_string()),
            hit_tolerance: 12.5,
            ..MapperSettings::with_canvas(1280, 720)
        };
        settings.save_to_file(&path).unwrap();
        let loaded = MapperSettings::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let xml = "<SketchMapperSettings><canvasWidth>1024</canvasWidth></SketchMapperSettings>";
        let settings: MapperSettings = from_str(xml).unwrap();
        assert_eq!(settings.canvas_width, 1024);
        assert_eq!(settings.canvas_height, 600);
        assert_eq!(settings.max_points_per_axis, 65);
    }
}
