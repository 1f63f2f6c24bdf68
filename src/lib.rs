//! Sketch Mapper - projection mapping for generative sketches
//!
//! Warp per-frame images onto editable quad and bezier surfaces, calibrate
//! them with the pointer and save the layout as XML.

pub mod mapping;
pub mod settings;
pub mod sketches;
pub mod telemetry;

pub use mapping::{MappingEngine, MappingError, Mode, Sketch, SurfaceKind};
pub use settings::MapperSettings;
