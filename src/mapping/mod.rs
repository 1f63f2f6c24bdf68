//! Projection mapping core
//!
//! Surfaces are editable meshes placed on an output canvas. Each surface shows
//! the frame of a bound sketch, warped through its mesh. The engine switches
//! between calibrating (editing meshes with the pointer) and rendering.

pub mod bezier;
pub mod engine;
pub mod error;
pub mod homography;
pub mod input;
pub mod layout;
pub mod mesh;
pub mod raster;
pub mod registry;
pub mod source;
pub mod surface;

pub use engine::{MappingEngine, Mode};
pub use error::{MappingError, UnresolvedBinding};
pub use input::{Key, KeyEvent, KeyPhase, PointerEvent, PointerPhase};
pub use layout::{LayoutDocument, LAYOUT_VERSION};
pub use mesh::ControlMesh;
pub use registry::SurfaceRegistry;
pub use source::{Sketch, SourceId, SourceRegistry};
pub use surface::{ForceAxis, FramePull, Surface, SurfaceId, SurfaceKind};
