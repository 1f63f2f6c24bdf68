//! Sketch Mapper - headless demo host
//!
//! Registers two test patterns, renders one calibrate frame and a few render
//! frames to PNG in the temp directory, then saves the layout.
//!
//! Usage: `sketch-mapper [layout.xml]`

use std::path::PathBuf;

use sketch_mapper::mapping::{ForceAxis, Key, KeyEvent, PointerEvent};
use sketch_mapper::sketches::TestPattern;
use sketch_mapper::telemetry::{init_logging, LogConfig};
use sketch_mapper::{MapperSettings, MappingEngine, SurfaceKind};

const RENDER_FRAMES: u32 = 30;

fn main() {
    let _log_guard = match init_logging(&LogConfig::default()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("Sketch Mapper v{}", env!("CARGO_PKG_VERSION"));

    let settings = MapperSettings::load_or_default();
    let layout_arg = std::env::args().nth(1).map(PathBuf::from);
    let out_dir = std::env::temp_dir();
    let layout_path = layout_arg
        .clone()
        .unwrap_or_else(|| out_dir.join("sketch_mapper_layout.xml"));

    let mut engine = MappingEngine::with_settings(settings);
    engine.add_source(Box::new(TestPattern::new("checker-red", 256, 256, [230, 40, 40, 255])));
    engine.add_source(Box::new(TestPattern::new("checker-blue", 256, 256, [40, 90, 230, 255])));

    if let Some(path) = layout_arg.filter(|p| p.exists()) {
        engine.set_layout_path(path);
    }
    engine.initialize();

    // A fresh session gets a second, curved surface to show both kinds
    if engine.registry().len() == 1 {
        match engine.create_surface(SurfaceKind::Bezier) {
            Ok(id) => {
                engine.bind_active_source("checker-blue");
                engine.adjust_force(ForceAxis::Horizontal, 6);
                // Drag the new surface to the right half of the canvas
                let y = engine.height() as f32 / 2.0 + 10.0;
                let from_x = engine.width() as f32 / 2.0 + 10.0;
                let to_x = engine.width() as f32 * 0.75 + 10.0;
                engine.handle_pointer(&PointerEvent::press(from_x, y));
                engine.handle_pointer(&PointerEvent::drag(to_x, y));
                engine.handle_pointer(&PointerEvent::release(to_x, y, 1));
                tracing::info!("Added {} for the demo", id);
            }
            Err(e) => tracing::warn!("Failed to add bezier surface: {}", e),
        }
    }

    let calibrate_png = out_dir.join("sketch_mapper_calibrate.png");
    match engine.render_frame().save(&calibrate_png) {
        Ok(()) => tracing::info!("Wrote {}", calibrate_png.display()),
        Err(e) => tracing::error!("Failed to write {}: {}", calibrate_png.display(), e),
    }

    engine.toggle_calibration();
    for _ in 0..RENDER_FRAMES {
        engine.render_frame();
    }
    // Space pauses the patterns; the snapshot below shows the paused frame
    engine.handle_key(&KeyEvent::press(Key::Char(' ')));
    let render_png = out_dir.join("sketch_mapper_render.png");
    match engine.render_frame().save(&render_png) {
        Ok(()) => tracing::info!("Wrote {}", render_png.display()),
        Err(e) => tracing::error!("Failed to write {}: {}", render_png.display(), e),
    }

    // Double click returns to calibration
    engine.handle_pointer(&PointerEvent::release(0.0, 0.0, 2));
    tracing::info!("Final mode: {:?}", engine.mode());

    if let Err(e) = engine.save_layout(&layout_path) {
        tracing::error!("Failed to save layout to {}: {}", layout_path.display(), e);
        std::process::exit(1);
    }
}
