//! Built-in sketches

use image::{Rgba, RgbaImage};

use crate::mapping::{Key, KeyEvent, KeyPhase, Sketch};

/// Scrolling checkerboard with a colored border, for lining up surfaces
pub struct TestPattern {
    name: String,
    frame: RgbaImage,
    cell: u32,
    offset: u32,
    paused: bool,
    color: Rgba<u8>,
}

impl TestPattern {
    pub fn new(name: impl Into<String>, width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            name: name.into(),
            frame: RgbaImage::new(width.max(1), height.max(1)),
            cell: (width.min(height) / 8).max(1),
            offset: 0,
            paused: false,
            color: Rgba(color),
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    fn paint(&mut self) {
        let (width, height) = self.frame.dimensions();
        let border = (self.cell / 4).max(1);
        for (x, y, pixel) in self.frame.enumerate_pixels_mut() {
            let on_border = x < border || y < border || x >= width - border || y >= height - border;
            let checker = ((x + self.offset) / self.cell + y / self.cell) % 2 == 0;
            *pixel = if on_border {
                self.color
            } else if checker {
                Rgba([235, 235, 235, 255])
            } else {
                Rgba([20, 20, 20, 255])
            };
        }
    }
}

impl Sketch for TestPattern {
    fn setup(&mut self) {
        self.offset = 0;
        self.paint();
    }

    fn draw(&mut self) {
        if !self.paused {
            self.offset = (self.offset + 1) % (self.cell * 2);
        }
        self.paint();
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    /// Space pauses the scroll
    fn key_event(&mut self, event: &KeyEvent) {
        if event.phase == KeyPhase::Press && event.key == Key::Char(' ') {
            self.paused = !self.paused;
        }
    }
}
