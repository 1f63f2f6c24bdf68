//! Render sources ("sketches") and the registry that owns them

use image::RgbaImage;

use super::input::{KeyEvent, PointerEvent};

/// A per-frame image generator that can be bound to surfaces
pub trait Sketch {
    /// Called once when the sketch is registered
    fn setup(&mut self);

    /// Produce the next frame
    fn draw(&mut self);

    /// Label shown in source selection and stored in layout files
    fn name(&self) -> &str;

    /// The current frame
    fn frame(&self) -> &RgbaImage;

    fn key_event(&mut self, _event: &KeyEvent) {}

    fn pointer_event(&mut self, _event: &PointerEvent) {}
}

/// Unique identifier for a registered sketch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u32);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Source {}", self.0)
    }
}

struct SourceEntry {
    id: SourceId,
    sketch: Box<dyn Sketch>,
}

/// Registered sketches, in registration order
pub struct SourceRegistry {
    entries: Vec<SourceEntry>,
    next_id: u32,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a sketch, running its `setup()`
    pub fn add(&mut self, mut sketch: Box<dyn Sketch>) -> SourceId {
        sketch.setup();
        let id = SourceId(self.next_id);
        self.next_id += 1;
        tracing::debug!("Registered sketch '{}' as {}", sketch.name(), id);
        self.entries.push(SourceEntry { id, sketch });
        id
    }

    /// Unregister a sketch
    pub fn remove(&mut self, id: SourceId) -> Option<Box<dyn Sketch>> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index).sketch)
    }

    pub fn get(&self, id: SourceId) -> Option<&dyn Sketch> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.sketch.as_ref())
    }

    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut (dyn Sketch + 'static)> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| e.sketch.as_mut())
    }

    /// First registered sketch (the default binding for new surfaces)
    pub fn first(&self) -> Option<SourceId> {
        self.entries.first().map(|e| e.id)
    }

    /// Find a sketch by its label
    pub fn find_by_label(&self, label: &str) -> Option<SourceId> {
        self.entries
            .iter()
            .find(|e| e.sketch.name() == label)
            .map(|e| e.id)
    }

    pub fn label(&self, id: SourceId) -> Option<&str> {
        self.get(id).map(|s| s.name())
    }

    /// Labels in registration order
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.sketch.name()).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forward a key event to every sketch
    pub fn broadcast_key(&mut self, event: &KeyEvent) {
        for entry in &mut self.entries {
            entry.sketch.key_event(event);
        }
    }

    /// Forward a pointer event to every sketch
    pub fn broadcast_pointer(&mut self, event: &PointerEvent) {
        for entry in &mut self.entries {
            entry.sketch.pointer_event(event);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mapping::input::{Key, PointerPhase};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Call counters shared between a test and its mock sketch
    #[derive(Debug, Default)]
    pub struct Counters {
        pub setups: Cell<u32>,
        pub draws: Cell<u32>,
        pub keys: Cell<u32>,
        pub pointers: Cell<u32>,
        pub releases: Cell<u32>,
    }

    /// Solid-color sketch that records how it is called
    pub struct MockSketch {
        name: String,
        frame: RgbaImage,
        pub counters: Rc<Counters>,
    }

    impl MockSketch {
        pub fn new(name: &str, color: [u8; 4]) -> (Self, Rc<Counters>) {
            let counters = Rc::new(Counters::default());
            let sketch = Self {
                name: name.to_string(),
                frame: RgbaImage::from_pixel(16, 16, image::Rgba(color)),
                counters: Rc::clone(&counters),
            };
            (sketch, counters)
        }
    }

    impl Sketch for MockSketch {
        fn setup(&mut self) {
            self.counters.setups.set(self.counters.setups.get() + 1);
        }

        fn draw(&mut self) {
            self.counters.draws.set(self.counters.draws.get() + 1);
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn frame(&self) -> &RgbaImage {
            &self.frame
        }

        fn key_event(&mut self, _event: &KeyEvent) {
            self.counters.keys.set(self.counters.keys.get() + 1);
        }

        fn pointer_event(&mut self, event: &PointerEvent) {
            self.counters.pointers.set(self.counters.pointers.get() + 1);
            if event.phase == PointerPhase::Release {
                self.counters.releases.set(self.counters.releases.get() + 1);
            }
        }
    }

    #[test]
    fn test_add_runs_setup_and_assigns_ids() {
        let mut registry = SourceRegistry::new();
        let (a, counters) = MockSketch::new("a", [255, 0, 0, 255]);
        let (b, _) = MockSketch::new("b", [0, 255, 0, 255]);
        let id_a = registry.add(Box::new(a));
        let id_b = registry.add(Box::new(b));

        assert_eq!(counters.setups.get(), 1);
        assert_eq!(id_a, SourceId(0));
        assert_eq!(id_b, SourceId(1));
        assert_eq!(registry.first(), Some(id_a));
        assert_eq!(registry.labels(), vec!["a", "b"]);
    }

    #[test]
    fn test_find_by_label_and_remove() {
        let mut registry = SourceRegistry::new();
        let (a, _) = MockSketch::new("circles", [255, 0, 0, 255]);
        let id = registry.add(Box::new(a));

        assert_eq!(registry.find_by_label("circles"), Some(id));
        assert_eq!(registry.find_by_label("squares"), None);
        assert!(registry.remove(id).is_some());
        assert!(registry.is_empty());
        assert!(registry.label(id).is_none());
    }

    #[test]
    fn test_broadcast_reaches_every_sketch() {
        let mut registry = SourceRegistry::new();
        let (a, ca) = MockSketch::new("a", [0; 4]);
        let (b, cb) = MockSketch::new("b", [0; 4]);
        registry.add(Box::new(a));
        registry.add(Box::new(b));

        registry.broadcast_key(&KeyEvent::press(Key::Char('x')));
        registry.broadcast_pointer(&PointerEvent::release(1.0, 1.0, 1));

        assert_eq!(ca.keys.get(), 1);
        assert_eq!(cb.keys.get(), 1);
        assert_eq!(cb.releases.get(), 1);
    }
}
