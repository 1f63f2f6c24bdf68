//! Raw input events forwarded by the host

use glam::Vec2;

/// Pointer event phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Press,
    Drag,
    Release,
}

/// A pointer (mouse, pen, touch) event in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub position: Vec2,
    /// Number of consecutive clicks (2 = double click)
    pub click_count: u32,
}

impl PointerEvent {
    pub fn press(x: f32, y: f32) -> Self {
        Self {
            phase: PointerPhase::Press,
            position: Vec2::new(x, y),
            click_count: 1,
        }
    }

    pub fn drag(x: f32, y: f32) -> Self {
        Self {
            phase: PointerPhase::Drag,
            position: Vec2::new(x, y),
            click_count: 0,
        }
    }

    pub fn release(x: f32, y: f32, click_count: u32) -> Self {
        Self {
            phase: PointerPhase::Release,
            position: Vec2::new(x, y),
            click_count,
        }
    }

    /// Release of a double click
    pub fn is_double_release(&self) -> bool {
        self.phase == PointerPhase::Release && self.click_count == 2
    }
}

/// Keyboard event phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Press,
    Release,
}

/// Keys the engine distinguishes; everything else is passed through as a code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Delete,
    Char(char),
    Code(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub phase: KeyPhase,
}

impl KeyEvent {
    pub fn press(key: Key) -> Self {
        Self {
            key,
            phase: KeyPhase::Press,
        }
    }

    pub fn release(key: Key) -> Self {
        Self {
            key,
            phase: KeyPhase::Release,
        }
    }
}
