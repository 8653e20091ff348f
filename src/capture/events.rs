//! Input event types
//!
//! Platform-independent representation of captured input events. The serde
//! representation of these types is the consumer-facing payload shape, so the
//! field and variant renames here are part of the public contract.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPhase {
    #[serde(rename = "keydown")]
    Pressed,
    #[serde(rename = "keyup")]
    Released,
}

impl fmt::Display for KeyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPhase::Pressed => write!(f, "keydown"),
            KeyPhase::Released => write!(f, "keyup"),
        }
    }
}

/// A keyboard event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key identifier as reported by the input surface
    pub key: String,
    /// Whether the key became pressed or released
    #[serde(rename = "type")]
    pub phase: KeyPhase,
    /// Milliseconds since capture started, non-decreasing per loop
    #[serde(rename = "timeStamp")]
    pub captured_at_ms: u64,
}

/// Kind of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerKind {
    #[serde(rename = "move")]
    Move,
    #[serde(rename = "click")]
    PrimaryClick,
    #[serde(rename = "rightClick")]
    SecondaryClick,
}

impl fmt::Display for PointerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointerKind::Move => write!(f, "move"),
            PointerKind::PrimaryClick => write!(f, "click"),
            PointerKind::SecondaryClick => write!(f, "rightClick"),
        }
    }
}

/// A pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: PointerKind,
    #[serde(rename = "timeStamp")]
    pub captured_at_ms: u64,
}

/// Union of all captured event types
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Keyboard(KeyEvent),
    Pointer(PointerEvent),
}

impl InputEvent {
    /// Get the timestamp of the event
    pub fn captured_at_ms(&self) -> u64 {
        match self {
            InputEvent::Keyboard(e) => e.captured_at_ms,
            InputEvent::Pointer(e) => e.captured_at_ms,
        }
    }

    /// Check if this is a keyboard event
    pub fn is_keyboard(&self) -> bool {
        matches!(self, InputEvent::Keyboard(_))
    }

    /// Check if this is a pointer event
    pub fn is_pointer(&self) -> bool {
        matches!(self, InputEvent::Pointer(_))
    }
}
