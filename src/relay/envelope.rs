//! Relay envelope definitions
//!
//! Captured events travel the in-process relay as tagged envelopes: a channel
//! name plus a JSON payload. Consumers never see an envelope directly; the hub
//! decodes payloads and hands typed events to the matching callbacks only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capture::{KeyEvent, PointerEvent};

/// Channel carrying the grant/revoke boolean from the trusted context.
pub const PERMISSION_STATUS: &str = "permission-status";

/// Channel carrying [`KeyEvent`] payloads.
pub const KEYBOARD_EVENT: &str = "keyboard-event";

/// Channel carrying [`PointerEvent`] payloads.
pub const MOUSE_EVENT: &str = "mouse-event";

/// A tagged relay message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Channel name identifying the event kind
    pub channel: String,
    /// The event payload, in the consumer-facing wire shape
    pub payload: Value,
}

impl Envelope {
    pub fn new(channel: impl Into<String>, payload: Value) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }

    /// Wrap a keyboard event for the `keyboard-event` channel.
    pub fn keyboard(event: &KeyEvent) -> Result<Self, serde_json::Error> {
        Ok(Self::new(KEYBOARD_EVENT, serde_json::to_value(event)?))
    }

    /// Wrap a pointer event for the `mouse-event` channel.
    pub fn mouse(event: &PointerEvent) -> Result<Self, serde_json::Error> {
        Ok(Self::new(MOUSE_EVENT, serde_json::to_value(event)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{KeyPhase, PointerKind};

    #[test]
    fn test_keyboard_envelope() {
        let event = KeyEvent {
            key: "a".to_string(),
            phase: KeyPhase::Pressed,
            captured_at_ms: 12,
        };

        let envelope = Envelope::keyboard(&event).unwrap();
        assert_eq!(envelope.channel, KEYBOARD_EVENT);
        assert_eq!(envelope.payload["key"], "a");
        assert_eq!(envelope.payload["type"], "keydown");
    }

    #[test]
    fn test_mouse_envelope() {
        let event = PointerEvent {
            x: 3,
            y: 4,
            kind: PointerKind::Move,
            captured_at_ms: 1,
        };

        let envelope = Envelope::mouse(&event).unwrap();
        assert_eq!(envelope.channel, MOUSE_EVENT);
        assert_eq!(envelope.payload["type"], "move");
    }
}
