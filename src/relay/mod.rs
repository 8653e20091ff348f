//! Relay module - moves captured events to registered consumers
//!
//! Provides:
//! - The tagged envelope format used on the internal channel
//! - A hub that pumps envelopes to consumers, filtered by channel tag
//! - The narrow bridge handed to the display surface
//!
//! The bridge is the security boundary: it can register consumers and nothing
//! else. Publishing, permission state, and loop control stay on the trusted
//! side of the hub.

mod envelope;

pub use envelope::*;

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::{InputEvent, KeyEvent, PointerEvent};

/// Relay errors
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("relay channel closed")]
    Closed,

    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;

/// Callback invoked with each relayed keyboard event.
pub type KeyboardConsumer = Box<dyn Fn(KeyEvent) + Send + Sync>;

/// Callback invoked with each relayed pointer event.
pub type MouseConsumer = Box<dyn Fn(PointerEvent) + Send + Sync>;

#[derive(Default)]
struct ConsumerRegistry {
    keyboard: Mutex<Vec<KeyboardConsumer>>,
    mouse: Mutex<Vec<MouseConsumer>>,
}

/// The relay hub
///
/// Owns the ingress channel the capture loops publish into and the pump task
/// that dispatches envelopes to registered consumers.
pub struct RelayHub {
    ingress_tx: mpsc::Sender<Envelope>,
    consumers: Arc<ConsumerRegistry>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    pump: Option<JoinHandle<()>>,
}

impl RelayHub {
    /// Create a hub with a bounded ingress queue and start its pump task.
    pub fn new(capacity: usize) -> Self {
        let (ingress_tx, mut ingress_rx) = mpsc::channel::<Envelope>(capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let consumers = Arc::new(ConsumerRegistry::default());

        let registry = consumers.clone();
        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    received = ingress_rx.recv() => {
                        match received {
                            Some(envelope) => dispatch(&registry, envelope),
                            None => break,
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            ingress_tx,
            consumers,
            shutdown_tx: Some(shutdown_tx),
            pump: Some(pump),
        }
    }

    /// A handle capture loops use to publish events.
    pub fn publisher(&self) -> RelayPublisher {
        RelayPublisher {
            tx: self.ingress_tx.clone(),
        }
    }

    /// The narrow handle given to the display surface.
    pub fn bridge(&self) -> DisplayBridge {
        DisplayBridge {
            consumers: self.consumers.clone(),
        }
    }

    /// Stop the pump task. Envelopes still queued are discarded; publishers
    /// see the relay as closed from here on.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        drop(self.ingress_tx);
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
    }
}

/// Decode the envelope and invoke the consumers registered for its tag.
/// Unknown tags and undecodable payloads are dropped here and never reach a
/// mismatched callback.
fn dispatch(registry: &ConsumerRegistry, envelope: Envelope) {
    match envelope.channel.as_str() {
        KEYBOARD_EVENT => match serde_json::from_value::<KeyEvent>(envelope.payload) {
            Ok(event) => {
                for consumer in registry.keyboard.lock().iter() {
                    consumer(event.clone());
                }
            }
            Err(e) => {
                tracing::debug!(channel = KEYBOARD_EVENT, error = %e, "dropping malformed payload");
            }
        },
        MOUSE_EVENT => match serde_json::from_value::<PointerEvent>(envelope.payload) {
            Ok(event) => {
                for consumer in registry.mouse.lock().iter() {
                    consumer(event);
                }
            }
            Err(e) => {
                tracing::debug!(channel = MOUSE_EVENT, error = %e, "dropping malformed payload");
            }
        },
        other => {
            tracing::debug!(channel = other, "dropping message with unrecognized channel");
        }
    }
}

/// Publishing handle used by the capture loops.
#[derive(Clone)]
pub struct RelayPublisher {
    tx: mpsc::Sender<Envelope>,
}

impl RelayPublisher {
    /// Publish a captured event on the channel matching its kind.
    pub async fn publish(&self, event: &InputEvent) -> RelayResult<()> {
        let envelope = match event {
            InputEvent::Keyboard(e) => Envelope::keyboard(e)?,
            InputEvent::Pointer(e) => Envelope::mouse(e)?,
        };
        self.send(envelope).await
    }

    /// Publish a raw envelope.
    pub async fn send(&self, envelope: Envelope) -> RelayResult<()> {
        self.tx.send(envelope).await.map_err(|_| RelayError::Closed)
    }
}

#[cfg(test)]
impl RelayPublisher {
    /// A publisher wired straight to a receiver, for loop-level tests.
    pub(crate) fn sink(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

/// The display surface's view of the relay.
///
/// Exposes exactly the two consumer-registration operations. Holds only the
/// consumer registry: no publisher, no permission state, no loop control.
#[derive(Clone)]
pub struct DisplayBridge {
    consumers: Arc<ConsumerRegistry>,
}

impl DisplayBridge {
    /// Register a callback for relayed keyboard events.
    pub fn on_keyboard_event(&self, callback: impl Fn(KeyEvent) + Send + Sync + 'static) {
        self.consumers.keyboard.lock().push(Box::new(callback));
    }

    /// Register a callback for relayed pointer events.
    pub fn on_mouse_event(&self, callback: impl Fn(PointerEvent) + Send + Sync + 'static) {
        self.consumers.mouse.lock().push(Box::new(callback));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{KeyPhase, PointerKind};
    use std::time::Duration;

    fn key_event(key: &str, phase: KeyPhase) -> KeyEvent {
        KeyEvent {
            key: key.to_string(),
            phase,
            captured_at_ms: 0,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_events_reach_keyboard_consumers_only() {
        let hub = RelayHub::new(16);
        let bridge = hub.bridge();

        let (key_tx, mut key_rx) = mpsc::unbounded_channel();
        let (mouse_tx, mut mouse_rx) = mpsc::unbounded_channel();
        bridge.on_keyboard_event(move |e| {
            let _ = key_tx.send(e);
        });
        bridge.on_mouse_event(move |e| {
            let _ = mouse_tx.send(e);
        });

        let publisher = hub.publisher();
        publisher
            .publish(&InputEvent::Keyboard(key_event("a", KeyPhase::Pressed)))
            .await
            .unwrap();
        settle().await;

        let received = key_rx.try_recv().unwrap();
        assert_eq!(received.key, "a");
        assert!(mouse_rx.try_recv().is_err());

        drop(publisher);
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_channel_is_dropped() {
        let hub = RelayHub::new(16);
        let bridge = hub.bridge();

        let (key_tx, mut key_rx) = mpsc::unbounded_channel();
        bridge.on_keyboard_event(move |e| {
            let _ = key_tx.send(e);
        });

        let publisher = hub.publisher();
        publisher
            .send(Envelope::new("clipboard-data", serde_json::json!({"data": "x"})))
            .await
            .unwrap();
        settle().await;

        assert!(key_rx.try_recv().is_err());

        drop(publisher);
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_payload_is_dropped() {
        let hub = RelayHub::new(16);
        let bridge = hub.bridge();

        let (key_tx, mut key_rx) = mpsc::unbounded_channel();
        bridge.on_keyboard_event(move |e| {
            let _ = key_tx.send(e);
        });

        let publisher = hub.publisher();
        publisher
            .send(Envelope::new(KEYBOARD_EVENT, serde_json::json!(42)))
            .await
            .unwrap();
        // A well-formed event after the malformed one still goes through.
        publisher
            .publish(&InputEvent::Keyboard(key_event("b", KeyPhase::Pressed)))
            .await
            .unwrap();
        settle().await;

        let received = key_rx.try_recv().unwrap();
        assert_eq!(received.key, "b");
        assert!(key_rx.try_recv().is_err());

        drop(publisher);
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiple_consumers_each_invoked() {
        let hub = RelayHub::new(16);
        let bridge = hub.bridge();
        let second_bridge = bridge.clone();

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        bridge.on_mouse_event(move |e| {
            let _ = tx_a.send(e);
        });
        second_bridge.on_mouse_event(move |e| {
            let _ = tx_b.send(e);
        });

        let event = PointerEvent {
            x: 1,
            y: 2,
            kind: PointerKind::PrimaryClick,
            captured_at_ms: 9,
        };
        let publisher = hub.publisher();
        publisher.publish(&InputEvent::Pointer(event)).await.unwrap();
        settle().await;

        assert_eq!(rx_a.try_recv().unwrap(), event);
        assert_eq!(rx_b.try_recv().unwrap(), event);

        drop(publisher);
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_after_shutdown_reports_closed() {
        let hub = RelayHub::new(16);
        let publisher = hub.publisher();
        hub.shutdown().await;

        let event = InputEvent::Keyboard(key_event("x", KeyPhase::Pressed));
        assert!(matches!(
            publisher.publish(&event).await,
            Err(RelayError::Closed)
        ));
    }
}
