//! Session module - one consent-gated capture session
//!
//! A session owns the pieces the host shell needs wired together: the
//! consent negotiator (single writer of the permission signal), the relay
//! hub, and the capture loop tasks. Loops are armed at session setup but
//! attach to their input surfaces only once consent is granted; a deny means
//! no listener is ever registered.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::capture::{KeySource, KeyboardCapture, PointerCapture, PointerSource};
use crate::config::Config;
use crate::consent::{ConsentNegotiator, ConsentPrompt, ConsentResult};
use crate::relay::{DisplayBridge, RelayHub};

/// A capture session
pub struct CaptureSession {
    id: Uuid,
    config: Config,
    negotiator: ConsentNegotiator,
    hub: RelayHub,
    epoch: Instant,
    tasks: Vec<JoinHandle<()>>,
}

impl CaptureSession {
    /// Create a session. Capture starts disabled and stays disabled until
    /// [`negotiate`](Self::negotiate) resolves to a grant.
    pub fn new(config: Config) -> Self {
        let id = Uuid::new_v4();
        let negotiator = ConsentNegotiator::new(config.consent_request());
        let hub = RelayHub::new(config.relay.capacity);

        tracing::info!(session = %id, host = %config.general.name, "capture session created");

        Self {
            id,
            config,
            negotiator,
            hub,
            epoch: Instant::now(),
            tasks: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The narrow handle for the display surface. It can register event
    /// consumers and nothing else.
    pub fn bridge(&self) -> DisplayBridge {
        self.hub.bridge()
    }

    /// Current permission state. Trusted side only; the bridge deliberately
    /// has no equivalent.
    pub fn is_enabled(&self) -> bool {
        self.negotiator.is_granted()
    }

    /// Arm the keyboard loop over the given surface.
    pub fn arm_keyboard<S: KeySource + 'static>(&mut self, source: S) {
        let capture = KeyboardCapture::new(
            source,
            self.negotiator.subscribe(),
            self.hub.publisher(),
            self.epoch,
        );
        self.tasks.push(capture.spawn());
        tracing::debug!(session = %self.id, "keyboard loop armed");
    }

    /// Arm the pointer loop over the given surface.
    pub fn arm_pointer<S: PointerSource + 'static>(&mut self, source: S) {
        let capture = PointerCapture::new(
            source,
            self.negotiator.subscribe(),
            self.hub.publisher(),
            self.epoch,
            Duration::from_millis(self.config.capture.throttle_ms),
            Duration::from_millis(self.config.capture.tick_ms),
        );
        self.tasks.push(capture.spawn());
        tracing::debug!(session = %self.id, "pointer loop armed");
    }

    /// Run the consent step. Suspends until the user answers; on grant the
    /// armed loops attach, on deny (or a failed prompt) they stay idle.
    pub async fn negotiate<P: ConsentPrompt + ?Sized>(&mut self, prompt: &P) -> ConsentResult<bool> {
        let granted = self.negotiator.negotiate(prompt).await?;
        if granted {
            tracing::info!(session = %self.id, "capture enabled");
        } else {
            tracing::info!(session = %self.id, "capture denied");
        }
        Ok(granted)
    }

    /// Withdraw the grant. Loops detach within one scheduling tick.
    pub fn revoke(&self) {
        self.negotiator.revoke();
    }

    /// Revoke, stop the loops, and tear down the relay.
    pub async fn shutdown(self) {
        let CaptureSession {
            id,
            negotiator,
            hub,
            tasks,
            ..
        } = self;

        negotiator.revoke();
        // Dropping the negotiator closes the permission channel, which ends
        // every armed loop.
        drop(negotiator);
        for task in tasks {
            let _ = task.await;
        }
        hub.shutdown().await;

        tracing::info!(session = %id, "capture session closed");
    }
}
