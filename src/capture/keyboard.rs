//! Keyboard capture loop
//!
//! Listener-driven: the loop attaches press/release listeners when capture is
//! granted, turns raw transitions into phase-paired [`KeyEvent`]s, and
//! detaches when the grant is withdrawn. Attach and detach happen exactly
//! once per permission transition, so repeated grant/revoke cycles never
//! stack listeners.

use std::collections::HashSet;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::events::{InputEvent, KeyEvent, KeyPhase};
use super::source::{KeySource, KeyTransition};
use super::{monotonic_ms, wait_for};
use crate::relay::RelayPublisher;

/// Captures keyboard input while the permission signal is high.
pub struct KeyboardCapture<S> {
    source: S,
    enabled: watch::Receiver<bool>,
    publisher: RelayPublisher,
    epoch: Instant,
}

impl<S: KeySource + 'static> KeyboardCapture<S> {
    pub fn new(
        source: S,
        enabled: watch::Receiver<bool>,
        publisher: RelayPublisher,
        epoch: Instant,
    ) -> Self {
        Self {
            source,
            enabled,
            publisher,
            epoch,
        }
    }

    /// Spawn the loop as a task. It runs until the permission signal source
    /// or the relay goes away.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut pressed: HashSet<String> = HashSet::new();
        let mut last_ms = 0u64;

        loop {
            if wait_for(&mut self.enabled, true).await.is_err() {
                return;
            }

            let mut stream = match self.source.attach().await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "keyboard listener attach failed; keyboard capture disabled until next grant"
                    );
                    if wait_for(&mut self.enabled, false).await.is_err() {
                        return;
                    }
                    continue;
                }
            };
            tracing::debug!("keyboard listeners attached");

            let mut surface_closed = false;
            loop {
                tokio::select! {
                    // Revocation wins over buffered input: nothing observed
                    // after the signal drops is relayed.
                    biased;
                    changed = self.enabled.changed() => {
                        match changed {
                            Ok(()) if *self.enabled.borrow_and_update() => {}
                            _ => break,
                        }
                    }
                    transition = stream.recv() => {
                        let Some(transition) = transition else {
                            tracing::warn!(
                                "keyboard surface closed its stream; keyboard capture disabled until next grant"
                            );
                            surface_closed = true;
                            break;
                        };
                        if let Some(event) =
                            filter_transition(&mut pressed, &mut last_ms, self.epoch, transition)
                        {
                            if self
                                .publisher
                                .publish(&InputEvent::Keyboard(event))
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                    }
                }
            }

            stream.detach();
            pressed.clear();
            tracing::debug!("keyboard listeners detached");

            if surface_closed && wait_for(&mut self.enabled, false).await.is_err() {
                return;
            }
        }
    }
}

/// Turn a raw transition into a phase-paired event, or drop it.
/// Invariant: for any key, emitted phases strictly alternate starting with
/// a press. Auto-repeat presses and unmatched releases produce nothing.
fn filter_transition(
    pressed: &mut HashSet<String>,
    last_ms: &mut u64,
    epoch: Instant,
    transition: KeyTransition,
) -> Option<KeyEvent> {
    let phase = if transition.pressed {
        if !pressed.insert(transition.key.clone()) {
            return None;
        }
        KeyPhase::Pressed
    } else {
        if !pressed.remove(&transition.key) {
            return None;
        }
        KeyPhase::Released
    };

    Some(KeyEvent {
        key: transition.key,
        phase,
        captured_at_ms: monotonic_ms(epoch, last_ms),
    })
}
