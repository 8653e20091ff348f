//! Pointer capture loop
//!
//! Sampling-driven: while capture is granted the loop polls the pointer
//! surface once per tick, emits `move` events through a combined time-and-
//! delta gate, and emits click events on button press edges. Unbounded
//! sampling would flood the relay with redundant events, so a `move` goes out
//! at most once per throttle window and only when the position actually
//! changed.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::events::{InputEvent, PointerEvent, PointerKind};
use super::source::{PointerSample, PointerSource};
use super::{monotonic_ms, wait_for};
use crate::relay::RelayPublisher;

/// Throttle window for `move` events: one frame at 60 Hz.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(16);

/// Delay between consecutive samples.
pub const DEFAULT_TICK: Duration = Duration::from_millis(4);

/// Captures pointer input while the permission signal is high.
pub struct PointerCapture<S> {
    source: S,
    enabled: watch::Receiver<bool>,
    publisher: RelayPublisher,
    epoch: Instant,
    throttle: Duration,
    tick: Duration,
}

impl<S: PointerSource + 'static> PointerCapture<S> {
    pub fn new(
        source: S,
        enabled: watch::Receiver<bool>,
        publisher: RelayPublisher,
        epoch: Instant,
        throttle: Duration,
        tick: Duration,
    ) -> Self {
        Self {
            source,
            enabled,
            publisher,
            epoch,
            throttle,
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    /// Spawn the loop as a task. It runs until the permission signal source
    /// or the relay goes away.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut last_ms = 0u64;

        loop {
            if wait_for(&mut self.enabled, true).await.is_err() {
                return;
            }
            tracing::debug!("pointer sampling started");

            // Baseline resets on every grant: position and button state from
            // before the grant must not leak into this session.
            let mut gate = SampleGate::new();

            loop {
                match self.source.sample() {
                    Ok(sample) => {
                        for (kind, x, y) in gate.observe(sample, self.throttle, Instant::now()) {
                            let event = PointerEvent {
                                x,
                                y,
                                kind,
                                captured_at_ms: monotonic_ms(self.epoch, &mut last_ms),
                            };
                            if self
                                .publisher
                                .publish(&InputEvent::Pointer(event))
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::trace!(error = %e, "pointer sample failed; skipping iteration");
                    }
                }

                tokio::select! {
                    biased;
                    changed = self.enabled.changed() => {
                        match changed {
                            Ok(()) if *self.enabled.borrow_and_update() => {}
                            _ => break,
                        }
                    }
                    _ = tokio::time::sleep(self.tick) => {}
                }
            }

            tracing::debug!("pointer sampling stopped");
        }
    }
}

/// Decides which events a pointer reading produces.
///
/// The first reading after a grant only establishes the baseline: a pointer
/// sitting still emits nothing, and a button already held does not count as a
/// click.
struct SampleGate {
    primed: bool,
    last_position: (i32, i32),
    last_move_at: Option<Instant>,
    primary_held: bool,
    secondary_held: bool,
}

impl SampleGate {
    fn new() -> Self {
        Self {
            primed: false,
            last_position: (0, 0),
            last_move_at: None,
            primary_held: false,
            secondary_held: false,
        }
    }

    fn observe(
        &mut self,
        sample: PointerSample,
        throttle: Duration,
        now: Instant,
    ) -> Vec<(PointerKind, i32, i32)> {
        let mut emitted = Vec::new();

        if !self.primed {
            self.primed = true;
            self.last_position = (sample.x, sample.y);
            self.primary_held = sample.primary;
            self.secondary_held = sample.secondary;
            return emitted;
        }

        // Click events are edge-triggered and never throttled.
        if sample.primary && !self.primary_held {
            emitted.push((PointerKind::PrimaryClick, sample.x, sample.y));
        }
        if sample.secondary && !self.secondary_held {
            emitted.push((PointerKind::SecondaryClick, sample.x, sample.y));
        }
        self.primary_held = sample.primary;
        self.secondary_held = sample.secondary;

        // A move needs both gates open: the throttle window has passed AND
        // the position actually changed.
        let position = (sample.x, sample.y);
        let window_open = self
            .last_move_at
            .map_or(true, |at| now.duration_since(at) >= throttle);
        if window_open && position != self.last_position {
            emitted.push((PointerKind::Move, sample.x, sample.y));
            self.last_position = position;
            self.last_move_at = Some(now);
        }

        emitted
    }
}
