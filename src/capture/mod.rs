//! Capture module - permission-gated input capture loops
//!
//! This module provides:
//! - Platform-independent event types
//! - Source traits the host collaborator implements for each input surface
//! - One capture loop per modality (keyboard listener-driven, pointer polled)
//!
//! Loops are spawned armed but idle: they attach to their surface only when
//! the permission signal turns true, and detach within one scheduling tick of
//! it turning false.

mod events;
mod keyboard;
mod pointer;
mod source;
mod stdin;

pub use events::*;
pub use keyboard::KeyboardCapture;
pub use pointer::PointerCapture;
pub use source::*;
pub use stdin::StdinKeySource;

#[cfg(test)]
pub(crate) use source::testing;

use tokio::sync::watch;
use tokio::time::Instant;

/// Stamp an event relative to the capture epoch, clamped so timestamps never
/// go backwards within one loop's output.
pub(crate) fn monotonic_ms(epoch: Instant, last_ms: &mut u64) -> u64 {
    let now = epoch.elapsed().as_millis() as u64;
    let stamped = now.max(*last_ms);
    *last_ms = stamped;
    stamped
}

/// Wait until the permission signal reaches `target`. Errors when the signal
/// source is gone, which means the session is over.
pub(crate) async fn wait_for(
    enabled: &mut watch::Receiver<bool>,
    target: bool,
) -> Result<(), watch::error::RecvError> {
    loop {
        if *enabled.borrow_and_update() == target {
            return Ok(());
        }
        enabled.changed().await?;
    }
}
