//! Input source trait definitions
//!
//! Defines the seams between the capture loops and the ambient input surface.
//! The host collaborator provides the implementations; the loops only ever see
//! these traits, so no OS-level capability leaks past this boundary.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur while talking to an input surface
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("input surface unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied by host: {0}")]
    PermissionDenied(String),

    #[error("transient read failure: {0}")]
    Transient(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// A raw key transition as reported by the input surface, before any
/// phase-pairing filtering is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: String,
    pub pressed: bool,
}

/// A single pointer reading: position plus current button state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerSample {
    pub x: i32,
    pub y: i32,
    pub primary: bool,
    pub secondary: bool,
}

/// Detaches the underlying listeners when asked, or on drop.
///
/// `detach` runs the teardown at most once, so calling it again (or dropping
/// the guard after an explicit detach) is safe.
pub struct ListenerGuard(Option<Box<dyn FnOnce() + Send>>);

impl ListenerGuard {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(teardown)))
    }

    /// A guard with nothing to tear down.
    pub fn noop() -> Self {
        Self(None)
    }

    /// Run the teardown. Idempotent.
    pub fn detach(&mut self) {
        if let Some(teardown) = self.0.take() {
            teardown();
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A stream of raw key transitions plus the guard that detaches the
/// underlying listeners.
pub struct KeyStream {
    rx: mpsc::Receiver<KeyTransition>,
    guard: ListenerGuard,
}

impl KeyStream {
    pub fn new(rx: mpsc::Receiver<KeyTransition>, guard: ListenerGuard) -> Self {
        Self { rx, guard }
    }

    /// Receive the next raw transition. Returns `None` once the source has
    /// closed its side of the stream.
    pub async fn recv(&mut self) -> Option<KeyTransition> {
        self.rx.recv().await
    }

    /// Detach the underlying listeners. Idempotent; also runs on drop.
    pub fn detach(&mut self) {
        self.guard.detach();
    }
}

/// A keyboard input surface.
///
/// `attach` registers the press and release listeners and hands back the
/// resulting stream. Implementations must tolerate repeated
/// attach/detach cycles.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn attach(&self) -> SourceResult<KeyStream>;
}

/// A pointer input surface, read by sampling.
pub trait PointerSource: Send {
    /// Read the current pointer position and button state. A `Transient`
    /// error means this reading failed but the next may succeed.
    fn sample(&mut self) -> SourceResult<PointerSample>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_guard_detach_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();

        let mut guard = ListenerGuard::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        guard.detach();
        guard.detach();
        drop(guard);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_runs_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();

        drop(ListenerGuard::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_noop_guard_is_safe() {
        let mut guard = ListenerGuard::noop();
        guard.detach();
    }
}
