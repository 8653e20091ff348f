//! Stdin-backed key source
//!
//! Adapts the controlling terminal as an ambient keyboard surface for the
//! bundled binary. A terminal only reports completed keystrokes, so each byte
//! read becomes a press/release pair. Real hosts integrate their own surface
//! behind [`KeySource`](super::KeySource).

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use super::source::{KeySource, KeyStream, KeyTransition, ListenerGuard, SourceResult};

/// Key source reading the process's standard input.
pub struct StdinKeySource {
    capacity: usize,
}

impl StdinKeySource {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

#[async_trait]
impl KeySource for StdinKeySource {
    async fn attach(&self) -> SourceResult<KeyStream> {
        let (tx, rx) = mpsc::channel(self.capacity.max(1));

        let reader = tokio::spawn(async move {
            let mut stdin = tokio::io::stdin();
            let mut buf = [0u8; 64];
            loop {
                let read = match stdin.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(read) => read,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed; closing key stream");
                        break;
                    }
                };

                for byte in &buf[..read] {
                    let Some(key) = key_name(*byte) else {
                        continue;
                    };
                    let pressed = KeyTransition {
                        key: key.clone(),
                        pressed: true,
                    };
                    let released = KeyTransition {
                        key,
                        pressed: false,
                    };
                    if tx.send(pressed).await.is_err() || tx.send(released).await.is_err() {
                        return;
                    }
                }
            }
        });

        let guard = ListenerGuard::new(move || reader.abort());
        Ok(KeyStream::new(rx, guard))
    }
}

/// Map a raw input byte to a key identifier. Bytes with no sensible name
/// (control sequences, non-ASCII fragments) are ignored.
fn key_name(byte: u8) -> Option<String> {
    match byte {
        b'\n' | b'\r' => Some("Enter".to_string()),
        b'\t' => Some("Tab".to_string()),
        b' ' => Some("Space".to_string()),
        0x1b => Some("Escape".to_string()),
        0x08 | 0x7f => Some("Backspace".to_string()),
        b if b.is_ascii_graphic() => Some((b as char).to_string()),
        _ => None,
    }
}
