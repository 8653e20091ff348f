//! Consent module - permission negotiation for input capture
//!
//! Capture never starts on its own: the negotiator asks the user exactly once
//! per session, and only an explicit grant arms the capture loops. The grant
//! travels on a single watch channel that doubles as the revocation signal,
//! so every loop observes a later `false` as cancellation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::relay::PERMISSION_STATUS;

/// Index of the grant option in a consent prompt.
pub const GRANT_CHOICE: usize = 0;

/// Consent errors
#[derive(Error, Debug)]
pub enum ConsentError {
    #[error("prompt mechanism unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("consent was already negotiated for this session")]
    AlreadyNegotiated,
}

pub type ConsentResult<T> = Result<T, ConsentError>;

/// Kind of prompt requested from the host collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptKind {
    #[serde(rename = "question")]
    Question,
}

/// A prompt request handed to the host collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    pub kind: PromptKind,
    /// Choice labels; index 0 is the grant option.
    pub options: Vec<String>,
    /// Index of the option selected when the user just dismisses the prompt.
    pub default_option: usize,
    pub title: String,
    pub message: String,
    pub detail: String,
}

impl PromptRequest {
    /// Build the standard binary grant/deny question. The default is deny.
    pub fn consent(title: &str, message: &str, detail: &str) -> Self {
        Self {
            kind: PromptKind::Question,
            options: vec!["Share input".to_string(), "Don't share".to_string()],
            default_option: 1,
            title: title.to_string(),
            message: message.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// The host collaborator's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptResponse {
    pub choice_index: usize,
}

impl PromptResponse {
    /// Only an explicit first-option choice grants capture.
    pub fn grants(&self) -> bool {
        self.choice_index == GRANT_CHOICE
    }
}

/// Presents a consent prompt to the user and suspends until they answer.
#[async_trait]
pub trait ConsentPrompt: Send + Sync {
    async fn present(&self, request: &PromptRequest) -> ConsentResult<PromptResponse>;
}

/// Prompt backed by the controlling terminal.
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsentPrompt for TerminalPrompt {
    async fn present(&self, request: &PromptRequest) -> ConsentResult<PromptResponse> {
        println!("\n{}", request.title);
        println!("{}", request.message);
        println!("{}", request.detail);
        for (index, option) in request.options.iter().enumerate() {
            println!("  [{}] {}", index, option);
        }
        print!("Choice [default {}]: ", request.default_option);
        use std::io::Write;
        std::io::stdout().flush()?;

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(ConsentError::Unavailable(
                "terminal closed before a choice was made".to_string(),
            ));
        }

        let choice_index = match line.trim() {
            "y" | "yes" => GRANT_CHOICE,
            "n" | "no" | "" => request.default_option,
            other => other.parse().unwrap_or(request.default_option),
        };

        Ok(PromptResponse { choice_index })
    }
}

/// Negotiates capture permission and owns the grant signal.
///
/// Single writer of the permission channel; capture loops hold receivers and
/// only ever read it.
pub struct ConsentNegotiator {
    tx: watch::Sender<bool>,
    request: PromptRequest,
    negotiated: bool,
}

impl ConsentNegotiator {
    /// Create a negotiator. Capture starts disabled.
    pub fn new(request: PromptRequest) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx,
            request,
            negotiated: false,
        }
    }

    /// Subscribe to the permission signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Current permission state.
    pub fn is_granted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Present the prompt and publish the decision.
    ///
    /// Runs at most once per session. A failing prompt mechanism is an
    /// implicit deny: capture must never start by default.
    pub async fn negotiate<P: ConsentPrompt + ?Sized>(
        &mut self,
        prompt: &P,
    ) -> ConsentResult<bool> {
        if self.negotiated {
            return Err(ConsentError::AlreadyNegotiated);
        }
        self.negotiated = true;

        let granted = match prompt.present(&self.request).await {
            Ok(response) => response.grants(),
            Err(e) => {
                tracing::warn!(error = %e, "consent prompt failed; treating as deny");
                false
            }
        };

        self.tx.send_replace(granted);
        tracing::debug!(channel = PERMISSION_STATUS, granted, "permission signal published");
        Ok(granted)
    }

    /// Withdraw a previous grant. Safe to call at any time, any number of
    /// times; running loops observe the transition as cancellation.
    pub fn revoke(&self) {
        let was_granted = self.tx.send_replace(false);
        if was_granted {
            tracing::info!("capture permission revoked");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Prompt answering with a fixed choice index.
    pub(crate) struct ScriptedPrompt(pub usize);

    #[async_trait]
    impl ConsentPrompt for ScriptedPrompt {
        async fn present(&self, _request: &PromptRequest) -> ConsentResult<PromptResponse> {
            Ok(PromptResponse {
                choice_index: self.0,
            })
        }
    }

    /// Prompt whose presentation always fails.
    pub(crate) struct FailingPrompt;

    #[async_trait]
    impl ConsentPrompt for FailingPrompt {
        async fn present(&self, _request: &PromptRequest) -> ConsentResult<PromptResponse> {
            Err(ConsentError::Unavailable("no display".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingPrompt, ScriptedPrompt};
    use super::*;

    fn request() -> PromptRequest {
        PromptRequest::consent("Share input?", "Capture keys?", "Revocable at any time.")
    }

    #[test]
    fn test_consent_request_shape() {
        let req = request();
        assert_eq!(req.kind, PromptKind::Question);
        assert_eq!(req.options.len(), 2);
        assert_eq!(req.default_option, 1);
    }

    #[test]
    fn test_only_first_choice_grants() {
        assert!(PromptResponse { choice_index: 0 }.grants());
        assert!(!PromptResponse { choice_index: 1 }.grants());
        assert!(!PromptResponse { choice_index: 7 }.grants());
    }

    #[tokio::test]
    async fn test_grant_sets_signal() {
        let mut negotiator = ConsentNegotiator::new(request());
        let rx = negotiator.subscribe();
        assert!(!*rx.borrow());

        let granted = negotiator.negotiate(&ScriptedPrompt(0)).await.unwrap();
        assert!(granted);
        assert!(*rx.borrow());
        assert!(negotiator.is_granted());
    }

    #[tokio::test]
    async fn test_deny_keeps_signal_low() {
        let mut negotiator = ConsentNegotiator::new(request());
        let granted = negotiator.negotiate(&ScriptedPrompt(1)).await.unwrap();
        assert!(!granted);
        assert!(!negotiator.is_granted());
    }

    #[tokio::test]
    async fn test_prompt_failure_is_implicit_deny() {
        let mut negotiator = ConsentNegotiator::new(request());
        let granted = negotiator.negotiate(&FailingPrompt).await.unwrap();
        assert!(!granted);
        assert!(!negotiator.is_granted());
    }

    #[tokio::test]
    async fn test_second_negotiation_rejected() {
        let mut negotiator = ConsentNegotiator::new(request());
        negotiator.negotiate(&ScriptedPrompt(0)).await.unwrap();

        let second = negotiator.negotiate(&ScriptedPrompt(0)).await;
        assert!(matches!(second, Err(ConsentError::AlreadyNegotiated)));
        // The first decision stands.
        assert!(negotiator.is_granted());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let mut negotiator = ConsentNegotiator::new(request());
        negotiator.negotiate(&ScriptedPrompt(0)).await.unwrap();

        negotiator.revoke();
        assert!(!negotiator.is_granted());
        // Revoking with no active grant is a no-op, not an error.
        negotiator.revoke();
        assert!(!negotiator.is_granted());
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let mut negotiator = ConsentNegotiator::new(request());
        let mut rx = negotiator.subscribe();

        negotiator.negotiate(&ScriptedPrompt(0)).await.unwrap();
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());

        negotiator.revoke();
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
    }
}
