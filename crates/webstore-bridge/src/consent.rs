use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

/// What the user is asked to approve before an extension is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallConsentPrompt {
    pub extension_id: String,
    pub title: String,
    pub author: String,
    pub icon_url: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UninstallConfirmPrompt {
    pub extension_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Accepted,
    Cancelled,
}

/// UI seam for the install consent step.
///
/// `request_consent` is the suspend point of the install handshake; the
/// handler calls `dismiss` exactly once after the decision has been replied.
/// Uninstall confirmations pair `confirm_uninstall` with `dismiss_uninstall`
/// the same way, including when the consent timeout fires.
#[async_trait]
pub trait ConsentPresenter: Send + Sync {
    async fn request_consent(&self, prompt: &InstallConsentPrompt) -> ConsentDecision;

    async fn dismiss(&self, prompt: &InstallConsentPrompt);

    async fn confirm_uninstall(&self, _prompt: &UninstallConfirmPrompt) -> ConsentDecision {
        ConsentDecision::Accepted
    }

    async fn dismiss_uninstall(&self, _prompt: &UninstallConfirmPrompt) {}
}

/// Answers every prompt with the same decision.
#[derive(Debug)]
pub struct StaticConsentPresenter {
    decision: ConsentDecision,
    presented: AtomicUsize,
    dismissed: AtomicUsize,
}

impl StaticConsentPresenter {
    pub fn new(decision: ConsentDecision) -> Self {
        Self {
            decision,
            presented: AtomicUsize::new(0),
            dismissed: AtomicUsize::new(0),
        }
    }

    pub fn presented_count(&self) -> usize {
        self.presented.load(Ordering::Relaxed)
    }

    pub fn dismissed_count(&self) -> usize {
        self.dismissed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ConsentPresenter for StaticConsentPresenter {
    async fn request_consent(&self, prompt: &InstallConsentPrompt) -> ConsentDecision {
        self.presented.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            extension_id = %prompt.extension_id,
            decision = ?self.decision,
            "answering install consent prompt automatically"
        );
        self.decision
    }

    async fn dismiss(&self, _prompt: &InstallConsentPrompt) {
        self.dismissed.fetch_add(1, Ordering::Relaxed);
    }

    async fn confirm_uninstall(&self, _prompt: &UninstallConfirmPrompt) -> ConsentDecision {
        self.presented.fetch_add(1, Ordering::Relaxed);
        self.decision
    }

    async fn dismiss_uninstall(&self, _prompt: &UninstallConfirmPrompt) {
        self.dismissed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Single-use answer handle handed to the UI; the first action wins.
#[derive(Debug)]
pub struct ConsentResponder {
    sender: oneshot::Sender<ConsentDecision>,
}

impl ConsentResponder {
    pub fn accept(self) {
        let _ = self.sender.send(ConsentDecision::Accepted);
    }

    pub fn cancel(self) {
        let _ = self.sender.send(ConsentDecision::Cancelled);
    }
}

/// Events a UI task consumes from [`ChannelConsentPresenter`].
#[derive(Debug)]
pub enum ConsentUiEvent {
    Present {
        prompt: InstallConsentPrompt,
        responder: ConsentResponder,
    },
    ConfirmUninstall {
        prompt: UninstallConfirmPrompt,
        responder: ConsentResponder,
    },
    Dismiss {
        prompt: InstallConsentPrompt,
    },
    DismissUninstall {
        prompt: UninstallConfirmPrompt,
    },
}

/// Forwards prompts to a UI task over a channel.
///
/// A responder dropped without an answer, or a closed UI channel, resolves
/// as [`ConsentDecision::Cancelled`].
#[derive(Debug, Clone)]
pub struct ChannelConsentPresenter {
    events: mpsc::UnboundedSender<ConsentUiEvent>,
}

impl ChannelConsentPresenter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConsentUiEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Self { events }, receiver)
    }

    async fn ask(&self, build: impl FnOnce(ConsentResponder) -> ConsentUiEvent) -> ConsentDecision {
        let (sender, receiver) = oneshot::channel();
        if self
            .events
            .send(build(ConsentResponder { sender }))
            .is_err()
        {
            tracing::warn!("consent UI channel closed; treating prompt as cancelled");
            return ConsentDecision::Cancelled;
        }
        receiver.await.unwrap_or(ConsentDecision::Cancelled)
    }
}

#[async_trait]
impl ConsentPresenter for ChannelConsentPresenter {
    async fn request_consent(&self, prompt: &InstallConsentPrompt) -> ConsentDecision {
        let prompt = prompt.clone();
        self.ask(|responder| ConsentUiEvent::Present { prompt, responder })
            .await
    }

    async fn dismiss(&self, prompt: &InstallConsentPrompt) {
        let _ = self.events.send(ConsentUiEvent::Dismiss {
            prompt: prompt.clone(),
        });
    }

    async fn confirm_uninstall(&self, prompt: &UninstallConfirmPrompt) -> ConsentDecision {
        let prompt = prompt.clone();
        self.ask(|responder| ConsentUiEvent::ConfirmUninstall { prompt, responder })
            .await
    }

    async fn dismiss_uninstall(&self, prompt: &UninstallConfirmPrompt) {
        let _ = self.events.send(ConsentUiEvent::DismissUninstall {
            prompt: prompt.clone(),
        });
    }
}
