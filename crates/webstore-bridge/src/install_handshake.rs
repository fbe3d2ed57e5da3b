use std::future::Future;

use webstore_protocol::{
    ExtensionManifest, InstallOutcome, InstallRequest, WebStoreReply,
    WEBSTORE_ERROR_INVALID_MANIFEST, WEBSTORE_ERROR_USER_CANCELLED,
};
use webstore_registry::{current_unix_timestamp_ms, ExtensionRecord};

use crate::consent::{ConsentDecision, InstallConsentPrompt};
use crate::evaluator::{ExtensionIcon, InstallEvaluation};
use crate::{ReplyChannel, WebStoreMessageHandler};

const PENDING_INSTALL_VERSION_FALLBACK: &str = "0.0.0";

/// Terminal state of one `beginInstallWithManifest3` handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallHandshakeOutcome {
    UserAccepted,
    UserCancelled,
    ConsentTimedOut,
    AlreadyInstalled,
    Rejected,
}

/// Install the user approved, waiting for `completeInstall`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInstall {
    pub request: InstallRequest,
    pub manifest: ExtensionManifest,
    pub accepted_unix_ms: u64,
}

impl PendingInstall {
    pub fn to_record(&self, installed_unix_ms: u64) -> ExtensionRecord {
        ExtensionRecord {
            id: self.request.id.clone(),
            name: self.request.localized_name.clone(),
            version: self
                .manifest
                .version
                .clone()
                .unwrap_or_else(|| PENDING_INSTALL_VERSION_FALLBACK.to_string()),
            description: self.manifest.description.clone().unwrap_or_default(),
            icon_url: self.request.icon_url().map(str::to_string),
            permissions: self.manifest.permissions().to_vec(),
            enabled: true,
            installed_unix_ms,
            manifest: self.request.manifest.clone(),
        }
    }
}

impl WebStoreMessageHandler {
    #[tracing::instrument(
        name = "webstore_bridge.install_handshake",
        skip_all,
        fields(extension_id = %request.id)
    )]
    pub(crate) async fn begin_install_with_manifest3(
        &self,
        request: InstallRequest,
        reply: ReplyChannel,
    ) -> InstallHandshakeOutcome {
        let evaluation = self.evaluator.evaluate(&request).await;
        let outcome = match evaluation {
            InstallEvaluation {
                outcome: InstallOutcome::UserGestureRequired,
                icon: Some(icon),
                manifest: Some(manifest),
            } => {
                self.await_install_consent(request, icon, manifest, reply)
                    .await
            }
            InstallEvaluation {
                outcome: InstallOutcome::AlreadyInstalled,
                ..
            } => {
                reply.send(WebStoreReply::empty_success());
                InstallHandshakeOutcome::AlreadyInstalled
            }
            _ => {
                reply.send(WebStoreReply::failure(WEBSTORE_ERROR_INVALID_MANIFEST));
                InstallHandshakeOutcome::Rejected
            }
        };
        tracing::info!(?outcome, "install handshake finished");
        outcome
    }

    async fn await_install_consent(
        &self,
        request: InstallRequest,
        icon: ExtensionIcon,
        manifest: ExtensionManifest,
        reply: ReplyChannel,
    ) -> InstallHandshakeOutcome {
        let prompt = InstallConsentPrompt {
            extension_id: request.id.clone(),
            title: request.localized_name.clone(),
            author: manifest.author_label().to_string(),
            icon_url: icon.url,
            permissions: manifest.permissions().to_vec(),
        };

        let decision = self
            .await_decision(self.presenter.request_consent(&prompt))
            .await;
        let outcome = match decision {
            Some(ConsentDecision::Accepted) => {
                // Recorded before replying so an immediate completeInstall sees it.
                self.record_pending_install(PendingInstall {
                    request,
                    manifest,
                    accepted_unix_ms: current_unix_timestamp_ms(),
                });
                reply.send(WebStoreReply::empty_success());
                InstallHandshakeOutcome::UserAccepted
            }
            Some(ConsentDecision::Cancelled) => {
                reply.send(WebStoreReply::failure(WEBSTORE_ERROR_USER_CANCELLED));
                InstallHandshakeOutcome::UserCancelled
            }
            None => {
                tracing::warn!(
                    timeout_ms = ?self.config.consent_timeout_ms,
                    "install consent prompt timed out"
                );
                reply.send(WebStoreReply::failure(WEBSTORE_ERROR_USER_CANCELLED));
                InstallHandshakeOutcome::ConsentTimedOut
            }
        };
        self.presenter.dismiss(&prompt).await;
        outcome
    }

    /// Awaits a user decision, returning `None` when the consent timeout fires.
    pub(crate) async fn await_decision<F>(&self, decision: F) -> Option<ConsentDecision>
    where
        F: Future<Output = ConsentDecision>,
    {
        match self.config.consent_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, decision).await.ok(),
            None => Some(decision.await),
        }
    }
}
