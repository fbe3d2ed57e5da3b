use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use webstore_protocol::{
    parse_webstore_message, ExtensionStatus, MessageRejection, UninstallOptions, WebStoreReply,
    WebStoreRequest, WEBSTORE_ERROR_DETAIL_PREFIX, WEBSTORE_ERROR_USER_CANCELLED,
};
use webstore_registry::{
    current_unix_timestamp_ms, serialize_extension_records, ExtensionQueryKind, ExtensionRegistry,
};

use crate::consent::{ConsentDecision, ConsentPresenter, UninstallConfirmPrompt};
use crate::evaluator::{InstallEvaluator, RegistryInstallEvaluator};
use crate::install_handshake::PendingInstall;
use crate::{BridgeError, ReplyChannel, SecurityToken, WebStoreBridgeConfig};

/// Inbound message as delivered by the page script host.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptMessage {
    pub body: Value,
    pub security_token: Option<String>,
}

impl ScriptMessage {
    pub fn new(body: Value, security_token: impl Into<String>) -> Self {
        Self {
            body,
            security_token: Some(security_token.into()),
        }
    }
}

/// Validates and routes web store script messages.
pub struct WebStoreMessageHandler {
    pub(crate) config: WebStoreBridgeConfig,
    handler_name: String,
    security_token: SecurityToken,
    pub(crate) registry: Arc<ExtensionRegistry>,
    pub(crate) evaluator: Arc<dyn InstallEvaluator>,
    pub(crate) presenter: Arc<dyn ConsentPresenter>,
    pending_installs: Mutex<HashMap<String, PendingInstall>>,
}

impl WebStoreMessageHandler {
    pub fn new(
        config: WebStoreBridgeConfig,
        registry: Arc<ExtensionRegistry>,
        presenter: Arc<dyn ConsentPresenter>,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let security_token = match config.security_token.as_deref() {
            Some(token) => SecurityToken::from_value(token)?,
            None => SecurityToken::generate(),
        };
        let handler_name = security_token.handler_name(config.script_name.trim());
        let evaluator = Arc::new(RegistryInstallEvaluator::new(Arc::clone(&registry)));
        Ok(Self {
            config,
            handler_name,
            security_token,
            registry,
            evaluator,
            presenter,
            pending_installs: Mutex::new(HashMap::new()),
        })
    }

    /// Replaces the default registry-backed install policy.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn InstallEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn security_token(&self) -> &SecurityToken {
        &self.security_token
    }

    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    pub fn pending_install_ids(&self) -> Vec<String> {
        let mut ids = self
            .pending_installs()
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    /// Handles one message on its own task so a pending consent prompt never
    /// blocks other messages.
    pub fn spawn(
        self: &Arc<Self>,
        message: ScriptMessage,
        reply: ReplyChannel,
    ) -> JoinHandle<Result<(), BridgeError>> {
        let handler = Arc::clone(self);
        tokio::spawn(async move { handler.handle_message(message, reply).await })
    }

    /// Validates, decodes, and dispatches one message.
    ///
    /// Every dispatched message is answered exactly once through `reply`.
    /// A missing or mismatched security token is a caller contract violation:
    /// the message is not dispatched, no reply is sent, and an error returns.
    #[tracing::instrument(
        name = "webstore_bridge.dispatch",
        skip_all,
        fields(handler = %self.handler_name)
    )]
    pub async fn handle_message(
        &self,
        message: ScriptMessage,
        reply: ReplyChannel,
    ) -> Result<(), BridgeError> {
        if !self
            .security_token
            .verify(message.security_token.as_deref())
        {
            tracing::error!(
                "rejecting web store message with a missing or mismatched security token"
            );
            reply.reject();
            return Err(BridgeError::SecurityTokenMismatch {
                handler_name: self.handler_name.clone(),
            });
        }

        let request = match parse_webstore_message(
            &message.body,
            Some(self.config.max_message_bytes),
        ) {
            Ok(request) => request,
            Err(rejection) => {
                if let MessageRejection::UnhandledMessage { name } = &rejection {
                    tracing::warn!(message_name = %name, "unhandled web store message");
                } else {
                    tracing::debug!(%rejection, "rejected web store message");
                }
                reply.send(WebStoreReply::failure(rejection.reply_error()));
                return Ok(());
            }
        };

        tracing::debug!(kind = request.kind().as_str(), "dispatching web store message");
        match request {
            WebStoreRequest::BeginInstallWithManifest3(install_request) => {
                self.begin_install_with_manifest3(install_request, reply)
                    .await;
            }
            WebStoreRequest::GetExtensionStatus { extension_id } => {
                reply.send(self.extension_status(&extension_id));
            }
            WebStoreRequest::GetAll => reply.send(self.get_all()),
            WebStoreRequest::CompleteInstall { expected_id } => {
                reply.send(self.complete_install(&expected_id).await);
            }
            WebStoreRequest::Uninstall {
                extension_id,
                options,
            } => reply.send(self.uninstall(&extension_id, options).await),
        }
        Ok(())
    }

    fn extension_status(&self, extension_id: &str) -> WebStoreReply {
        let status = ExtensionStatus::from_installed(self.registry.is_installed(extension_id));
        WebStoreReply::success(Value::String(status.as_str().to_string()))
    }

    fn get_all(&self) -> WebStoreReply {
        let records = self.registry.get_all(ExtensionQueryKind::All);
        match serialize_extension_records(&records) {
            Ok(value) => WebStoreReply::success(value),
            Err(error) => {
                tracing::warn!(%error, "failed to serialize installed extensions");
                WebStoreReply::failure_with_result(
                    json!([]),
                    format!("{WEBSTORE_ERROR_DETAIL_PREFIX}{error}"),
                )
            }
        }
    }

    async fn complete_install(&self, expected_id: &str) -> WebStoreReply {
        let _guard = self.registry.lock_extension(expected_id).await;
        if let Some(pending) = self.take_pending_install(expected_id) {
            let record = pending.to_record(current_unix_timestamp_ms());
            let committed = self
                .write_registry(move |registry| registry.insert_extension(record))
                .await;
            if let Err(error) = committed {
                let detail = format!("{error:#}");
                tracing::error!(
                    extension_id = %expected_id,
                    %detail,
                    "failed to commit accepted install"
                );
                self.record_pending_install(pending);
                return WebStoreReply::detailed_failure(detail);
            }
            tracing::info!(extension_id = %expected_id, "committed accepted extension install");
        }

        let Some(record) = self
            .registry
            .get_extension(expected_id, ExtensionQueryKind::All)
        else {
            tracing::debug!(extension_id = %expected_id, "completeInstall for unknown extension");
            return WebStoreReply::detailed_failure(not_installed(expected_id));
        };
        match record.to_reply_value() {
            Ok(value) => WebStoreReply::success(value),
            Err(error) => WebStoreReply::detailed_failure(error),
        }
    }

    async fn uninstall(&self, extension_id: &str, options: UninstallOptions) -> WebStoreReply {
        let _guard = self.registry.lock_extension(extension_id).await;
        let Some(record) = self
            .registry
            .get_extension(extension_id, ExtensionQueryKind::All)
        else {
            tracing::debug!(%extension_id, "uninstall requested for unknown extension");
            return WebStoreReply::detailed_failure(not_installed(extension_id));
        };
        let reply_value = match record.to_reply_value() {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(
                    %extension_id,
                    %error,
                    "uninstall aborted: extension failed to serialize"
                );
                return WebStoreReply::detailed_failure(error);
            }
        };

        if options.show_confirm_dialog {
            let prompt = UninstallConfirmPrompt {
                extension_id: record.id.clone(),
                name: record.name.clone(),
            };
            let decision = self
                .await_decision(self.presenter.confirm_uninstall(&prompt))
                .await;
            self.presenter.dismiss_uninstall(&prompt).await;
            match decision {
                Some(ConsentDecision::Accepted) => {}
                Some(ConsentDecision::Cancelled) => {
                    tracing::info!(%extension_id, "uninstall cancelled by user");
                    return WebStoreReply::failure(WEBSTORE_ERROR_USER_CANCELLED);
                }
                None => {
                    tracing::warn!(
                        %extension_id,
                        timeout_ms = ?self.config.consent_timeout_ms,
                        "uninstall confirmation timed out"
                    );
                    return WebStoreReply::failure(WEBSTORE_ERROR_USER_CANCELLED);
                }
            }
        }

        let id = extension_id.to_string();
        match self
            .write_registry(move |registry| registry.remove_extension(&id))
            .await
        {
            Ok(Some(_)) => tracing::info!(%extension_id, "uninstalled extension"),
            Ok(None) => tracing::debug!(%extension_id, "extension already removed"),
            Err(error) => return WebStoreReply::detailed_failure(format!("{error:#}")),
        }
        self.take_pending_install(extension_id);
        WebStoreReply::success(reply_value)
    }

    /// Runs a registry write on the blocking pool, since persisting does file I/O.
    async fn write_registry<T, F>(&self, write: F) -> anyhow::Result<T>
    where
        F: FnOnce(&ExtensionRegistry) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || write(registry.as_ref()))
            .await
            .context("extension registry write task failed")?
    }

    pub(crate) fn record_pending_install(&self, pending: PendingInstall) {
        self.pending_installs()
            .insert(pending.request.id.clone(), pending);
    }

    fn take_pending_install(&self, extension_id: &str) -> Option<PendingInstall> {
        self.pending_installs().remove(extension_id)
    }

    /// Locks the pending map after dropping installs accepted longer ago than
    /// the consent timeout.
    fn pending_installs(&self) -> MutexGuard<'_, HashMap<String, PendingInstall>> {
        let mut pending = self
            .pending_installs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(ttl_ms) = self.config.consent_timeout_ms {
            let now = current_unix_timestamp_ms();
            pending.retain(|extension_id, install| {
                let fresh = now.saturating_sub(install.accepted_unix_ms) <= ttl_ms;
                if !fresh {
                    tracing::info!(%extension_id, "dropping expired pending install");
                }
                fresh
            });
        }
        pending
    }
}

fn not_installed(extension_id: &str) -> String {
    format!("extension '{extension_id}' is not installed")
}

impl std::fmt::Debug for WebStoreMessageHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebStoreMessageHandler")
            .field("handler_name", &self.handler_name)
            .field("script_name", &self.config.script_name)
            .field("consent_timeout_ms", &self.config.consent_timeout_ms)
            .field("installed", &self.registry.len())
            .finish_non_exhaustive()
    }
}
