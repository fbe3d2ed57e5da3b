//! Browser-side handler for the extension web store script bridge.
//!
//! Verifies the per-session security token, routes typed web store requests
//! against the extension registry, and runs the install handshake with an
//! asynchronous user-consent step. Every dispatched message is answered once
//! through a [`ReplyChannel`].

mod config;
mod consent;
mod evaluator;
mod handler;
mod install_handshake;
mod reply_channel;
mod security_token;

use thiserror::Error;

pub use config::{
    WebStoreBridgeConfig, WEBSTORE_CONSENT_TIMEOUT_MS_DEFAULT, WEBSTORE_CONSENT_TIMEOUT_MS_MAX,
    WEBSTORE_MAX_MESSAGE_BYTES_DEFAULT, WEBSTORE_SCRIPT_NAME_DEFAULT,
};
pub use consent::{
    ChannelConsentPresenter, ConsentDecision, ConsentPresenter, ConsentResponder,
    ConsentUiEvent, InstallConsentPrompt, StaticConsentPresenter, UninstallConfirmPrompt,
};
pub use evaluator::{
    ExtensionIcon, InstallEvaluation, InstallEvaluator, RegistryInstallEvaluator,
};
pub use handler::{ScriptMessage, WebStoreMessageHandler};
pub use install_handshake::{InstallHandshakeOutcome, PendingInstall};
pub use reply_channel::{ReplyChannel, ReplyChannelClosed, ReplyReceiver};
pub use security_token::SecurityToken;

/// Enumerates supported `BridgeError` values.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("web store message rejected: security token mismatch for handler '{handler_name}'")]
    SecurityTokenMismatch { handler_name: String },
    #[error("invalid web store bridge configuration: {0}")]
    InvalidConfig(String),
}
