use std::time::Duration;

use crate::BridgeError;

pub const WEBSTORE_SCRIPT_NAME_DEFAULT: &str = "WebStorePrivateAPIScript";
pub const WEBSTORE_CONSENT_TIMEOUT_MS_DEFAULT: u64 = 300_000;
pub const WEBSTORE_CONSENT_TIMEOUT_MS_MAX: u64 = 3_600_000;
pub const WEBSTORE_MAX_MESSAGE_BYTES_DEFAULT: usize = 64 * 1024;
const WEBSTORE_MAX_MESSAGE_BYTES_LIMIT: usize = 16 * 1024 * 1024;

/// Runtime settings for [`crate::WebStoreMessageHandler`].
///
/// # Examples
///
/// ```
/// use webstore_bridge::WebStoreBridgeConfig;
///
/// let config = WebStoreBridgeConfig {
///     consent_timeout_ms: Some(30_000),
///     ..WebStoreBridgeConfig::default()
/// };
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct WebStoreBridgeConfig {
    pub script_name: String,
    /// Fixed security token; a fresh one is generated per handler when unset.
    pub security_token: Option<String>,
    pub consent_timeout_ms: Option<u64>,
    pub max_message_bytes: usize,
}

impl Default for WebStoreBridgeConfig {
    fn default() -> Self {
        Self {
            script_name: WEBSTORE_SCRIPT_NAME_DEFAULT.to_string(),
            security_token: None,
            consent_timeout_ms: Some(WEBSTORE_CONSENT_TIMEOUT_MS_DEFAULT),
            max_message_bytes: WEBSTORE_MAX_MESSAGE_BYTES_DEFAULT,
        }
    }
}

impl std::fmt::Debug for WebStoreBridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebStoreBridgeConfig")
            .field("script_name", &self.script_name)
            .field(
                "security_token",
                &self.security_token.as_ref().map(|_| "<redacted>"),
            )
            .field("consent_timeout_ms", &self.consent_timeout_ms)
            .field("max_message_bytes", &self.max_message_bytes)
            .finish()
    }
}

impl WebStoreBridgeConfig {
    pub fn validate(&self) -> Result<(), BridgeError> {
        let script_name = self.script_name.trim();
        if script_name.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "script_name must be non-empty".to_string(),
            ));
        }
        if !script_name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(BridgeError::InvalidConfig(format!(
                "script_name '{script_name}' may only contain ASCII letters, digits, and '_'"
            )));
        }
        if let Some(token) = self.security_token.as_deref() {
            if token.trim().is_empty() {
                return Err(BridgeError::InvalidConfig(
                    "security_token must be non-empty when provided".to_string(),
                ));
            }
        }
        match self.consent_timeout_ms {
            Some(0) => {
                return Err(BridgeError::InvalidConfig(
                    "consent_timeout_ms must be greater than zero".to_string(),
                ))
            }
            Some(timeout_ms) if timeout_ms > WEBSTORE_CONSENT_TIMEOUT_MS_MAX => {
                return Err(BridgeError::InvalidConfig(format!(
                    "consent_timeout_ms {timeout_ms} exceeds {WEBSTORE_CONSENT_TIMEOUT_MS_MAX}"
                )))
            }
            _ => {}
        }
        if self.max_message_bytes == 0 || self.max_message_bytes > WEBSTORE_MAX_MESSAGE_BYTES_LIMIT
        {
            return Err(BridgeError::InvalidConfig(format!(
                "max_message_bytes must be between 1 and {WEBSTORE_MAX_MESSAGE_BYTES_LIMIT}"
            )));
        }
        Ok(())
    }

    pub fn consent_timeout(&self) -> Option<Duration> {
        self.consent_timeout_ms.map(Duration::from_millis)
    }
}
