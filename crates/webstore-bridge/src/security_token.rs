use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::BridgeError;

const SECURITY_TOKEN_RANDOM_BYTES: usize = 48;
const SECURITY_TOKEN_CHARS: usize = 64;
const HANDLER_NAME_SUFFIX_CHARS: usize = 16;

/// Per-session secret the page script echoes back with every message.
#[derive(Clone, PartialEq, Eq)]
pub struct SecurityToken {
    value: String,
}

impl SecurityToken {
    /// Draws a fresh token from three random (v4) UUIDs, 366 random bits.
    pub fn generate() -> Self {
        let mut bytes = Vec::with_capacity(SECURITY_TOKEN_RANDOM_BYTES);
        while bytes.len() < SECURITY_TOKEN_RANDOM_BYTES {
            bytes.extend_from_slice(Uuid::new_v4().as_bytes());
        }
        Self {
            value: URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    pub fn from_value(value: impl Into<String>) -> Result<Self, BridgeError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "security token must be non-empty".to_string(),
            ));
        }
        Ok(Self { value })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Compares digests so timing does not depend on a shared prefix.
    pub fn verify(&self, candidate: Option<&str>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };
        Sha256::digest(self.value.as_bytes()) == Sha256::digest(candidate.as_bytes())
    }

    /// Message-handler name registered with the page: `<script>_<suffix>`.
    pub fn handler_name(&self, script_name: &str) -> String {
        let digest = Sha256::digest(format!("handler:{}", self.value).as_bytes());
        let suffix = URL_SAFE_NO_PAD
            .encode(digest)
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(HANDLER_NAME_SUFFIX_CHARS)
            .collect::<String>();
        format!("{script_name}_{suffix}")
    }
}

impl fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityToken")
            .field("value", &"<redacted>")
            .finish()
    }
}
