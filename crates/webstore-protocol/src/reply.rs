use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const WEBSTORE_ERROR_INVALID_MESSAGE: &str = "Invalid Message";
pub const WEBSTORE_ERROR_UNHANDLED_MESSAGE: &str = "Unhandled Message";
pub const WEBSTORE_ERROR_INVALID_MANIFEST: &str = "Invalid Manifest";
pub const WEBSTORE_ERROR_USER_CANCELLED: &str = "user_cancelled";
pub const WEBSTORE_ERROR_DETAIL_PREFIX: &str = "ERROR!: ";

/// `(result, error)` pair delivered to the script for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebStoreReply {
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl WebStoreReply {
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    /// Empty-string success used for accepted and already-installed installs.
    pub fn empty_success() -> Self {
        Self::success(Value::String(String::new()))
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn failure_with_result(result: Value, error: impl Into<String>) -> Self {
        Self {
            result: Some(result),
            error: Some(error.into()),
        }
    }

    /// Ad-hoc `ERROR!: <details>` failure.
    pub fn detailed_failure(detail: impl Display) -> Self {
        Self::failure(format!("{WEBSTORE_ERROR_DETAIL_PREFIX}{detail}"))
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Install status reported by `getExtensionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionStatus {
    Enabled,
    Installable,
}

impl ExtensionStatus {
    pub fn from_installed(installed: bool) -> Self {
        if installed {
            Self::Enabled
        } else {
            Self::Installable
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Installable => "installable",
        }
    }
}
