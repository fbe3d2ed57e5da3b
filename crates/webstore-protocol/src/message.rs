use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::install_request::InstallRequest;
use crate::reply::{
    WEBSTORE_ERROR_DETAIL_PREFIX, WEBSTORE_ERROR_INVALID_MESSAGE, WEBSTORE_ERROR_UNHANDLED_MESSAGE,
};

pub const WEBSTORE_MESSAGE_NAME_FIELD: &str = "name";
pub const WEBSTORE_MESSAGE_DATA_FIELD: &str = "data";

pub const WEBSTORE_REQUEST_KINDS: &[&str] = &[
    "beginInstallWithManifest3",
    "getExtensionStatus",
    "getAll",
    "completeInstall",
    "uninstall",
];

const UNINSTALL_OPTIONS_FIELD: &str = "options";
const UNINSTALL_SHOW_CONFIRM_DIALOG_FIELD: &str = "showConfirmDialog";

/// Operations the web store script may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebStoreRequestKind {
    BeginInstallWithManifest3,
    GetExtensionStatus,
    GetAll,
    CompleteInstall,
    Uninstall,
}

impl WebStoreRequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeginInstallWithManifest3 => "beginInstallWithManifest3",
            Self::GetExtensionStatus => "getExtensionStatus",
            Self::GetAll => "getAll",
            Self::CompleteInstall => "completeInstall",
            Self::Uninstall => "uninstall",
        }
    }
}

impl FromStr for WebStoreRequestKind {
    type Err = MessageRejection;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "beginInstallWithManifest3" => Ok(Self::BeginInstallWithManifest3),
            "getExtensionStatus" => Ok(Self::GetExtensionStatus),
            "getAll" => Ok(Self::GetAll),
            "completeInstall" => Ok(Self::CompleteInstall),
            "uninstall" => Ok(Self::Uninstall),
            other => Err(MessageRejection::UnhandledMessage {
                name: other.to_string(),
            }),
        }
    }
}

/// Structurally valid message whose name has not been resolved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct WebStoreMessageEnvelope {
    pub name: String,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UninstallOptions {
    pub show_confirm_dialog: bool,
}

/// Typed request decoded from a script message.
#[derive(Debug, Clone, PartialEq)]
pub enum WebStoreRequest {
    BeginInstallWithManifest3(InstallRequest),
    GetExtensionStatus {
        extension_id: String,
    },
    GetAll,
    CompleteInstall {
        expected_id: String,
    },
    Uninstall {
        extension_id: String,
        options: UninstallOptions,
    },
}

impl WebStoreRequest {
    pub fn kind(&self) -> WebStoreRequestKind {
        match self {
            Self::BeginInstallWithManifest3(_) => WebStoreRequestKind::BeginInstallWithManifest3,
            Self::GetExtensionStatus { .. } => WebStoreRequestKind::GetExtensionStatus,
            Self::GetAll => WebStoreRequestKind::GetAll,
            Self::CompleteInstall { .. } => WebStoreRequestKind::CompleteInstall,
            Self::Uninstall { .. } => WebStoreRequestKind::Uninstall,
        }
    }
}

/// Reasons a message is answered without reaching an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageRejection {
    #[error("web store message {reason}")]
    InvalidMessage { reason: String },
    #[error("web store message body is {actual_bytes} bytes, limit is {max_bytes}")]
    MessageTooLarge {
        actual_bytes: usize,
        max_bytes: usize,
    },
    #[error("unhandled web store message '{name}'")]
    UnhandledMessage { name: String },
    #[error("failed to decode install request: {detail}")]
    InvalidInstallRequest { detail: String },
}

impl MessageRejection {
    fn invalid(reason: &str) -> Self {
        Self::InvalidMessage {
            reason: reason.to_string(),
        }
    }

    /// Error string sent back through the reply channel.
    pub fn reply_error(&self) -> String {
        match self {
            Self::InvalidMessage { .. } | Self::MessageTooLarge { .. } => {
                WEBSTORE_ERROR_INVALID_MESSAGE.to_string()
            }
            Self::UnhandledMessage { .. } => WEBSTORE_ERROR_UNHANDLED_MESSAGE.to_string(),
            Self::InvalidInstallRequest { .. } => {
                format!("{WEBSTORE_ERROR_DETAIL_PREFIX}{self}")
            }
        }
    }
}

pub fn parse_webstore_message_envelope(
    body: &Value,
) -> Result<WebStoreMessageEnvelope, MessageRejection> {
    let object = body
        .as_object()
        .ok_or_else(|| MessageRejection::invalid("body must be a JSON object"))?;
    let name = object
        .get(WEBSTORE_MESSAGE_NAME_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| MessageRejection::invalid("field 'name' must be a string"))?;
    let data = object
        .get(WEBSTORE_MESSAGE_DATA_FIELD)
        .and_then(Value::as_object)
        .ok_or_else(|| MessageRejection::invalid("field 'data' must be a JSON object"))?;

    Ok(WebStoreMessageEnvelope {
        name: name.to_string(),
        data: data.clone(),
    })
}

pub fn parse_webstore_request(
    envelope: &WebStoreMessageEnvelope,
) -> Result<WebStoreRequest, MessageRejection> {
    let kind = WebStoreRequestKind::from_str(&envelope.name)?;
    let data = &envelope.data;
    let request = match kind {
        WebStoreRequestKind::BeginInstallWithManifest3 => {
            let request = InstallRequest::from_message_data(data).map_err(|error| {
                MessageRejection::InvalidInstallRequest {
                    detail: error.to_string(),
                }
            })?;
            WebStoreRequest::BeginInstallWithManifest3(request)
        }
        WebStoreRequestKind::GetExtensionStatus => WebStoreRequest::GetExtensionStatus {
            extension_id: optional_string_field(data, "extension_id"),
        },
        WebStoreRequestKind::GetAll => WebStoreRequest::GetAll,
        WebStoreRequestKind::CompleteInstall => WebStoreRequest::CompleteInstall {
            expected_id: optional_string_field(data, "expected_id"),
        },
        WebStoreRequestKind::Uninstall => WebStoreRequest::Uninstall {
            extension_id: optional_string_field(data, "extension_id"),
            options: parse_uninstall_options(data),
        },
    };
    Ok(request)
}

/// Parses a raw message body, optionally enforcing a serialized size limit.
pub fn parse_webstore_message(
    body: &Value,
    max_message_bytes: Option<usize>,
) -> Result<WebStoreRequest, MessageRejection> {
    if let Some(max_bytes) = max_message_bytes {
        let actual_bytes = serde_json::to_vec(body)
            .map(|encoded| encoded.len())
            .map_err(|_| MessageRejection::invalid("body is not serializable"))?;
        if actual_bytes > max_bytes {
            return Err(MessageRejection::MessageTooLarge {
                actual_bytes,
                max_bytes,
            });
        }
    }
    let envelope = parse_webstore_message_envelope(body)?;
    parse_webstore_request(&envelope)
}

/// Reads a string field, treating absent or non-string values as empty.
pub fn optional_string_field(data: &Map<String, Value>, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_uninstall_options(data: &Map<String, Value>) -> UninstallOptions {
    let show_confirm_dialog = data
        .get(UNINSTALL_OPTIONS_FIELD)
        .and_then(Value::as_object)
        .and_then(|options| options.get(UNINSTALL_SHOW_CONFIRM_DIALOG_FIELD))
        .and_then(Value::as_bool)
        == Some(true);
    UninstallOptions {
        show_confirm_dialog,
    }
}
