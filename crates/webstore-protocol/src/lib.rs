//! Message, request, and reply contracts for the web store script bridge.
//!
//! The page-side web store script posts untyped `{ name, data }` payloads. This
//! crate validates them at the boundary into a typed [`WebStoreRequest`] and
//! defines the reply tokens the script understands.

mod install_request;
mod message;
mod reply;

pub use install_request::{
    ExtensionManifest, InstallOutcome, InstallRequest, MANIFEST_AUTHOR_FALLBACK,
};
pub use message::{
    optional_string_field, parse_webstore_message, parse_webstore_message_envelope,
    parse_webstore_request, MessageRejection, UninstallOptions, WebStoreMessageEnvelope,
    WebStoreRequest, WebStoreRequestKind, WEBSTORE_MESSAGE_DATA_FIELD,
    WEBSTORE_MESSAGE_NAME_FIELD, WEBSTORE_REQUEST_KINDS,
};
pub use reply::{
    ExtensionStatus, WebStoreReply, WEBSTORE_ERROR_DETAIL_PREFIX,
    WEBSTORE_ERROR_INVALID_MANIFEST, WEBSTORE_ERROR_INVALID_MESSAGE,
    WEBSTORE_ERROR_UNHANDLED_MESSAGE, WEBSTORE_ERROR_USER_CANCELLED,
};

#[cfg(test)]
mod tests;
