//! Installed-extension registry backing the web store bridge.
//!
//! Provides concurrent reads, per-extension serialized mutation, and optional
//! JSON-file persistence written through atomic temp-file renames.

mod persistence;
mod record;
mod registry;

pub use persistence::{
    current_unix_timestamp_ms, load_registry_file, save_registry_file, write_text_atomic,
    REGISTRY_FILE_SCHEMA_VERSION,
};
pub use record::{serialize_extension_records, ExtensionQueryKind, ExtensionRecord};
pub use registry::{ExtensionMutationGuard, ExtensionRegistry};
