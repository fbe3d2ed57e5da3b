use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::record::ExtensionRecord;

pub const REGISTRY_FILE_SCHEMA_VERSION: u32 = 1;

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct RegistryFile {
    schema_version: u32,
    #[serde(default)]
    extensions: Vec<ExtensionRecord>,
}

/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Loads persisted records; a missing file is an empty registry.
pub fn load_registry_file(path: &Path) -> Result<Vec<ExtensionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read extension registry {}", path.display()))?;
    let file = serde_json::from_str::<RegistryFile>(&raw)
        .with_context(|| format!("failed to parse extension registry {}", path.display()))?;
    if file.schema_version != REGISTRY_FILE_SCHEMA_VERSION {
        bail!(
            "unsupported extension registry schema_version {} in {} (expected {})",
            file.schema_version,
            path.display(),
            REGISTRY_FILE_SCHEMA_VERSION
        );
    }
    Ok(file.extensions)
}

pub fn save_registry_file(path: &Path, records: &[ExtensionRecord]) -> Result<()> {
    let file = RegistryFile {
        schema_version: REGISTRY_FILE_SCHEMA_VERSION,
        extensions: records.to_vec(),
    };
    let mut encoded =
        serde_json::to_string_pretty(&file).context("failed to encode extension registry")?;
    encoded.push('\n');
    write_text_atomic(path, &encoded)
}

/// Writes `content` beside `path` and renames it into place.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("registry path cannot be empty");
    }
    if path.is_dir() {
        bail!("registry path '{}' is a directory", path.display());
    }
    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("registry");
    let temp_path = parent_dir.join(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::write(&temp_path, content)
        .with_context(|| format!("failed to write {}", temp_path.display()))?;
    if let Err(error) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                temp_path.display(),
                path.display()
            )
        });
    }
    Ok(())
}
