use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Author label shown when a manifest carries no `author.name`.
pub const MANIFEST_AUTHOR_FALLBACK: &str = "N/A";

/// Install details posted by `beginInstallWithManifest3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallRequest {
    #[serde(alias = "extension_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_manifest_text")]
    pub manifest: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    pub localized_name: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub esb_allowlist: Option<bool>,
}

impl InstallRequest {
    /// Re-encodes the message data to canonical JSON bytes and decodes it.
    pub fn from_message_data(data: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_vec(data)?;
        serde_json::from_slice(&canonical)
    }

    pub fn parse_manifest(&self) -> Result<ExtensionManifest, serde_json::Error> {
        ExtensionManifest::parse(&self.manifest)
    }

    /// Icon URL, if one was supplied and is not blank.
    pub fn icon_url(&self) -> Option<&str> {
        self.icon_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

fn deserialize_manifest_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        object @ Value::Object(_) => Ok(object.to_string()),
        _ => Err(serde::de::Error::custom(
            "manifest must be a JSON string or object",
        )),
    }
}

/// Subset of an extension manifest consulted during install.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub manifest_version: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    /// Display-only; any non-object shape falls back to the default label.
    #[serde(default)]
    pub author: Option<Value>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub host_permissions: Option<Vec<String>>,
}

impl ExtensionManifest {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn author_name(&self) -> Option<&str> {
        self.author
            .as_ref()
            .and_then(Value::as_object)
            .and_then(|author| author.get("name"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn author_label(&self) -> &str {
        self.author_name().unwrap_or(MANIFEST_AUTHOR_FALLBACK)
    }

    pub fn permissions(&self) -> &[String] {
        self.permissions.as_deref().unwrap_or_default()
    }
}

/// Result of evaluating an install request against installation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallOutcome {
    UserGestureRequired,
    AlreadyInstalled,
    InvalidManifest,
}
