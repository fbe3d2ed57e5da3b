use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

fn default_enabled() -> bool {
    true
}

/// One installed extension as persisted in the registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub installed_unix_ms: u64,
    /// Raw manifest text captured at install time.
    #[serde(default)]
    pub manifest: String,
}

impl ExtensionRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            icon_url: None,
            permissions: Vec::new(),
            enabled: true,
            installed_unix_ms: 0,
            manifest: String::new(),
        }
    }

    /// Serializes the record into the shape returned to the web store script.
    ///
    /// The stored manifest is embedded as structured JSON, so a record whose
    /// manifest text is not valid JSON fails to serialize.
    pub fn to_reply_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(ExtensionInfoView::from(self))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtensionQueryKind {
    #[default]
    All,
    Enabled,
    Disabled,
}

impl ExtensionQueryKind {
    pub fn matches(self, record: &ExtensionRecord) -> bool {
        match self {
            Self::All => true,
            Self::Enabled => record.enabled,
            Self::Disabled => !record.enabled,
        }
    }
}

pub fn serialize_extension_records(
    records: &[ExtensionRecord],
) -> Result<Value, serde_json::Error> {
    let views = records
        .iter()
        .map(ExtensionInfoView::from)
        .collect::<Vec<_>>();
    serde_json::to_value(views)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionInfoView<'a> {
    id: &'a str,
    name: &'a str,
    version: &'a str,
    description: &'a str,
    enabled: bool,
    install_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<&'a str>,
    permissions: &'a [String],
    installed_unix_ms: u64,
    #[serde(serialize_with = "serialize_manifest_text")]
    manifest: &'a str,
}

impl<'a> From<&'a ExtensionRecord> for ExtensionInfoView<'a> {
    fn from(record: &'a ExtensionRecord) -> Self {
        Self {
            id: &record.id,
            name: &record.name,
            version: &record.version,
            description: &record.description,
            enabled: record.enabled,
            install_type: "normal",
            icon_url: record.icon_url.as_deref(),
            permissions: &record.permissions,
            installed_unix_ms: record.installed_unix_ms,
            manifest: &record.manifest,
        }
    }
}

fn serialize_manifest_text<S>(manifest: &&str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if manifest.trim().is_empty() {
        return serializer.serialize_none();
    }
    let parsed = serde_json::from_str::<Value>(manifest).map_err(|error| {
        <S::Error as serde::ser::Error>::custom(format!(
            "stored manifest is not valid JSON: {error}"
        ))
    })?;
    parsed.serialize(serializer)
}
