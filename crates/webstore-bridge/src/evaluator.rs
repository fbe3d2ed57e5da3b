use std::sync::Arc;

use async_trait::async_trait;
use webstore_protocol::{ExtensionManifest, InstallOutcome, InstallRequest};
use webstore_registry::ExtensionRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionIcon {
    pub url: String,
}

/// Outcome of install evaluation plus the resources needed for consent.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallEvaluation {
    pub outcome: InstallOutcome,
    pub icon: Option<ExtensionIcon>,
    pub manifest: Option<ExtensionManifest>,
}

impl InstallEvaluation {
    pub fn already_installed() -> Self {
        Self {
            outcome: InstallOutcome::AlreadyInstalled,
            icon: None,
            manifest: None,
        }
    }

    pub fn invalid_manifest() -> Self {
        Self {
            outcome: InstallOutcome::InvalidManifest,
            icon: None,
            manifest: None,
        }
    }
}

/// Installation policy consulted by `beginInstallWithManifest3`.
#[async_trait]
pub trait InstallEvaluator: Send + Sync {
    async fn evaluate(&self, request: &InstallRequest) -> InstallEvaluation;
}

/// Default policy: validate the request and manifest, then check the registry.
#[derive(Debug, Clone)]
pub struct RegistryInstallEvaluator {
    registry: Arc<ExtensionRegistry>,
}

impl RegistryInstallEvaluator {
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl InstallEvaluator for RegistryInstallEvaluator {
    async fn evaluate(&self, request: &InstallRequest) -> InstallEvaluation {
        if request.id.trim().is_empty() || request.localized_name.trim().is_empty() {
            return InstallEvaluation::invalid_manifest();
        }
        let manifest = match request.parse_manifest() {
            Ok(manifest) => manifest,
            Err(error) => {
                tracing::debug!(
                    extension_id = %request.id,
                    %error,
                    "install request manifest failed to parse"
                );
                return InstallEvaluation::invalid_manifest();
            }
        };
        if self.registry.is_installed(&request.id) {
            return InstallEvaluation::already_installed();
        }
        InstallEvaluation {
            outcome: InstallOutcome::UserGestureRequired,
            icon: request.icon_url().map(|url| ExtensionIcon {
                url: url.to_string(),
            }),
            manifest: Some(manifest),
        }
    }
}
