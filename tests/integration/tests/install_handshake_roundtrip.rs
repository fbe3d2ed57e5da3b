use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex as AsyncMutex;
use webstore_bridge::{
    ConsentDecision, ConsentPresenter, InstallConsentPrompt, ReplyChannel, ScriptMessage,
    UninstallConfirmPrompt, WebStoreBridgeConfig, WebStoreMessageHandler,
};
use webstore_protocol::WebStoreReply;
use webstore_registry::{ExtensionQueryKind, ExtensionRegistry};

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(1);
const SESSION_TOKEN: &str = "integration-session-token";

/// Answers prompts from a fixed queue and records what was shown.
struct ScriptedPresenter {
    decisions: AsyncMutex<VecDeque<ConsentDecision>>,
    install_prompts: AsyncMutex<Vec<InstallConsentPrompt>>,
    uninstall_prompts: AsyncMutex<Vec<UninstallConfirmPrompt>>,
    dismissed: AsyncMutex<Vec<String>>,
    uninstall_dismissed: AsyncMutex<Vec<String>>,
}

impl ScriptedPresenter {
    fn new(decisions: Vec<ConsentDecision>) -> Self {
        Self {
            decisions: AsyncMutex::new(VecDeque::from(decisions)),
            install_prompts: AsyncMutex::new(Vec::new()),
            uninstall_prompts: AsyncMutex::new(Vec::new()),
            dismissed: AsyncMutex::new(Vec::new()),
            uninstall_dismissed: AsyncMutex::new(Vec::new()),
        }
    }

    async fn next_decision(&self) -> ConsentDecision {
        self.decisions
            .lock()
            .await
            .pop_front()
            .unwrap_or(ConsentDecision::Cancelled)
    }
}

#[async_trait]
impl ConsentPresenter for ScriptedPresenter {
    async fn request_consent(&self, prompt: &InstallConsentPrompt) -> ConsentDecision {
        self.install_prompts.lock().await.push(prompt.clone());
        self.next_decision().await
    }

    async fn dismiss(&self, prompt: &InstallConsentPrompt) {
        self.dismissed.lock().await.push(prompt.extension_id.clone());
    }

    async fn confirm_uninstall(&self, prompt: &UninstallConfirmPrompt) -> ConsentDecision {
        self.uninstall_prompts.lock().await.push(prompt.clone());
        self.next_decision().await
    }

    async fn dismiss_uninstall(&self, prompt: &UninstallConfirmPrompt) {
        self.uninstall_dismissed
            .lock()
            .await
            .push(prompt.extension_id.clone());
    }
}

struct IsolatedWorkspace {
    root: PathBuf,
}

impl IsolatedWorkspace {
    fn new(label: &str) -> Self {
        let tick = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let count = WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "webstore-{label}-{}-{tick}-{count}",
            std::process::id()
        ));
        fs::create_dir_all(&root).expect("must create isolated workspace root");
        Self { root }
    }

    fn registry_path(&self) -> PathBuf {
        self.root.join("extensions.json")
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for IsolatedWorkspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn open_handler(
    registry_path: &Path,
    presenter: Arc<ScriptedPresenter>,
) -> Arc<WebStoreMessageHandler> {
    let config = WebStoreBridgeConfig {
        security_token: Some(SESSION_TOKEN.to_string()),
        consent_timeout_ms: Some(5_000),
        ..WebStoreBridgeConfig::default()
    };
    let registry = ExtensionRegistry::open(registry_path).expect("open registry");
    Arc::new(WebStoreMessageHandler::new(config, Arc::new(registry), presenter).expect("handler"))
}

async fn send(handler: &Arc<WebStoreMessageHandler>, name: &str, data: Value) -> WebStoreReply {
    let (reply, receiver) = ReplyChannel::oneshot();
    handler
        .spawn(
            ScriptMessage::new(json!({ "name": name, "data": data }), SESSION_TOKEN),
            reply,
        )
        .await
        .expect("dispatch task")
        .expect("dispatch");
    receiver.recv().await.expect("reply")
}

fn install_data(extension_id: &str, name: &str, version: &str) -> Value {
    json!({
        "id": extension_id,
        "manifest": {
            "name": name,
            "version": version,
            "manifest_version": 3,
            "description": format!("{name} extension"),
            "permissions": ["storage"],
            "host_permissions": ["https://*.example/*"]
        },
        "localizedName": name,
        "iconUrl": format!("https://store.example/{extension_id}.png"),
        "locale": "en-US"
    })
}

#[tokio::test]
async fn integration_install_lifecycle_persists_across_reopen() {
    let workspace = IsolatedWorkspace::new("lifecycle");
    let presenter = Arc::new(ScriptedPresenter::new(vec![
        ConsentDecision::Cancelled,
        ConsentDecision::Accepted,
    ]));
    let handler = open_handler(&workspace.registry_path(), Arc::clone(&presenter));

    let status = send(&handler, "getExtensionStatus", json!({ "extension_id": "ext-a" })).await;
    assert_eq!(status, WebStoreReply::success(json!("installable")));

    let cancelled = send(
        &handler,
        "beginInstallWithManifest3",
        install_data("ext-a", "Reader", "3.1.0"),
    )
    .await;
    assert_eq!(cancelled, WebStoreReply::failure("user_cancelled"));
    assert!(handler.pending_install_ids().is_empty());

    let accepted = send(
        &handler,
        "beginInstallWithManifest3",
        install_data("ext-a", "Reader", "3.1.0"),
    )
    .await;
    assert_eq!(accepted, WebStoreReply::empty_success());

    let prompts = presenter.install_prompts.lock().await.clone();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[1].title, "Reader");
    assert_eq!(prompts[1].author, "N/A");
    assert_eq!(prompts[1].icon_url, "https://store.example/ext-a.png");
    assert_eq!(
        presenter.dismissed.lock().await.as_slice(),
        ["ext-a", "ext-a"]
    );

    let completed = send(&handler, "completeInstall", json!({ "expected_id": "ext-a" })).await;
    let installed = completed.result.expect("installed extension");
    assert_eq!(installed["id"], "ext-a");
    assert_eq!(installed["version"], "3.1.0");
    assert_eq!(installed["enabled"], true);
    assert_eq!(installed["manifest"]["manifest_version"], 3);

    drop(handler);
    let reopened = open_handler(&workspace.registry_path(), Arc::clone(&presenter));
    let all = send(&reopened, "getAll", json!({})).await;
    let all = all.result.expect("extension list");
    assert_eq!(all.as_array().map(Vec::len), Some(1));
    assert_eq!(all[0]["name"], "Reader");

    let status = send(&reopened, "getExtensionStatus", json!({ "extension_id": "ext-a" })).await;
    assert_eq!(status, WebStoreReply::success(json!("enabled")));

    let repeat = send(
        &reopened,
        "beginInstallWithManifest3",
        install_data("ext-a", "Reader", "3.1.0"),
    )
    .await;
    assert_eq!(repeat, WebStoreReply::empty_success());
    assert_eq!(presenter.install_prompts.lock().await.len(), 2);
    assert!(workspace.root().join("extensions.json").exists());
}

#[tokio::test]
async fn integration_uninstall_with_confirm_dialog_updates_store() {
    let workspace = IsolatedWorkspace::new("uninstall");
    let presenter = Arc::new(ScriptedPresenter::new(vec![
        ConsentDecision::Accepted,
        ConsentDecision::Cancelled,
        ConsentDecision::Accepted,
    ]));
    let handler = open_handler(&workspace.registry_path(), Arc::clone(&presenter));

    send(
        &handler,
        "beginInstallWithManifest3",
        install_data("ext-b", "Notes", "1.0.0"),
    )
    .await;
    send(&handler, "completeInstall", json!({ "expected_id": "ext-b" })).await;

    let uninstall_data = json!({
        "extension_id": "ext-b",
        "options": { "showConfirmDialog": true }
    });
    let declined = send(&handler, "uninstall", uninstall_data.clone()).await;
    assert_eq!(declined, WebStoreReply::failure("user_cancelled"));
    assert!(handler.registry().is_installed("ext-b"));

    let removed = send(&handler, "uninstall", uninstall_data).await;
    assert_eq!(removed.result.as_ref().map(|value| &value["id"]), Some(&json!("ext-b")));
    assert!(removed.error.is_none());

    let prompts = presenter.uninstall_prompts.lock().await.clone();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0].name, "Notes");
    assert_eq!(
        presenter.uninstall_dismissed.lock().await.as_slice(),
        ["ext-b", "ext-b"]
    );

    let reopened = ExtensionRegistry::open(workspace.registry_path()).expect("reopen registry");
    assert!(reopened.get_all(ExtensionQueryKind::All).is_empty());
}

#[tokio::test]
async fn integration_concurrent_mutations_on_one_extension_serialize() {
    let workspace = IsolatedWorkspace::new("concurrency");
    let presenter = Arc::new(ScriptedPresenter::new(vec![ConsentDecision::Accepted]));
    let handler = open_handler(&workspace.registry_path(), Arc::clone(&presenter));
    send(
        &handler,
        "beginInstallWithManifest3",
        install_data("ext-c", "Clock", "0.9.0"),
    )
    .await;

    let complete = {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            send(&handler, "completeInstall", json!({ "expected_id": "ext-c" })).await
        })
    };
    let uninstall = {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            send(&handler, "uninstall", json!({ "extension_id": "ext-c" })).await
        })
    };
    let complete = complete.await.expect("complete task");
    let uninstall = uninstall.await.expect("uninstall task");
    assert_eq!(
        complete.result.as_ref().map(|value| &value["id"]),
        Some(&json!("ext-c"))
    );

    // Uninstall either removes the committed record or runs first and finds
    // nothing installed, leaving completeInstall to commit.
    let installed = handler.registry().is_installed("ext-c");
    assert_eq!(uninstall.is_success(), !installed);
    assert_eq!(uninstall.error.is_some(), installed);
    assert!(handler.pending_install_ids().is_empty());
}
