use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use webstore_bridge::{
    ConsentDecision, WebStoreBridgeConfig, WEBSTORE_CONSENT_TIMEOUT_MS_DEFAULT,
    WEBSTORE_MAX_MESSAGE_BYTES_DEFAULT, WEBSTORE_SCRIPT_NAME_DEFAULT,
};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

/// Answer given to every consent prompt when no interactive UI is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliConsentMode {
    Accept,
    Cancel,
}

impl From<CliConsentMode> for ConsentDecision {
    fn from(value: CliConsentMode) -> Self {
        match value {
            CliConsentMode::Accept => ConsentDecision::Accepted,
            CliConsentMode::Cancel => ConsentDecision::Cancelled,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "webstore-bridge",
    about = "Serve web store script messages as NDJSON over stdin/stdout",
    version
)]
pub struct Cli {
    #[arg(
        long = "registry-path",
        env = "WEBSTORE_REGISTRY_PATH",
        help = "Extension registry JSON file. The registry is kept in memory when omitted."
    )]
    pub registry_path: Option<PathBuf>,

    #[arg(
        long = "security-token",
        env = "WEBSTORE_SECURITY_TOKEN",
        hide_env_values = true,
        help = "Session token every inbound line must carry in its security_token field"
    )]
    pub security_token: String,

    #[arg(
        long = "script-name",
        env = "WEBSTORE_SCRIPT_NAME",
        default_value = WEBSTORE_SCRIPT_NAME_DEFAULT,
        help = "Script name used as the message handler prefix"
    )]
    pub script_name: String,

    #[arg(
        long,
        env = "WEBSTORE_CONSENT",
        value_enum,
        default_value_t = CliConsentMode::Cancel,
        help = "Decision applied to install and uninstall consent prompts"
    )]
    pub consent: CliConsentMode,

    #[arg(
        long = "consent-timeout-ms",
        env = "WEBSTORE_CONSENT_TIMEOUT_MS",
        default_value_t = WEBSTORE_CONSENT_TIMEOUT_MS_DEFAULT,
        value_parser = parse_positive_u64,
        help = "Milliseconds to wait for a consent decision before replying user_cancelled"
    )]
    pub consent_timeout_ms: u64,

    #[arg(
        long = "no-consent-timeout",
        env = "WEBSTORE_NO_CONSENT_TIMEOUT",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Wait indefinitely for consent decisions"
    )]
    pub no_consent_timeout: bool,

    #[arg(
        long = "max-message-bytes",
        env = "WEBSTORE_MAX_MESSAGE_BYTES",
        default_value_t = WEBSTORE_MAX_MESSAGE_BYTES_DEFAULT,
        value_parser = parse_positive_usize,
        help = "Largest serialized message body accepted before replying Invalid Message"
    )]
    pub max_message_bytes: usize,

    #[arg(
        long = "log-level",
        env = "WEBSTORE_LOG_LEVEL",
        help = "Tracing filter directive written to stderr (defaults to RUST_LOG, then warn)"
    )]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn bridge_config(&self) -> WebStoreBridgeConfig {
        WebStoreBridgeConfig {
            script_name: self.script_name.clone(),
            security_token: Some(self.security_token.clone()),
            consent_timeout_ms: (!self.no_consent_timeout).then_some(self.consent_timeout_ms),
            max_message_bytes: self.max_message_bytes,
        }
    }
}
