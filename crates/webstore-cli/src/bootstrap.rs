use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

fn tracing_filter(log_level: Option<&str>) -> Result<EnvFilter> {
    match log_level {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid --log-level directive '{directive}'")),
        None => Ok(EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy()),
    }
}

/// Logs go to stderr; stdout carries only NDJSON replies.
pub(crate) fn init_tracing(log_level: Option<&str>) -> Result<()> {
    let env_filter = tracing_filter(log_level)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}
