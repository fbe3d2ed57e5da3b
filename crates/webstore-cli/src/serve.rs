use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use webstore_bridge::{ReplyChannel, ScriptMessage, WebStoreMessageHandler};
use webstore_protocol::{WebStoreReply, WEBSTORE_ERROR_INVALID_MESSAGE};

/// One inbound NDJSON line.
#[derive(Debug, Deserialize)]
struct InboundLine {
    #[serde(default)]
    security_token: Option<String>,
    #[serde(default)]
    body: Value,
}

/// One outbound NDJSON line, correlated to its input by `line`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct OutboundLine {
    pub line: usize,
    pub result: Option<Value>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

impl OutboundLine {
    fn reply(line: usize, reply: WebStoreReply) -> Self {
        Self {
            line,
            result: reply.result,
            error: reply.error,
            rejected: None,
        }
    }

    fn rejected(line: usize, reason: String) -> Self {
        Self {
            line,
            result: None,
            error: None,
            rejected: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ServeReport {
    pub processed_lines: usize,
    pub rejected_count: usize,
}

/// Reads messages until EOF and writes one reply line per processed input line.
///
/// Every message runs on its own task, so replies are written in completion
/// order rather than input order.
pub(crate) async fn serve_ndjson<R, W>(
    handler: Arc<WebStoreMessageHandler>,
    reader: R,
    mut writer: W,
) -> Result<ServeReport>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let (output_tx, mut output_rx) = mpsc::unbounded_channel::<OutboundLine>();
    let mut output_tx = Some(output_tx);
    let mut line_number = 0_usize;
    let mut report = ServeReport::default();

    loop {
        tokio::select! {
            next = lines.next_line(), if output_tx.is_some() => {
                let next = next.context("failed to read web store ndjson input line")?;
                let Some(raw) = next else {
                    tracing::debug!(lines = line_number, "web store ndjson input closed");
                    output_tx = None;
                    continue;
                };
                line_number = line_number.saturating_add(1);
                let trimmed = raw.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                if let Some(sender) = output_tx.as_ref() {
                    report.processed_lines = report.processed_lines.saturating_add(1);
                    dispatch_line(&handler, line_number, trimmed, sender.clone());
                }
            }
            outbound = output_rx.recv() => {
                let Some(outbound) = outbound else {
                    break;
                };
                if outbound.rejected.is_some() {
                    report.rejected_count = report.rejected_count.saturating_add(1);
                }
                write_outbound_line(&mut writer, &outbound).await?;
            }
        }
    }

    Ok(report)
}

fn dispatch_line(
    handler: &Arc<WebStoreMessageHandler>,
    line: usize,
    raw: &str,
    output: mpsc::UnboundedSender<OutboundLine>,
) {
    let inbound = match serde_json::from_str::<InboundLine>(raw) {
        Ok(inbound) => inbound,
        Err(error) => {
            tracing::debug!(line, %error, "failed to decode web store ndjson line");
            let outbound =
                OutboundLine::reply(line, WebStoreReply::failure(WEBSTORE_ERROR_INVALID_MESSAGE));
            if output.send(outbound).is_err() {
                tracing::debug!(line, "web store ndjson output closed");
            }
            return;
        }
    };

    let (reply, receiver) = ReplyChannel::oneshot();
    let task = handler.spawn(
        ScriptMessage {
            body: inbound.body,
            security_token: inbound.security_token,
        },
        reply,
    );
    tokio::spawn(async move {
        let outbound = match task.await {
            Ok(Ok(())) => match receiver.recv().await {
                Ok(reply) => OutboundLine::reply(line, reply),
                Err(error) => OutboundLine::rejected(line, error.to_string()),
            },
            Ok(Err(error)) => OutboundLine::rejected(line, error.to_string()),
            Err(error) => OutboundLine::rejected(line, format!("dispatch task failed: {error}")),
        };
        if output.send(outbound).is_err() {
            tracing::debug!(line, "web store ndjson output closed");
        }
    });
}

async fn write_outbound_line<W>(writer: &mut W, outbound: &OutboundLine) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded =
        serde_json::to_vec(outbound).context("failed to serialize web store reply line")?;
    encoded.push(b'\n');
    writer
        .write_all(&encoded)
        .await
        .context("failed to write web store reply line")?;
    writer
        .flush()
        .await
        .context("failed to flush web store reply line")
}
