use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use webstore_protocol::WebStoreReply;

type ReplyCallback = Box<dyn FnOnce(Option<Value>, Option<String>) + Send + 'static>;

enum ReplySink {
    Oneshot(oneshot::Sender<WebStoreReply>),
    Callback(ReplyCallback),
}

/// Single-use reply handle for one inbound script message.
///
/// `send` consumes the channel, so a second reply cannot be expressed.
/// Dropping a channel that never replied is logged as a protocol violation.
pub struct ReplyChannel {
    sink: Option<ReplySink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("web store reply channel closed without a reply")]
pub struct ReplyChannelClosed;

/// Receiving half of [`ReplyChannel::oneshot`].
#[derive(Debug)]
pub struct ReplyReceiver {
    receiver: oneshot::Receiver<WebStoreReply>,
}

impl ReplyReceiver {
    pub async fn recv(self) -> Result<WebStoreReply, ReplyChannelClosed> {
        self.receiver.await.map_err(|_| ReplyChannelClosed)
    }

    /// Non-blocking poll; `Ok(None)` while the reply is still pending.
    pub fn try_recv(&mut self) -> Result<Option<WebStoreReply>, ReplyChannelClosed> {
        match self.receiver.try_recv() {
            Ok(reply) => Ok(Some(reply)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => Err(ReplyChannelClosed),
        }
    }
}

impl ReplyChannel {
    pub fn oneshot() -> (Self, ReplyReceiver) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sink: Some(ReplySink::Oneshot(sender)),
            },
            ReplyReceiver { receiver },
        )
    }

    /// Wraps a `(result, error)` callback in the shape script hosts expose.
    pub fn from_callback<F>(callback: F) -> Self
    where
        F: FnOnce(Option<Value>, Option<String>) + Send + 'static,
    {
        Self {
            sink: Some(ReplySink::Callback(Box::new(callback))),
        }
    }

    pub fn send(mut self, reply: WebStoreReply) {
        match self.sink.take() {
            Some(ReplySink::Oneshot(sender)) => {
                if sender.send(reply).is_err() {
                    tracing::debug!("web store reply receiver dropped before reply");
                }
            }
            Some(ReplySink::Callback(callback)) => callback(reply.result, reply.error),
            None => {}
        }
    }

    /// Closes the channel without replying. Only used for messages rejected
    /// before dispatch, where the caller receives a hard error instead.
    pub(crate) fn reject(mut self) {
        self.sink = None;
    }
}

impl Drop for ReplyChannel {
    fn drop(&mut self) {
        if self.sink.is_some() {
            tracing::error!("web store reply channel dropped without a reply");
        }
    }
}

impl std::fmt::Debug for ReplyChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sink = match &self.sink {
            Some(ReplySink::Oneshot(_)) => "oneshot",
            Some(ReplySink::Callback(_)) => "callback",
            None => "spent",
        };
        f.debug_struct("ReplyChannel").field("sink", &sink).finish()
    }
}
