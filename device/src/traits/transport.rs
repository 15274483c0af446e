//! Message transport towards a cloud broker.
//!
//! A transport owns a single session with a remote broker. Inbound messages are delivered to
//! registered [`MessageHandler`]s from a dispatch context owned by the transport, never from the
//! caller of [`Transport::publish`] or [`Transport::subscribe`].

use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

/// Delivery guarantee requested for a message or subscription.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum QoS {
    /// At most once: no acknowledgement, no retry.
    #[default]
    AtMostOnce,
    /// At least once: acknowledged by the broker.
    AtLeastOnce,
}

/// What happened to a message handed to [`Transport::publish`].
///
/// This reflects the state at call time, not delivery confirmation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the live session.
    Sent,
    /// Stored in the offline queue, to be drained on reconnect.
    Queued,
}

/// A message received on a subscribed topic.
#[derive(Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new<T: Into<String>, P: Into<Vec<u8>>>(topic: T, payload: P) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

impl Debug for InboundMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundMessage")
            .field("topic", &self.topic)
            .field("payload", &self.payload_str())
            .finish()
    }
}

/// Callback invoked for every inbound message matching a subscription.
///
/// Handlers run on the transport's dispatch context and may be called concurrently with any
/// other transport operation, so they must not block.
pub type MessageHandler = Arc<dyn Fn(InboundMessage) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unable to load credential {path:?}: {source}")]
    Credentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("connection rejected: {0}")]
    Rejected(String),
    #[error("not connected")]
    NotConnected,
    #[error("offline queue is full")]
    QueueFull,
    #[error("request could not be handed to the client: {0}")]
    Client(String),
    #[error("invalid client id {0:?}")]
    InvalidClientId(String),
}

impl TransportError {
    /// Whether retrying the operation can succeed without changing the configuration.
    ///
    /// Missing credentials and an invalid client id fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TransportError::Credentials { .. } | TransportError::InvalidClientId(_)
        )
    }
}

/// Lifecycle of a session with a message broker.
pub trait Transport {
    /// Establishes the session, waiting at most the configured connect timeout.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Registers `handler` for messages arriving on `topic`.
    async fn subscribe(
        &mut self,
        topic: &str,
        qos: QoS,
        handler: MessageHandler,
    ) -> Result<(), TransportError>;

    /// Sends `payload` to `topic`, or queues it while disconnected.
    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
    ) -> Result<Delivery, TransportError>;

    /// Tears down the session. Calling it on a transport that never connected, or that is
    /// already disconnected, is a no-op.
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}
