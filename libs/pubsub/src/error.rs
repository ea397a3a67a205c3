use std::time::Duration;

use pubsub_api::BackendError;

/// Topic creation failed. Permanent for the manager instance: every past
/// and future operation observes the same value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CreationError {
    #[error("create topic '{topic}': {source}")]
    Backend {
        topic: String,
        #[source]
        source: BackendError,
    },

    #[error("backend did not return an identifier for created topic '{0}'")]
    MissingIdentifier(String),

    #[error("create topic '{topic}' timed out after {timeout:?}")]
    TimedOut { topic: String, timeout: Duration },

    #[error("topic creation ended without an outcome")]
    Aborted,
}

#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    #[error("config: {0}")]
    Config(String),

    #[error("topic creation failed: {0}")]
    Creation(#[from] CreationError),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend: {0}")]
    Backend(#[from] BackendError),

    #[error("topic not ready after {0:?}")]
    ReadyTimeout(Duration),
}

impl PubSubError {
    /// The preserved creation failure, if this error is one.
    pub fn as_creation(&self) -> Option<&CreationError> {
        match self {
            PubSubError::Creation(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure of the envelope-normalizing consumer adapter.
///
/// `Envelope` and `Decode` are local serialization failures; `Consumer`
/// carries the consumer's own error untouched.
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError<E> {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("decode message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("consumer: {0}")]
    Consumer(E),
}

impl<E> ConsumeError<E> {
    pub fn is_serialization(&self) -> bool {
        matches!(self, ConsumeError::Envelope(_) | ConsumeError::Decode(_))
    }

    pub fn into_consumer(self) -> Option<E> {
        match self {
            ConsumeError::Consumer(e) => Some(e),
            _ => None,
        }
    }
}
