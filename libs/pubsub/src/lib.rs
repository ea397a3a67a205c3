//! Lazily-initialized publish/subscribe over a managed topic.
//!
//! `PubSubManager` either binds a known topic identifier or creates the
//! topic by name in the background; subscribe / confirm / publish wait for
//! that creation transparently. `EnvelopeHandler` normalizes trigger and
//! webhook deliveries into a typed payload.

pub mod config;
pub mod consumer;
pub mod envelope;
pub mod error;
pub mod handle;
pub mod manager;

pub use config::{ManagerConfig, TopicTarget};
pub use consumer::{BoxError, EnvelopeConsumer, EnvelopeHandler};
pub use envelope::{InboundEnvelope, TriggerEnvelope, WebhookEnvelope, WebhookKind};
pub use error::{ConsumeError, CreationError, PubSubError};
pub use handle::TopicHandle;
pub use manager::{InitStatus, PubSubManager, SubscriptionConfirmer};

pub use pubsub_api::{
    BackendError, CreateTopicOutput, DeliveryProtocol, ErrorKind, PubSubBackend, TopicId,
};
