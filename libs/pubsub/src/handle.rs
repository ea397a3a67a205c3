use std::sync::Arc;

use serde::Serialize;

use pubsub_api::{DeliveryProtocol, PubSubBackend, TopicId};

use crate::error::PubSubError;

/// Operation surface over one bound topic. Holds nothing beyond the
/// identifier and the injected backend; every call is a single delegation.
pub struct TopicHandle {
    topic_id: TopicId,
    protocol: DeliveryProtocol,
    backend: Arc<dyn PubSubBackend>,
}

impl std::fmt::Debug for TopicHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicHandle")
            .field("topic_id", &self.topic_id)
            .field("protocol", &self.protocol)
            .finish()
    }
}

impl TopicHandle {
    pub fn new(topic_id: TopicId, protocol: DeliveryProtocol, backend: Arc<dyn PubSubBackend>) -> Self {
        Self { topic_id, protocol, backend }
    }

    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    /// Register `endpoint` for push delivery. No local validation of the
    /// endpoint; rejection comes back from the backend.
    pub async fn subscribe(&self, endpoint: &str) -> Result<(), PubSubError> {
        tracing::debug!(topic = %self.topic_id, endpoint, protocol = %self.protocol, "subscribe");
        self.backend
            .subscribe(&self.topic_id, self.protocol, endpoint)
            .await
            .map_err(PubSubError::Backend)
    }

    pub async fn confirm_subscription(&self, token: &str) -> Result<(), PubSubError> {
        tracing::debug!(topic = %self.topic_id, "confirm subscription");
        self.backend
            .confirm_subscription(&self.topic_id, token)
            .await
            .map_err(PubSubError::Backend)
    }

    /// Serialize to JSON and publish. Serialization runs before the
    /// backend is touched.
    pub async fn publish<P: Serialize + ?Sized>(&self, message: &P) -> Result<(), PubSubError> {
        let json = serde_json::to_string(message)?;
        tracing::debug!(topic = %self.topic_id, bytes = json.len(), "publish");
        self.backend
            .publish(&self.topic_id, json)
            .await
            .map_err(PubSubError::Backend)
    }
}
