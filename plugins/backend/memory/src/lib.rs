use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use pubsub_api::{BackendError, CreateTopicOutput, DeliveryProtocol, PubSubBackend, TopicId};

// ═══════════════════════════════════════════════════════════════
//  MemoryBackendConfig
// ═══════════════════════════════════════════════════════════════

fn default_arn_prefix() -> String {
    "arn:memory:topic".to_string()
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MemoryBackendConfig {
    #[serde(default = "default_arn_prefix")]
    pub arn_prefix: String,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            arn_prefix: default_arn_prefix(),
        }
    }
}

impl MemoryBackendConfig {
    pub fn from_json(config_json: &str) -> Result<Self, BackendError> {
        if config_json.trim().is_empty() || config_json == "{}" {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(config_json)?)
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBackend
// ═══════════════════════════════════════════════════════════════

/// Подписка на topic внутри MemoryBackend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub endpoint: String,
    pub protocol: DeliveryProtocol,
    /// Токен подтверждения, выданный backend'ом.
    pub token: String,
    pub confirmed: bool,
}

#[derive(Debug, Default)]
struct TopicState {
    subscriptions: Vec<Subscription>,
    messages: Vec<String>,
}

/// In-process pub/sub backend. Для локальной разработки и тестов:
/// topic'и живут в памяти, сообщения накапливаются без доставки.
pub struct MemoryBackend {
    arn_prefix: String,
    topics: RwLock<HashMap<TopicId, TopicState>>,
    next_token: AtomicU64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(MemoryBackendConfig::default())
    }
}

impl MemoryBackend {
    pub fn new(config: MemoryBackendConfig) -> Self {
        Self {
            arn_prefix: config.arn_prefix,
            topics: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    fn topic_id_for(&self, name: &str) -> TopicId {
        TopicId::new(format!("{}:{name}", self.arn_prefix))
    }

    /// Все сообщения, опубликованные в topic, в порядке публикации.
    pub async fn published(&self, topic: &TopicId) -> Vec<String> {
        let topics = self.topics.read().await;
        topics.get(topic).map(|t| t.messages.clone()).unwrap_or_default()
    }

    pub async fn subscriptions(&self, topic: &TopicId) -> Vec<Subscription> {
        let topics = self.topics.read().await;
        topics.get(topic).map(|t| t.subscriptions.clone()).unwrap_or_default()
    }

    pub async fn topic_ids(&self) -> Vec<TopicId> {
        self.topics.read().await.keys().cloned().collect()
    }
}

fn unknown_topic(topic: &TopicId) -> BackendError {
    BackendError::not_found(format!("topic '{topic}' does not exist"))
}

impl PubSubBackend for MemoryBackend {
    fn create_topic(
        &self,
        name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<CreateTopicOutput, BackendError>> + Send + '_>> {
        let name = name.to_string();
        Box::pin(async move {
            if name.is_empty() {
                return Err(BackendError::config("topic name is empty"));
            }
            let topic_id = self.topic_id_for(&name);
            let mut topics = self.topics.write().await;
            // Повторное создание возвращает тот же идентификатор.
            topics.entry(topic_id.clone()).or_default();
            tracing::debug!(topic = %name, topic_id = %topic_id, "memory topic created");
            Ok(CreateTopicOutput { topic_id: Some(topic_id) })
        })
    }

    fn subscribe(
        &self,
        topic: &TopicId,
        protocol: DeliveryProtocol,
        endpoint: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let topic = topic.clone();
        let endpoint = endpoint.to_string();
        Box::pin(async move {
            if endpoint.is_empty() {
                return Err(BackendError::config("endpoint is empty"));
            }
            let mut topics = self.topics.write().await;
            let state = topics.get_mut(&topic).ok_or_else(|| unknown_topic(&topic))?;
            let n = self.next_token.fetch_add(1, Ordering::Relaxed);
            state.subscriptions.push(Subscription {
                endpoint,
                protocol,
                token: format!("token-{n}"),
                confirmed: false,
            });
            Ok(())
        })
    }

    fn confirm_subscription(
        &self,
        topic: &TopicId,
        token: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let topic = topic.clone();
        let token = token.to_string();
        Box::pin(async move {
            let mut topics = self.topics.write().await;
            let state = topics.get_mut(&topic).ok_or_else(|| unknown_topic(&topic))?;
            let sub = state
                .subscriptions
                .iter_mut()
                .find(|s| s.token == token)
                .ok_or_else(|| BackendError::not_found("unknown confirmation token"))?;
            sub.confirmed = true;
            Ok(())
        })
    }

    fn publish(
        &self,
        topic: &TopicId,
        message: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let topic = topic.clone();
        Box::pin(async move {
            let mut topics = self.topics.write().await;
            let state = topics.get_mut(&topic).ok_or_else(|| unknown_topic(&topic))?;
            state.messages.push(message);
            Ok(())
        })
    }
}
