pub mod error;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

pub use error::{BackendError, ErrorKind};

// ════════════════════════════════════════════════════════════════
//  Topic identifier
// ════════════════════════════════════════════════════════════════

/// Непрозрачный идентификатор topic'а в backend'е (ARN и т.п.).
///
/// Неизменяем после получения. Формат не проверяется: его интерпретирует
/// только backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for TopicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TopicId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TopicId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ════════════════════════════════════════════════════════════════
//  Delivery protocol
// ════════════════════════════════════════════════════════════════

/// Push-протокол доставки уведомлений подписчику.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryProtocol {
    #[default]
    Https,
    Http,
}

impl DeliveryProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryProtocol::Https => "https",
            DeliveryProtocol::Http => "http",
        }
    }
}

impl std::fmt::Display for DeliveryProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ════════════════════════════════════════════════════════════════
//  Backend contract
// ════════════════════════════════════════════════════════════════

/// Ответ на create-topic. Идентификатор опционален: backend может
/// ответить успехом без него, и это должно быть представимо.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTopicOutput {
    pub topic_id: Option<TopicId>,
}

/// Удалённый pub/sub сервис.
///
/// Передаётся явно (Arc<dyn PubSubBackend>) в TopicHandle/Manager, никакого
/// глобального клиента. Transport, retry и auth остаются на стороне реализации.
pub trait PubSubBackend: Send + Sync {
    /// Создать topic по имени (или вернуть существующий).
    fn create_topic(&self, name: &str)
        -> Pin<Box<dyn Future<Output = Result<CreateTopicOutput, BackendError>> + Send + '_>>;

    /// Зарегистрировать endpoint на получение уведомлений topic'а.
    fn subscribe(&self, topic: &TopicId, protocol: DeliveryProtocol, endpoint: &str)
        -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>>;

    /// Подтвердить подписку токеном, выданным backend'ом.
    fn confirm_subscription(&self, topic: &TopicId, token: &str)
        -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>>;

    /// Отправить уже сериализованное JSON-сообщение в topic.
    fn publish(&self, topic: &TopicId, message: String)
        -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>>;
}
