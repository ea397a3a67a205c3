use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;

use pubsub_api::{DeliveryProtocol, PubSubBackend, TopicId};

use crate::config::{ManagerConfig, TopicTarget};
use crate::consumer::EnvelopeHandler;
use crate::error::{CreationError, PubSubError};
use crate::handle::TopicHandle;

// ═══════════════════════════════════════════════════════════════
//  Readiness cell
// ═══════════════════════════════════════════════════════════════

/// Internal lifecycle state. Only `Pending` ever transitions, and only once.
#[derive(Debug)]
enum InitState {
    Bound(Arc<TopicHandle>),
    Pending,
    Ready(Arc<TopicHandle>),
    Failed(CreationError),
}

impl InitState {
    fn is_resolved(&self) -> bool {
        !matches!(self, InitState::Pending)
    }

    fn outcome(&self) -> Option<Result<Arc<TopicHandle>, CreationError>> {
        match self {
            InitState::Bound(h) | InitState::Ready(h) => Some(Ok(h.clone())),
            InitState::Failed(e) => Some(Err(e.clone())),
            InitState::Pending => None,
        }
    }
}

/// Observable lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    /// Identifier supplied at construction.
    Bound,
    /// Create-topic call in flight.
    Pending,
    /// Identifier obtained from the backend.
    Ready,
    /// Creation failed; permanent.
    Failed,
}

// ═══════════════════════════════════════════════════════════════
//  PubSubManager
// ═══════════════════════════════════════════════════════════════

/// Owns the topic handle lifecycle and exposes an initialization-transparent
/// subscribe / confirm / publish surface.
///
/// With a topic identifier the handle is bound synchronously. With a topic
/// name a single create-topic call runs on a spawned task; every operation
/// waits for it and all waiters observe the same outcome.
///
/// The outcome lives in a `watch` channel: waiters clone the receiver and
/// wait for a non-pending value, so a waiter that arrives after resolution
/// reads the stored value without suspending, and nothing stays registered
/// once the cloned receiver is dropped.
pub struct PubSubManager<P> {
    state: watch::Receiver<InitState>,
    ready_timeout: Option<Duration>,
    _payload: PhantomData<fn(P)>,
}

impl<P> Clone for PubSubManager<P> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            ready_timeout: self.ready_timeout,
            _payload: PhantomData,
        }
    }
}

impl<P> std::fmt::Debug for PubSubManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubManager")
            .field("status", &self.status())
            .field("topic_id", &self.topic_id())
            .finish()
    }
}

impl<P> PubSubManager<P> {
    /// Build a manager from configuration. Invalid configuration fails here,
    /// before any backend call. A name-based target must be constructed
    /// inside a tokio runtime.
    pub fn new(config: ManagerConfig, backend: Arc<dyn PubSubBackend>) -> Result<Self, PubSubError> {
        let target = config.target()?;
        let ready_timeout = config.ready_timeout_duration();
        let protocol = config.protocol;

        let state = match target {
            TopicTarget::Id(topic_id) => {
                tracing::debug!(topic = %topic_id, "bound to existing topic");
                let handle = Arc::new(TopicHandle::new(topic_id, protocol, backend));
                let (_tx, rx) = watch::channel(InitState::Bound(handle));
                rx
            }
            TopicTarget::Name(name) => {
                let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
                    PubSubError::Config(format!("topic '{name}' must be created inside a tokio runtime: {e}"))
                })?;
                let (tx, rx) = watch::channel(InitState::Pending);
                let create_timeout = config.create_timeout_duration();
                runtime.spawn(create_topic(tx, backend, name, protocol, create_timeout));
                rx
            }
        };

        Ok(Self { state, ready_timeout, _payload: PhantomData })
    }

    pub fn from_topic_id(topic_id: impl Into<String>, backend: Arc<dyn PubSubBackend>) -> Result<Self, PubSubError> {
        Self::new(ManagerConfig::with_topic_arn(topic_id), backend)
    }

    pub fn from_topic_name(name: impl Into<String>, backend: Arc<dyn PubSubBackend>) -> Result<Self, PubSubError> {
        Self::new(ManagerConfig::with_topic_name(name), backend)
    }

    pub fn status(&self) -> InitStatus {
        match &*self.state.borrow() {
            InitState::Bound(_) => InitStatus::Bound,
            // Still pending with the sender gone: creation was aborted.
            InitState::Pending if self.state.has_changed().is_err() => InitStatus::Failed,
            InitState::Pending => InitStatus::Pending,
            InitState::Ready(_) => InitStatus::Ready,
            InitState::Failed(_) => InitStatus::Failed,
        }
    }

    /// Identifier of the bound topic, once known.
    pub fn topic_id(&self) -> Option<TopicId> {
        match &*self.state.borrow() {
            InitState::Bound(h) | InitState::Ready(h) => Some(h.topic_id().clone()),
            _ => None,
        }
    }

    /// Wait until the handle exists. Returns immediately when already
    /// resolved; a preserved creation failure is returned on every call.
    pub async fn wait_ready(&self) -> Result<(), PubSubError> {
        self.handle().await.map(|_| ())
    }

    async fn handle(&self) -> Result<Arc<TopicHandle>, PubSubError> {
        let resolved = self.state.borrow().outcome();
        if let Some(outcome) = resolved {
            return outcome.map_err(PubSubError::Creation);
        }

        match self.ready_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.wait_outcome())
                .await
                .map_err(|_| PubSubError::ReadyTimeout(timeout))?,
            None => self.wait_outcome().await,
        }
    }

    async fn wait_outcome(&self) -> Result<Arc<TopicHandle>, PubSubError> {
        let mut rx = self.state.clone();
        let outcome = match rx.wait_for(InitState::is_resolved).await {
            Ok(state) => state.outcome(),
            // Sender dropped while still pending: the creation task is gone.
            Err(_) => None,
        };
        match outcome {
            Some(result) => result.map_err(PubSubError::Creation),
            None => Err(PubSubError::Creation(CreationError::Aborted)),
        }
    }

    pub async fn subscribe(&self, endpoint: &str) -> Result<(), PubSubError> {
        self.handle().await?.subscribe(endpoint).await
    }

    pub async fn confirm_subscription(&self, token: &str) -> Result<(), PubSubError> {
        self.handle().await?.confirm_subscription(token).await
    }
}

impl<P: Serialize> PubSubManager<P> {
    pub async fn publish(&self, message: &P) -> Result<(), PubSubError> {
        self.handle().await?.publish(message).await
    }
}

impl<P: DeserializeOwned> PubSubManager<P> {
    /// Adapter turning either inbound envelope shape into a call of
    /// `consumer` with the decoded payload.
    pub fn build_consumer<F, Fut, E>(&self, consumer: F) -> EnvelopeHandler<P, F>
    where
        F: Fn(P) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        EnvelopeHandler::new(consumer)
    }
}

/// Single create-topic attempt. Publishes exactly one outcome on `tx`.
async fn create_topic(
    tx: watch::Sender<InitState>,
    backend: Arc<dyn PubSubBackend>,
    name: String,
    protocol: DeliveryProtocol,
    timeout: Option<Duration>,
) {
    tracing::info!(topic = %name, "creating topic");

    let call = backend.create_topic(&name);
    let response = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(r) => r,
            Err(_) => {
                let err = CreationError::TimedOut { topic: name.clone(), timeout: limit };
                tracing::error!(topic = %name, error = %err, "topic creation failed");
                tx.send_replace(InitState::Failed(err));
                return;
            }
        },
        None => call.await,
    };

    let state = match response {
        Ok(out) => match out.topic_id {
            Some(topic_id) if !topic_id.as_str().is_empty() => {
                tracing::info!(topic = %name, topic_id = %topic_id, "topic ready");
                InitState::Ready(Arc::new(TopicHandle::new(topic_id, protocol, backend.clone())))
            }
            _ => InitState::Failed(CreationError::MissingIdentifier(name.clone())),
        },
        Err(source) => InitState::Failed(CreationError::Backend { topic: name.clone(), source }),
    };

    if let InitState::Failed(err) = &state {
        tracing::error!(topic = %name, error = %err, "topic creation failed");
    }
    // send_replace stores the value even with no receivers left.
    tx.send_replace(state);
}

// ═══════════════════════════════════════════════════════════════
//  Subscription confirmation seam
// ═══════════════════════════════════════════════════════════════

/// Object-safe confirm surface, so transports need not know the payload type.
pub trait SubscriptionConfirmer: Send + Sync {
    fn confirm(&self, token: &str) -> Pin<Box<dyn Future<Output = Result<(), PubSubError>> + Send + '_>>;
}

impl<P> SubscriptionConfirmer for PubSubManager<P> {
    fn confirm(&self, token: &str) -> Pin<Box<dyn Future<Output = Result<(), PubSubError>> + Send + '_>> {
        let token = token.to_string();
        Box::pin(async move { self.confirm_subscription(&token).await })
    }
}
