use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tokio_util::sync::CancellationToken;

use pubsub::{
    ConsumeError, EnvelopeConsumer, InboundEnvelope, PubSubError, SubscriptionConfirmer, WebhookKind,
};

/// Shared state of the webhook route.
#[derive(Clone)]
pub struct WebhookState {
    consumer: Arc<dyn EnvelopeConsumer>,
    confirmer: Option<Arc<dyn SubscriptionConfirmer>>,
}

impl WebhookState {
    pub fn new(consumer: Arc<dyn EnvelopeConsumer>) -> Self {
        Self { consumer, confirmer: None }
    }

    /// Confirm subscriptions automatically when the backend sends a
    /// `SubscriptionConfirmation` to the endpoint.
    pub fn with_confirmer(mut self, confirmer: Arc<dyn SubscriptionConfirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }
}

/// Router с единственным POST-маршрутом для push-доставки.
pub fn router(path: &str, state: WebhookState) -> Router {
    Router::new()
        .route(path, post(handle_delivery))
        .with_state(state)
}

/// Webhook HTTP сервер. Работает до отмены `shutdown`.
pub async fn run(
    addr: &str,
    path: &str,
    state: WebhookState,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = router(path, state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind webhook {addr}: {e}"))?;
    tracing::info!(addr, path, "webhook listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}

// ═══════════════════════════════════════════════════════════════
//  POST {path}
// ═══════════════════════════════════════════════════════════════

// Deliveries arrive as text/plain, so the body is read raw rather than
// through the Json extractor.
async fn handle_delivery(State(state): State<WebhookState>, body: Bytes) -> Response {
    let envelope = match InboundEnvelope::from_slice(&body) {
        Ok(env) => env,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting malformed envelope");
            return (StatusCode::BAD_REQUEST, format!("malformed envelope: {e}")).into_response();
        }
    };

    match envelope.webhook_kind() {
        Some(WebhookKind::SubscriptionConfirmation) => confirm(&state, &envelope).await,
        Some(kind @ (WebhookKind::UnsubscribeConfirmation | WebhookKind::Unknown)) => {
            tracing::info!(?kind, "ignoring webhook message");
            StatusCode::OK.into_response()
        }
        Some(WebhookKind::Notification) | None => deliver(&state, envelope).await,
    }
}

async fn confirm(state: &WebhookState, envelope: &InboundEnvelope) -> Response {
    let Some(token) = envelope.confirmation_token() else {
        return (StatusCode::BAD_REQUEST, "subscription confirmation without token").into_response();
    };
    let Some(confirmer) = &state.confirmer else {
        tracing::warn!("subscription confirmation received but no confirmer configured");
        return StatusCode::OK.into_response();
    };

    match confirmer.confirm(token).await {
        Ok(()) => {
            tracing::info!("subscription confirmed");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "subscription confirmation failed");
            let status = match e {
                PubSubError::Backend(_) => StatusCode::BAD_GATEWAY,
                PubSubError::Creation(_) | PubSubError::ReadyTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, format!("error: {e}")).into_response()
        }
    }
}

async fn deliver(state: &WebhookState, envelope: InboundEnvelope) -> Response {
    match state.consumer.consume(envelope).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e @ (ConsumeError::Envelope(_) | ConsumeError::Decode(_))) => {
            tracing::warn!(error = %e, "undecodable notification");
            (StatusCode::BAD_REQUEST, format!("error: {e}")).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "consumer failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::http::Request;
    use backend_memory::MemoryBackend;
    use pretty_assertions::assert_eq;
    use pubsub::{BackendError, CreateTopicOutput, DeliveryProtocol, PubSubBackend, PubSubManager, TopicId};
    use std::future::Future;
    use std::pin::Pin;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use tower::ServiceExt;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u32,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("order {0} rejected")]
    struct Rejected(u32);

    struct Fixture {
        backend: Arc<MemoryBackend>,
        manager: PubSubManager<Order>,
        seen: Arc<Mutex<Vec<Order>>>,
        app: Router,
    }

    async fn fixture() -> Fixture {
        let backend = Arc::new(MemoryBackend::default());
        let manager = PubSubManager::<Order>::from_topic_name("orders", backend.clone()).unwrap();
        manager.wait_ready().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = manager.build_consumer(move |order: Order| {
            let accepted = order.id != 0;
            sink.lock().unwrap().push(order.clone());
            std::future::ready(if accepted { Ok(()) } else { Err(Rejected(order.id)) })
        });

        let state = WebhookState::new(Arc::new(handler)).with_confirmer(Arc::new(manager.clone()));
        let app = router("/sns", state);
        Fixture { backend, manager, seen, app }
    }

    fn post(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/sns")
            .header("content-type", "text/plain; charset=UTF-8")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn notification_reaches_consumer() {
        let f = fixture().await;
        let body = json!({ "Type": "Notification", "Message": "{\"id\":7}" }).to_string();
        let response = f.app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*f.seen.lock().unwrap(), vec![Order { id: 7 }]);
    }

    #[tokio::test]
    async fn subscription_confirmation_is_confirmed() {
        let f = fixture().await;
        let topic_id = f.manager.topic_id().unwrap();
        f.manager.subscribe("https://example.com/sns").await.unwrap();
        let token = f.backend.subscriptions(&topic_id).await[0].token.clone();

        let body = json!({
            "Type": "SubscriptionConfirmation",
            "Message": "You have chosen to subscribe to the topic",
            "Token": token,
        })
        .to_string();
        let response = f.app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(f.backend.subscriptions(&topic_id).await[0].confirmed);
        assert!(f.seen.lock().unwrap().is_empty());
    }

    /// Backend that refuses to create any topic.
    struct Unreachable;

    impl PubSubBackend for Unreachable {
        fn create_topic(&self, _name: &str)
            -> Pin<Box<dyn Future<Output = Result<CreateTopicOutput, BackendError>> + Send + '_>>
        {
            Box::pin(async { Err(BackendError::io("connection refused")) })
        }

        fn subscribe(&self, _topic: &TopicId, _protocol: DeliveryProtocol, _endpoint: &str)
            -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>>
        {
            Box::pin(async { Ok(()) })
        }

        fn confirm_subscription(&self, _topic: &TopicId, _token: &str)
            -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>>
        {
            Box::pin(async { Ok(()) })
        }

        fn publish(&self, _topic: &TopicId, _message: String)
            -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>>
        {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn confirmation_without_topic_is_unavailable() {
        let manager = PubSubManager::<Order>::from_topic_name("orders", Arc::new(Unreachable)).unwrap();
        assert!(manager.wait_ready().await.is_err());

        let handler = manager.build_consumer(|_: Order| std::future::ready(Ok::<(), Rejected>(())));
        let state = WebhookState::new(Arc::new(handler)).with_confirmer(Arc::new(manager));
        let app = router("/sns", state);

        let body = json!({ "Type": "SubscriptionConfirmation", "Message": "", "Token": "tok-1" }).to_string();
        let response = app.oneshot(post(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_token_is_bad_gateway() {
        let f = fixture().await;
        let body = json!({ "Type": "SubscriptionConfirmation", "Message": "", "Token": "bogus" }).to_string();
        let response = f.app.oneshot(post(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn malformed_message_is_bad_request() {
        let f = fixture().await;
        let body = json!({ "Type": "Notification", "Message": "{not json" }).to_string();
        let response = f.app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(f.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let f = fixture().await;
        let response = f.app.oneshot(post("<xml/>".into())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn consumer_failure_is_server_error() {
        let f = fixture().await;
        let body = json!({ "Type": "Notification", "Message": "{\"id\":0}" }).to_string();
        let response = f.app.oneshot(post(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn trigger_shaped_body_is_delivered() {
        let f = fixture().await;
        let body = json!({ "Records": [ { "Sns": { "Message": "{\"id\":3}" } } ] }).to_string();
        let response = f.app.oneshot(post(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*f.seen.lock().unwrap(), vec![Order { id: 3 }]);
    }

    #[tokio::test]
    async fn unsubscribe_confirmation_is_ignored() {
        let f = fixture().await;
        let body = json!({ "Type": "UnsubscribeConfirmation", "Message": "bye" }).to_string();
        let response = f.app.oneshot(post(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(f.seen.lock().unwrap().is_empty());
    }
}
