use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::envelope::InboundEnvelope;
use crate::error::ConsumeError;

/// Type-erased consumer error for transports that hold
/// `Arc<dyn EnvelopeConsumer>`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Normalizes an inbound envelope into a typed payload and hands it to a
/// user consumer. Pure transformation: no shared state, no concurrency.
pub struct EnvelopeHandler<P, F> {
    consumer: F,
    _payload: PhantomData<fn() -> P>,
}

impl<P, F: Clone> Clone for EnvelopeHandler<P, F> {
    fn clone(&self) -> Self {
        Self { consumer: self.consumer.clone(), _payload: PhantomData }
    }
}

impl<P, F, Fut, E> EnvelopeHandler<P, F>
where
    P: DeserializeOwned,
    F: Fn(P) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    pub fn new(consumer: F) -> Self {
        Self { consumer, _payload: PhantomData }
    }

    /// Decode the selected message and await the consumer. The consumer is
    /// not called when decoding fails.
    pub async fn handle(&self, envelope: InboundEnvelope) -> Result<(), ConsumeError<E>> {
        let skipped = envelope.ignored_records();
        if skipped > 0 {
            tracing::debug!(skipped, "trigger batch: delivering first record only");
        }
        let Some(raw) = envelope.message() else {
            return Err(ConsumeError::Envelope(serde::de::Error::custom(
                "trigger envelope has no records",
            )));
        };
        let payload: P = serde_json::from_str(raw).map_err(ConsumeError::Decode)?;
        (self.consumer)(payload).await.map_err(ConsumeError::Consumer)
    }

    pub async fn handle_value(&self, value: Value) -> Result<(), ConsumeError<E>> {
        let envelope = InboundEnvelope::from_value(value).map_err(ConsumeError::Envelope)?;
        self.handle(envelope).await
    }

    pub async fn handle_slice(&self, bytes: &[u8]) -> Result<(), ConsumeError<E>> {
        let envelope = InboundEnvelope::from_slice(bytes).map_err(ConsumeError::Envelope)?;
        self.handle(envelope).await
    }
}

/// Object-safe view of an `EnvelopeHandler`.
pub trait EnvelopeConsumer: Send + Sync {
    fn consume(&self, envelope: InboundEnvelope)
        -> Pin<Box<dyn Future<Output = Result<(), ConsumeError<BoxError>>> + Send + '_>>;
}

impl<P, F, Fut, E> EnvelopeConsumer for EnvelopeHandler<P, F>
where
    P: DeserializeOwned + Send,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    fn consume(&self, envelope: InboundEnvelope)
        -> Pin<Box<dyn Future<Output = Result<(), ConsumeError<BoxError>>> + Send + '_>>
    {
        Box::pin(async move {
            self.handle(envelope).await.map_err(|e| match e {
                ConsumeError::Envelope(e) => ConsumeError::Envelope(e),
                ConsumeError::Decode(e) => ConsumeError::Decode(e),
                ConsumeError::Consumer(e) => ConsumeError::Consumer(Box::new(e) as BoxError),
            })
        })
    }
}
