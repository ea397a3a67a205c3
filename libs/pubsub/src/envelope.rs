use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ═══════════════════════════════════════════════════════════════
//  Trigger envelope: { "Records": [ { "Sns": { "Message": "..." } } ] }
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggerEnvelope {
    /// Non-empty whenever produced by `InboundEnvelope::from_value`.
    #[serde(rename = "Records", alias = "records")]
    pub records: Vec<TriggerRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggerRecord {
    #[serde(rename = "Sns", alias = "sns")]
    pub notification: TriggerNotification,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggerNotification {
    #[serde(rename = "Message", alias = "message")]
    pub message: String,
    #[serde(rename = "MessageId", default)]
    pub message_id: Option<String>,
    #[serde(rename = "TopicArn", default)]
    pub topic_arn: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Webhook envelope: { "Type": "Notification", "Message": "..." }
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum WebhookKind {
    #[default]
    Notification,
    SubscriptionConfirmation,
    UnsubscribeConfirmation,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "Type", alias = "type", default)]
    pub kind: WebhookKind,
    #[serde(rename = "Message", alias = "message")]
    pub message: String,
    #[serde(rename = "Token", default)]
    pub token: Option<String>,
    #[serde(rename = "TopicArn", default)]
    pub topic_arn: Option<String>,
    #[serde(rename = "MessageId", default)]
    pub message_id: Option<String>,
    #[serde(rename = "SubscribeURL", default)]
    pub subscribe_url: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  InboundEnvelope
// ═══════════════════════════════════════════════════════════════

/// One inbound notification in either delivery shape.
///
/// The branch is picked structurally: a non-empty `Records` array means
/// trigger delivery, anything else is read as a webhook body. The `Type`
/// field is not consulted for this, it only exists on the webhook shape.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    Trigger(TriggerEnvelope),
    Webhook(WebhookEnvelope),
}

fn has_records(value: &Value) -> bool {
    ["Records", "records"].iter().any(|key| {
        value
            .get(key)
            .and_then(Value::as_array)
            .is_some_and(|records| !records.is_empty())
    })
}

impl InboundEnvelope {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if has_records(&value) {
            serde_json::from_value(value).map(InboundEnvelope::Trigger)
        } else {
            serde_json::from_value(value).map(InboundEnvelope::Webhook)
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    /// The message string to decode. For trigger delivery only the first
    /// record is used; the rest of a batch is ignored.
    pub fn message(&self) -> Option<&str> {
        match self {
            InboundEnvelope::Trigger(t) => t.records.first().map(|r| r.notification.message.as_str()),
            InboundEnvelope::Webhook(w) => Some(w.message.as_str()),
        }
    }

    /// Records beyond the first that the adapter will not deliver.
    pub fn ignored_records(&self) -> usize {
        match self {
            InboundEnvelope::Trigger(t) => t.records.len().saturating_sub(1),
            InboundEnvelope::Webhook(_) => 0,
        }
    }

    pub fn webhook_kind(&self) -> Option<WebhookKind> {
        match self {
            InboundEnvelope::Webhook(w) => Some(w.kind),
            InboundEnvelope::Trigger(_) => None,
        }
    }

    /// Token of a subscription-confirmation webhook.
    pub fn confirmation_token(&self) -> Option<&str> {
        match self {
            InboundEnvelope::Webhook(w) if w.kind == WebhookKind::SubscriptionConfirmation => {
                w.token.as_deref()
            }
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for InboundEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        InboundEnvelope::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn records_select_trigger_branch() {
        let env = InboundEnvelope::from_value(json!({
            "Records": [
                { "Sns": { "Message": "{\"n\":1}" } },
                { "Sns": { "Message": "{\"n\":2}" } }
            ]
        }))
        .unwrap();
        assert!(matches!(env, InboundEnvelope::Trigger(_)));
        assert_eq!(env.message(), Some("{\"n\":1}"));
        assert_eq!(env.ignored_records(), 1);
    }

    #[test]
    fn webhook_branch_without_records() {
        let env = InboundEnvelope::from_value(json!({
            "Type": "Notification",
            "Message": "{\"n\":1}",
            "TopicArn": "arn:aws:sns:eu-west-1:1:orders"
        }))
        .unwrap();
        assert_eq!(env.webhook_kind(), Some(WebhookKind::Notification));
        assert_eq!(env.message(), Some("{\"n\":1}"));
        assert_eq!(env.confirmation_token(), None);
    }

    #[test]
    fn lowercase_fields_accepted() {
        let env = InboundEnvelope::from_value(json!({
            "type": "Notification",
            "message": "{}"
        }))
        .unwrap();
        assert_eq!(env.message(), Some("{}"));
    }

    #[test]
    fn empty_records_fall_through_to_webhook() {
        let env = InboundEnvelope::from_value(json!({ "Records": [], "Message": "1" })).unwrap();
        assert!(matches!(env, InboundEnvelope::Webhook(_)));

        assert!(InboundEnvelope::from_value(json!({ "Records": [] })).is_err());
    }

    #[test]
    fn subscription_confirmation_token() {
        let env: InboundEnvelope = serde_json::from_str(
            r#"{
                "Type": "SubscriptionConfirmation",
                "Message": "You have chosen to subscribe",
                "Token": "tok-123",
                "SubscribeURL": "https://sns.example/confirm"
            }"#,
        )
        .unwrap();
        assert_eq!(env.webhook_kind(), Some(WebhookKind::SubscriptionConfirmation));
        assert_eq!(env.confirmation_token(), Some("tok-123"));
    }

    #[test]
    fn unknown_type_is_kept() {
        let env = InboundEnvelope::from_value(json!({ "Type": "Heartbeat", "Message": "" })).unwrap();
        assert_eq!(env.webhook_kind(), Some(WebhookKind::Unknown));
    }

    #[test]
    fn trigger_record_missing_message_is_error() {
        let err = InboundEnvelope::from_value(json!({ "Records": [ { "Sns": {} } ] }));
        assert!(err.is_err());
    }
}
