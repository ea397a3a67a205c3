use std::time::Duration;

use serde::Deserialize;

use pubsub_api::{DeliveryProtocol, TopicId};

use crate::error::PubSubError;

/// Manager configuration, parsed from TOML or built in code.
///
/// Exactly one of `topic_arn` / `topic_name` must be set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManagerConfig {
    /// Bind to an existing topic immediately.
    #[serde(default)]
    pub topic_arn: Option<String>,

    /// Create the topic by name in the background.
    #[serde(default)]
    pub topic_name: Option<String>,

    /// Protocol used when registering subscription endpoints.
    #[serde(default)]
    pub protocol: DeliveryProtocol,

    /// Upper bound on the create-topic call. None = wait indefinitely.
    #[serde(default)]
    pub create_timeout_ms: Option<u64>,

    /// Upper bound on each wait for readiness. None = wait indefinitely.
    #[serde(default)]
    pub ready_timeout_ms: Option<u64>,
}

/// Milliseconds, rounded into `1..=u64::MAX` so a short timeout never
/// becomes zero.
fn whole_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// What the manager is bound to at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicTarget {
    Id(TopicId),
    Name(String),
}

impl ManagerConfig {
    pub fn with_topic_arn(arn: impl Into<String>) -> Self {
        Self { topic_arn: Some(arn.into()), ..Self::default() }
    }

    pub fn with_topic_name(name: impl Into<String>) -> Self {
        Self { topic_name: Some(name.into()), ..Self::default() }
    }

    pub fn create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout_ms = Some(whole_millis(timeout));
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout_ms = Some(whole_millis(timeout));
        self
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, PubSubError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PubSubError::Config(format!("{path}: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, PubSubError> {
        toml::from_str(toml_str).map_err(|e| PubSubError::Config(e.to_string()))
    }

    /// Resolve the construction target. Both or neither set is an error,
    /// as is an empty value.
    pub fn target(&self) -> Result<TopicTarget, PubSubError> {
        match (self.topic_arn.as_deref(), self.topic_name.as_deref()) {
            (Some(_), Some(_)) => Err(PubSubError::Config(
                "topic_arn and topic_name are mutually exclusive".into(),
            )),
            (None, None) => Err(PubSubError::Config(
                "one of topic_arn or topic_name is required".into(),
            )),
            (Some(arn), None) if arn.trim().is_empty() => {
                Err(PubSubError::Config("topic_arn is empty".into()))
            }
            (None, Some(name)) if name.trim().is_empty() => {
                Err(PubSubError::Config("topic_name is empty".into()))
            }
            (Some(arn), None) => Ok(TopicTarget::Id(TopicId::new(arn))),
            (None, Some(name)) => Ok(TopicTarget::Name(name.to_string())),
        }
    }

    pub(crate) fn create_timeout_duration(&self) -> Option<Duration> {
        self.create_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn ready_timeout_duration(&self) -> Option<Duration> {
        self.ready_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_topic_name_with_timeouts() {
        let config = ManagerConfig::parse(
            r#"
            topic_name = "orders"
            protocol = "http"
            create_timeout_ms = 5000
            "#,
        )
        .unwrap();
        assert_eq!(config.target().unwrap(), TopicTarget::Name("orders".into()));
        assert_eq!(config.protocol, DeliveryProtocol::Http);
        assert_eq!(config.create_timeout_duration(), Some(Duration::from_secs(5)));
        assert_eq!(config.ready_timeout_duration(), None);
    }

    #[test]
    fn parse_topic_arn() {
        let config = ManagerConfig::parse(r#"topic_arn = "arn:aws:sns:us-east-1:1:orders""#).unwrap();
        assert_eq!(
            config.target().unwrap(),
            TopicTarget::Id(TopicId::new("arn:aws:sns:us-east-1:1:orders"))
        );
        assert_eq!(config.protocol, DeliveryProtocol::Https);
    }

    #[test]
    fn both_targets_rejected() {
        let config = ManagerConfig {
            topic_arn: Some("arn".into()),
            topic_name: Some("name".into()),
            ..ManagerConfig::default()
        };
        assert!(matches!(config.target(), Err(PubSubError::Config(_))));
    }

    #[test]
    fn no_target_rejected() {
        assert!(matches!(ManagerConfig::default().target(), Err(PubSubError::Config(_))));
    }

    #[test]
    fn empty_name_rejected() {
        let config = ManagerConfig::with_topic_name("  ");
        assert!(matches!(config.target(), Err(PubSubError::Config(_))));
    }

    #[test]
    fn sub_millisecond_timeout_is_not_zero() {
        let config = ManagerConfig::with_topic_name("orders")
            .create_timeout(Duration::from_micros(300))
            .ready_timeout(Duration::MAX);
        assert_eq!(config.create_timeout_ms, Some(1));
        assert_eq!(config.ready_timeout_ms, Some(u64::MAX));
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = ManagerConfig::parse("topic_name = ").unwrap_err();
        assert!(matches!(err, PubSubError::Config(_)));
    }
}
