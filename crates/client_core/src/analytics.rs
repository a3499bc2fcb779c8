use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use shared::domain::SignupMethod;
use tracing::warn;

/// Traits attached to an identify call. The identifier lands in the field
/// matching the signup method: email populated iff the method is email,
/// phone iff the method is phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifyTraits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub signup_method: SignupMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
}

impl IdentifyTraits {
    pub fn for_identifier(method: SignupMethod, identifier: &str) -> Self {
        Self {
            email: matches!(method, SignupMethod::Email).then(|| identifier.to_string()),
            phone: matches!(method, SignupMethod::Phone).then(|| identifier.to_string()),
            signup_method: method,
            profile_name: None,
        }
    }

    pub fn with_profile_name(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_name = Some(profile_name.into());
        self
    }
}

/// Third-party tracking surface consumed by the funnel. `track` is carried
/// for parity with the SDK helper but the funnel itself never calls it.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn identify(&self, user_id: &str, traits: IdentifyTraits) -> Result<()>;
    async fn track(&self, event_name: &str, properties: serde_json::Value) -> Result<()>;
    async fn reset(&self) -> Result<()>;
}

/// Stand-in when no analytics SDK is configured. Calls degrade to a logged
/// warning and succeed; analytics absence must never fail the funnel.
pub struct MissingAnalyticsSink;

#[async_trait]
impl AnalyticsSink for MissingAnalyticsSink {
    async fn identify(&self, user_id: &str, _traits: IdentifyTraits) -> Result<()> {
        warn!(user_id, "analytics sink not configured; dropping identify call");
        Ok(())
    }

    async fn track(&self, event_name: &str, _properties: serde_json::Value) -> Result<()> {
        warn!(event_name, "analytics sink not configured; dropping track call");
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        warn!("analytics sink not configured; dropping reset call");
        Ok(())
    }
}
