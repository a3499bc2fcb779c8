use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{AnonymousId, Screen, SignupMethod},
    protocol::{
        OtpSendRequest, OtpSendResponse, OtpVerifyRequest, OtpVerifyResponse,
        SignupCompleteRequest,
    },
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod analytics;
mod durable_identity_store;

pub use analytics::{AnalyticsSink, IdentifyTraits, MissingAnalyticsSink};
pub use durable_identity_store::DurableIdentityStore;

/// Persisted key for the locally generated anonymous identifier.
pub const ANONYMOUS_ID_KEY: &str = "anonymous_id";
/// Persisted key for the analytics SDK's own anonymous-session identifier.
/// The funnel never writes it; restart clears it alongside ours.
pub const SDK_ANONYMOUS_ID_KEY: &str = "sdk_anonymous_id";

#[derive(Debug, Error)]
pub enum FunnelError {
    #[error("'{operation}' is not valid on screen '{screen}'")]
    WrongScreen {
        operation: &'static str,
        screen: Screen,
    },
}

/// Local persistence for session-scoped identifiers.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>>;
    async fn store(&self, key: &str, value: &str) -> Result<()>;
    async fn clear(&self, key: &str) -> Result<()>;
}

/// In-memory store for tests and storage-less embedding.
#[derive(Default)]
pub struct MemoryIdentityStore {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn store(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FunnelConfig {
    /// OTP backend base URL, read once at startup.
    pub api_base_url: String,
    pub platform: String,
    /// Free-form client description sent to the backend, the user-agent
    /// analogue.
    pub device: String,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001".into(),
            platform: "web".into(),
            device: "unknown".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunnelEvent {
    ScreenChanged(Screen),
    /// The blocking user-visible invalid-OTP notification. The session stays
    /// on the otp screen; the user retries.
    InvalidOtp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOtpOutcome {
    Verified,
    Rejected,
}

/// Read-only view of the session for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub screen: Screen,
    pub step: u8,
    pub signup_method: SignupMethod,
    pub identifier: String,
    pub otp_input: String,
    pub server_otp: String,
    pub profile_name: String,
    pub anonymous_id: Option<String>,
}

#[derive(Default)]
struct FunnelState {
    screen: Screen,
    signup_method: SignupMethod,
    identifier: String,
    otp_input: String,
    server_otp: String,
    profile_name: String,
    anonymous_id: Option<AnonymousId>,
    last_identified: Option<String>,
}

/// Drives the six-step signup funnel: strictly linear screen transitions,
/// an OTP backend over HTTP, and an injected analytics sink invoked at the
/// transition points. One logical thread of control; all state lives behind
/// a single mutex.
pub struct FunnelClient {
    http: Client,
    config: FunnelConfig,
    analytics: Arc<dyn AnalyticsSink>,
    identity: Arc<dyn IdentityStore>,
    inner: Mutex<FunnelState>,
    events: broadcast::Sender<FunnelEvent>,
}

impl FunnelClient {
    pub fn new(config: FunnelConfig) -> Arc<Self> {
        Self::new_with_dependencies(
            config,
            Arc::new(MissingAnalyticsSink),
            Arc::new(MemoryIdentityStore::default()),
        )
    }

    pub fn new_with_dependencies(
        config: FunnelConfig,
        analytics: Arc<dyn AnalyticsSink>,
        identity: Arc<dyn IdentityStore>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            http: Client::new(),
            config,
            analytics,
            identity,
            inner: Mutex::new(FunnelState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FunnelEvent> {
        self.events.subscribe()
    }

    pub async fn screen(&self) -> Screen {
        self.inner.lock().await.screen
    }

    pub async fn step(&self) -> u8 {
        self.inner.lock().await.screen.step()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let guard = self.inner.lock().await;
        SessionSnapshot {
            screen: guard.screen,
            step: guard.screen.step(),
            signup_method: guard.signup_method,
            identifier: guard.identifier.clone(),
            otp_input: guard.otp_input.clone(),
            server_otp: guard.server_otp.clone(),
            profile_name: guard.profile_name.clone(),
            anonymous_id: guard.anonymous_id.as_ref().map(|id| id.0.clone()),
        }
    }

    /// Loads the persisted anonymous identifier, generating and persisting a
    /// fresh one on first access. Stable until `restart` clears it.
    pub async fn anonymous_id(&self) -> Result<AnonymousId> {
        {
            let guard = self.inner.lock().await;
            if let Some(id) = &guard.anonymous_id {
                return Ok(id.clone());
            }
        }

        let id = match self.identity.load(ANONYMOUS_ID_KEY).await? {
            Some(existing) => AnonymousId(existing),
            None => {
                let generated = AnonymousId::generate();
                self.identity
                    .store(ANONYMOUS_ID_KEY, generated.as_str())
                    .await?;
                info!(anonymous_id = %generated, "funnel: generated new anonymous identifier");
                generated
            }
        };

        let mut guard = self.inner.lock().await;
        guard.anonymous_id = Some(id.clone());
        Ok(id)
    }

    /// Accepts the identifier from the start screen, identifies the session
    /// with the analytics sink, and requests an OTP from the backend.
    /// Empty identifiers are silently ignored. No retry on transport
    /// failure; a failed send leaves the session on the submitted screen.
    pub async fn begin_signup(&self, identifier: &str, method: SignupMethod) -> Result<Screen> {
        self.expect_screen(Screen::Start, "begin_signup").await?;

        let identifier = identifier.trim();
        if identifier.is_empty() {
            debug!("funnel: ignoring begin_signup with empty identifier");
            return Ok(Screen::Start);
        }

        let anonymous_id = self.anonymous_id().await?;
        {
            let mut guard = self.inner.lock().await;
            guard.signup_method = method;
            guard.identifier = identifier.to_string();
        }
        self.set_screen(Screen::Submitted).await;

        let needs_reset = {
            let guard = self.inner.lock().await;
            guard
                .last_identified
                .as_deref()
                .is_some_and(|last| last != anonymous_id.as_str())
        };
        if needs_reset {
            self.analytics_reset().await;
        }

        if let Err(err) = self
            .analytics
            .identify(
                anonymous_id.as_str(),
                IdentifyTraits::for_identifier(method, identifier),
            )
            .await
        {
            warn!(error = %err, "funnel: identify call failed; continuing");
        }
        self.inner.lock().await.last_identified = Some(anonymous_id.as_str().to_string());

        let response: OtpSendResponse = self
            .http
            .post(format!("{}/otp/send", self.config.api_base_url))
            .json(&OtpSendRequest {
                user_id: anonymous_id.as_str().to_string(),
                signup_method: method,
                platform: self.config.platform.clone(),
                device: self.config.device.clone(),
            })
            .send()
            .await
            .context("otp send request failed")?
            .error_for_status()?
            .json()
            .await
            .context("otp send response was not valid JSON")?;

        {
            let mut guard = self.inner.lock().await;
            guard.server_otp = response.otp;
        }
        self.set_screen(Screen::Otp).await;
        Ok(Screen::Otp)
    }

    /// Round-trips the entered code through the backend. A rejected code
    /// surfaces the invalid-OTP notification and leaves the session on the
    /// otp screen; the user retries.
    pub async fn verify_otp(&self, otp_input: &str) -> Result<VerifyOtpOutcome> {
        self.expect_screen(Screen::Otp, "verify_otp").await?;

        let anonymous_id = self.anonymous_id().await?;
        let method = {
            let mut guard = self.inner.lock().await;
            guard.otp_input = otp_input.to_string();
            guard.signup_method
        };

        let response: OtpVerifyResponse = self
            .http
            .post(format!("{}/otp/verify", self.config.api_base_url))
            .json(&OtpVerifyRequest {
                user_id: anonymous_id.as_str().to_string(),
                otp: otp_input.to_string(),
                signup_method: method,
                platform: self.config.platform.clone(),
                device: self.config.device.clone(),
            })
            .send()
            .await
            .context("otp verify request failed")?
            .error_for_status()?
            .json()
            .await
            .context("otp verify response was not valid JSON")?;

        if !response.success {
            info!("funnel: otp rejected by backend");
            let _ = self.events.send(FunnelEvent::InvalidOtp);
            return Ok(VerifyOtpOutcome::Rejected);
        }

        self.set_screen(Screen::Profile).await;
        Ok(VerifyOtpOutcome::Verified)
    }

    /// Records the profile name and re-identifies the session with it.
    /// Empty names are silently ignored.
    pub async fn complete_profile(&self, profile_name: &str) -> Result<Screen> {
        self.expect_screen(Screen::Profile, "complete_profile").await?;

        let profile_name = profile_name.trim();
        if profile_name.is_empty() {
            debug!("funnel: ignoring complete_profile with empty name");
            return Ok(Screen::Profile);
        }

        let anonymous_id = self.anonymous_id().await?;
        let (method, identifier) = {
            let mut guard = self.inner.lock().await;
            guard.profile_name = profile_name.to_string();
            (guard.signup_method, guard.identifier.clone())
        };
        self.set_screen(Screen::Finish).await;

        let traits = IdentifyTraits::for_identifier(method, &identifier)
            .with_profile_name(profile_name);
        if let Err(err) = self.analytics.identify(anonymous_id.as_str(), traits).await {
            warn!(error = %err, "funnel: identify call failed; continuing");
        }

        Ok(Screen::Finish)
    }

    /// Notifies the backend that signup is complete. The response body is
    /// unused. No retry on failure.
    pub async fn finish_signup(&self) -> Result<Screen> {
        self.expect_screen(Screen::Finish, "finish_signup").await?;

        let anonymous_id = self.anonymous_id().await?;
        let method = self.inner.lock().await.signup_method;

        self.http
            .post(format!("{}/signup/complete", self.config.api_base_url))
            .json(&SignupCompleteRequest {
                user_id: anonymous_id.as_str().to_string(),
                signup_method: method,
                platform: self.config.platform.clone(),
                device: self.config.device.clone(),
            })
            .send()
            .await
            .context("signup complete request failed")?
            .error_for_status()?;

        self.set_screen(Screen::Done).await;
        Ok(Screen::Done)
    }

    /// Resets the analytics session, clears both persisted identifiers, and
    /// returns the funnel to the start screen with all fields empty. Valid
    /// from any screen and idempotent; the next anonymous-id access
    /// generates a fresh identifier.
    pub async fn restart(&self) -> Result<Screen> {
        self.analytics_reset().await;

        self.identity
            .clear(ANONYMOUS_ID_KEY)
            .await
            .context("failed to clear persisted anonymous id")?;
        self.identity
            .clear(SDK_ANONYMOUS_ID_KEY)
            .await
            .context("failed to clear persisted sdk session id")?;

        {
            let mut guard = self.inner.lock().await;
            *guard = FunnelState::default();
        }
        self.set_screen(Screen::Start).await;
        Ok(Screen::Start)
    }

    async fn expect_screen(&self, expected: Screen, operation: &'static str) -> Result<()> {
        let screen = self.inner.lock().await.screen;
        if screen != expected {
            return Err(FunnelError::WrongScreen { operation, screen }.into());
        }
        Ok(())
    }

    async fn set_screen(&self, screen: Screen) {
        {
            let mut guard = self.inner.lock().await;
            guard.screen = screen;
        }
        info!(screen = %screen, step = screen.step(), "funnel: screen changed");
        let _ = self.events.send(FunnelEvent::ScreenChanged(screen));
    }

    async fn analytics_reset(&self) {
        if let Err(err) = self.analytics.reset().await {
            warn!(error = %err, "funnel: analytics reset failed; continuing");
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
