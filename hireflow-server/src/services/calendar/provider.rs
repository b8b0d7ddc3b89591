//! Calendar provider abstraction

use crate::models::CalendarProviderKind;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hireflow_common::{Error, Result};
use serde::Deserialize;

/// Tokens returned by a code exchange or refresh
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub external_email: Option<String>,
}

/// Standard OAuth 2.0 token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    pub(crate) fn into_grant(self, now: DateTime<Utc>) -> TokenGrant {
        TokenGrant {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
            external_email: None,
        }
    }
}

/// An event pushed to a panel member's calendar
#[derive(Debug, Clone)]
pub struct CalendarEvent {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
}

/// An external calendar reachable over OAuth 2.0
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    fn kind(&self) -> CalendarProviderKind;

    /// Consent URL the user is redirected to
    fn authorize_url(&self, state: &str) -> Result<String>;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant>;

    /// Returns the provider's event id
    async fn create_event(&self, access_token: &str, event: &CalendarEvent) -> Result<String>;

    async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<()>;

    async fn busy_times(
        &self,
        access_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>>;
}

/// Map a transport failure to `Error::External`
pub(crate) fn transport_error(provider: CalendarProviderKind, err: reqwest::Error) -> Error {
    Error::External(format!("{} request failed: {}", provider, err))
}

/// Turn a non-success response into `Error::External` with its body
pub(crate) async fn check_status(
    provider: CalendarProviderKind,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(provider = %provider, status = status.as_u16(), "Calendar provider returned an error");
    Err(Error::External(format!(
        "{} returned HTTP {}: {}",
        provider,
        status.as_u16(),
        body.chars().take(200).collect::<String>()
    )))
}
