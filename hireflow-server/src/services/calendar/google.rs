//! Google Calendar over OAuth 2.0 and the Calendar v3 REST API

use super::provider::{check_status, transport_error, CalendarEvent, CalendarProvider, TokenGrant, TokenResponse};
use crate::models::CalendarProviderKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hireflow_common::config::OAuthClientConfig;
use hireflow_common::{time, Error, Result};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const SCOPES: &str = "openid email https://www.googleapis.com/auth/calendar.events \
                      https://www.googleapis.com/auth/calendar.freebusy";

const KIND: CalendarProviderKind = CalendarProviderKind::Google;

pub struct GoogleCalendar {
    http: reqwest::Client,
    client: OAuthClientConfig,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<BusyPeriod>,
}

#[derive(Debug, Deserialize)]
struct BusyPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl GoogleCalendar {
    pub fn new(http: reqwest::Client, client: OAuthClientConfig, redirect_url: String) -> Self {
        Self {
            http,
            client,
            redirect_url,
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;
        let tokens: TokenResponse = check_status(KIND, response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(KIND, e))?;
        Ok(tokens.into_grant(time::now()))
    }

    async fn account_email(&self, access_token: &str) -> Option<String> {
        let response = self.http.get(USERINFO_URL).bearer_auth(access_token).send().await.ok()?;
        let info: UserInfo = response.error_for_status().ok()?.json().await.ok()?;
        info.email
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendar {
    fn kind(&self) -> CalendarProviderKind {
        KIND
    }

    fn authorize_url(&self, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| Error::Internal(format!("google authorize url: {}", e)))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let mut grant = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client.client_id.as_str()),
                ("client_secret", self.client.client_secret.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
            ])
            .await?;
        grant.external_email = self.account_email(&grant.access_token).await;
        Ok(grant)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
        ])
        .await
    }

    async fn create_event(&self, access_token: &str, event: &CalendarEvent) -> Result<String> {
        let body = json!({
            "summary": event.title,
            "description": event.description,
            "location": event.location,
            "start": { "dateTime": event.starts_at.to_rfc3339() },
            "end": { "dateTime": event.ends_at.to_rfc3339() },
        });
        let response = self
            .http
            .post(format!("{}/calendars/primary/events", API_BASE))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;
        let created: CreatedEvent = check_status(KIND, response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(KIND, e))?;
        Ok(created.id)
    }

    async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/calendars/primary/events/{}", API_BASE, event_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;
        // Already gone counts as deleted
        if matches!(response.status().as_u16(), 404 | 410) {
            return Ok(());
        }
        check_status(KIND, response).await?;
        Ok(())
    }

    async fn busy_times(
        &self,
        access_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let body = json!({
            "timeMin": from.to_rfc3339(),
            "timeMax": to.to_rfc3339(),
            "items": [{ "id": "primary" }],
        });
        let response = self
            .http
            .post(format!("{}/freeBusy", API_BASE))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;
        let parsed: FreeBusyResponse = check_status(KIND, response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        Ok(parsed
            .calendars
            .into_values()
            .flat_map(|c| c.busy)
            .map(|p| (p.start, p.end))
            .collect())
    }
}
