//! Microsoft 365 calendars over the identity platform and Microsoft Graph

use super::provider::{check_status, transport_error, CalendarEvent, CalendarProvider, TokenGrant, TokenResponse};
use crate::models::CalendarProviderKind;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use hireflow_common::config::OAuthClientConfig;
use hireflow_common::{time, Error, Result};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const SCOPES: &str = "offline_access User.Read Calendars.ReadWrite";

const KIND: CalendarProviderKind = CalendarProviderKind::Microsoft;

pub struct MicrosoftCalendar {
    http: reqwest::Client,
    client: OAuthClientConfig,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Me {
    mail: Option<String>,
    user_principal_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CalendarView {
    #[serde(default)]
    value: Vec<ViewEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewEvent {
    start: GraphDateTime,
    end: GraphDateTime,
    show_as: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
}

/// Graph returns UTC wall-clock times without an offset when asked for UTC
fn parse_graph_time(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::External(format!("microsoft returned an invalid time '{}': {}", value, e)))
}

impl MicrosoftCalendar {
    pub fn new(http: reqwest::Client, client: OAuthClientConfig, redirect_url: String) -> Self {
        Self {
            http,
            client,
            redirect_url,
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/{}",
            self.client.tenant, name
        )
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant> {
        let response = self
            .http
            .post(self.endpoint("token"))
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
        let response = self
            .http
            .get(format!("{}/me", GRAPH_BASE))
            .bearer_auth(access_token)
            .send()
            .await
            .ok()?;
        let me: Me = response.error_for_status().ok()?.json().await.ok()?;
        me.mail.or(me.user_principal_name)
    }
}

#[async_trait]
impl CalendarProvider for MicrosoftCalendar {
    fn kind(&self) -> CalendarProviderKind {
        KIND
    }

    fn authorize_url(&self, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &self.endpoint("authorize"),
            &[
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("response_mode", "query"),
                ("scope", SCOPES),
                ("state", state),
            ],
        )
        .map_err(|e| Error::Internal(format!("microsoft authorize url: {}", e)))?;
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
                ("scope", SCOPES),
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
            ("scope", SCOPES),
        ])
        .await
    }

    async fn create_event(&self, access_token: &str, event: &CalendarEvent) -> Result<String> {
        let body = json!({
            "subject": event.title,
            "body": { "contentType": "text", "content": event.description.clone().unwrap_or_default() },
            "start": { "dateTime": event.starts_at.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": "UTC" },
            "end": { "dateTime": event.ends_at.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": "UTC" },
            "location": { "displayName": event.location.clone().unwrap_or_default() },
        });
        let response = self
            .http
            .post(format!("{}/me/events", GRAPH_BASE))
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
            .delete(format!("{}/me/events/{}", GRAPH_BASE, event_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;
        if response.status().as_u16() == 404 {
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
        let response = self
            .http
            .get(format!("{}/me/calendarView", GRAPH_BASE))
            .bearer_auth(access_token)
            .header("Prefer", "outlook.timezone=\"UTC\"")
            .query(&[
                ("startDateTime", from.to_rfc3339()),
                ("endDateTime", to.to_rfc3339()),
                ("$select", "start,end,showAs".to_string()),
                ("$top", "500".to_string()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;
        let view: CalendarView = check_status(KIND, response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        view.value
            .into_iter()
            .filter(|e| e.show_as.as_deref() != Some("free"))
            .map(|e| Ok((parse_graph_time(&e.start.date_time)?, parse_graph_time(&e.end.date_time)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_graph_time() {
        let t = parse_graph_time("2024-03-04T10:30:00.0000000").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-03-04T10:30:00+00:00");
        assert!(parse_graph_time("tomorrow").is_err());
    }
}
