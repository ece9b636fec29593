//! Shared OAuth2 refresh logic for connector adapters.
//!
//! Grounded in `original_source`'s `connector_auth.py::refresh_airtable_token`:
//! a Basic-auth'd form POST to the provider's token endpoint, with the
//! new `expires_at` computed from `now + expires_in`. Generalized to any
//! provider by parameterising the token endpoint and client credentials.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;

/// Refresh when `expires_at - now < margin`.
pub const REFRESH_MARGIN: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

impl OAuthCredentials {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.refresh_token, self.expires_at) {
            (Some(_), Some(expires_at)) => expires_at - now < REFRESH_MARGIN,
            _ => false,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    scope: Option<String>,
    refresh_token: Option<String>,
}

pub struct OAuthClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub async fn refresh(
        &self,
        credentials: &OAuthCredentials,
    ) -> Result<OAuthCredentials, ConnectorError> {
        let refresh_token = credentials.refresh_token.as_ref().ok_or_else(|| {
            ConnectorError::RefreshFailed {
                reason: "no refresh_token on file".to_string(),
            }
        })?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ConnectorError::RefreshFailed {
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(ConnectorError::RefreshFailed {
                reason: format!("token endpoint returned {}", resp.status()),
            });
        }

        let body: TokenResponse = resp.json().await.map_err(|e| ConnectorError::RefreshFailed {
            reason: e.to_string(),
        })?;

        let expires_at = body
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));

        Ok(OAuthCredentials {
            access_token: body.access_token,
            refresh_token: body.refresh_token.or_else(|| credentials.refresh_token.clone()),
            expires_at,
            scope: body.scope.or_else(|| credentials.scope.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_refresh_within_margin() {
        let creds = OAuthCredentials {
            access_token: "tok".into(),
            refresh_token: Some("refresh".into()),
            expires_at: Some(Utc::now() + Duration::minutes(2)),
            scope: None,
        };
        assert!(creds.needs_refresh(Utc::now()));
    }

    #[test]
    fn no_refresh_needed_well_before_expiry() {
        let creds = OAuthCredentials {
            access_token: "tok".into(),
            refresh_token: Some("refresh".into()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            scope: None,
        };
        assert!(!creds.needs_refresh(Utc::now()));
    }

    #[test]
    fn no_refresh_token_never_refreshes() {
        let creds = OAuthCredentials {
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() - Duration::minutes(1)),
            scope: None,
        };
        assert!(!creds.needs_refresh(Utc::now()));
    }
}
