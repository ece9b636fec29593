//! Dispatches a [`crate::store::ConnectorRecord`] to its concrete
//! adapter, decrypting its config through the [`crate::vault::Vault`]
//! and centralising OAuth token refresh.
//!
//! The spec describes OAuth refresh as something each adapter owns;
//! this registry owns it instead, sharing one [`OAuthClient`] per
//! connector type so the refresh-margin check and the Basic-auth'd
//! token POST are implemented once rather than copied into
//! [`super::slack`], [`super::google_drive`]'s three adapters, and any
//! future OAuth-backed connector (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ConnectorError;
use crate::store::ConnectorRecord;
use crate::vault::Vault;

use super::github::GithubConnector;
use super::google_drive::{GmailConnector, GoogleCalendarConnector, GoogleDriveConnector};
use super::notion::NotionConnector;
use super::oauth::{OAuthClient, OAuthCredentials};
use super::slack::SlackConnector;
use super::template::TemplateConnector;
use super::{Connector, ConnectorType};

/// Per-connector-type OAuth2 token endpoint + client credentials,
/// supplied once at startup from configuration.
#[derive(Clone)]
pub struct OAuthProviderConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

pub struct ConnectorRegistry {
    vault: Arc<Vault>,
    oauth_clients: HashMap<ConnectorType, OAuthClient>,
    notion_mcp_server_url: String,
}

impl ConnectorRegistry {
    pub fn new(
        vault: Arc<Vault>,
        oauth_providers: HashMap<ConnectorType, OAuthProviderConfig>,
        notion_mcp_server_url: impl Into<String>,
    ) -> Self {
        let oauth_clients = oauth_providers
            .into_iter()
            .map(|(kind, cfg)| {
                (
                    kind,
                    OAuthClient::new(cfg.token_url, cfg.client_id, cfg.client_secret),
                )
            })
            .collect();

        Self {
            vault,
            oauth_clients,
            notion_mcp_server_url: notion_mcp_server_url.into(),
        }
    }

    /// Decrypt `record.config` values and, for OAuth-backed connectors,
    /// refresh the access token if it is within [`super::oauth::REFRESH_MARGIN`]
    /// of expiring. Returns the adapter plus the (possibly refreshed)
    /// config to persist back if it changed.
    pub async fn build(
        &self,
        record: &ConnectorRecord,
    ) -> Result<(Box<dyn Connector>, Option<Value>), ConnectorError> {
        let kind = ConnectorType::try_from(record.connector_type.as_str())
            .map_err(|reason| ConnectorError::InvalidCredentials { reason })?;

        let config = self.decrypt_config(&record.config)?;

        if kind.requires_oauth() {
            let mut credentials = parse_oauth_credentials(&config)?;
            let mut updated_config = None;

            if credentials.needs_refresh(Utc::now()) {
                let client = self.oauth_clients.get(&kind).ok_or_else(|| {
                    ConnectorError::RefreshFailed {
                        reason: format!("no OAuth provider configured for {}", kind.as_str()),
                    }
                })?;
                credentials = client.refresh(&credentials).await?;
                updated_config = Some(self.encrypt_oauth_credentials(&credentials)?);
            }

            let connector: Box<dyn Connector> = match kind {
                ConnectorType::Slack => Box::new(SlackConnector::new(
                    credentials,
                    config_str(&config, "channel_id")?,
                )),
                ConnectorType::GoogleDrive => Box::new(GoogleDriveConnector::new(credentials)),
                ConnectorType::GoogleCalendar => Box::new(GoogleCalendarConnector::new(
                    credentials,
                    config_str(&config, "calendar_id")?,
                )),
                ConnectorType::Gmail => Box::new(GmailConnector::new(credentials)),
                _ => unreachable!("requires_oauth() set matches the arms above"),
            };

            return Ok((connector, updated_config));
        }

        let connector: Box<dyn Connector> = match kind {
            ConnectorType::Github => Box::new(GithubConnector::new(
                config_str(&config, "token")?,
                config_str(&config, "owner")?,
                config_str(&config, "repo")?,
            )),
            ConnectorType::Notion => Box::new(NotionConnector::new(self.notion_mcp_server_url.clone())),
            ConnectorType::Template => Box::new(TemplateConnector::from_config(&config)?),
            ConnectorType::WebCrawl => Box::new(super::web_crawl::WebCrawlConnector::new(config_str(
                &config,
                "base_url",
            )?)),
            ConnectorType::Slack
            | ConnectorType::GoogleDrive
            | ConnectorType::GoogleCalendar
            | ConnectorType::Gmail => unreachable!("handled by the OAuth branch above"),
        };

        Ok((connector, None))
    }

    fn decrypt_config(&self, config: &Value) -> Result<Value, ConnectorError> {
        let Value::Object(map) = config else {
            return Ok(config.clone());
        };
        let mut decrypted = serde_json::Map::with_capacity(map.len());
        for (key, value) in map {
            match value {
                Value::String(s) => {
                    let plain = self.vault.decrypt(s).map_err(|e| ConnectorError::InvalidCredentials {
                        reason: e.to_string(),
                    })?;
                    decrypted.insert(key.clone(), Value::String(plain));
                }
                other => {
                    decrypted.insert(key.clone(), other.clone());
                }
            }
        }
        Ok(Value::Object(decrypted))
    }

    fn encrypt_oauth_credentials(&self, credentials: &OAuthCredentials) -> Result<Value, ConnectorError> {
        let access_token = self
            .vault
            .encrypt(&credentials.access_token)
            .map_err(|e| ConnectorError::InvalidCredentials { reason: e.to_string() })?;
        let refresh_token = match &credentials.refresh_token {
            Some(token) => Some(
                self.vault
                    .encrypt(token)
                    .map_err(|e| ConnectorError::InvalidCredentials { reason: e.to_string() })?,
            ),
            None => None,
        };

        Ok(serde_json::json!({
            "access_token": access_token,
            "refresh_token": refresh_token,
            "expires_at": credentials.expires_at,
            "scope": credentials.scope,
        }))
    }
}

fn config_str(config: &Value, key: &str) -> Result<String, ConnectorError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ConnectorError::InvalidCredentials {
            reason: format!("missing config field `{key}`"),
        })
}

fn parse_oauth_credentials(config: &Value) -> Result<OAuthCredentials, ConnectorError> {
    serde_json::from_value(config.clone()).map_err(|e| ConnectorError::InvalidCredentials {
        reason: format!("malformed OAuth credentials: {e}"),
    })
}

/// Opaque handle threaded through the scheduler so it can look up which
/// search space and user own a connector without re-querying the store.
#[derive(Debug, Clone, Copy)]
pub struct ConnectorOwner {
    pub search_space_id: Uuid,
    pub user_id: Uuid,
}
