//! `ConnectorType` unifies the spec's `document_type` and connector-kind
//! enumerations into one string-backed tag (see DESIGN.md).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorType {
    Github,
    Slack,
    GoogleDrive,
    GoogleCalendar,
    Gmail,
    Notion,
    WebCrawl,
    Template,
}

impl ConnectorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Slack => "slack",
            Self::GoogleDrive => "google_drive",
            Self::GoogleCalendar => "google_calendar",
            Self::Gmail => "gmail",
            Self::Notion => "notion",
            Self::WebCrawl => "web_crawl",
            Self::Template => "template",
        }
    }

    pub fn requires_oauth(&self) -> bool {
        matches!(
            self,
            Self::Slack | Self::GoogleDrive | Self::GoogleCalendar | Self::Gmail
        )
    }
}

impl TryFrom<&str> for ConnectorType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "github" => Ok(Self::Github),
            "slack" => Ok(Self::Slack),
            "google_drive" => Ok(Self::GoogleDrive),
            "google_calendar" => Ok(Self::GoogleCalendar),
            "gmail" => Ok(Self::Gmail),
            "notion" => Ok(Self::Notion),
            "web_crawl" => Ok(Self::WebCrawl),
            "template" => Ok(Self::Template),
            other => Err(format!("unknown connector type: {other}")),
        }
    }
}
