//! Core domain types for AgencyPulse.
//!
//! These are the typed views collectors decode store records into. Only the
//! fields marked required (non-`Option`) are presence-checked; everything else
//! is optional because CRM documents are edited by hand and drift over time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Collection names
// ---------------------------------------------------------------------------

/// Record-store collection names.
pub mod collections {
    pub const ORG_PROFILE: &str = "org_profile";
    pub const CLIENTS: &str = "clients";
    pub const OFFERS: &str = "offers";
    pub const CAMPAIGNS: &str = "campaigns";
    pub const TASKS: &str = "tasks";
    pub const MEETINGS: &str = "meetings";
    pub const CHAT_LOGS: &str = "chat_logs";

    /// Every collection the pipeline reads.
    pub const ALL: [&str; 7] = [
        ORG_PROFILE,
        CLIENTS,
        OFFERS,
        CAMPAIGNS,
        TASKS,
        MEETINGS,
        CHAT_LOGS,
    ];
}

// ---------------------------------------------------------------------------
// LeadStatus
// ---------------------------------------------------------------------------

/// CRM lifecycle stage of a client record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadStatus {
    Lead,
    Prospect,
    Client,
    #[serde(rename = "VIP")]
    Vip,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lead => "Lead",
            Self::Prospect => "Prospect",
            Self::Client => "Client",
            Self::Vip => "VIP",
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lead" => Ok(Self::Lead),
            "prospect" => Ok(Self::Prospect),
            "client" => Ok(Self::Client),
            "vip" => Ok(Self::Vip),
            other => Err(format!("unknown lead status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientRecord
// ---------------------------------------------------------------------------

/// A CRM client / lead. The Scoring Engine reads this; it never writes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    /// Record id (filled from the store key).
    #[serde(default)]
    pub id: String,
    /// Contact or company display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Raw lifecycle status; see [`ClientRecord::lead_status`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Service the client is interested in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Acquisition channel (e.g. `Direct`, `Referral`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ClientRecord {
    /// Parsed lifecycle status; `None` when absent or unrecognized.
    pub fn lead_status(&self) -> Option<LeadStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }
}

// ---------------------------------------------------------------------------
// Other collections
// ---------------------------------------------------------------------------

/// A marketing campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// A previously issued offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

/// An internal task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// A scheduled or past meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

/// One exchange captured by the website chat widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLogRecord {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

/// The agency's own "context" profile used to frame every prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgProfile {
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_market: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub differentiators: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_status_parses_case_insensitively() {
        assert_eq!("lead".parse::<LeadStatus>(), Ok(LeadStatus::Lead));
        assert_eq!(" Prospect ".parse::<LeadStatus>(), Ok(LeadStatus::Prospect));
        assert_eq!("vip".parse::<LeadStatus>(), Ok(LeadStatus::Vip));
        assert!("churned".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn client_record_decodes_camel_case() {
        let json = r#"{
            "name": "Acme Co",
            "status": "Lead",
            "service": "Web Development",
            "source": "Direct",
            "createdAt": "2026-01-02T03:04:05Z"
        }"#;
        let client: ClientRecord = serde_json::from_str(json).expect("decode");
        assert_eq!(client.name, "Acme Co");
        assert_eq!(client.lead_status(), Some(LeadStatus::Lead));
        assert!(client.created_at.is_some());
        assert!(client.id.is_empty());
    }

    #[test]
    fn client_record_requires_name() {
        let json = r#"{ "status": "Lead" }"#;
        assert!(serde_json::from_str::<ClientRecord>(json).is_err());
    }

    #[test]
    fn unknown_status_is_none() {
        let client = ClientRecord {
            name: "x".into(),
            status: Some("archived".into()),
            ..Default::default()
        };
        assert_eq!(client.lead_status(), None);
    }

    #[test]
    fn org_profile_defaults_lists() {
        let profile: OrgProfile =
            serde_json::from_str(r#"{ "companyName": "Northwind Digital" }"#).expect("decode");
        assert!(profile.services.is_empty());
        assert!(profile.differentiators.is_empty());
    }
}
