//! Source collectors.
//!
//! Each collector reads one bounded slice of business state from the record
//! store and renders it as a [`ContextSection`]. Collectors never return an
//! error: a failed read becomes a `failed` section with a reason, and an empty
//! read becomes an `empty` section carrying [`EMPTY_MARKER`], so the prompt can
//! say "no data" instead of inventing content.

mod crm;
mod ops;
mod profile;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use agencypulse_shared::Result;
use agencypulse_storage::{Filter, Record, RecordStore};

/// Marker rendered for a source that returned no usable records.
pub const EMPTY_MARKER: &str = "No data available.";

// ---------------------------------------------------------------------------
// SourceId
// ---------------------------------------------------------------------------

/// The sources a bundle can contain.
///
/// Variant order is the canonical section order of every Context Bundle:
/// the org profile frames everything else, CRM state follows, then
/// operational activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceId {
    OrgProfile,
    Clients,
    Offers,
    Campaigns,
    Tasks,
    Meetings,
    ChatLogs,
}

impl SourceId {
    /// All sources in canonical order.
    pub const ALL: [SourceId; 7] = [
        Self::OrgProfile,
        Self::Clients,
        Self::Offers,
        Self::Campaigns,
        Self::Tasks,
        Self::Meetings,
        Self::ChatLogs,
    ];

    /// Section name used in prompts and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrgProfile => "org-profile",
            Self::Clients => "clients",
            Self::Offers => "offers",
            Self::Campaigns => "campaigns",
            Self::Tasks => "tasks",
            Self::Meetings => "meetings",
            Self::ChatLogs => "chat-logs",
        }
    }

    /// Human-readable heading.
    pub fn title(&self) -> &'static str {
        match self {
            Self::OrgProfile => "Organization profile",
            Self::Clients => "CRM clients",
            Self::Offers => "Offers",
            Self::Campaigns => "Campaigns",
            Self::Tasks => "Open tasks",
            Self::Meetings => "Meetings",
            Self::ChatLogs => "Website chat logs",
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Bounds applied to one collector call.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectConstraints {
    /// Maximum records fetched.
    pub limit: usize,
    /// Only records created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Restrict to one client (the client itself, or records linked to it).
    pub client_id: Option<String>,
    /// Rendered text is cut at this many characters.
    pub max_chars: usize,
}

impl CollectConstraints {
    pub fn new(limit: usize, max_chars: usize) -> Self {
        Self {
            limit,
            since: None,
            client_id: None,
            max_chars,
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn for_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// The `created_at` filter, if a window is set.
    fn window_filter(&self) -> Option<Filter> {
        self.since.map(Filter::CreatedSince)
    }
}

// ---------------------------------------------------------------------------
// ContextSection
// ---------------------------------------------------------------------------

/// Outcome tag of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionStatus {
    Ok,
    Empty,
    Failed,
}

impl SectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Empty => "empty",
            Self::Failed => "failed",
        }
    }
}

/// Section payload, tagged by outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionBody {
    Ok { records: usize, text: String },
    Empty,
    Failed { reason: String },
}

/// One named slice of a Context Bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSection {
    source: SourceId,
    body: SectionBody,
}

impl ContextSection {
    pub fn ok(source: SourceId, records: usize, text: String) -> Self {
        Self {
            source,
            body: SectionBody::Ok { records, text },
        }
    }

    pub fn empty(source: SourceId) -> Self {
        Self {
            source,
            body: SectionBody::Empty,
        }
    }

    pub fn failed(source: SourceId, reason: impl Into<String>) -> Self {
        Self {
            source,
            body: SectionBody::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn body(&self) -> &SectionBody {
        &self.body
    }

    pub fn status(&self) -> SectionStatus {
        match self.body {
            SectionBody::Ok { .. } => SectionStatus::Ok,
            SectionBody::Empty => SectionStatus::Empty,
            SectionBody::Failed { .. } => SectionStatus::Failed,
        }
    }

    /// Number of records rendered into this section.
    pub fn record_count(&self) -> usize {
        match self.body {
            SectionBody::Ok { records, .. } => records,
            _ => 0,
        }
    }

    /// Prompt-ready text. Never empty.
    pub fn text(&self) -> String {
        match &self.body {
            SectionBody::Ok { text, .. } => text.clone(),
            SectionBody::Empty => EMPTY_MARKER.to_string(),
            SectionBody::Failed { reason } => {
                format!("Data unavailable ({reason}). Do not guess about this area.")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Fetch one source and render it as a section. Never fails.
pub async fn collect(
    store: &dyn RecordStore,
    source: SourceId,
    constraints: &CollectConstraints,
) -> ContextSection {
    let lines = match source {
        SourceId::OrgProfile => profile::org_profile(store, constraints).await,
        SourceId::Clients => crm::clients(store, constraints).await,
        SourceId::Offers => crm::offers(store, constraints).await,
        SourceId::Campaigns => crm::campaigns(store, constraints).await,
        SourceId::Tasks => ops::tasks(store, constraints).await,
        SourceId::Meetings => ops::meetings(store, constraints).await,
        SourceId::ChatLogs => ops::chat_logs(store, constraints).await,
    };

    match lines {
        Ok(lines) if lines.is_empty() => ContextSection::empty(source),
        Ok(lines) => {
            let records = lines.len();
            let text = truncate_section(&lines.join("\n"), constraints.max_chars);
            ContextSection::ok(source, records, text)
        }
        Err(e) => {
            warn!(%source, error = %e, "source unavailable, degrading section");
            ContextSection::failed(source, e.to_string())
        }
    }
}

/// Query a collection and decode each record into `T`, skipping records
/// that lack required fields.
async fn fetch_typed<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: &str,
    filters: &[Filter],
    limit: usize,
) -> Result<Vec<(Record, T)>> {
    let records = store.query(collection, filters, limit).await?;
    let mut decoded = Vec::with_capacity(records.len());
    for record in records {
        match record.decode::<T>() {
            Ok(dto) => decoded.push((record, dto)),
            Err(e) => {
                debug!(collection, id = %record.id, error = %e, "skipping undecodable record");
            }
        }
    }
    Ok(decoded)
}

/// Join the non-empty `label: value` pairs of a record line.
fn describe(head: &str, fields: &[(&str, Option<String>)]) -> String {
    let mut line = format!("- {head}");
    for (label, value) in fields {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            line.push_str(&format!(" | {label}: {value}"));
        }
    }
    line
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
fn truncate_section(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}\n[... section truncated ...]", &text[..cut]),
    }
}

/// Render an amount without trailing `.0` noise.
fn money(amount: Option<f64>) -> Option<String> {
    amount.map(|a| {
        if a.fract() == 0.0 {
            format!("{a:.0}")
        } else {
            format!("{a:.2}")
        }
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use agencypulse_shared::AgencyPulseError;
    use async_trait::async_trait;
    use serde_json::json;

    /// In-memory store that applies filters the same way the SQL store does.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        records: Mutex<Vec<Record>>,
        failing: HashMap<String, String>,
    }

    impl MemoryStore {
        pub(crate) fn insert(&self, collection: &str, id: &str, data: serde_json::Value, created_at: DateTime<Utc>) {
            self.records.lock().unwrap().push(Record {
                collection: collection.into(),
                id: id.into(),
                data,
                created_at,
            });
        }

        pub(crate) fn fail(mut self, collection: &str, reason: &str) -> Self {
            self.failing.insert(collection.into(), reason.into());
            self
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn query(
            &self,
            collection: &str,
            filters: &[Filter],
            limit: usize,
        ) -> Result<Vec<Record>> {
            if let Some(reason) = self.failing.get(collection) {
                return Err(AgencyPulseError::SourceUnavailable(reason.clone()));
            }
            let field = |r: &Record, f: &str| r.data.get(f).and_then(|v| v.as_str()).map(String::from);
            let mut out: Vec<Record> = self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.collection == collection)
                .filter(|r| {
                    filters.iter().all(|f| match f {
                        Filter::IdEq(id) => &r.id == id,
                        Filter::FieldEq(k, v) => field(r, k).as_deref() == Some(v.as_str()),
                        Filter::FieldNotEq(k, v) => field(r, k).as_deref() != Some(v.as_str()),
                        Filter::CreatedSince(t) => r.created_at >= *t,
                    })
                })
                .cloned()
                .collect();
            out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
            out.truncate(limit);
            Ok(out)
        }
    }

    fn constraints() -> CollectConstraints {
        CollectConstraints::new(10, 4_000)
    }

    #[tokio::test]
    async fn empty_collection_yields_empty_section() {
        let store = MemoryStore::default();
        let section = collect(&store, SourceId::Clients, &constraints()).await;
        assert_eq!(section.status(), SectionStatus::Empty);
        assert_eq!(section.text(), EMPTY_MARKER);
        assert_eq!(section.record_count(), 0);
    }

    #[tokio::test]
    async fn store_failure_yields_failed_section() {
        let store = MemoryStore::default().fail("tasks", "connection refused");
        let section = collect(&store, SourceId::Tasks, &constraints()).await;
        assert_eq!(section.status(), SectionStatus::Failed);
        assert!(section.text().contains("connection refused"));
    }

    #[tokio::test]
    async fn undecodable_records_are_skipped() {
        let store = MemoryStore::default();
        let now = Utc::now();
        store.insert("clients", "c1", json!({"status": "Lead"}), now);
        store.insert("clients", "c2", json!({"name": "Globex", "status": "Lead"}), now);
        let section = collect(&store, SourceId::Clients, &constraints()).await;
        assert_eq!(section.status(), SectionStatus::Ok);
        assert_eq!(section.record_count(), 1);
        assert!(section.text().contains("Globex"));
    }

    #[tokio::test]
    async fn only_invalid_records_is_empty_not_failed() {
        let store = MemoryStore::default();
        store.insert("offers", "o1", json!({"status": "sent"}), Utc::now());
        let section = collect(&store, SourceId::Offers, &constraints()).await;
        assert_eq!(section.status(), SectionStatus::Empty);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "é".repeat(50);
        let cut = truncate_section(&text, 10);
        assert!(cut.starts_with(&"é".repeat(10)));
        assert!(cut.contains("truncated"));
        assert_eq!(truncate_section("short", 10), "short");
    }

    #[test]
    fn describe_skips_blank_fields() {
        let line = describe(
            "Acme",
            &[("status", Some("Lead".into())), ("service", None), ("source", Some("  ".into()))],
        );
        assert_eq!(line, "- Acme | status: Lead");
    }

    #[test]
    fn canonical_order_matches_ord() {
        let mut shuffled = vec![SourceId::ChatLogs, SourceId::OrgProfile, SourceId::Tasks, SourceId::Clients];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![SourceId::OrgProfile, SourceId::Clients, SourceId::Tasks, SourceId::ChatLogs]
        );
    }

    #[test]
    fn money_formatting() {
        assert_eq!(money(Some(1500.0)).as_deref(), Some("1500"));
        assert_eq!(money(Some(99.5)).as_deref(), Some("99.50"));
        assert_eq!(money(None), None);
    }
}
