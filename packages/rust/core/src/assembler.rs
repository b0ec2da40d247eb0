//! Context assembly.
//!
//! Fans a task's collectors out concurrently, bounds each by its own timeout
//! and the whole fan-out by one deadline, and merges the results into an
//! immutable [`ContextBundle`] in canonical section order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{info, instrument, warn};

use agencypulse_shared::PipelineConfig;
use agencypulse_storage::RecordStore;

use crate::collectors::{CollectConstraints, ContextSection, SectionStatus, SourceId, collect};

/// Reason recorded for sections still running when the deadline hit.
pub const DEADLINE_REASON: &str = "deadline exceeded";

/// One collector call in a task plan.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRequest {
    pub source: SourceId,
    pub constraints: CollectConstraints,
}

impl SourceRequest {
    pub fn new(source: SourceId, constraints: CollectConstraints) -> Self {
        Self {
            source,
            constraints,
        }
    }
}

/// Time bounds for one assembly.
#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions {
    /// Per-collector timeout.
    pub collector_timeout: Duration,
    /// Overall assembly deadline, measured from the start of assembly.
    pub deadline: Duration,
}

impl From<&PipelineConfig> for AssembleOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            collector_timeout: config.collector_timeout(),
            deadline: config.assembly_deadline(),
        }
    }
}

// ---------------------------------------------------------------------------
// ContextBundle
// ---------------------------------------------------------------------------

/// Section tallies, for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundleCounters {
    pub ok: usize,
    pub empty: usize,
    pub failed: usize,
    pub records: usize,
}

/// The assembled, immutable context for one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBundle {
    as_of: DateTime<Utc>,
    sections: Vec<ContextSection>,
}

impl ContextBundle {
    /// Build a bundle from arbitrary sections, sorting them canonically and
    /// keeping the first section per source.
    pub fn new(as_of: DateTime<Utc>, sections: Vec<ContextSection>) -> Self {
        let mut by_source = BTreeMap::new();
        for section in sections {
            by_source.entry(section.source()).or_insert(section);
        }
        Self {
            as_of,
            sections: by_source.into_values().collect(),
        }
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn sections(&self) -> &[ContextSection] {
        &self.sections
    }

    pub fn section(&self, source: SourceId) -> Option<&ContextSection> {
        self.sections.iter().find(|s| s.source() == source)
    }

    pub fn counters(&self) -> BundleCounters {
        let mut counters = BundleCounters::default();
        for section in &self.sections {
            match section.status() {
                SectionStatus::Ok => counters.ok += 1,
                SectionStatus::Empty => counters.empty += 1,
                SectionStatus::Failed => counters.failed += 1,
            }
            counters.records += section.record_count();
        }
        counters
    }

    /// Prompt text for all sections, in order.
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|s| format!("### {} [{}]\n{}", s.source().title(), s.source(), s.text()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ---------------------------------------------------------------------------
// assemble
// ---------------------------------------------------------------------------

/// Run every collector of `plan` concurrently and merge the sections.
///
/// Never fails. A collector that exceeds its timeout, panics, or is still
/// running at the deadline contributes a `failed` section. Dropping the
/// returned future aborts all in-flight collectors.
#[instrument(skip_all, fields(sources = plan.len()))]
pub async fn assemble(
    store: Arc<dyn RecordStore>,
    plan: &[SourceRequest],
    options: AssembleOptions,
    as_of: DateTime<Utc>,
) -> ContextBundle {
    let started = Instant::now();
    let deadline = started + options.deadline;

    let mut planned: BTreeMap<SourceId, &SourceRequest> = BTreeMap::new();
    for request in plan {
        planned.entry(request.source).or_insert(request);
    }

    let mut set = JoinSet::new();
    for request in planned.values() {
        let store = Arc::clone(&store);
        let source = request.source;
        let constraints = request.constraints.clone();
        let per_collector = options.collector_timeout;
        set.spawn(async move {
            match timeout(per_collector, collect(store.as_ref(), source, &constraints)).await {
                Ok(section) => section,
                Err(_) => {
                    warn!(%source, timeout_ms = per_collector.as_millis() as u64, "collector timed out");
                    ContextSection::failed(
                        source,
                        format!("timed out after {}ms", per_collector.as_millis()),
                    )
                }
            }
        });
    }

    let mut done: BTreeMap<SourceId, ContextSection> = BTreeMap::new();
    let mut deadline_hit = false;
    loop {
        match timeout_at(deadline, set.join_next()).await {
            Ok(Some(Ok(section))) => {
                done.insert(section.source(), section);
            }
            Ok(Some(Err(e))) => warn!(error = %e, "collector task failed"),
            Ok(None) => break,
            Err(_) => {
                deadline_hit = true;
                set.abort_all();
                break;
            }
        }
    }

    let missing_reason = if deadline_hit {
        DEADLINE_REASON
    } else {
        "collector task failed"
    };
    for source in planned.keys() {
        done.entry(*source).or_insert_with(|| {
            warn!(%source, reason = missing_reason, "collector did not report");
            ContextSection::failed(*source, missing_reason)
        });
    }

    let bundle = ContextBundle {
        as_of,
        sections: done.into_values().collect(),
    };
    let counters = bundle.counters();
    info!(
        ok = counters.ok,
        empty = counters.empty,
        failed = counters.failed,
        records = counters.records,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "context assembled"
    );
    bundle
}
