//! Lead scoring.
//!
//! A weighted sum over four factors of a CRM client record: lifecycle status,
//! requested service, acquisition source and recency. Scoring is pure and
//! total: every record scores, and a missing field takes the lowest weight
//! of its factor.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use agencypulse_shared::{ClientRecord, LeadStatus, ScoringConfig};

/// Priority band derived from the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-factor contributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub status: u32,
    pub service: u32,
    pub source: u32,
    pub age: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score {
    pub total: u32,
    pub tier: Tier,
    pub breakdown: ScoreBreakdown,
}

/// A lead with its score, as listed by [`ScoringEngine::rank_leads`].
#[derive(Debug, Clone, Serialize)]
pub struct ScoredLead {
    pub id: String,
    pub name: String,
    pub score: Score,
}

/// Applies a [`ScoringConfig`] rule table.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score one lead as of `now`.
    pub fn score(&self, lead: &ClientRecord, now: DateTime<Utc>) -> Score {
        let breakdown = ScoreBreakdown {
            status: self.status_weight(lead.lead_status()),
            service: self.service_weight(lead.service.as_deref()),
            source: self.source_weight(lead.source.as_deref()),
            age: self.age_weight(lead.created_at, now),
        };
        let total = [breakdown.service, breakdown.source, breakdown.age]
            .into_iter()
            .fold(breakdown.status, u32::saturating_add);
        Score {
            total,
            tier: self.tier(total),
            breakdown,
        }
    }

    /// Score every lead and order by total descending, then name.
    pub fn rank_leads(&self, leads: &[ClientRecord], now: DateTime<Utc>) -> Vec<ScoredLead> {
        let mut ranked: Vec<ScoredLead> = leads
            .iter()
            .map(|lead| ScoredLead {
                id: lead.id.clone(),
                name: lead.name.clone(),
                score: self.score(lead, now),
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .total
                .cmp(&a.score.total)
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked
    }

    pub fn tier(&self, total: u32) -> Tier {
        if total >= self.config.hot_threshold {
            Tier::Hot
        } else if total >= self.config.warm_threshold {
            Tier::Warm
        } else {
            Tier::Cold
        }
    }

    fn status_weight(&self, status: Option<LeadStatus>) -> u32 {
        let w = &self.config.status_weights;
        match status {
            Some(LeadStatus::Lead) => w.lead,
            Some(LeadStatus::Prospect) => w.prospect,
            Some(LeadStatus::Client) => w.client,
            Some(LeadStatus::Vip) => w.vip,
            None => w.lead.min(w.prospect).min(w.client).min(w.vip),
        }
    }

    fn service_weight(&self, service: Option<&str>) -> u32 {
        let Some(service) = service.map(str::trim).filter(|s| !s.is_empty()) else {
            return self.config.other_service_weight;
        };
        let listed = |list: &[String]| list.iter().any(|s| s.eq_ignore_ascii_case(service));
        if listed(&self.config.high_value_services) {
            self.config.high_value_weight
        } else if listed(&self.config.medium_value_services) {
            self.config.medium_value_weight
        } else {
            self.config.other_service_weight
        }
    }

    fn source_weight(&self, source: Option<&str>) -> u32 {
        source
            .map(str::trim)
            .and_then(|source| {
                self.config
                    .source_weights
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(source))
                    .map(|(_, weight)| *weight)
            })
            .unwrap_or(self.config.default_source_weight)
    }

    fn age_weight(&self, created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
        let Some(created_at) = created_at else {
            return 0;
        };
        // Clock skew can put created_at in the future; treat it as brand new.
        let age = (now - created_at).max(Duration::zero());
        self.config
            .recency
            .iter()
            .find(|bucket| age <= Duration::days(i64::from(bucket.max_age_days)))
            .map(|bucket| bucket.weight)
            .unwrap_or(0)
    }
}
