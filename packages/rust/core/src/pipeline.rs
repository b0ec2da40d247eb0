//! End-to-end generation pipelines: collect → assemble → prompt → generate → validate.
//!
//! Two tasks share one path: [`Pipeline::generate_offer`] drafts a priced
//! offer for a client request, [`Pipeline::smart_pulse`] writes the daily
//! brief. Each invocation is bounded by the configured request deadline, and
//! dropping the returned future cancels in-flight collectors and the model
//! call.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use agencypulse_shared::{AgencyPulseError, ModelConfig, PipelineConfig, Result};
use agencypulse_storage::RecordStore;

use crate::assembler::{self, AssembleOptions, ContextBundle, SourceRequest};
use crate::collectors::{CollectConstraints, SourceId};
use crate::generation::GenerationClient;
use crate::output::{BriefReport, OfferDraft, StructuredOutput};
use crate::prompt::{self, ModelParams, TaskTemplate};
use crate::validator;

/// Upper bound on the free-text client request.
pub const MAX_REQUEST_CHARS: usize = 4_000;

/// Raw model text logged on rejected output is cut to this many characters.
const LOGGED_RAW_CHARS: usize = 500;

/// Input of the offer pipeline, as posted to `/ai/generate-offer`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRequest {
    pub client_request: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl OfferRequest {
    pub fn validate(&self) -> Result<()> {
        let request = self.client_request.trim();
        if request.is_empty() {
            return Err(AgencyPulseError::validation("clientRequest must not be empty"));
        }
        let chars = request.chars().count();
        if chars > MAX_REQUEST_CHARS {
            return Err(AgencyPulseError::validation(format!(
                "clientRequest is too long ({chars} chars, max {MAX_REQUEST_CHARS})"
            )));
        }
        Ok(())
    }

    fn client_id(&self) -> Option<&str> {
        self.client_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Phase callbacks for interactive front ends.
pub trait ProgressReporter: Send + Sync {
    fn phase(&self, name: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
}

/// Collector plan for an offer: who we are, who the client is, what we
/// already offered, what is running.
pub fn offer_plan(config: &PipelineConfig, client_id: Option<&str>) -> Vec<SourceRequest> {
    let bounded = |limit| {
        let c = CollectConstraints::new(limit, config.max_section_chars);
        match client_id {
            Some(id) => c.for_client(id),
            None => c,
        }
    };
    vec![
        SourceRequest::new(
            SourceId::OrgProfile,
            CollectConstraints::new(1, config.max_section_chars),
        ),
        SourceRequest::new(SourceId::Clients, bounded(config.limits.clients)),
        SourceRequest::new(SourceId::Offers, bounded(config.limits.offers)),
        SourceRequest::new(
            SourceId::Campaigns,
            CollectConstraints::new(config.limits.campaigns, config.max_section_chars),
        ),
    ]
}

/// Collector plan for the daily brief. Leads, offers, meetings and chat
/// logs are windowed to the look-back period; open tasks and campaigns are
/// not.
pub fn brief_plan(config: &PipelineConfig, as_of: DateTime<Utc>) -> Vec<SourceRequest> {
    let since = as_of - ChronoDuration::hours(i64::from(config.brief_window_hours));
    let max = config.max_section_chars;
    let limits = &config.limits;
    vec![
        SourceRequest::new(SourceId::OrgProfile, CollectConstraints::new(1, max)),
        SourceRequest::new(
            SourceId::Clients,
            CollectConstraints::new(limits.clients, max).since(since),
        ),
        SourceRequest::new(
            SourceId::Offers,
            CollectConstraints::new(limits.offers, max).since(since),
        ),
        SourceRequest::new(SourceId::Campaigns, CollectConstraints::new(limits.campaigns, max)),
        SourceRequest::new(SourceId::Tasks, CollectConstraints::new(limits.tasks, max)),
        SourceRequest::new(
            SourceId::Meetings,
            CollectConstraints::new(limits.meetings, max).since(since),
        ),
        SourceRequest::new(
            SourceId::ChatLogs,
            CollectConstraints::new(limits.chat_logs, max).since(since),
        ),
    ]
}

/// Shared dependencies of both pipelines.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    client: Arc<dyn GenerationClient>,
    config: PipelineConfig,
    model: ModelConfig,
}

impl Pipeline {
    /// Fails if the pipeline timeouts do not nest.
    pub fn new(
        store: Arc<dyn RecordStore>,
        client: Arc<dyn GenerationClient>,
        config: PipelineConfig,
        model: ModelConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            client,
            config,
            model,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Draft an offer for a client request.
    #[instrument(skip_all, fields(client_id = request.client_id.as_deref().unwrap_or("-")))]
    pub async fn generate_offer(
        &self,
        request: &OfferRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<OfferDraft> {
        request.validate()?;
        let as_of = Utc::now();
        let plan = offer_plan(&self.config, request.client_id());
        let company = request.company_name.as_deref().unwrap_or("");
        let inputs = [
            ("client request", request.client_request.as_str()),
            ("company name", company),
        ];
        self.with_deadline(self.run(&prompt::offer_template(), &plan, &inputs, as_of, progress))
            .await
    }

    /// Write the daily brief.
    #[instrument(skip_all)]
    pub async fn smart_pulse(&self, progress: &dyn ProgressReporter) -> Result<BriefReport> {
        let as_of = Utc::now();
        let plan = brief_plan(&self.config, as_of);
        let window = format!("last {} hours", self.config.brief_window_hours);
        let inputs = [("period", window.as_str())];
        self.with_deadline(self.run(&prompt::brief_template(), &plan, &inputs, as_of, progress))
            .await
    }

    async fn with_deadline<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        let deadline = self.config.request_deadline();
        match timeout(deadline, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(deadline_ms = deadline.as_millis() as u64, "request deadline exceeded");
                Err(AgencyPulseError::DeadlineExceeded(deadline))
            }
        }
    }

    async fn run<T: StructuredOutput>(
        &self,
        template: &TaskTemplate,
        plan: &[SourceRequest],
        inputs: &[(&str, &str)],
        as_of: DateTime<Utc>,
        progress: &dyn ProgressReporter,
    ) -> Result<T> {
        let start = Instant::now();
        let task = template.task;

        progress.phase("Collecting context");
        let bundle: ContextBundle = assembler::assemble(
            Arc::clone(&self.store),
            plan,
            AssembleOptions::from(&self.config),
            as_of,
        )
        .await;

        let request = prompt::build_request(
            &bundle,
            template,
            inputs,
            ModelParams::for_task(&self.model, task),
        );
        let fingerprint = request.fingerprint();
        let prompt_hash = &fingerprint[..16];
        info!(%task, prompt_hash, prompt_chars = request.prompt.len(), "prompt built");

        progress.phase("Generating");
        let generation_timeout = self.config.generation_timeout();
        let raw = match timeout(generation_timeout, self.client.invoke(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(AgencyPulseError::Transport(format!(
                    "generation timed out after {}ms",
                    generation_timeout.as_millis()
                )));
            }
        };

        progress.phase("Validating");
        let output = validator::validate::<T>(&raw.text).inspect_err(|e| {
            let clipped: String = raw.text.chars().take(LOGGED_RAW_CHARS).collect();
            warn!(%task, error = %e, raw = %clipped, "model output rejected");
        })?;

        let counters = bundle.counters();
        info!(
            %task,
            sections_ok = counters.ok,
            sections_failed = counters.failed,
            latency_ms = raw.latency_ms,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generation pipeline complete"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::tests::MemoryStore;
    use crate::generation::RawText;
    use crate::prompt::GenerationRequest;
    use agencypulse_shared::ErrorKind;
    use agencypulse_storage::{Filter, Record};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    const OFFER_JSON: &str = r#"```json
{
  "title": "Local SEO Starter",
  "lineItems": [
    {"name": "Audit", "description": "Site and listings audit", "price": 450},
    {"name": "On-page", "description": "Fix titles and schema", "price": 900},
    {"name": "Reporting", "description": "Monthly report", "price": 150}
  ],
  "notes": "Three month minimum.",
  "internalStrategy": "Upsell content later."
}
```"#;

    const BRIEF_JSON: &str = r#"{"headline": "Two new leads overnight",
        "sections": [{"title": "Leads", "body": "Acme asked about SEO."}]}"#;

    /// Returns a canned reply and records every request.
    struct FakeClient {
        reply: Result<String>,
        delay: Duration,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl FakeClient {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(AgencyPulseError::Transport("connection refused".into())),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.seen.lock().unwrap().iter().map(|r| r.prompt.clone()).collect()
        }
    }

    #[async_trait]
    impl GenerationClient for FakeClient {
        async fn invoke(&self, request: &GenerationRequest) -> Result<RawText> {
            self.seen.lock().unwrap().push(request.clone());
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(text) => Ok(RawText {
                    text: text.clone(),
                    latency_ms: 1,
                }),
                Err(e) => Err(AgencyPulseError::Transport(e.to_string())),
            }
        }
    }

    /// Every query stalls for a long time.
    struct StalledStore;

    #[async_trait]
    impl RecordStore for StalledStore {
        async fn query(&self, _: &str, _: &[Filter], _: usize) -> Result<Vec<Record>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::default();
        let now = Utc::now();
        store.insert(
            "org_profile",
            "main",
            json!({"companyName": "Pulse Digital", "services": ["SEO", "PPC"]}),
            now,
        );
        store.insert(
            "clients",
            "c1",
            json!({"name": "Acme Bakery", "status": "Lead", "service": "SEO"}),
            now - ChronoDuration::hours(3),
        );
        store.insert(
            "clients",
            "c2",
            json!({"name": "Globex", "status": "Client"}),
            now - ChronoDuration::days(3),
        );
        store.insert("tasks", "t1", json!({"title": "Call Acme back", "status": "open"}), now);
        store
    }

    fn pipeline(store: impl RecordStore + 'static, client: Arc<FakeClient>) -> Pipeline {
        Pipeline::new(
            Arc::new(store),
            client,
            PipelineConfig::default(),
            ModelConfig::default(),
        )
        .unwrap()
    }

    fn offer_request() -> OfferRequest {
        OfferRequest {
            client_request: "We need more walk-in customers from Google".into(),
            company_name: Some("Acme Bakery".into()),
            client_id: Some("c1".into()),
        }
    }

    #[tokio::test]
    async fn offer_pipeline_happy_path() {
        let client = Arc::new(FakeClient::replying(OFFER_JSON));
        let pipeline = pipeline(seeded_store(), Arc::clone(&client));

        let offer = pipeline
            .generate_offer(&offer_request(), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(offer.title, "Local SEO Starter");
        assert_eq!(offer.line_items.len(), 3);

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        assert!(prompt.contains("walk-in customers from Google"));
        assert!(prompt.contains("Pulse Digital"));
        assert!(prompt.contains("Acme Bakery"));
        // Client scope keeps other clients out of the prompt.
        assert!(!prompt.contains("Globex"));
    }

    #[tokio::test]
    async fn brief_pipeline_windows_sources() {
        let client = Arc::new(FakeClient::replying(BRIEF_JSON));
        let pipeline = pipeline(seeded_store(), Arc::clone(&client));

        let report = pipeline.smart_pulse(&SilentProgress).await.unwrap();
        assert_eq!(report.headline, "Two new leads overnight");

        let prompt = &client.prompts()[0];
        assert!(prompt.contains("Acme Bakery"));
        assert!(!prompt.contains("Globex"), "3-day-old client is outside the 24h window");
        assert!(prompt.contains("Call Acme back"));
        assert!(prompt.contains("- period: last 24 hours"));
    }

    #[tokio::test]
    async fn all_sources_failing_still_produces_prompt() {
        let store = ["org_profile", "clients", "offers", "campaigns"]
            .into_iter()
            .fold(MemoryStore::default(), |s, c| s.fail(c, "database locked"));
        let client = Arc::new(FakeClient::replying(OFFER_JSON));
        let pipeline = pipeline(store, Arc::clone(&client));

        let offer = pipeline.generate_offer(&offer_request(), &SilentProgress).await;
        assert!(offer.is_ok());
        let prompt = &client.prompts()[0];
        assert!(!prompt.is_empty());
        assert_eq!(prompt.matches("Data unavailable").count(), 4);
    }

    #[tokio::test]
    async fn transport_failure_is_fatal() {
        let client = Arc::new(FakeClient::failing());
        let pipeline = pipeline(seeded_store(), client);
        let err = pipeline
            .generate_offer(&offer_request(), &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.user_message(), "generation failed, try again");
    }

    #[tokio::test]
    async fn malformed_and_invalid_output_are_rejected() {
        let client = Arc::new(FakeClient::replying("I cannot help with that."));
        let err = pipeline(seeded_store(), client)
            .generate_offer(&offer_request(), &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);

        let client = Arc::new(FakeClient::replying(r#"{"headline": "x", "sections": []}"#));
        let err = pipeline(seeded_store(), client)
            .smart_pulse(&SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    }

    #[tokio::test]
    async fn blank_request_never_reaches_the_model() {
        let client = Arc::new(FakeClient::replying(OFFER_JSON));
        let pipeline = pipeline(seeded_store(), Arc::clone(&client));
        let request = OfferRequest {
            client_request: "   ".into(),
            ..OfferRequest::default()
        };
        let err = pipeline.generate_offer(&request, &SilentProgress).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(client.prompts().is_empty());
    }

    #[tokio::test]
    async fn slow_generation_hits_generation_timeout() {
        let client = Arc::new(FakeClient {
            delay: Duration::from_secs(10),
            ..FakeClient::replying(OFFER_JSON)
        });
        let config = PipelineConfig {
            collector_timeout_ms: 50,
            assembly_deadline_ms: 100,
            generation_timeout_ms: 150,
            request_deadline_ms: 2_000,
            ..PipelineConfig::default()
        };
        let pipeline =
            Pipeline::new(Arc::new(seeded_store()), client, config, ModelConfig::default()).unwrap();
        let err = pipeline
            .generate_offer(&offer_request(), &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn request_deadline_bounds_the_whole_invocation() {
        let client = Arc::new(FakeClient {
            delay: Duration::from_secs(10),
            ..FakeClient::replying(OFFER_JSON)
        });
        // Assembly burns its full deadline, leaving less than the generation
        // timeout before the request deadline.
        let config = PipelineConfig {
            collector_timeout_ms: 100,
            assembly_deadline_ms: 150,
            generation_timeout_ms: 250,
            request_deadline_ms: 300,
            ..PipelineConfig::default()
        };
        let pipeline =
            Pipeline::new(Arc::new(StalledStore), client, config, ModelConfig::default()).unwrap();
        let started = std::time::Instant::now();
        let err = pipeline
            .generate_offer(&offer_request(), &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn invalid_timeouts_are_rejected() {
        let config = PipelineConfig {
            generation_timeout_ms: 60_000,
            request_deadline_ms: 60_000,
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(
            Arc::new(MemoryStore::default()),
            Arc::new(FakeClient::replying("")),
            config,
            ModelConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn offer_request_validation() {
        assert!(offer_request().validate().is_ok());
        let long = OfferRequest {
            client_request: "x".repeat(MAX_REQUEST_CHARS + 1),
            ..OfferRequest::default()
        };
        assert_eq!(long.validate().unwrap_err().kind(), ErrorKind::Validation);

        let parsed: OfferRequest =
            serde_json::from_str(r#"{"clientRequest": "New logo", "clientId": " "}"#).unwrap();
        assert_eq!(parsed.company_name, None);
        assert_eq!(parsed.client_id(), None);
    }

    #[test]
    fn brief_plan_covers_every_source() {
        let as_of = Utc::now();
        let plan = brief_plan(&PipelineConfig::default(), as_of);
        let sources: Vec<SourceId> = plan.iter().map(|r| r.source).collect();
        assert_eq!(sources, SourceId::ALL.to_vec());
        let chat = plan.iter().find(|r| r.source == SourceId::ChatLogs).unwrap();
        assert_eq!(chat.constraints.since, Some(as_of - ChronoDuration::hours(24)));
    }
}
