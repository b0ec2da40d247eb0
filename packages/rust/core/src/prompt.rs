//! Prompt building.
//!
//! [`build_request`] is a pure function of a bundle, a task template, the
//! caller's inputs and the model parameters: the same arguments always yield
//! a byte-identical prompt.

use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

use agencypulse_shared::ModelConfig;

use crate::assembler::ContextBundle;
use crate::output::{BriefReport, OfferDraft, StructuredOutput};
use crate::schema::Schema;

/// Which pipeline a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Offer,
    SmartPulse,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "generate_offer",
            Self::SmartPulse => "smart_pulse",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed framing for one task.
#[derive(Debug, Clone, Copy)]
pub struct TaskTemplate {
    pub task: TaskKind,
    pub persona: &'static str,
    pub instructions: &'static str,
    /// Output schema; the validator checks the reply against the same value.
    pub schema: Schema,
    pub rules: &'static [&'static str],
}

const COMMON_RULES: &[&str] = &[
    "Return only JSON, no markdown fences and no text before or after the object.",
    "Use exactly the field names shown in the output format.",
    "Use only facts from the business context. If a section says data is unavailable, do not guess about that area.",
];

pub fn offer_template() -> TaskTemplate {
    TaskTemplate {
        task: TaskKind::Offer,
        persona: "You are the senior account strategist of a digital marketing agency. \
                  You write clear, commercially sound proposals in the agency's own voice.",
        instructions: "Draft a priced offer that answers the client request below. \
                       Match the agency's services and tone from the organization profile, \
                       and stay consistent with previous offers to the same client.",
        schema: OfferDraft::SCHEMA,
        rules: &[
            "Include between 3 and 6 line items.",
            "Every price is a plain number >= 0, without currency symbols.",
            "internalStrategy is for the agency team only; keep client-facing wording in notes.",
        ],
    }
}

pub fn brief_template() -> TaskTemplate {
    TaskTemplate {
        task: TaskKind::SmartPulse,
        persona: "You are the operations assistant of a digital marketing agency. \
                  You write short, factual morning briefs for the owner.",
        instructions: "Summarize what happened recently and what needs attention today: \
                       new leads and conversations, open tasks, upcoming meetings, running campaigns.",
        schema: BriefReport::SCHEMA,
        rules: &[
            "Write between 1 and 8 sections, each with a title and a body of two to four sentences.",
            "Prefer concrete names, counts and dates over general advice.",
        ],
    }
}

/// Sampling parameters sent with a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl ModelParams {
    /// Configured parameters for `task`.
    pub fn for_task(model: &ModelConfig, task: TaskKind) -> Self {
        let temperature = match task {
            TaskKind::Offer => model.offer_temperature,
            TaskKind::SmartPulse => model.brief_temperature,
        };
        Self {
            temperature,
            max_output_tokens: model.max_output_tokens,
        }
    }
}

/// A fully rendered request for the generation client. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub task: TaskKind,
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationRequest {
    /// SHA-256 of the prompt and task id, for correlating log lines.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.prompt.as_bytes());
        hasher.update(self.task.as_str().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Render a generation request.
///
/// `inputs` are caller-supplied `(label, value)` pairs, rendered in the
/// given order; blank values are left out.
pub fn build_request(
    bundle: &ContextBundle,
    template: &TaskTemplate,
    inputs: &[(&str, &str)],
    params: ModelParams,
) -> GenerationRequest {
    let mut prompt = String::new();
    prompt.push_str(template.persona);
    prompt.push_str("\n\n## Task\n");
    prompt.push_str(template.instructions);

    prompt.push_str("\n\n## Request\n");
    let mut any_input = false;
    for (label, value) in inputs {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        any_input = true;
        prompt.push_str(&format!("- {label}: {value}\n"));
    }
    if !any_input {
        prompt.push_str("No additional input.\n");
    }

    prompt.push_str(&format!(
        "\n## Business context (as of {})\n",
        bundle.as_of().to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    prompt.push_str(&bundle.render());

    prompt.push_str("\n\n## Output format\nReturn one JSON object with this shape:\n");
    prompt.push_str(&template.schema.render());

    prompt.push_str("\n\n## Rules\n");
    for rule in COMMON_RULES.iter().chain(template.rules) {
        prompt.push_str(&format!("- {rule}\n"));
    }

    GenerationRequest {
        task: template.task,
        prompt,
        temperature: params.temperature,
        max_output_tokens: params.max_output_tokens,
    }
}
