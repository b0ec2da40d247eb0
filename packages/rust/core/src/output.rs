//! Structured outputs produced by the generation pipelines.
//!
//! Values of these types only exist after the validator has accepted the
//! model's JSON against the type's [`Schema`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::schema::{FieldSpec, FieldType, Schema};

/// A typed result the model is asked to produce.
pub trait StructuredOutput: Serialize + DeserializeOwned {
    /// Schema embedded in the prompt and enforced by the validator.
    const SCHEMA: Schema;
}

// ---------------------------------------------------------------------------
// Offer draft
// ---------------------------------------------------------------------------

/// One priced deliverable of an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    pub description: String,
    pub price: f64,
}

/// A commercial proposal for a client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDraft {
    pub title: String,
    pub line_items: Vec<LineItem>,
    /// Client-facing notes.
    pub notes: String,
    /// Internal pricing and positioning rationale. Not shown to the client.
    pub internal_strategy: String,
}

impl OfferDraft {
    /// Sum of all line item prices.
    pub fn total(&self) -> f64 {
        self.line_items.iter().map(|i| i.price).sum()
    }
}

const LINE_ITEM_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "name",
        ty: FieldType::String { non_empty: true },
        description: "short deliverable name",
    },
    FieldSpec {
        name: "description",
        ty: FieldType::String { non_empty: true },
        description: "what the client gets",
    },
    FieldSpec {
        name: "price",
        ty: FieldType::Number { non_negative: true },
        description: "price in the agency's currency",
    },
];

impl StructuredOutput for OfferDraft {
    const SCHEMA: Schema = Schema {
        name: "OfferDraft",
        fields: &[
            FieldSpec {
                name: "title",
                ty: FieldType::String { non_empty: true },
                description: "offer title",
            },
            FieldSpec {
                name: "lineItems",
                ty: FieldType::Array {
                    items: LINE_ITEM_FIELDS,
                    min: 3,
                    max: 6,
                },
                description: "priced deliverables",
            },
            FieldSpec {
                name: "notes",
                ty: FieldType::String { non_empty: false },
                description: "client-facing notes",
            },
            FieldSpec {
                name: "internalStrategy",
                ty: FieldType::String { non_empty: false },
                description: "internal pricing rationale, never shown to the client",
            },
        ],
    };
}

// ---------------------------------------------------------------------------
// Brief report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefSection {
    pub title: String,
    pub body: String,
}

/// The daily "smart pulse" digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefReport {
    pub headline: String,
    pub sections: Vec<BriefSection>,
}

impl BriefReport {
    /// Render as plain text for the `{report}` response and the CLI.
    pub fn to_report_text(&self) -> String {
        let mut out = self.headline.trim().to_string();
        for section in &self.sections {
            out.push_str("\n\n");
            out.push_str(section.title.trim());
            out.push('\n');
            out.push_str(section.body.trim());
        }
        out
    }
}

const BRIEF_SECTION_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "title",
        ty: FieldType::String { non_empty: true },
        description: "section heading",
    },
    FieldSpec {
        name: "body",
        ty: FieldType::String { non_empty: true },
        description: "two to four sentences",
    },
];

impl StructuredOutput for BriefReport {
    const SCHEMA: Schema = Schema {
        name: "BriefReport",
        fields: &[
            FieldSpec {
                name: "headline",
                ty: FieldType::String { non_empty: true },
                description: "one-line summary of the day",
            },
            FieldSpec {
                name: "sections",
                ty: FieldType::Array {
                    items: BRIEF_SECTION_FIELDS,
                    min: 1,
                    max: 8,
                },
                description: "brief sections",
            },
        ],
    };
}
