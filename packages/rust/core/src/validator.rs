//! Response validation: raw model text to typed structured output.
//!
//! Strict parse-then-validate. Nothing is repaired or defaulted: a value
//! either matches its schema completely or the call fails with a classified
//! error.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use agencypulse_shared::{AgencyPulseError, Result};

use crate::output::StructuredOutput;

/// Remove a markdown code fence around the payload, plus surrounding
/// whitespace. Text without a fence is only trimmed.
///
/// Fence markers must start a line, so backticks inside JSON strings are
/// left alone.
pub fn strip_fences(raw: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)(?:\A|\n)[ \t]*```[A-Za-z0-9_-]*[ \t]*\r?\n(.*)\n[ \t]*```")
            .expect("valid regex")
    });

    match FENCE_RE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => raw.trim(),
    }
}

/// Parse raw text as a JSON object.
///
/// Bare JSON is parsed as-is; fence stripping only applies when that fails.
pub fn parse_object(raw: &str) -> Result<Value> {
    let value = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) => value,
        Err(_) => {
            let payload = strip_fences(raw);
            if payload.is_empty() {
                return Err(AgencyPulseError::malformed("empty model output", raw));
            }
            serde_json::from_str(payload)
                .map_err(|e| AgencyPulseError::malformed(format!("invalid JSON: {e}"), raw))?
        }
    };
    if !value.is_object() {
        return Err(AgencyPulseError::malformed(
            "expected a JSON object at the top level",
            raw,
        ));
    }
    Ok(value)
}

/// Validate raw model text into `T`.
pub fn validate<T: StructuredOutput>(raw: &str) -> Result<T> {
    let value = parse_object(raw)?;
    T::SCHEMA.check(&value)?;
    serde_json::from_value(value)
        .map_err(|e| AgencyPulseError::schema(T::SCHEMA.name, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{BriefReport, OfferDraft};
    use agencypulse_shared::ErrorKind;

    const OFFER: &str = r#"{
        "title": "Website Relaunch",
        "lineItems": [
            {"name": "Design", "description": "New visual identity", "price": 1200},
            {"name": "Build", "description": "Responsive site", "price": 3400.5},
            {"name": "Launch", "description": "Go-live support", "price": 0}
        ],
        "notes": "Timeline: six weeks.",
        "internalStrategy": "Bundle design to lift margin."
    }"#;

    #[test]
    fn strips_json_fence() {
        let raw = format!("```json\n{OFFER}\n```");
        assert_eq!(strip_fences(&raw), OFFER.trim());
    }

    #[test]
    fn strips_bare_fence_and_prose() {
        let raw = "Here you go:\n```\n{\"a\": 1}\n```\nThanks!";
        assert_eq!(strip_fences(raw), "{\"a\": 1}");
        assert_eq!(strip_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn valid_offer_parses() {
        let offer: OfferDraft = validate(OFFER).unwrap();
        assert_eq!(offer.title, "Website Relaunch");
        assert_eq!(offer.line_items.len(), 3);
        assert_eq!(offer.line_items[1].price, 3400.5);
    }

    #[test]
    fn fenced_offer_parses() {
        let raw = format!("```json\n{OFFER}\n```\n");
        let offer: OfferDraft = validate(&raw).unwrap();
        assert_eq!(offer.line_items.len(), 3);
    }

    #[test]
    fn valid_output_revalidates_after_serialization() {
        let offer: OfferDraft = validate(OFFER).unwrap();
        let json = serde_json::to_string(&offer).unwrap();
        let again: OfferDraft = validate(&json).unwrap();
        assert_eq!(offer, again);
    }

    #[test]
    fn backticks_inside_strings_survive() {
        let mut offer: OfferDraft = validate(OFFER).unwrap();
        offer.notes = "Install with ```npm i widget``` then run it.".into();
        let json = serde_json::to_string(&offer).unwrap();
        let again: OfferDraft = validate(&json).unwrap();
        assert_eq!(offer, again);

        let pretty = serde_json::to_string_pretty(&offer).unwrap();
        let fenced = format!("```json\n{pretty}\n```");
        assert_eq!(strip_fences(&fenced), pretty);
        let again: OfferDraft = validate(&fenced).unwrap();
        assert_eq!(again.notes, offer.notes);
    }

    #[test]
    fn non_json_is_malformed() {
        let err = validate::<OfferDraft>("Sure! Here is an offer: Website Relaunch").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
        let err = validate::<OfferDraft>("   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
        let err = validate::<OfferDraft>("[1, 2, 3]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
    }

    #[test]
    fn too_few_line_items_is_schema_violation() {
        let raw = r#"{"title": "T", "lineItems": [
            {"name": "a", "description": "d", "price": 1},
            {"name": "b", "description": "d", "price": 2}
        ], "notes": "", "internalStrategy": ""}"#;
        let err = validate::<OfferDraft>(raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert!(err.to_string().contains("lineItems"));
    }

    #[test]
    fn negative_price_is_schema_violation() {
        let raw = OFFER.replace("\"price\": 0", "\"price\": -10");
        let err = validate::<OfferDraft>(&raw).unwrap_err();
        assert!(matches!(
            err,
            AgencyPulseError::SchemaViolation { ref field, .. } if field == "lineItems[2].price"
        ));
    }

    #[test]
    fn brief_requires_sections() {
        let err = validate::<BriefReport>(r#"{"headline": "Hi", "sections": []}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);

        let report: BriefReport = validate(
            r#"{"headline": "Hi", "sections": [{"title": "Leads", "body": "None today."}]}"#,
        )
        .unwrap();
        assert_eq!(report.sections.len(), 1);
    }
}
