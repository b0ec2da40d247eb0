//! Output schemas shared by the prompt builder and the response validator.
//!
//! A [`Schema`] is a static description of the JSON object a task must
//! return. The prompt embeds [`Schema::render`]; the validator runs
//! [`Schema::check`] on the parsed model output. Both read the same value,
//! so the instructions and the check cannot drift apart.

use serde_json::Value;

use agencypulse_shared::{AgencyPulseError, Result};

/// JSON type of one field, with its bounds.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    String { non_empty: bool },
    Number { non_negative: bool },
    /// Array of objects described by `items`.
    Array {
        items: &'static [FieldSpec],
        min: usize,
        max: usize,
    },
}

/// One required field of an object.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub description: &'static str,
}

/// A top-level output object.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// Field names at the top level, in declaration order.
    #[cfg(test)]
    pub(crate) fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Prompt-ready description of the expected JSON shape.
    pub fn render(&self) -> String {
        let mut out = String::new();
        render_object(self.fields, 0, &mut out);
        out
    }

    /// Check required fields, JSON types and bounds.
    ///
    /// Errors name the offending path, e.g. `lineItems[2].price`.
    pub fn check(&self, value: &Value) -> Result<()> {
        check_object(self.fields, value, "")
    }
}

fn render_object(fields: &[FieldSpec], depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    out.push_str("{\n");
    for (i, field) in fields.iter().enumerate() {
        let comma = if i + 1 < fields.len() { "," } else { "" };
        out.push_str(&format!("{pad}  \"{}\": ", field.name));
        match field.ty {
            FieldType::String { non_empty } => {
                let qualifier = if non_empty { "non-empty string" } else { "string" };
                out.push_str(&format!("<{qualifier}>{comma}  // {}\n", field.description));
            }
            FieldType::Number { non_negative } => {
                let qualifier = if non_negative { "number >= 0" } else { "number" };
                out.push_str(&format!("<{qualifier}>{comma}  // {}\n", field.description));
            }
            FieldType::Array { items, min, max } => {
                out.push_str(&format!(
                    "[  // {}; {min} to {max} items, each:\n{pad}    ",
                    field.description
                ));
                render_object(items, depth + 2, out);
                out.push_str(&format!("\n{pad}  ]{comma}\n"));
            }
        }
    }
    out.push_str(&pad);
    out.push('}');
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn check_object(fields: &[FieldSpec], value: &Value, prefix: &str) -> Result<()> {
    let Some(object) = value.as_object() else {
        let field = if prefix.is_empty() { "$" } else { prefix };
        return Err(AgencyPulseError::schema(field, "expected an object"));
    };

    for spec in fields {
        let path = join_path(prefix, spec.name);
        let Some(field) = object.get(spec.name).filter(|v| !v.is_null()) else {
            return Err(AgencyPulseError::schema(path, "missing required field"));
        };
        check_field(spec.ty, field, &path)?;
    }
    Ok(())
}

fn check_field(ty: FieldType, value: &Value, path: &str) -> Result<()> {
    match ty {
        FieldType::String { non_empty } => {
            let Some(s) = value.as_str() else {
                return Err(AgencyPulseError::schema(path, "expected a string"));
            };
            if non_empty && s.trim().is_empty() {
                return Err(AgencyPulseError::schema(path, "must not be empty"));
            }
        }
        FieldType::Number { non_negative } => {
            // serde_json never yields NaN or infinity from text, so any
            // number that parsed is finite.
            let Some(n) = value.as_f64() else {
                return Err(AgencyPulseError::schema(path, "expected a number"));
            };
            if non_negative && n < 0.0 {
                return Err(AgencyPulseError::schema(path, format!("must be >= 0, got {n}")));
            }
        }
        FieldType::Array { items, min, max } => {
            let Some(elements) = value.as_array() else {
                return Err(AgencyPulseError::schema(path, "expected an array"));
            };
            if elements.len() < min || elements.len() > max {
                return Err(AgencyPulseError::schema(
                    path,
                    format!("expected {min} to {max} items, got {}", elements.len()),
                ));
            }
            for (i, element) in elements.iter().enumerate() {
                check_object(items, element, &format!("{path}[{i}]"))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agencypulse_shared::ErrorKind;
    use serde_json::json;

    const ITEM: &[FieldSpec] = &[
        FieldSpec {
            name: "name",
            ty: FieldType::String { non_empty: true },
            description: "item name",
        },
        FieldSpec {
            name: "price",
            ty: FieldType::Number { non_negative: true },
            description: "price",
        },
    ];

    const SAMPLE: Schema = Schema {
        name: "sample",
        fields: &[
            FieldSpec {
                name: "title",
                ty: FieldType::String { non_empty: true },
                description: "title",
            },
            FieldSpec {
                name: "items",
                ty: FieldType::Array {
                    items: ITEM,
                    min: 1,
                    max: 2,
                },
                description: "things",
            },
        ],
    };

    fn violation_field(err: AgencyPulseError) -> String {
        match err {
            AgencyPulseError::SchemaViolation { field, .. } => field,
            other => panic!("expected schema violation, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid_object() {
        let value = json!({"title": "T", "items": [{"name": "a", "price": 0}], "extra": true});
        assert!(SAMPLE.check(&value).is_ok());
    }

    #[test]
    fn reports_nested_path() {
        let value = json!({"title": "T", "items": [{"name": "a", "price": 1}, {"name": "b", "price": -3}]});
        let err = SAMPLE.check(&value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert_eq!(violation_field(err), "items[1].price");
    }

    #[test]
    fn rejects_missing_and_null_fields() {
        let err = SAMPLE.check(&json!({"items": []})).unwrap_err();
        assert_eq!(violation_field(err), "title");
        let err = SAMPLE.check(&json!({"title": null, "items": []})).unwrap_err();
        assert_eq!(violation_field(err), "title");
    }

    #[test]
    fn rejects_wrong_types_and_bounds() {
        let err = SAMPLE.check(&json!({"title": 5, "items": []})).unwrap_err();
        assert_eq!(violation_field(err), "title");

        let err = SAMPLE.check(&json!({"title": "  ", "items": []})).unwrap_err();
        assert_eq!(violation_field(err), "title");

        let err = SAMPLE.check(&json!({"title": "T", "items": []})).unwrap_err();
        assert_eq!(violation_field(err), "items");

        let err = SAMPLE
            .check(&json!({"title": "T", "items": [{"name": "a", "price": "10"}]}))
            .unwrap_err();
        assert_eq!(violation_field(err), "items[0].price");
    }

    #[test]
    fn render_lists_every_field_and_bounds() {
        let rendered = SAMPLE.render();
        assert!(rendered.contains("\"title\": <non-empty string>"));
        assert!(rendered.contains("\"items\": [  // things; 1 to 2 items"));
        assert!(rendered.contains("\"price\": <number >= 0>"));
        assert_eq!(rendered, SAMPLE.render());
    }
}
