//! Metadata extraction: map a corrected document onto a schema's fields.
//!
//! One request carries the whole corrected document plus the field list.
//! The model must answer with a single JSON object keyed by field name;
//! anything else counts as unparseable. Failed attempts repeat the
//! identical request under the configured [`crate::RetryPolicy`].
//!
//! ## Response normalisation
//!
//! | Reply value | Stored cell |
//! |-------------|-------------|
//! | missing key, `null`, `""` | `Not provided` |
//! | string | trimmed string |
//! | number / bool | its JSON text |
//! | array | non-empty items joined with `", "` |
//!
//! Keys are matched exactly first, then ignoring case and repeated
//! whitespace. Keys that match no field are dropped.

use crate::config::{AttemptFailure, PipelineConfig};
use crate::error::PipelineError;
use crate::output::{CorrectedPage, MetadataRecord, NOT_PROVIDED};
use crate::pipeline::llm::{ModelRequest, TextModel};
use crate::pipeline::postprocess::isolate_json_object;
use crate::prompts::{extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use crate::schema::DocumentSchema;
use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// A successful extraction and how many calls it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub record: MetadataRecord,
    pub attempts: u32,
}

/// Concatenate the corrected pages into one document text.
///
/// Degraded pages (no text) are left out.
pub fn assemble_document(pages: &[CorrectedPage]) -> String {
    pages
        .iter()
        .filter_map(|p| p.text.as_deref().map(|t| format!("[Page {}]\n{}", p.index + 1, t)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the single extraction request for a document.
pub fn build_request(
    schema: &DocumentSchema,
    pages: &[CorrectedPage],
    config: &PipelineConfig,
) -> ModelRequest {
    let document_text = assemble_document(pages);
    ModelRequest::new(
        extraction_prompt(schema, &document_text),
        config.extraction_max_tokens,
    )
    .with_system(EXTRACTION_SYSTEM_PROMPT)
    .with_temperature(config.temperature)
}

/// Extract `schema`'s fields from the corrected pages.
pub async fn extract(
    model: &dyn TextModel,
    pages: &[CorrectedPage],
    schema: &DocumentSchema,
    config: &PipelineConfig,
) -> Result<Extraction, PipelineError> {
    let request = build_request(schema, pages, config);
    let policy = &config.retry;
    debug!(
        "Extraction prompt: {} chars, {} fields",
        request.prompt.len(),
        schema.fields.len()
    );

    let mut attempts = 0u32;
    loop {
        attempts += 1;

        let failure = match model.complete(&request).await {
            Ok(reply) if reply.trim().is_empty() => AttemptFailure::EmptyResponse,
            Ok(reply) => match parse_response(&reply, schema) {
                Ok(record) => {
                    info!(
                        "Extracted {}/{} fields in {} attempt(s)",
                        record.provided_count(),
                        schema.fields.len(),
                        attempts
                    );
                    return Ok(Extraction { record, attempts });
                }
                Err(detail) => AttemptFailure::Unparseable(detail),
            },
            Err(e) => AttemptFailure::NoResponse(e.to_string()),
        };

        if !policy.should_retry(&failure, attempts) {
            return Err(give_up(failure, attempts, policy.max_attempts));
        }

        warn!(
            "Attempt {}/{}: {}, retrying",
            attempts, policy.max_attempts, failure
        );
        let delay = policy.backoff.delay(attempts);
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

fn give_up(failure: AttemptFailure, attempts: u32, max_attempts: u32) -> PipelineError {
    if attempts >= max_attempts {
        return PipelineError::ExtractionFailed {
            attempts,
            last_error: failure.to_string(),
        };
    }
    // The retry predicate declined; surface the underlying failure.
    match failure {
        AttemptFailure::NoResponse(message) => PipelineError::LlmApiError { message },
        AttemptFailure::EmptyResponse => PipelineError::UnparseableResponse {
            detail: "empty response".into(),
        },
        AttemptFailure::Unparseable(detail) => PipelineError::UnparseableResponse { detail },
    }
}

/// Parse a model reply into a record holding exactly `schema`'s fields.
pub fn parse_response(reply: &str, schema: &DocumentSchema) -> Result<MetadataRecord, String> {
    let json = isolate_json_object(reply).ok_or_else(|| "no JSON object in response".to_string())?;
    let value: Value = serde_json::from_str(&json).map_err(|e| format!("invalid JSON: {e}"))?;
    let object = match value {
        Value::Object(map) => map,
        _ => return Err("response is not a JSON object".into()),
    };

    let mut record = MetadataRecord::new();
    let mut matched = 0usize;
    for field in &schema.fields {
        match lookup(&object, field) {
            Some(v) => {
                matched += 1;
                record.insert(field.as_str(), value_to_cell(v));
            }
            None => record.insert(field.as_str(), NOT_PROVIDED),
        }
    }

    if matched == 0 && !object.is_empty() {
        return Err(format!(
            "none of the {} keys in the response match a schema field",
            object.len()
        ));
    }
    let dropped = object.len().saturating_sub(matched);
    if dropped > 0 {
        debug!("Dropped {} keys not in the schema", dropped);
    }
    Ok(record)
}

fn lookup<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    if let Some(v) = object.get(field) {
        return Some(v);
    }
    let wanted = normalise_key(field);
    object
        .iter()
        .find(|(k, _)| normalise_key(k) == wanted)
        .map(|(_, v)| v)
}

fn normalise_key(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => NOT_PROVIDED.to_string(),
        Value::String(s) if s.trim().is_empty() => NOT_PROVIDED.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(value_to_cell)
                .filter(|s| s != NOT_PROVIDED)
                .collect();
            if parts.is_empty() {
                NOT_PROVIDED.to_string()
            } else {
                parts.join(", ")
            }
        }
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> DocumentSchema {
        DocumentSchema::new("DEED", ["Seller Name", "Seller Current Address", "Buyer Name"]).unwrap()
    }

    #[test]
    fn parses_plain_object_and_fills_missing() {
        let r = parse_response(r#"{"Seller Name": "John Doe"}"#, &schema()).unwrap();
        assert_eq!(r.get("Seller Name"), Some("John Doe"));
        assert_eq!(r.get("Buyer Name"), Some(NOT_PROVIDED));
        assert_eq!(
            r.keys().collect::<Vec<_>>(),
            vec!["Seller Name", "Seller Current Address", "Buyer Name"]
        );
    }

    #[test]
    fn drops_invented_keys() {
        let r = parse_response(r#"{"Seller Name": "A", "Notary": "B"}"#, &schema()).unwrap();
        assert_eq!(r.len(), 3);
        assert_eq!(r.get("Notary"), None);
    }

    #[test]
    fn tolerates_fences_and_loose_keys() {
        let reply = "```json\n{\"seller  name\": \"A\", \"BUYER NAME\": [\"B\", \"C\"]}\n```";
        let r = parse_response(reply, &schema()).unwrap();
        assert_eq!(r.get("Seller Name"), Some("A"));
        assert_eq!(r.get("Buyer Name"), Some("B, C"));
    }

    #[test]
    fn normalises_values() {
        let reply = r#"{"Seller Name": null, "Seller Current Address": 42, "Buyer Name": "  "}"#;
        let r = parse_response(reply, &schema()).unwrap();
        assert_eq!(r.get("Seller Name"), Some(NOT_PROVIDED));
        assert_eq!(r.get("Seller Current Address"), Some("42"));
        assert_eq!(r.get("Buyer Name"), Some(NOT_PROVIDED));
    }

    #[test]
    fn keeps_unclear_values_verbatim() {
        let r = parse_response(r#"{"Buyer Name": "Unclear - smudged signature"}"#, &schema()).unwrap();
        assert_eq!(r.get("Buyer Name"), Some("Unclear - smudged signature"));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(parse_response("Seller Name: John", &schema()).is_err());
        assert!(parse_response("{not json}", &schema()).is_err());
        assert!(parse_response(r#"{"Unrelated": "x"}"#, &schema()).is_err());
    }

    #[test]
    fn empty_object_is_all_not_provided() {
        let r = parse_response("{}", &schema()).unwrap();
        assert_eq!(r.provided_count(), 0);
    }

    #[test]
    fn assemble_skips_degraded_pages() {
        let pages = vec![
            CorrectedPage { index: 0, text: Some("John Doe, Seller".into()), error: None },
            CorrectedPage { index: 1, text: None, error: None },
            CorrectedPage { index: 2, text: Some("123 Main St".into()), error: None },
        ];
        assert_eq!(
            assemble_document(&pages),
            "[Page 1]\nJohn Doe, Seller\n\n[Page 3]\n123 Main St"
        );
    }

    #[test]
    fn give_up_distinguishes_exhaustion() {
        let e = give_up(AttemptFailure::EmptyResponse, 5, 5);
        assert!(matches!(e, PipelineError::ExtractionFailed { attempts: 5, .. }));
        let e = give_up(AttemptFailure::NoResponse("401".into()), 1, 5);
        assert!(matches!(e, PipelineError::LlmApiError { .. }));
    }
}
