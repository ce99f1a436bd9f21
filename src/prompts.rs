//! Prompts for OCR correction and metadata extraction.
//!
//! Every prompt lives here so prompt changes never touch retry or parsing
//! logic. The extraction prompt is assembled from the document schema at
//! call time; nothing about a particular document type is hard-coded.
//!
//! Callers can override the correction prompt via
//! [`crate::config::PipelineConfig::correction_prompt`].

use crate::output::{NOT_PROVIDED, UNCLEAR_PREFIX};
use crate::schema::DocumentSchema;

/// System message for the per-page correction call.
pub const CORRECTION_SYSTEM_PROMPT: &str = "You are a helpful assistant that fixes errors in OCR output.";

/// Default instruction for the per-page correction call.
///
/// The page text follows this instruction on a new line.
pub const DEFAULT_CORRECTION_PROMPT: &str = r#"Correct the following OCR text.

Rules:
- Fix misread characters, broken words, and spacing errors
- Keep names, numbers, addresses, and dates exactly as written unless a character is clearly misread
- Do NOT summarise, translate, or add commentary
- Output ONLY the corrected text"#;

/// System message for the extraction call.
pub const EXTRACTION_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that extracts specific metadata fields from document text and answers only in JSON.";

/// Build the user message for correcting one page.
pub fn correction_prompt(instruction: Option<&str>, page_text: &str) -> String {
    let instruction = instruction.unwrap_or(DEFAULT_CORRECTION_PROMPT);
    format!("{instruction}\n\n{page_text}")
}

/// Build the user message for extracting `schema`'s fields from `document_text`.
pub fn extraction_prompt(schema: &DocumentSchema, document_text: &str) -> String {
    let fields = schema.fields.join("\n");
    let mut prompt = format!(
        r#"You are tasked with extracting specific metadata fields from a {doc_type} document. Accurately extract every field listed below from the document text.

1. Here is the full text of the document:
<document_text>
{document_text}
</document_text>

2. Extract information for the following fields:
<fields_to_extract>
{fields}
</fields_to_extract>

3. To extract the information:
a. Read through the entire document text.
b. For each field, search for relevant information within the document.
c. Pay attention to headers, labels, or sections that indicate where information is located.
d. Capture the exact information as it appears in the document.

4. Format your output as follows:
a. Return a single JSON object and nothing else.
b. Use exactly the field names above as keys, and strings as values.
c. If a field is not present in the document, use the value "{not_provided}".
d. If a field is ambiguous or unclear, use "{unclear}<brief explanation>".
e. If a field has multiple values, join them with ", " in one string.
"#,
        doc_type = schema.document_type,
        not_provided = NOT_PROVIDED,
        unclear = UNCLEAR_PREFIX,
    );

    if let Some(ref extra) = schema.instructions {
        prompt.push_str("\n5. Additional instructions:\n");
        prompt.push_str(extra);
        prompt.push('\n');
    }
    prompt
}

/// Prompt used by `scan2csv check` to probe the model connection.
pub const CONNECTION_CHECK_PROMPT: &str = "Hello, are you working?";
