//! Post-processing: deterministic cleanup of model replies.
//!
//! Even well-prompted models wrap answers in ```` ``` ```` fences, emit
//! Windows line endings, or leave zero-width characters behind. These rules
//! fix that without touching content. Each rule is a pure `&str → String`
//! function and independently tested.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a correction reply.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim the whole text
pub fn clean_corrected_text(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

/// Isolate the JSON object in an extraction reply.
///
/// Strips code fences, then returns the slice from the first `{` to the
/// last `}` so a sentence of preamble does not break parsing. Returns
/// `None` when there is no object-shaped span at all.
pub fn isolate_json_object(input: &str) -> Option<String> {
    let s = strip_code_fences(input);
    let s = remove_invisible_chars(&s);
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    if end < start {
        return None;
    }
    Some(s[start..=end].to_string())
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse blank lines ─────────────────────────────────────────────

static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUNS.replace_all(input, "\n\n\n").into_owned()
}

// ── Rule 5: Strip invisible Unicode ──────────────────────────────────────────

const INVISIBLE: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}'];

fn remove_invisible_chars(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLE.contains(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_with_language() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\nplain\n```"), "plain");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_clean_corrected_text_full_pipeline() {
        let input = "```\nJohn Doe, Seller   \r\n\r\n\r\n\r\n\r\n123 Main St\u{200B}\n```";
        assert_eq!(clean_corrected_text(input), "John Doe, Seller\n\n\n123 Main St");
    }

    #[test]
    fn test_isolate_json_object_with_preamble() {
        let input = "Here is the extracted metadata:\n{\"Seller Name\": \"John Doe\"}\nLet me know!";
        assert_eq!(
            isolate_json_object(input).as_deref(),
            Some("{\"Seller Name\": \"John Doe\"}")
        );
    }

    #[test]
    fn test_isolate_json_object_missing() {
        assert_eq!(isolate_json_object("Not provided"), None);
        assert_eq!(isolate_json_object("} backwards {"), None);
    }
}
