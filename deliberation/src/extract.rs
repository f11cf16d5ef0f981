//! Recovering a JSON object from free-form model output.
//!
//! Models are asked for a single JSON object but wrap it in ```json fences,
//! plain fences, or prose. Extraction tries, in order: a fence tagged `json`,
//! any other fence, the trimmed text itself; within the chosen candidate it
//! falls back to the span between the first `{` and the last `}`.
//!
//! Decoding is tagged: [`parse_object`] yields either the strict record or an
//! explicit [`Parsed::Degraded`] carrying the raw text and the reason.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Outcome of decoding one model response into `T`.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Structured(T),
    Degraded { raw: String, reason: String },
}

impl<T> Parsed<T> {
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

/// Locate the most likely JSON payload in `text`.
///
/// Returns `None` when no candidate contains an object-looking span.
pub fn extract_json_payload(text: &str) -> Option<&str> {
    let candidate = fenced_body(text).unwrap_or_else(|| text.trim());
    if candidate.starts_with('{') && candidate.ends_with('}') {
        return Some(candidate);
    }
    brace_span(candidate).or_else(|| brace_span(text))
}

/// Decode `raw` into `T`, requiring the payload to be a JSON object.
pub fn parse_object<T: DeserializeOwned>(raw: &str) -> Parsed<T> {
    let degraded = |reason: String| Parsed::Degraded {
        raw: raw.to_string(),
        reason,
    };

    let Some(payload) = extract_json_payload(raw) else {
        return degraded("no JSON object found in response".to_string());
    };

    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => return degraded(format!("invalid JSON: {e}")),
    };
    if !value.is_object() {
        return degraded("payload is not a JSON object".to_string());
    }

    match serde_json::from_value::<T>(value) {
        Ok(record) => Parsed::Structured(record),
        Err(e) => degraded(format!("schema mismatch: {e}")),
    }
}

/// Body of the preferred fenced block: a `json`-tagged fence wins over an
/// untagged one. An unterminated fence runs to the end of the text.
fn fenced_body(text: &str) -> Option<&str> {
    let mut first_any: Option<&str> = None;
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let line_end = after.find('\n').unwrap_or(after.len());
        let tag = after[..line_end].trim();

        let (body_start, is_json) = if tag.starts_with('{') {
            (0, false)
        } else {
            ((line_end + 1).min(after.len()), tag.eq_ignore_ascii_case("json"))
        };
        let body_and_tail = &after[body_start..];
        let (body, tail) = match body_and_tail.find("```") {
            Some(close) => (&body_and_tail[..close], &body_and_tail[close + 3..]),
            None => (body_and_tail, ""),
        };
        let body = body.trim();

        if is_json {
            return Some(body);
        }
        if first_any.is_none() && !body.is_empty() {
            first_any = Some(body);
        }
        rest = tail;
    }
    first_any
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        predicted_type: String,
    }

    #[test]
    fn test_fenced_and_bare_yield_same_object() {
        let bare = r#"{"predicted_type":"AAA","confidence":70,"reasoning":"r"}"#;
        let fenced = format!("Here you go:\n```json\n{bare}\n```\nThanks");
        let a: Value = serde_json::from_str(extract_json_payload(bare).unwrap()).unwrap();
        let b: Value = serde_json::from_str(extract_json_payload(&fenced).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, json!({"predicted_type":"AAA","confidence":70,"reasoning":"r"}));
    }

    #[test]
    fn test_json_fence_preferred_over_plain_fence() {
        let text = "```\nnot this\n```\nand\n```json\n{\"predicted_type\":\"B\"}\n```";
        assert_eq!(extract_json_payload(text), Some("{\"predicted_type\":\"B\"}"));
    }

    #[test]
    fn test_plain_fence_and_uppercase_tag() {
        let plain = "```\n{\"predicted_type\":\"A\"}\n```";
        assert_eq!(extract_json_payload(plain), Some("{\"predicted_type\":\"A\"}"));
        let upper = "```JSON\n{\"predicted_type\":\"A\"}\n```";
        assert_eq!(extract_json_payload(upper), Some("{\"predicted_type\":\"A\"}"));
    }

    #[test]
    fn test_unterminated_fence() {
        let text = "```json\n{\"predicted_type\":\"A\"}";
        let parsed: Parsed<Probe> = parse_object(text);
        assert!(parsed.is_structured());
    }

    #[test]
    fn test_prose_wrapped_object() {
        let text = "My answer is {\"predicted_type\": \"LIE\"} as shown.";
        let parsed: Parsed<Probe> = parse_object(text);
        assert_eq!(
            parsed,
            Parsed::Structured(Probe {
                predicted_type: "LIE".into()
            })
        );
    }

    #[test]
    fn test_degraded_cases_keep_raw() {
        for raw in ["no json here", "{broken", "[1, 2, 3]", "{\"other\": 1}"] {
            match parse_object::<Probe>(raw) {
                Parsed::Degraded { raw: kept, reason } => {
                    assert_eq!(kept, raw);
                    assert!(!reason.is_empty());
                }
                Parsed::Structured(p) => panic!("unexpected structured {p:?} for {raw}"),
            }
        }
    }
}
