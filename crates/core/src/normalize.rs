//! Normalisation of heterogeneous model output.
//!
//! The model replies with clean JSON, markdown-fenced JSON, JSON buried in
//! explanatory prose, or freeform Q&A text. This module turns all of those
//! into a tagged [`AnalysisOutcome`] instead of letting callers probe fields
//! ad hoc.

use crate::analysis::StructuredAnalysis;
use serde_json::Value;

/// A normalised analysis result.
#[derive(Clone, Debug, PartialEq)]
pub enum AnalysisOutcome {
    /// The structured JSON shape from structured mode.
    Structured(StructuredAnalysis),
    /// Freeform Q&A (or otherwise unstructured) text.
    Narrative(String),
}

/// Strip a leading/trailing markdown code fence (```json or ```), trimming
/// whitespace. Text without a fence passes through unchanged apart from the
/// trim.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    let body = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };

    body.strip_suffix("```").unwrap_or(body).trim()
}

/// The largest brace-delimited substring, used as a fallback when the model
/// wraps its JSON in explanatory prose.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse structured-mode output: fence-stripped text first, then the
/// brace-extraction fallback.
pub fn parse_structured(text: &str) -> Option<StructuredAnalysis> {
    let stripped = strip_code_fence(text);

    if let Ok(analysis) = serde_json::from_str(stripped) {
        return Some(analysis);
    }

    extract_json_object(stripped).and_then(|candidate| serde_json::from_str(candidate).ok())
}

/// Classify a persisted payload loaded back from the Observation store.
///
/// A payload that parses as a JSON object carrying any of the structured keys
/// is treated as a prior structured analysis; everything else is narrative
/// Q&A text.
pub fn classify_payload(payload: &str) -> AnalysisOutcome {
    let Ok(value) = serde_json::from_str::<Value>(payload) else {
        return AnalysisOutcome::Narrative(payload.to_string());
    };

    if looks_structured(&value) {
        if let Ok(analysis) = serde_json::from_value(value) {
            return AnalysisOutcome::Structured(analysis);
        }
    }

    AnalysisOutcome::Narrative(payload.to_string())
}

/// Whether a JSON value carries any of the structured-analysis keys.
pub fn looks_structured(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    [
        "riskScores",
        "recommendedTreatments",
        "preventiveMeasures",
        "summaryText",
    ]
    .iter()
    .any(|key| object.contains_key(*key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{ "summaryText": "Stable.", "riskScores": [] }"#;

    #[test]
    fn fenced_json_recovers_identical_object() {
        let plain: StructuredAnalysis = serde_json::from_str(SAMPLE).expect("parse");

        for fenced in [
            format!("```json\n{SAMPLE}\n```"),
            format!("```\n{SAMPLE}\n```"),
            format!("  {SAMPLE}  "),
        ] {
            let parsed = parse_structured(&fenced).expect("parse fenced");
            assert_eq!(parsed, plain);
        }
    }

    #[test]
    fn strip_fence_leaves_plain_text_alone() {
        assert_eq!(strip_code_fence("  hello  "), "hello");
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\ntext\n```"), "text");
    }

    #[test]
    fn prose_wrapped_json_extracts_via_braces() {
        let wrapped = format!("Here is the analysis you asked for:\n{SAMPLE}\nLet me know!");
        let parsed = parse_structured(&wrapped).expect("extract");
        assert_eq!(parsed.summary_text, "Stable.");
    }

    #[test]
    fn unparseable_text_yields_none() {
        assert!(parse_structured("no json here").is_none());
        assert!(parse_structured("{ broken").is_none());
    }

    #[test]
    fn classify_recognises_structured_payload() {
        match classify_payload(SAMPLE) {
            AnalysisOutcome::Structured(analysis) => {
                assert_eq!(analysis.summary_text, "Stable.")
            }
            other => panic!("expected structured, got {other:?}"),
        }
    }

    #[test]
    fn classify_falls_back_to_narrative() {
        let narrative = "### Does the patient smoke?\nNo relevant data found.";
        match classify_payload(narrative) {
            AnalysisOutcome::Narrative(text) => assert_eq!(text, narrative),
            other => panic!("expected narrative, got {other:?}"),
        }

        // Valid JSON without structured keys is still narrative.
        match classify_payload(r#"{ "note": "hi" }"#) {
            AnalysisOutcome::Narrative(_) => {}
            other => panic!("expected narrative, got {other:?}"),
        }
    }
}
