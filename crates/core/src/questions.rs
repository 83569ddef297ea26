//! Templated question import.
//!
//! Questions are user-supplied and held for the session only; there is no
//! server-side persistence. Two file shapes are accepted: a JSON array of
//! strings, and a CSV whose first column is flattened. A malformed file is
//! rejected whole with a descriptive message, never partially imported.

use crate::{AnalysisError, AnalysisResult};
use serde_json::Value;

/// Parse a JSON question file: a top-level array of strings.
pub fn import_json(text: &str) -> AnalysisResult<Vec<String>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| AnalysisError::InvalidQuestionFile(format!("not valid JSON: {e}")))?;

    let Value::Array(items) = value else {
        return Err(AnalysisError::InvalidQuestionFile(
            "JSON must be an array of strings".into(),
        ));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(question) => Ok(question),
            other => Err(AnalysisError::InvalidQuestionFile(format!(
                "expected a string question, found {other}"
            ))),
        })
        .collect()
}

/// Parse a CSV question file, flattening the first column and skipping blank
/// cells. Order follows the rows.
pub fn import_csv(text: &str) -> AnalysisResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut questions = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| AnalysisError::InvalidQuestionFile(format!("bad CSV row: {e}")))?;
        if let Some(cell) = record.get(0) {
            let question = cell.trim();
            if !question.is_empty() {
                questions.push(question.to_string());
            }
        }
    }

    Ok(questions)
}

/// Dispatch on file extension. Unsupported extensions are rejected up front.
pub fn import(file_name: &str, text: &str) -> AnalysisResult<Vec<String>> {
    if file_name.ends_with(".json") {
        import_json(text)
    } else if file_name.ends_with(".csv") {
        import_csv(text)
    } else {
        Err(AnalysisError::InvalidQuestionFile(
            "unsupported file type; use JSON or CSV".into(),
        ))
    }
}
