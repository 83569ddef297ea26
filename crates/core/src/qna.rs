//! Line-oriented parsing of Q&A-mode model output.
//!
//! Q&A answers arrive as markdown: each question restated as a `###` heading
//! followed by free-text answer lines, with FHIR references
//! (`ResourceType/id`) cited inline.

use fhir::reference::split_reference;

/// One question/answer pair recovered from the model's markdown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Parse `### question` / answer blocks, preserving order. Lines before the
/// first heading are dropped, matching the rendering behaviour.
pub fn parse_qna(text: &str) -> Vec<QaPair> {
    let mut pairs: Vec<QaPair> = Vec::new();

    for line in text.lines() {
        if let Some(heading) = line.strip_prefix("###") {
            pairs.push(QaPair {
                question: heading.trim_start().to_string(),
                answer: String::new(),
            });
        } else if let Some(current) = pairs.last_mut() {
            if !current.answer.is_empty() {
                current.answer.push('\n');
            }
            current.answer.push_str(line);
        }
    }

    pairs
}

/// Extract the FHIR references cited in an answer, in order of appearance.
pub fn extract_references(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '/' || c == '-' || c == '.'))
        .filter(|token| token.contains('/'))
        .filter(|token| split_reference(token).is_ok())
        .map(str::to_string)
        .collect()
}

/// Strip bracketed citations (`[Type/id]`) from display text, leaving the
/// prose readable; the references themselves come from
/// [`extract_references`].
pub fn strip_citations(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let (before, from_open) = rest.split_at(open);
        cleaned.push_str(before);

        match from_open.find(']') {
            Some(close) if split_reference(&from_open[1..close]).is_ok() => {
                rest = &from_open[close + 1..];
            }
            _ => {
                cleaned.push('[');
                rest = &from_open[1..];
            }
        }
    }
    cleaned.push_str(rest);
    cleaned.trim().to_string()
}
