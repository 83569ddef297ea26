//! The canonical normalised AI output.
//!
//! `StructuredAnalysis` is the JSON shape the model is instructed to return
//! in structured mode. The model does not always comply: sequences it omits
//! deserialise to empty vectors so consumers never see a null, and `accuracy`
//! stays optional because the model sometimes withholds a confidence figure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model-assigned risk band.
///
/// Ordering is `Low < Moderate < High`; trend charts rely on the numeric
/// mapping from [`RiskLevel::value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(alias = "low", alias = "LOW")]
    Low,
    #[serde(alias = "moderate", alias = "MODERATE")]
    Moderate,
    #[serde(alias = "high", alias = "HIGH")]
    High,
}

impl RiskLevel {
    /// Numeric mapping used by chart consumers (Low=1, Moderate=2, High=3).
    pub fn value(self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Moderate => 2,
            RiskLevel::High => 3,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
        };
        f.write_str(label)
    }
}

/// One labelled risk entry, e.g. `{"label": "Cardiovascular Risk", "score": "Moderate"}`.
///
/// Labels are free text; the system does not enforce uniqueness per label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub label: String,
    pub score: RiskLevel,
}

/// A recommended treatment tied to the condition motivating it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    pub treatment: String,
    pub condition: String,
}

/// The structured analysis the model returns when no templated questions
/// drive the prompt.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredAnalysis {
    #[serde(default)]
    pub risk_scores: Vec<RiskScore>,
    #[serde(default)]
    pub recommended_treatments: Vec<Treatment>,
    #[serde(default)]
    pub preventive_measures: Vec<String>,
    /// FHIR references (`ResourceType/id`) the model cited.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub summary_text: String,
    /// Model self-reported confidence in `[0, 1]`. Consumers must null-check
    /// before deriving a percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_explanation: Option<String>,
}

impl StructuredAnalysis {
    /// Render the analysis as the plain-text report consumed by the PDF
    /// exporter. Sections with no data are omitted entirely.
    pub fn to_report_text(&self) -> String {
        let mut output = String::new();

        if !self.summary_text.is_empty() {
            output.push_str(&format!("Summary:\n{}\n\n", self.summary_text));
        }

        if let Some(accuracy) = self.accuracy {
            output.push_str(&format!("Accuracy: {:.0}%\n", accuracy * 100.0));
            if let Some(explanation) = &self.accuracy_explanation {
                output.push_str(&format!("Accuracy Explanation:\n{explanation}\n\n"));
            }
        }

        if !self.risk_scores.is_empty() {
            output.push_str("Risk Scores:\n");
            for risk in &self.risk_scores {
                output.push_str(&format!("- {}: {}\n", risk.label, risk.score));
            }
            output.push('\n');
        }

        if !self.recommended_treatments.is_empty() {
            output.push_str("Recommended Treatments:\n");
            for treatment in &self.recommended_treatments {
                output.push_str(&format!(
                    "- {} ({})\n",
                    treatment.treatment, treatment.condition
                ));
            }
            output.push('\n');
        }

        if !self.preventive_measures.is_empty() {
            output.push_str("Preventive Measures:\n");
            for measure in &self.preventive_measures {
                output.push_str(&format!("- {measure}\n"));
            }
            output.push('\n');
        }

        if !self.sources.is_empty() {
            output.push_str("FHIR Sources:\n");
            for source in &self.sources {
                output.push_str(&format!("- {source}\n"));
            }
            output.push('\n');
        }

        output.trim_end().to_string()
    }
}
