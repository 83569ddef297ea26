//! CDS Hooks card generation.
//!
//! Pure logic over prefetched resources: the REST layer hands in the
//! `prefetch.patient` and `prefetch.observations` bodies and gets cards
//! back. De-duplication is scoped to a per-request [`CardCache`] passed by
//! the caller, never process-wide state.

use crate::analysis::{RiskLevel, StructuredAnalysis};
use fhir::{Bundle, Observation, Patient};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;

/// Card urgency, per the CDS Hooks card contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    Info,
    Warning,
    Critical,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardSource {
    pub label: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardLink {
    pub label: String,
    pub url: String,
    #[serde(rename = "type")]
    pub link_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Card {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub indicator: Indicator,
    pub source: CardSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<CardLink>,
}

const SOURCE_LABEL: &str = "AI Predictive Service";

/// Per-request de-duplication of cards by summary text.
#[derive(Debug, Default)]
pub struct CardCache {
    seen: HashSet<String>,
}

impl CardCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a card unless one with the same summary was already emitted in
    /// this request.
    pub fn push(&mut self, cards: &mut Vec<Card>, card: Card) {
        if self.seen.insert(card.summary.clone()) {
            cards.push(card);
        }
    }
}

/// Build the card set for a `patient-view` hook invocation.
///
/// The main card cites the most recent `ai-last-analysis` date if one
/// exists; each Moderate/High risk in its `analysis-json` component earns an
/// additional card (`warning` resp. `critical`).
pub fn build_cards(
    patient: &Patient,
    observations: Option<&Bundle>,
    launch_url: &str,
    cache: &mut CardCache,
) -> Vec<Card> {
    let patient_name = patient.display_name();
    let most_recent = observations.and_then(most_recent_analysis);

    let last_analyzed = most_recent
        .as_ref()
        .and_then(|obs| obs.analysis_date())
        .map(str::to_string);

    let mut cards = Vec::new();

    let summary = match &last_analyzed {
        Some(date) => format!("AI insights available for {patient_name} - Last analyzed {date}"),
        None => format!("AI insights unavailable for {patient_name} - Launch app to get started"),
    };
    cache.push(
        &mut cards,
        Card {
            summary,
            detail: None,
            indicator: if last_analyzed.is_some() {
                Indicator::Info
            } else {
                Indicator::Warning
            },
            source: CardSource {
                label: SOURCE_LABEL.to_string(),
            },
            links: vec![CardLink {
                label: "Get AI Insights".to_string(),
                url: launch_url.to_string(),
                link_type: "smart".to_string(),
            }],
        },
    );

    let analysis = most_recent
        .as_ref()
        .and_then(|obs| obs.analysis_payload())
        .and_then(|payload| serde_json::from_str::<StructuredAnalysis>(payload).ok());

    if let Some(analysis) = analysis {
        for risk in &analysis.risk_scores {
            if risk.score < RiskLevel::Moderate {
                continue;
            }
            let indicator = if risk.score == RiskLevel::High {
                Indicator::Critical
            } else {
                Indicator::Warning
            };
            cache.push(
                &mut cards,
                Card {
                    summary: format!("Risk identified: {} ({})", risk.label, risk.score),
                    detail: Some(format!(
                        "AI identified a {} risk for {}. Consider reviewing recent clinical data or initiating appropriate interventions.",
                        risk.score.to_string().to_lowercase(),
                        risk.label
                    )),
                    indicator,
                    source: CardSource {
                        label: SOURCE_LABEL.to_string(),
                    },
                    links: Vec::new(),
                },
            );
        }
    }

    cards
}

/// The most recent `ai-last-analysis` Observation in a prefetch bundle,
/// by `valueDateTime` (falling back to `effectiveDateTime`) descending.
fn most_recent_analysis(bundle: &Bundle) -> Option<Observation> {
    let mut analyses: Vec<Observation> = bundle
        .resources()
        .filter_map(|resource| serde_json::from_value(resource.clone()).ok())
        .filter(Observation::is_last_analysis)
        .collect();

    analyses.sort_by(|a, b| {
        b.analysis_date()
            .unwrap_or_default()
            .cmp(a.analysis_date().unwrap_or_default())
    });

    analyses.into_iter().next()
}

/// The CDS Hooks service discovery document (`GET /cds-services`).
pub fn discovery_document() -> serde_json::Value {
    json!({
        "services": [
            {
                "hook": "patient-view",
                "title": "Predictive AI Service",
                "description": "Provides AI-powered queue optimization, preventive care, and cost reduction analysis.",
                "id": "0001",
                "prefetch": {
                    "patient": "Patient/{{context.patientId}}",
                    "conditions": "Condition?patient={{context.patientId}}",
                    "observations": "Observation?patient={{context.patientId}}",
                    "medications": "MedicationRequest?patient={{context.patientId}}",
                    "procedures": "Procedure?patient={{context.patientId}}",
                    "claims": "Claim?patient={{context.patientId}}"
                }
            }
        ]
    })
}
