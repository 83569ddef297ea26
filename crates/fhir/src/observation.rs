//! The `Observation` side-channel that persists the last AI analysis.
//!
//! One Observation per patient is expected, coded
//! `{AI_ANALYSIS_SYSTEM}|ai-last-analysis`. Its top-level `valueDateTime`
//! records the "last analyzed" date and a single `analysis-json` component
//! carries the serialised analysis payload as a `valueString`.
//!
//! Older records wrote the payload to the top-level `valueString` or as a
//! base64 `valueAttachment`; readers still honour both.

use crate::reference::Reference;
use crate::FhirResult;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Coding system owning the AI-analysis codes.
pub const AI_ANALYSIS_SYSTEM: &str = "http://example.org/fhir/CodeSystem/ai-analysis";
/// Top-level code of the last-analysis Observation.
pub const CODE_LAST_ANALYSIS: &str = "ai-last-analysis";
/// Component code carrying the serialised analysis payload.
pub const CODE_ANALYSIS_JSON: &str = "analysis-json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// Whether any coding carries the given code.
    pub fn has_code(&self, code: &str) -> bool {
        self.coding.iter().any(|coding| coding.code == code)
    }

    fn ai_analysis(code: &str, display: &str) -> Self {
        Self {
            coding: vec![Coding {
                system: Some(AI_ANALYSIS_SYSTEM.to_string()),
                code: code.to_string(),
                display: Some(display.to_string()),
            }],
            text: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationComponent {
    pub code: CodeableConcept,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationAttachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default = "Observation::resource_type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub code: CodeableConcept,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_attachment: Option<ObservationAttachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component: Vec<ObservationComponent>,
}

impl Observation {
    fn resource_type() -> String {
        "Observation".to_string()
    }

    /// Whether this Observation is the AI last-analysis record.
    pub fn is_last_analysis(&self) -> bool {
        self.code.has_code(CODE_LAST_ANALYSIS)
    }

    /// The `analysis-json` component payload, if present.
    pub fn analysis_payload(&self) -> Option<&str> {
        self.component
            .iter()
            .find(|component| component.code.has_code(CODE_ANALYSIS_JSON))
            .and_then(|component| component.value_string.as_deref())
    }

    /// The date to treat as "last analyzed": `valueDateTime`, falling back
    /// to `effectiveDateTime`.
    pub fn analysis_date(&self) -> Option<&str> {
        self.value_date_time
            .as_deref()
            .or(self.effective_date_time.as_deref())
    }

    /// Legacy payload locations: top-level `valueString`, then a base64
    /// `valueAttachment`.
    pub fn legacy_payload(&self) -> FhirResult<Option<String>> {
        if let Some(value) = &self.value_string {
            return Ok(Some(value.clone()));
        }
        if let Some(data) = self
            .value_attachment
            .as_ref()
            .and_then(|attachment| attachment.data.as_deref())
        {
            let decoded = base64::engine::general_purpose::STANDARD.decode(data)?;
            return Ok(Some(String::from_utf8_lossy(&decoded).into_owned()));
        }
        Ok(None)
    }
}

/// Build the last-analysis Observation for a patient.
///
/// `id` is `Some` when updating an existing record (PUT) and `None` when
/// creating a new one (POST); the store decides which by searching first.
pub fn last_analysis_observation(
    patient_id: &str,
    date: &str,
    payload: &str,
    id: Option<String>,
) -> Observation {
    Observation {
        resource_type: "Observation".to_string(),
        id,
        status: "final".to_string(),
        code: CodeableConcept::ai_analysis(CODE_LAST_ANALYSIS, "Last AI Analysis Date"),
        subject: Some(Reference::patient(patient_id)),
        effective_date_time: Some(date.to_string()),
        value_date_time: Some(date.to_string()),
        value_string: None,
        value_attachment: None,
        component: vec![ObservationComponent {
            code: CodeableConcept::ai_analysis(CODE_ANALYSIS_JSON, "AI Analysis Data"),
            value_string: Some(payload.to_string()),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_component_and_dates() {
        let obs = last_analysis_observation("p1", "2026-08-27", "{\"summaryText\":\"ok\"}", None);
        assert!(obs.is_last_analysis());
        assert_eq!(obs.analysis_date(), Some("2026-08-27"));
        assert_eq!(obs.analysis_payload(), Some("{\"summaryText\":\"ok\"}"));
        assert_eq!(obs.subject.as_ref().unwrap().reference, "Patient/p1");
        assert!(obs.id.is_none());
    }

    #[test]
    fn update_preserves_id() {
        let obs = last_analysis_observation("p1", "2026-08-27", "x", Some("obs-9".into()));
        assert_eq!(obs.id.as_deref(), Some("obs-9"));
    }

    #[test]
    fn wire_shape_round_trips() {
        let obs = last_analysis_observation("p1", "2026-08-27", "payload", None);
        let json = serde_json::to_value(&obs).expect("serialise");
        assert_eq!(json["resourceType"], "Observation");
        assert_eq!(json["valueDateTime"], "2026-08-27");
        assert_eq!(json["component"][0]["valueString"], "payload");
        assert_eq!(
            json["component"][0]["code"]["coding"][0]["code"],
            CODE_ANALYSIS_JSON
        );

        let back: Observation = serde_json::from_value(json).expect("reparse");
        assert_eq!(back.analysis_payload(), Some("payload"));
    }

    #[test]
    fn analysis_date_falls_back_to_effective() {
        let obs: Observation = serde_json::from_value(serde_json::json!({
            "resourceType": "Observation",
            "status": "final",
            "effectiveDateTime": "2026-01-05"
        }))
        .expect("parse");
        assert_eq!(obs.analysis_date(), Some("2026-01-05"));
    }

    #[test]
    fn legacy_attachment_decodes() {
        let obs: Observation = serde_json::from_value(serde_json::json!({
            "resourceType": "Observation",
            "status": "final",
            "valueAttachment": { "contentType": "application/json", "data": "eyJhIjoxfQ==" }
        }))
        .expect("parse");
        assert_eq!(obs.legacy_payload().expect("decode").as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn no_component_means_no_payload() {
        let obs: Observation = serde_json::from_value(serde_json::json!({
            "resourceType": "Observation",
            "status": "final"
        }))
        .expect("parse");
        assert!(obs.analysis_payload().is_none());
        assert!(obs.legacy_payload().expect("decode").is_none());
    }
}
