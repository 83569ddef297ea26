//! The last-analysis Observation store.
//!
//! Persists the most recent AI analysis per patient as a FHIR Observation
//! side-channel, and loads it back on dashboard startup. Writes follow a
//! search-before-write protocol so a patient keeps a single Observation:
//! find the existing record and PUT an update preserving its id, or POST a
//! new one. The protocol is not transactional; concurrent writers race to
//! last-write-wins.

use crate::{ClientResult, FhirGateway};
use fhir::{
    last_analysis_observation, Bundle, Observation, AI_ANALYSIS_SYSTEM, CODE_LAST_ANALYSIS,
};
use serde_json::Value;

/// The payload loaded back from the store.
///
/// `structured` carries the parsed JSON when the persisted payload was valid
/// JSON; otherwise the raw text lands in `content`. Both `None` means no
/// prior analysis exists (or the read failed — callers treat those alike).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedAnalysis {
    pub content: Option<String>,
    pub structured: Option<Value>,
}

pub struct LastAnalysisStore<'a, G> {
    gateway: &'a G,
    fhir_root: String,
}

impl<'a, G: FhirGateway> LastAnalysisStore<'a, G> {
    pub fn new(gateway: &'a G, fhir_root: impl Into<String>) -> Self {
        Self {
            gateway,
            fhir_root: fhir_root.into(),
        }
    }

    /// Persist `payload` as the patient's last analysis, dated `date`
    /// (`YYYY-MM-DD`).
    ///
    /// Callers on the analysis flow treat this as fire-and-forget: failures
    /// are logged by the caller, never surfaced into the flow that produced
    /// the analysis.
    pub async fn persist(
        &self,
        patient_id: &str,
        token: &str,
        date: &str,
        payload: &str,
    ) -> ClientResult<()> {
        let search_url = format!(
            "{}/Observation?subject=Patient/{patient_id}&code={AI_ANALYSIS_SYSTEM}|{CODE_LAST_ANALYSIS}",
            self.fhir_root
        );
        let bundle: Bundle = serde_json::from_value(self.gateway.get_json(&search_url, token).await?)?;

        let existing_id = bundle
            .first_resource()
            .and_then(|resource| serde_json::from_value::<Observation>(resource.clone()).ok())
            .and_then(|observation| observation.id);

        let observation = last_analysis_observation(patient_id, date, payload, existing_id.clone());
        let body = serde_json::to_value(&observation)?;

        match existing_id {
            Some(id) => {
                let url = format!("{}/Observation/{id}", self.fhir_root);
                self.gateway.put_json(&url, token, &body).await?;
                tracing::info!(%patient_id, observation_id = %id, "updated last-analysis observation");
            }
            None => {
                let url = format!("{}/Observation", self.fhir_root);
                self.gateway.post_json(&url, token, &body).await?;
                tracing::info!(%patient_id, "created last-analysis observation");
            }
        }
        Ok(())
    }

    /// Load the patient's most recent analysis.
    ///
    /// Read failures are logged and reported as "no prior analysis"; the
    /// dashboard treats both identically.
    pub async fn load(&self, token: &str, patient_id: &str) -> LoadedAnalysis {
        match self.load_inner(token, patient_id).await {
            Ok(loaded) => loaded,
            Err(error) => {
                tracing::error!(%patient_id, %error, "failed to load last analysis");
                LoadedAnalysis::default()
            }
        }
    }

    async fn load_inner(&self, token: &str, patient_id: &str) -> ClientResult<LoadedAnalysis> {
        let url = format!(
            "{}/Observation?patient={patient_id}&code={AI_ANALYSIS_SYSTEM}|{CODE_LAST_ANALYSIS}&_sort=-date&_count=1",
            self.fhir_root
        );
        let bundle: Bundle = serde_json::from_value(self.gateway.get_json(&url, token).await?)?;

        let Some(resource) = bundle.first_resource() else {
            return Ok(LoadedAnalysis::default());
        };
        let observation: Observation = serde_json::from_value(resource.clone())?;

        if let Some(payload) = observation.analysis_payload() {
            return Ok(classify(payload));
        }

        // Legacy records: top-level valueString or base64 attachment.
        match observation.legacy_payload()? {
            Some(payload) => Ok(classify(&payload)),
            None => Ok(LoadedAnalysis::default()),
        }
    }
}

fn classify(payload: &str) -> LoadedAnalysis {
    match serde_json::from_str::<Value>(payload) {
        Ok(structured) => LoadedAnalysis {
            content: None,
            structured: Some(structured),
        },
        Err(_) => LoadedAnalysis {
            content: Some(payload.to_string()),
            structured: None,
        },
    }
}
