//! FHIR literal references (`ResourceType/id`).

use crate::{FhirError, FhirResult};
use serde::{Deserialize, Serialize};

/// A literal FHIR reference, e.g. `Patient/123` or `Condition/abc-def`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub reference: String,
}

impl Reference {
    /// Build a `Patient/<id>` reference.
    pub fn patient(id: &str) -> Self {
        Self {
            reference: format!("Patient/{id}"),
        }
    }
}

/// Split a `ResourceType/id` string into its two halves.
///
/// Accepts the `ResourceType/id` shape the AI is instructed to cite.
/// Anything else (absolute URLs, contained `#` references) is rejected.
pub fn split_reference(reference: &str) -> FhirResult<(&str, &str)> {
    let mut parts = reference.splitn(2, '/');
    let resource_type = parts.next().unwrap_or_default();
    let id = parts.next().unwrap_or_default();

    let type_ok = !resource_type.is_empty()
        && resource_type.chars().all(|c| c.is_ascii_alphabetic());
    let id_ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');

    if !type_ok || !id_ok {
        return Err(FhirError::InvalidReference(reference.to_string()));
    }

    Ok((resource_type, id))
}
