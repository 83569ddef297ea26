//! Patient demographics subset.
//!
//! Only the fields the dashboard and CDS cards actually read. The upstream
//! server sends far more; unknown fields are ignored.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub given: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(default = "Patient::resource_type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
}

impl Patient {
    fn resource_type() -> String {
        "Patient".to_string()
    }

    /// `"<first given> <family>"` from the primary name, trimmed.
    ///
    /// Empty when the patient carries no usable name, which the CDS card
    /// text tolerates.
    pub fn display_name(&self) -> String {
        let Some(name) = self.name.first() else {
            return String::new();
        };
        let given = name.given.first().map(String::as_str).unwrap_or_default();
        let family = name.family.as_deref().unwrap_or_default();
        format!("{given} {family}").trim().to_string()
    }
}
