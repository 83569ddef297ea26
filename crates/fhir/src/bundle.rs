//! FHIR search result bundles.
//!
//! Search responses carry their entries as raw JSON values: the fetcher works
//! across many resource types, and callers that need a typed view (for example
//! the last-analysis store reading an `Observation`) deserialise the value
//! they select.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A pagination (or self) link on a search result bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

/// One entry of a search result bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
}

/// A FHIR `searchset` bundle, as returned by `GET <base>/<Type>?patient=...`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default = "Bundle::resource_type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<BundleLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    fn resource_type() -> String {
        "Bundle".to_string()
    }

    /// URL of the next page, if the server reports one.
    pub fn next_url(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|link| link.relation == "next")
            .map(|link| link.url.as_str())
    }

    /// The first entry's resource, if any. Used by `_count=1` searches.
    pub fn first_resource(&self) -> Option<&Value> {
        self.entry.first().and_then(|entry| entry.resource.as_ref())
    }

    /// Iterate over all entry resources, skipping entries without one.
    pub fn resources(&self) -> impl Iterator<Item = &Value> {
        self.entry.iter().filter_map(|entry| entry.resource.as_ref())
    }
}
