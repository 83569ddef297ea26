//! DocumentReference subset for document analysis.
//!
//! A document's text either rides inline as base64 `attachment.data` or sits
//! behind `attachment.url`; the client decides which round-trip to make.

use crate::{FhirError, FhirResult};
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Attachment {
    /// Decode inline base64 data, if present.
    pub fn decoded_data(&self) -> FhirResult<Option<String>> {
        match &self.data {
            Some(data) => {
                let bytes = base64::engine::general_purpose::STANDARD.decode(data)?;
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
            None => Ok(None),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocumentContent {
    #[serde(default)]
    pub attachment: Attachment,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReference {
    #[serde(default = "DocumentReference::resource_type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<DocumentContent>,
}

impl DocumentReference {
    fn resource_type() -> String {
        "DocumentReference".to_string()
    }

    /// The first attachment, which is the one the service analyses.
    pub fn primary_attachment(&self) -> FhirResult<&Attachment> {
        self.content
            .first()
            .map(|content| &content.attachment)
            .ok_or_else(|| {
                FhirError::InvalidInput("DocumentReference has no content attachment".into())
            })
    }
}
