//! DocumentReference content retrieval.
//!
//! A document's text either rides inline as base64 attachment data or sits
//! behind an attachment URL that needs one more round-trip. Either way the
//! caller receives `(content_type, content)` ready for the document prompt.

use crate::{ClientError, ClientResult, FhirGateway};
use fhir::DocumentReference;

/// Resolve the analysable content of a document.
pub async fn document_content<G: FhirGateway>(
    gateway: &G,
    document: &DocumentReference,
) -> ClientResult<(String, String)> {
    let attachment = document.primary_attachment()?;
    let content_type = attachment
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());

    if let Some(content) = attachment.decoded_data()? {
        return Ok((content_type, content));
    }

    match &attachment.url {
        Some(url) => gateway.get_text(url).await,
        None => Err(ClientError::InvalidInput(
            "No content URL found in DocumentReference".into(),
        )),
    }
}
