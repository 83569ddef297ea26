//! FHIR wire/boundary support for the predictive insights service.
//!
//! This crate provides **wire models** and **translation helpers** for the FHIR
//! REST resources the service exchanges with the upstream FHIR server:
//! - search result `Bundle`s (including pagination links)
//! - the `Observation` side-channel used to persist the last AI analysis
//! - the `Patient` and `DocumentReference` subsets the dashboard consumes
//!
//! This crate focuses on:
//! - FHIR semantic alignment over JSON/REST transport
//! - serialisation/deserialisation
//! - the `ai-analysis` coding constants shared by the store and the CDS hook
//!
//! Deserialisation is deliberately lenient: resources arrive from an external
//! server and frequently carry fields we do not model. Unknown fields are
//! ignored rather than rejected.

pub mod bundle;
pub mod document;
pub mod observation;
pub mod patient;
pub mod reference;

pub use bundle::{Bundle, BundleEntry, BundleLink};
pub use document::{Attachment, DocumentContent, DocumentReference};
pub use observation::{
    last_analysis_observation, CodeableConcept, Coding, Observation, ObservationComponent,
    AI_ANALYSIS_SYSTEM, CODE_ANALYSIS_JSON, CODE_LAST_ANALYSIS,
};
pub use patient::{HumanName, Patient};
pub use reference::Reference;

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("invalid base64 attachment: {0}")]
    InvalidAttachment(#[from] base64::DecodeError),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
