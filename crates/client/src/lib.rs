//! HTTP edge of the predictive insights service.
//!
//! Everything that talks to a remote service lives here:
//! - [`gateway`] — the `FhirGateway` trait and its `reqwest` implementation
//! - [`fetch`] — the paginated FHIR resource fetcher
//! - [`ai`] — the AI request client (timeout + bounded retry)
//! - [`store`] — the last-analysis Observation store
//! - [`document`] — DocumentReference content retrieval
//!
//! The FHIR server and the AI backend are opaque remote collaborators; this
//! crate frames requests and normalises transport failures, nothing more.
//! Shape validation of AI replies belongs to `insights-core`.

pub mod ai;
pub mod document;
pub mod fetch;
pub mod gateway;
pub mod store;

pub use ai::AiRequestClient;
pub use fetch::FhirFetcher;
pub use gateway::{FhirGateway, HttpGateway};
pub use store::{LastAnalysisStore, LoadedAnalysis};

/// Errors returned by the HTTP edge.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Failed to fetch {0}.")]
    FetchFailed(String),

    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),

    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
