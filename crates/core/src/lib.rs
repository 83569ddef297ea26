//! # Insights Core
//!
//! Core business logic for the predictive insights service.
//!
//! This crate contains the AI-analysis pipeline with no HTTP concerns:
//! - prompt construction (structured JSON mode and templated Q&A mode)
//! - normalisation of heterogeneous model output into a tagged outcome
//! - the bounded validation retry loop around an [`AnalysisBackend`]
//! - CDS card generation from prefetched FHIR resources
//! - templated question import
//!
//! **No API concerns**: HTTP transport lives in `insights-client`, the REST
//! surface in `api-rest`.

pub mod analysis;
pub mod cards;
pub mod config;
pub mod error;
pub mod normalize;
pub mod prompt;
pub mod qna;
pub mod questions;
pub mod queue;

pub use analysis::{RiskLevel, RiskScore, StructuredAnalysis, Treatment};
pub use cards::{Card, CardCache, Indicator};
pub use config::CoreConfig;
pub use error::{AnalysisError, AnalysisResult};
pub use normalize::AnalysisOutcome;
pub use queue::{run_analysis, AnalysisBackend, AnalysisRequest, AnalysisSettings, CancelFlag};
