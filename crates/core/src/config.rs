//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process
//! startup and then passed into services. The intent is to avoid reading
//! process-wide environment variables during request handling, which can lead
//! to inconsistent behaviour in multi-threaded runtimes and test harnesses.

use crate::{AnalysisError, AnalysisResult};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    fhir_base_url: String,
    app_id: String,
    ai_backend_url: String,
    ai_backend_token: Option<String>,
    launch_url: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// The FHIR base URL, tenant/app id and AI backend URL are required for
    /// every external call; their absence is a startup error, not something
    /// request handlers should discover later.
    pub fn new(
        fhir_base_url: String,
        app_id: String,
        ai_backend_url: String,
        ai_backend_token: Option<String>,
        launch_url: String,
    ) -> AnalysisResult<Self> {
        for (name, value) in [
            ("fhir_base_url", &fhir_base_url),
            ("app_id", &app_id),
            ("ai_backend_url", &ai_backend_url),
        ] {
            if value.trim().is_empty() {
                return Err(AnalysisError::InvalidInput(format!(
                    "{name} cannot be empty"
                )));
            }
        }

        Ok(Self {
            fhir_base_url: fhir_base_url.trim_end_matches('/').to_string(),
            app_id,
            ai_backend_url,
            ai_backend_token,
            launch_url,
        })
    }

    /// The tenant-scoped FHIR API root, e.g.
    /// `https://app.meldrx.com/api/fhir/<app-id>`.
    pub fn fhir_root(&self) -> String {
        format!("{}/{}", self.fhir_base_url, self.app_id)
    }

    pub fn ai_backend_url(&self) -> &str {
        &self.ai_backend_url
    }

    pub fn ai_backend_token(&self) -> Option<&str> {
        self.ai_backend_token.as_deref()
    }

    /// SMART launch URL advertised on CDS cards.
    pub fn launch_url(&self) -> &str {
        &self.launch_url
    }
}
