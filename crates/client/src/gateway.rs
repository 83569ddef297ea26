//! The FHIR transport seam.
//!
//! The fetcher and the store speak to the FHIR server through this trait so
//! tests can substitute an in-memory fake; production code uses
//! [`HttpGateway`] over `reqwest`.

use crate::{ClientError, ClientResult};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Bearer-authenticated JSON transport to the FHIR server.
pub trait FhirGateway: Send + Sync {
    /// GET a JSON body.
    fn get_json(
        &self,
        url: &str,
        token: &str,
    ) -> impl Future<Output = ClientResult<Value>> + Send;

    /// POST a FHIR JSON body (resource create).
    fn post_json(
        &self,
        url: &str,
        token: &str,
        body: &Value,
    ) -> impl Future<Output = ClientResult<Value>> + Send;

    /// PUT a FHIR JSON body (resource update).
    fn put_json(
        &self,
        url: &str,
        token: &str,
        body: &Value,
    ) -> impl Future<Output = ClientResult<Value>> + Send;

    /// GET a plain body (document attachments), returning
    /// `(content_type, body)`. Unauthenticated: attachment URLs are
    /// pre-signed by the FHIR server.
    fn get_text(&self, url: &str)
        -> impl Future<Output = ClientResult<(String, String)>> + Send;
}

/// `reqwest`-backed gateway.
#[derive(Clone, Debug)]
pub struct HttpGateway {
    http: reqwest::Client,
}

impl HttpGateway {
    /// Build a gateway with sane connection limits.
    pub fn new() -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http })
    }

    async fn expect_json(response: reqwest::Response) -> ClientResult<Value> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }
        Ok(response.json().await?)
    }
}

impl FhirGateway for HttpGateway {
    async fn get_json(&self, url: &str, token: &str) -> ClientResult<Value> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/fhir+json")
            .send()
            .await?;
        Self::expect_json(response).await
    }

    async fn post_json(&self, url: &str, token: &str, body: &Value) -> ClientResult<Value> {
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/fhir+json")
            .json(body)
            .send()
            .await?;
        Self::expect_json(response).await
    }

    async fn put_json(&self, url: &str, token: &str, body: &Value) -> ClientResult<Value> {
        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/fhir+json")
            .json(body)
            .send()
            .await?;
        Self::expect_json(response).await
    }

    async fn get_text(&self, url: &str) -> ClientResult<(String, String)> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response.text().await?;
        Ok((content_type, body))
    }
}
