//! Paginated FHIR resource fetching.
//!
//! Drains a search result's `next` links, re-fetching each entry's
//! `fullUrl` so callers always receive full resource bodies rather than
//! search-result stubs. Within a page those per-entry fetches run
//! concurrently; the assembled sequence keeps the page's entry order
//! because results are collected positionally.

use crate::{ClientError, ClientResult, FhirGateway};
use fhir::Bundle;
use futures::future::join_all;
use serde_json::Value;

/// Fetches a patient's resources of one type, all pages.
pub struct FhirFetcher<'a, G> {
    gateway: &'a G,
    fhir_root: String,
}

impl<'a, G: FhirGateway> FhirFetcher<'a, G> {
    pub fn new(gateway: &'a G, fhir_root: impl Into<String>) -> Self {
        Self {
            gateway,
            fhir_root: fhir_root.into(),
        }
    }

    /// Fetch every `resource_type` resource for `patient_id`.
    ///
    /// Pagination stops once `max_items` resources have accumulated (the
    /// in-flight page is kept whole, so slightly more than `max_items` may
    /// be returned). Any HTTP failure aborts the whole fetch: pages already
    /// fetched are discarded and the caller sees one generic error.
    pub async fn fetch_all(
        &self,
        resource_type: &str,
        patient_id: &str,
        token: &str,
        max_items: Option<usize>,
    ) -> ClientResult<Vec<Value>> {
        self.fetch_inner(resource_type, patient_id, token, max_items)
            .await
            .map_err(|error| {
                tracing::error!(%resource_type, %error, "resource fetch failed");
                ClientError::FetchFailed(resource_type.to_string())
            })
    }

    async fn fetch_inner(
        &self,
        resource_type: &str,
        patient_id: &str,
        token: &str,
        max_items: Option<usize>,
    ) -> ClientResult<Vec<Value>> {
        let cap = max_items.unwrap_or(usize::MAX);
        let mut resources: Vec<Value> = Vec::new();
        let mut next_url = Some(format!(
            "{}/{resource_type}?patient={patient_id}",
            self.fhir_root
        ));

        while let Some(url) = next_url {
            if resources.len() >= cap {
                break;
            }

            let page: Bundle = serde_json::from_value(self.gateway.get_json(&url, token).await?)?;

            let fetches = page.entry.iter().map(|entry| async move {
                match &entry.full_url {
                    Some(full_url) => self.gateway.get_json(full_url, token).await,
                    // Entries without a fullUrl keep their inline body.
                    None => entry
                        .resource
                        .clone()
                        .ok_or_else(|| ClientError::InvalidInput("entry without resource".into())),
                }
            });
            for resolved in join_all(fetches).await {
                resources.push(resolved?);
            }

            if resources.len() >= cap {
                break;
            }
            next_url = page.next_url().map(str::to_string);
        }

        tracing::info!(
            count = resources.len(),
            %resource_type,
            "fetched patient resources"
        );
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory gateway serving canned GET responses and recording every
    /// requested URL.
    struct FakeGateway {
        responses: HashMap<String, Value>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeGateway {
        fn new(responses: Vec<(&str, Value)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(url, value)| (url.to_string(), value))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl FhirGateway for FakeGateway {
        async fn get_json(&self, url: &str, _token: &str) -> ClientResult<Value> {
            self.requested.lock().unwrap().push(url.to_string());
            self.responses.get(url).cloned().ok_or(ClientError::Status {
                status: 404,
                body: format!("no canned response for {url}"),
            })
        }

        async fn post_json(&self, _url: &str, _token: &str, _body: &Value) -> ClientResult<Value> {
            unimplemented!("fetch tests never write")
        }

        async fn put_json(&self, _url: &str, _token: &str, _body: &Value) -> ClientResult<Value> {
            unimplemented!("fetch tests never write")
        }

        async fn get_text(&self, _url: &str) -> ClientResult<(String, String)> {
            unimplemented!("fetch tests never fetch text")
        }
    }

    const ROOT: &str = "https://fhir.example/api/fhir/app";

    fn condition(id: usize) -> Value {
        json!({ "resourceType": "Condition", "id": format!("c{id}") })
    }

    fn page(ids: std::ops::Range<usize>, next: Option<&str>) -> Value {
        let mut link = vec![json!({ "relation": "self", "url": "ignored" })];
        if let Some(next) = next {
            link.push(json!({ "relation": "next", "url": next }));
        }
        json!({
            "resourceType": "Bundle",
            "link": link,
            "entry": ids
                .map(|id| json!({ "fullUrl": format!("{ROOT}/Condition/c{id}") }))
                .collect::<Vec<_>>()
        })
    }

    fn with_resources(mut responses: Vec<(String, Value)>, ids: std::ops::Range<usize>) -> Vec<(String, Value)> {
        for id in ids {
            responses.push((format!("{ROOT}/Condition/c{id}"), condition(id)));
        }
        responses
    }

    #[tokio::test]
    async fn drains_three_pages_in_page_order() {
        let responses = with_resources(
            vec![
                (
                    format!("{ROOT}/Condition?patient=p1"),
                    page(0..2, Some(&format!("{ROOT}/page2"))),
                ),
                (format!("{ROOT}/page2"), page(2..4, Some(&format!("{ROOT}/page3")))),
                (format!("{ROOT}/page3"), page(4..6, None)),
            ],
            0..6,
        );
        let gateway = FakeGateway::new(
            responses.iter().map(|(u, v)| (u.as_str(), v.clone())).collect(),
        );

        let fetcher = FhirFetcher::new(&gateway, ROOT);
        let resources = fetcher
            .fetch_all("Condition", "p1", "tok", None)
            .await
            .expect("fetch");

        let ids: Vec<&str> = resources.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["c0", "c1", "c2", "c3", "c4", "c5"]);
    }

    #[tokio::test]
    async fn max_items_stops_before_next_page() {
        let responses = with_resources(
            vec![
                (
                    format!("{ROOT}/Condition?patient=p1"),
                    page(0..10, Some(&format!("{ROOT}/page2"))),
                ),
                (format!("{ROOT}/page2"), page(10..20, None)),
            ],
            0..10,
        );
        let gateway = FakeGateway::new(
            responses.iter().map(|(u, v)| (u.as_str(), v.clone())).collect(),
        );

        let fetcher = FhirFetcher::new(&gateway, ROOT);
        let resources = fetcher
            .fetch_all("Condition", "p1", "tok", Some(5))
            .await
            .expect("fetch");

        assert!(resources.len() >= 5);
        assert!(!gateway
            .requested()
            .iter()
            .any(|url| url.ends_with("/page2")));
    }

    #[tokio::test]
    async fn entry_without_full_url_keeps_inline_body() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [{ "resource": { "resourceType": "Condition", "id": "inline" } }]
        });
        let url = format!("{ROOT}/Condition?patient=p1");
        let gateway = FakeGateway::new(vec![(url.as_str(), bundle)]);

        let fetcher = FhirFetcher::new(&gateway, ROOT);
        let resources = fetcher
            .fetch_all("Condition", "p1", "tok", None)
            .await
            .expect("fetch");
        assert_eq!(resources[0]["id"], "inline");
    }

    #[tokio::test]
    async fn any_failure_discards_partial_pages() {
        // Page 1 resolves, page 2 is missing from the fake.
        let responses = with_resources(
            vec![(
                format!("{ROOT}/Condition?patient=p1"),
                page(0..2, Some(&format!("{ROOT}/page2"))),
            )],
            0..2,
        );
        let gateway = FakeGateway::new(
            responses.iter().map(|(u, v)| (u.as_str(), v.clone())).collect(),
        );

        let fetcher = FhirFetcher::new(&gateway, ROOT);
        let err = fetcher
            .fetch_all("Condition", "p1", "tok", None)
            .await
            .expect_err("should fail");
        assert_eq!(err.to_string(), "Failed to fetch Condition.");
    }
}
