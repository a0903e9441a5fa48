//! Pagination behavior against a mocked remote.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gdap_migrate::auth::{Credential, CredentialCache, CredentialError, Resource, TokenAcquirer};
use gdap_migrate::http::ApiClient;
use gdap_migrate::paging::PagedFetcher;

struct StaticAcquirer;

#[async_trait]
impl TokenAcquirer for StaticAcquirer {
    async fn acquire(&self, _resource: Resource) -> Result<Credential, CredentialError> {
        Ok(Credential {
            access_token: "test-token".to_string(),
            tenant_id: "partner-tenant".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }
}

fn credentials() -> Arc<CredentialCache> {
    Arc::new(CredentialCache::new(Arc::new(StaticAcquirer)))
}

#[tokio::test]
async fn a_three_page_walk_decodes_every_record_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .and(query_param("PageSize", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.count": 6,
            "value": [{"id": "1"}, {"id": "2"}],
            "@odata.nextLink": format!("{}/v1/items?page=2", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Continuation on a different host: the fetcher must come back to the
    // canonical endpoint, keeping only the continuation's query.
    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "3"}, {"id": "4"}],
            "@odata.nextLink": "https://other-region.example.net/v1/items?page=3",
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "5"}, {"id": "6"}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new();
    let credentials = credentials();
    let fetcher = PagedFetcher::new(&client, &credentials, Resource::PartnerApi);
    let records: Vec<serde_json::Value> = fetcher
        .fetch_all(&format!("{}/v1/items?PageSize=2", server.uri()))
        .await
        .expect("fetch should succeed");

    let ids: Vec<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);
}

#[tokio::test]
async fn a_failing_page_aborts_with_the_decoded_prefix() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .and(query_param("PageSize", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "1"}, {"id": "2"}],
            "@odata.nextLink": format!("{}/v1/items?page=2", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new();
    let credentials = credentials();
    let fetcher = PagedFetcher::new(&client, &credentials, Resource::PartnerApi);
    let failure = fetcher
        .fetch_all::<serde_json::Value>(&format!("{}/v1/items?PageSize=2", server.uri()))
        .await
        .expect_err("second page should fail");

    assert_eq!(failure.pages_fetched, 1);
    assert_eq!(failure.partial.len(), 2);
    let err = failure.into_sync_error().to_string();
    assert!(err.contains("1 page(s)"), "unexpected message: {err}");
    assert!(err.contains("2 record(s)"), "unexpected message: {err}");
}

#[tokio::test]
async fn an_empty_collection_yields_no_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.count": 0,
            "value": [],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new();
    let credentials = credentials();
    let fetcher = PagedFetcher::new(&client, &credentials, Resource::PartnerApi);
    let records: Vec<serde_json::Value> = fetcher
        .fetch_all(&format!("{}/v1/items", server.uri()))
        .await
        .expect("fetch should succeed");
    assert!(records.is_empty());
}
