//! Paginated collection fetching.
//!
//! The partner administration and graph APIs both answer collection GETs with
//! a JSON envelope: annotation properties (names starting with `@`) carry
//! paging metadata, every other property carries record payload. A
//! continuation link is any property whose name contains `nextLink`; the
//! remote sometimes issues continuations against a different host than the
//! one configured, so continuations are rewritten onto the canonical base
//! keeping only their query string.

use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::auth::{CredentialCache, CredentialError, Resource};
use crate::error::SyncError;
use crate::http::{ApiClient, ApiError};

/// Why a paginated fetch stopped early.
#[derive(Debug)]
pub enum FetchErrorKind {
    Credential(CredentialError),
    Api(ApiError),
    /// The remote issued a continuation link that is not a URL.
    Continuation(url::ParseError),
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credential(err) => err.fmt(f),
            Self::Api(err) => err.fmt(f),
            Self::Continuation(err) => write!(f, "unusable continuation link: {err}"),
        }
    }
}

/// A failed fetch, carrying everything decoded before the failing page.
#[derive(Debug)]
pub struct FetchFailure<T> {
    pub partial: Vec<T>,
    pub pages_fetched: usize,
    pub source: FetchErrorKind,
}

impl<T> FetchFailure<T> {
    /// Fold into the operation-level error, discarding the partial prefix.
    pub fn into_sync_error(self) -> SyncError {
        match self.source {
            FetchErrorKind::Credential(err) => SyncError::Credential(err),
            FetchErrorKind::Api(err) => SyncError::Fetch {
                pages_fetched: self.pages_fetched,
                records_decoded: self.partial.len(),
                source: err,
            },
            FetchErrorKind::Continuation(err) => SyncError::Fetch {
                pages_fetched: self.pages_fetched,
                records_decoded: self.partial.len(),
                source: ApiError::Decode(serde_json::Error::io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    err.to_string(),
                ))),
            },
        }
    }
}

/// Walks a paginated collection to completion, one page in flight at a time.
pub struct PagedFetcher<'a> {
    client: &'a ApiClient,
    credentials: &'a CredentialCache,
    resource: Resource,
}

impl<'a> PagedFetcher<'a> {
    pub fn new(client: &'a ApiClient, credentials: &'a CredentialCache, resource: Resource) -> Self {
        Self {
            client,
            credentials,
            resource,
        }
    }

    /// Fetch every page starting at `first_url` and decode the concatenated
    /// payload. A credential is taken from the cache before each page so a
    /// long walk survives credential expiry.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        first_url: &str,
    ) -> Result<Vec<T>, FetchFailure<T>> {
        let mut records: Vec<T> = Vec::new();
        let mut pages_fetched = 0usize;

        let canonical = match Url::parse(first_url) {
            Ok(url) => url,
            Err(err) => {
                return Err(FetchFailure {
                    partial: records,
                    pages_fetched,
                    source: FetchErrorKind::Continuation(err),
                })
            }
        };
        let mut next_url = canonical.clone();

        loop {
            let credential = match self.credentials.acquire(self.resource).await {
                Ok(credential) => credential,
                Err(err) => {
                    return Err(FetchFailure {
                        partial: records,
                        pages_fetched,
                        source: FetchErrorKind::Credential(err),
                    })
                }
            };

            let started = std::time::Instant::now();
            let envelope = match self
                .client
                .get_json(next_url.as_str(), &credential.access_token)
                .await
            {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(
                        url = %next_url,
                        pages_fetched,
                        records_decoded = records.len(),
                        "page fetch failed"
                    );
                    return Err(FetchFailure {
                        partial: records,
                        pages_fetched,
                        source: FetchErrorKind::Api(err),
                    });
                }
            };
            pages_fetched += 1;
            counter!("paged_fetch_pages_total", "resource" => self.resource.as_str())
                .increment(1);
            histogram!("paged_fetch_page_duration_seconds")
                .record(started.elapsed().as_secs_f64());

            let page_records = match decode_payload::<T>(&envelope) {
                Ok(page_records) => page_records,
                Err(err) => {
                    return Err(FetchFailure {
                        partial: records,
                        pages_fetched,
                        source: FetchErrorKind::Api(ApiError::Decode(err)),
                    })
                }
            };
            debug!(page = pages_fetched, records = page_records.len(), "decoded page");
            records.extend(page_records);

            match continuation_link(&envelope) {
                Some(link) => match rewrite_continuation(&canonical, link) {
                    Ok(url) => next_url = url,
                    Err(err) => {
                        return Err(FetchFailure {
                            partial: records,
                            pages_fetched,
                            source: FetchErrorKind::Continuation(err),
                        })
                    }
                },
                None => return Ok(records),
            }
        }
    }
}

/// Decode the record payload of one envelope: every non-annotation property,
/// flattened. Array values contribute their elements, object values
/// contribute themselves, scalars are metadata and are skipped.
pub fn decode_payload<T: DeserializeOwned>(envelope: &Value) -> Result<Vec<T>, serde_json::Error> {
    let mut records = Vec::new();
    let Some(object) = envelope.as_object() else {
        return Ok(records);
    };
    for (name, value) in object {
        if name.starts_with('@') {
            continue;
        }
        match value {
            Value::Array(elements) => {
                for element in elements {
                    records.push(serde_json::from_value(element.clone())?);
                }
            }
            Value::Object(_) => records.push(serde_json::from_value(value.clone())?),
            _ => {}
        }
    }
    Ok(records)
}

/// First property whose name contains `nextLink` and holds a non-empty
/// string.
pub fn continuation_link(envelope: &Value) -> Option<&str> {
    let object = envelope.as_object()?;
    object
        .iter()
        .filter(|(name, _)| name.contains("nextLink"))
        .filter_map(|(_, value)| value.as_str())
        .find(|link| !link.is_empty())
}

/// Rebase a continuation onto the canonical endpoint, keeping only the
/// continuation's query string.
pub fn rewrite_continuation(canonical: &Url, link: &str) -> Result<Url, url::ParseError> {
    let link = Url::parse(link)?;
    let mut rewritten = canonical.clone();
    rewritten.set_query(link.query());
    Ok(rewritten)
}
