//! HTTP client for the upstream system of record.

use super::{DataSourceError, SourceLoan, SourceOfRecord, SourceRecord, SourceRepayment};
use crate::domain::{CustomerInput, OfficerInput};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Source of record served over a JSON HTTP API.
///
/// Endpoints (all `GET`, each returning a JSON array):
/// - `{base}/customers?offset=&limit=`
/// - `{base}/officers?offset=&limit=`
/// - `{base}/loans?offset=&limit=`
/// - `{base}/repayments?after_id=&limit=`
/// - `{base}/loans/{loan_id}/repayments`
#[derive(Debug, Clone)]
pub struct HttpSourceOfRecord {
    client: Client,
    base_url: String,
    max_elapsed: Duration,
}

impl HttpSourceOfRecord {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_elapsed: Duration::from_secs(30),
        }
    }

    /// Cap on total time spent retrying one request.
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        id_field: &str,
    ) -> Result<Vec<SourceRecord<T>>, DataSourceError> {
        let url = format!("{}{}", self.base_url, path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        let body = retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .query(query)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response.text().await.map_err(|e| {
                backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
            })
        })
        .await?;

        parse_page(&body, id_field)
    }
}

/// Decode a response body. The body must be a JSON array; each element is
/// decoded on its own.
fn parse_page<T: DeserializeOwned>(
    body: &str,
    id_field: &str,
) -> Result<Vec<SourceRecord<T>>, DataSourceError> {
    let elements: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| DataSourceError::ParseError(e.to_string()))?;
    Ok(elements
        .into_iter()
        .map(|element| SourceRecord::decode(element, id_field))
        .collect())
}

#[async_trait]
impl SourceOfRecord for HttpSourceOfRecord {
    async fn fetch_customers(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<CustomerInput>>, DataSourceError> {
        debug!(offset, limit, "Fetching customers");
        self.get_page(
            "/customers",
            &[("offset", offset.to_string()), ("limit", limit.to_string())],
            "customer_id",
        )
        .await
    }

    async fn fetch_officers(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<OfficerInput>>, DataSourceError> {
        debug!(offset, limit, "Fetching officers");
        self.get_page(
            "/officers",
            &[("offset", offset.to_string()), ("limit", limit.to_string())],
            "officer_id",
        )
        .await
    }

    async fn fetch_loans(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<SourceLoan>>, DataSourceError> {
        debug!(offset, limit, "Fetching loans");
        self.get_page(
            "/loans",
            &[("offset", offset.to_string()), ("limit", limit.to_string())],
            "loan_id",
        )
        .await
    }

    async fn fetch_repayments_after(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<SourceRecord<SourceRepayment>>, DataSourceError> {
        debug!(after_id, limit, "Fetching repayments");
        self.get_page(
            "/repayments",
            &[("after_id", after_id.to_string()), ("limit", limit.to_string())],
            "id",
        )
        .await
    }

    async fn fetch_loan_repayments(
        &self,
        loan_id: &str,
    ) -> Result<Vec<SourceRecord<SourceRepayment>>, DataSourceError> {
        debug!(loan_id = %loan_id, "Fetching loan repayments");
        let path = format!("/loans/{}/repayments", urlencode_segment(loan_id));
        self.get_page(&path, &[], "id").await
    }
}

/// Percent-encode a single path segment.
fn urlencode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let source = HttpSourceOfRecord::new("http://upstream.local/api/");
        assert_eq!(source.base_url, "http://upstream.local/api");
    }

    #[test]
    fn test_parse_page_isolates_bad_elements() {
        let page: Vec<SourceRecord<SourceRepayment>> = parse_page(
            r#"[
                {"id": 1, "loan_id": "L-1", "is_reversed": 0},
                {"id": "x1"},
                {"id": 3, "is_backdated": "sometimes"},
                {"loan_id": "L-1"}
            ]"#,
            "id",
        )
        .unwrap();
        assert_eq!(page.len(), 4);

        match &page[0] {
            SourceRecord::Parsed(record) => {
                assert_eq!(record.id, Some(1));
                assert_eq!(record.is_reversed, Some(false));
            }
            other => panic!("expected a parsed record, got {:?}", other),
        }
        assert!(matches!(&page[1], SourceRecord::Malformed { id: Some(id), .. } if id == "x1"));
        assert_eq!(page[2].repayment_id(), Some(3));
        assert!(matches!(&page[2], SourceRecord::Malformed { .. }));
        assert!(matches!(&page[3], SourceRecord::Parsed(r) if r.id.is_none()));
    }

    #[test]
    fn test_parse_page_requires_an_array() {
        let err =
            parse_page::<SourceRepayment>(r#"{"not": "an array"}"#, "id").unwrap_err();
        assert!(matches!(err, DataSourceError::ParseError(_)));
    }

    #[test]
    fn test_urlencode_segment() {
        assert_eq!(urlencode_segment("L-1"), "L-1");
        assert_eq!(urlencode_segment("a/b c"), "a%2Fb%20c");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_network_error() {
        let source = HttpSourceOfRecord::new("http://127.0.0.1:1")
            .with_max_elapsed(Duration::from_millis(200));
        let err = source.fetch_loans(0, 10).await.unwrap_err();
        assert!(matches!(err, DataSourceError::NetworkError(_)));
    }
}
