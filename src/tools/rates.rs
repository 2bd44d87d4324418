/// Exchange Rate Source
///
/// Fetches the current rate table from the public exchange-rate API. Every call
/// issues exactly one GET; nothing is cached or retried.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Endpoint returning the latest rates relative to the API's base currency.
pub const LATEST_RATES_URL: &str = "https://api.fxratesapi.com/latest";

/// Rate table returned by a single fetch.
///
/// All rates are expressed relative to one base currency reported by the API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateSnapshot {
    pub success: bool,
    pub base: Option<String>,
    pub rates: HashMap<String, f64>,
}

impl RateSnapshot {
    /// Read a snapshot from any JSON document the API returned.
    ///
    /// Only a literal `"success": true` counts as success. Entries of `rates`
    /// that are not numbers are skipped, and a missing or non-object `rates`
    /// reads as empty. Other fields (date, timestamp, ...) are ignored.
    pub fn from_document(document: &Value) -> Self {
        let rates = document
            .get("rates")
            .and_then(Value::as_object)
            .map(|rates| {
                rates
                    .iter()
                    .filter_map(|(code, rate)| rate.as_f64().map(|rate| (code.clone(), rate)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            success: document.get("success") == Some(&Value::Bool(true)),
            base: document.get("base").and_then(Value::as_str).map(str::to_string),
            rates,
        }
    }

    /// Rate for `code`, if present and usable as a divisor.
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates
            .get(code)
            .copied()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
    }
}

impl<const N: usize> From<[(&str, f64); N]> for RateSnapshot {
    fn from(rates: [(&str, f64); N]) -> Self {
        Self {
            success: true,
            base: None,
            rates: rates
                .into_iter()
                .map(|(code, rate)| (code.to_string(), rate))
                .collect(),
        }
    }
}

/// Reasons a rate table could not be obtained.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to rates API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rates API returned status {status} with an unreadable body")]
    Status { status: u16 },

    #[error("rates API returned an unreadable body: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Source of exchange-rate snapshots.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn latest(&self) -> Result<RateSnapshot, FetchError>;
}

/// Rate source backed by the exchange-rate HTTP API.
pub struct HttpRateSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRateSource {
    pub fn new() -> Self {
        Self::with_endpoint(LATEST_RATES_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for HttpRateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn latest(&self) -> Result<RateSnapshot, FetchError> {
        tracing::debug!(endpoint = %self.endpoint, "fetching latest rates");
        let response = self.client.get(&self.endpoint).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        // A non-2xx answer still counts if it carries a JSON document; its
        // `success` flag then decides the outcome.
        let document: Value = match serde_json::from_slice(&body) {
            Ok(document) => document,
            Err(_) if !status.is_success() => {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                });
            }
            Err(e) => return Err(FetchError::Decode(e)),
        };

        let snapshot = RateSnapshot::from_document(&document);
        tracing::debug!(
            status = status.as_u16(),
            success = snapshot.success,
            base = snapshot.base.as_deref().unwrap_or("?"),
            currencies = snapshot.rates.len(),
            "received rate snapshot"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn rate_lookup_rejects_missing_and_unusable_values() {
        let snapshot = RateSnapshot::from_document(&json!({
            "success": true,
            "base": "USD",
            "rates": { "USD": 1, "EUR": 0.9, "XXX": null, "YYY": "1.1", "ZZZ": 0 }
        }));

        assert!(snapshot.success);
        assert_eq!(snapshot.rate("USD"), Some(1.0));
        assert_eq!(snapshot.rate("EUR"), Some(0.9));
        assert_eq!(snapshot.rate("XXX"), None);
        assert_eq!(snapshot.rate("YYY"), None);
        assert_eq!(snapshot.rate("ZZZ"), None);
        assert_eq!(snapshot.rate("GBP"), None);
    }

    #[test]
    fn only_literal_true_is_success() {
        for document in [
            json!({}),
            json!({ "success": false, "rates": null }),
            json!({ "success": null }),
            json!({ "success": "true", "rates": { "USD": 1.0 } }),
            json!({ "success": 1 }),
            json!([1, 2, 3]),
        ] {
            let snapshot = RateSnapshot::from_document(&document);
            assert!(!snapshot.success, "{document} read as success");
        }

        let snapshot = RateSnapshot::from_document(&json!({ "success": true, "rates": null }));
        assert!(snapshot.success);
        assert!(snapshot.rates.is_empty());
    }

    #[tokio::test]
    async fn loosely_typed_failure_documents_are_snapshots() {
        for body in [
            json!({ "success": false, "rates": null }),
            json!({ "success": null }),
            json!({ "success": "false", "error": "quota" }),
        ] {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(GET).path("/latest");
                    then.status(200).json_body(body.clone());
                })
                .await;

            let source = HttpRateSource::with_endpoint(server.url("/latest"));
            let snapshot = source.latest().await.unwrap();
            assert!(!snapshot.success);
        }
    }

    #[tokio::test]
    async fn fetches_snapshot_with_get() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/latest");
                then.status(200).json_body(json!({
                    "success": true,
                    "base": "USD",
                    "date": "2026-10-16T00:00:00.000Z",
                    "rates": { "USD": 1.0, "EUR": 0.9 }
                }));
            })
            .await;

        let source = HttpRateSource::with_endpoint(server.url("/latest"));
        let snapshot = source.latest().await.unwrap();

        mock.assert_async().await;
        assert!(snapshot.success);
        assert_eq!(snapshot.base.as_deref(), Some("USD"));
        assert_eq!(snapshot.rate("EUR"), Some(0.9));
    }

    #[tokio::test]
    async fn error_status_with_rate_document_is_passed_through() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/latest");
                then.status(429).json_body(json!({ "success": false }));
            })
            .await;

        let source = HttpRateSource::with_endpoint(server.url("/latest"));
        let snapshot = source.latest().await.unwrap();
        assert!(!snapshot.success);
    }

    #[tokio::test]
    async fn error_status_without_body_is_a_fetch_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/latest");
                then.status(503).body("upstream down");
            })
            .await;

        let source = HttpRateSource::with_endpoint(server.url("/latest"));
        let err = source.latest().await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503 }));
    }

    #[tokio::test]
    async fn garbage_body_is_a_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/latest");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let source = HttpRateSource::with_endpoint(server.url("/latest"));
        let err = source.latest().await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
