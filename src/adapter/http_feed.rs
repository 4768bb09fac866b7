//! HTTP price feed.
//!
//! `GET {url}?symbols=BTC/USD,ETH/USD` returning
//! `{"BTC/USD": {"value": 6725000, "decimals": 2, "timestamp": 1767268800}}`
//! with `timestamp` in Unix seconds. Symbols missing from the response are
//! simply absent from the snapshot.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{OracleSnapshot, PricePoint};
use crate::error::ExternalError;
use crate::port::PriceFeed;

const SERVICE: &str = "oracle";

#[derive(Debug, Deserialize)]
struct Quote {
    value: i64,
    decimals: u32,
    timestamp: i64,
}

pub struct HttpFeed {
    http: HttpClient,
    url: Url,
    timeout: Duration,
}

impl HttpFeed {
    /// Create a feed for `url` with a per-request timeout.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ExternalError> {
        let url = Url::parse(url).map_err(|e| ExternalError::Rejected {
            service: SERVICE,
            reason: format!("invalid url {url}: {e}"),
        })?;
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });
        Ok(Self { http, url, timeout })
    }

    fn request_url(&self, symbols: &[String]) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("symbols", &symbols.join(","));
        url
    }

    fn map_error(&self, err: &reqwest::Error) -> ExternalError {
        if err.is_timeout() {
            ExternalError::Timeout {
                service: SERVICE,
                millis: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if err.is_decode() {
            ExternalError::Decode {
                service: SERVICE,
                reason: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            ExternalError::Rejected {
                service: SERVICE,
                reason: status.to_string(),
            }
        } else {
            ExternalError::Unavailable {
                service: SERVICE,
                reason: err.to_string(),
            }
        }
    }
}

fn into_snapshot(quotes: HashMap<String, Quote>, fetched_at: DateTime<Utc>) -> OracleSnapshot {
    let mut snapshot = OracleSnapshot::empty().with_fetched_at(fetched_at);
    for (symbol, quote) in quotes {
        let Some(timestamp) = DateTime::<Utc>::from_timestamp(quote.timestamp, 0) else {
            debug!(symbol = %symbol, timestamp = quote.timestamp, "Dropping quote with bad timestamp");
            continue;
        };
        snapshot.insert(symbol, PricePoint::new(quote.value, quote.decimals, timestamp));
    }
    snapshot
}

#[async_trait]
impl PriceFeed for HttpFeed {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn snapshot(&self, symbols: &[String]) -> Result<OracleSnapshot, ExternalError> {
        let url = self.request_url(symbols);
        debug!(url = %url, "Fetching oracle snapshot");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.map_error(&e))?;
        let quotes: HashMap<String, Quote> =
            response.json().await.map_err(|e| self.map_error(&e))?;

        Ok(into_snapshot(quotes, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn request_url_carries_symbols() {
        let feed = HttpFeed::new("http://localhost:9000/prices", Duration::from_secs(1)).unwrap();
        let url = feed.request_url(&["BTC/USD".into(), "ETH/USD".into()]);
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/prices?symbols=BTC%2FUSD%2CETH%2FUSD"
        );
    }

    #[test]
    fn invalid_url_rejected() {
        assert!(matches!(
            HttpFeed::new("not a url", Duration::from_secs(1)),
            Err(ExternalError::Rejected { .. })
        ));
    }

    #[test]
    fn response_body_maps_to_snapshot() {
        let body = r#"{
            "BTC/USD": {"value": 6725000, "decimals": 2, "timestamp": 1767268800},
            "ETH/USD": {"value": 345000, "decimals": 2, "timestamp": 1767268800}
        }"#;
        let quotes: HashMap<String, Quote> = serde_json::from_str(body).unwrap();
        let snap = into_snapshot(quotes, Utc::now());
        assert_eq!(snap.price("BTC/USD"), Some(dec!(67250.00)));
        assert_eq!(snap.len(), 2);
    }
}
