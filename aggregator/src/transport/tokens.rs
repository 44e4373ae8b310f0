// Token list client
// This file fetches the reputable token list and normalizes each record
// into the token metadata served by the HTTP API
//
// Numan Thabit 2025 Nov

use crate::errors::AggrError;
use crate::metrics::{REQ_ERRORS, REQ_LATENCY};
use crate::router::fields;
use anyhow::{Context, Result};
use backoff::{future::retry, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use url::Url;

const SERVICE: &str = "tokens";

/// Decimals assumed for a record without metadata.
pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;
pub const UNKNOWN_REPUTATION: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change24h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume24h: Option<f64>,
    pub reputation: String,
}

impl Token {
    /// None when the record lacks an id, symbol or name.
    pub fn from_record(record: &Value) -> Option<Self> {
        let id = non_empty(fields::TOKEN_ID.string(record))?;
        let symbol = non_empty(fields::TOKEN_SYMBOL.string(record))?;
        let name = non_empty(fields::TOKEN_NAME.string(record))?;
        let decimals = fields::TOKEN_DECIMALS
            .u64(record)
            .and_then(|d| u32::try_from(d).ok())
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_TOKEN_DECIMALS);

        Some(Self {
            id,
            symbol,
            name,
            decimals,
            price: fields::TOKEN_PRICE.f64(record),
            change24h: fields::TOKEN_CHANGE_24H.f64(record),
            icon: non_empty(fields::TOKEN_ICON.string(record)),
            market_cap: fields::TOKEN_MARKET_CAP.f64(record),
            volume24h: fields::TOKEN_VOLUME_24H.f64(record),
            reputation: non_empty(fields::TOKEN_REPUTATION.string(record))
                .unwrap_or_else(|| UNKNOWN_REPUTATION.to_string()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Normalize a token list body. Accepts an array of records or a map keyed by token id.
pub fn normalize_tokens(body: &Value) -> Result<Vec<Token>, AggrError> {
    let records: Vec<&Value> = match body {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        other => {
            return Err(AggrError::Decode(format!(
                "token list is not a collection: {}",
                kind(other)
            )))
        }
    };
    if records.is_empty() {
        return Err(AggrError::Provider("No tokens available".into()));
    }

    let total = records.len();
    let tokens: Vec<Token> = records.into_iter().filter_map(Token::from_record).collect();
    if tokens.len() < total {
        debug!(dropped = total - tokens.len(), "dropped incomplete token records");
    }
    Ok(tokens)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Clone)]
pub struct TokenListClient {
    endpoint: Url,
    client: reqwest::Client,
    retry_budget: Duration,
}

impl TokenListClient {
    pub fn new(endpoint: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()
            .context("build HTTP client for token list")?;

        Ok(Self {
            endpoint,
            client,
            retry_budget: Duration::from_secs(5),
        })
    }

    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Fetch and normalize, retrying transport and HTTP failures within the budget.
    pub async fn fetch_tokens(&self) -> Result<Vec<Token>, AggrError> {
        let _timer = REQ_LATENCY
            .with_label_values(&[SERVICE, "list"])
            .start_timer();

        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(50),
            max_interval: Duration::from_secs(1),
            max_elapsed_time: Some(self.retry_budget),
            multiplier: 2.0,
            ..Default::default()
        };

        let result = retry(backoff, || async move {
            self.fetch_once().await.map_err(|e| match e {
                AggrError::Decode(_) => backoff::Error::permanent(e),
                other => {
                    warn!(error = %other, "token list fetch failed, retrying");
                    backoff::Error::transient(other)
                }
            })
        })
        .await;

        if result.is_err() {
            REQ_ERRORS.with_label_values(&[SERVICE, "list"]).inc();
        }
        result
    }

    async fn fetch_once(&self) -> Result<Vec<Token>, AggrError> {
        let mut url = self.endpoint.clone();
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        url.query_pairs_mut().append_pair("t", &stamp.to_string());

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| AggrError::from_reqwest("token list", e))?;
        if !resp.status().is_success() {
            return Err(AggrError::Provider(format!(
                "Failed to fetch tokens: {}",
                resp.status().as_u16()
            )));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AggrError::Decode(format!("token list json: {e}")))?;
        normalize_tokens(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn normalizes_metadata_and_defaults() {
        let body = json!([
            {
                "account_id": "wrap.near",
                "metadata": {"symbol": "wNEAR", "name": "Wrapped NEAR", "decimals": 24, "icon": "data:x"},
                "price_usd": "3.21",
                "volume_24h": 1000.5,
                "reputation": "Reputable"
            },
            {"token_id": "usdt.tether-token.near", "symbol": "USDt", "name": "Tether USD"},
            {"account_id": "nameless.near", "symbol": "NL"}
        ]);
        let tokens = normalize_tokens(&body).unwrap();
        assert_eq!(tokens.len(), 2);

        assert_eq!(tokens[0].decimals, 24);
        assert_eq!(tokens[0].price, Some(3.21));
        assert_eq!(tokens[0].volume24h, Some(1000.5));
        assert_eq!(tokens[0].reputation, "Reputable");

        assert_eq!(tokens[1].id, "usdt.tether-token.near");
        assert_eq!(tokens[1].decimals, DEFAULT_TOKEN_DECIMALS);
        assert_eq!(tokens[1].reputation, UNKNOWN_REPUTATION);
        assert_eq!(tokens[1].icon, None);
    }

    #[test]
    fn empty_list_is_an_error() {
        assert!(normalize_tokens(&json!([])).is_err());
        assert!(matches!(
            normalize_tokens(&json!("nope")),
            Err(AggrError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokens-reputable"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tokens-reputable"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"account_id": "near", "symbol": "NEAR", "name": "NEAR"}
            ])))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/tokens-reputable", server.uri())).unwrap();
        let client = TokenListClient::new(url).unwrap();
        let tokens = client.fetch_tokens().await.unwrap();
        assert_eq!(tokens[0].symbol, "NEAR");
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/tokens-reputable", server.uri())).unwrap();
        let client = TokenListClient::new(url)
            .unwrap()
            .with_retry_budget(Duration::from_millis(200));
        assert!(matches!(
            client.fetch_tokens().await,
            Err(AggrError::Provider(_))
        ));
    }
}
