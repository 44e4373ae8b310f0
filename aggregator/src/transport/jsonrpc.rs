// JSON-RPC transport layer implementation
// This file implements the JSON-RPC 2.0 client shared by the NEAR RPC
// node (confirmation polling, view calls) and the solver relay
//
// Numan Thabit 2025 Nov

use crate::errors::AggrError;
use crate::metrics::{REQ_ERRORS, REQ_LATENCY};
use crate::units::parse_base_units;
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use num_bigint::BigUint;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Error object of a JSON-RPC reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    /// Message plus data, since NEAR nodes put the useful part in `data`.
    pub fn describe(&self) -> String {
        match &self.data {
            Some(Value::String(s)) => format!("{}: {s}", self.message),
            Some(other) => format!("{}: {other}", self.message),
            None => self.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    Result(Value),
    Error(RpcErrorObject),
}

/// Outcome of a transaction as seen by the `tx` method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct JsonRpc {
    http: Client,
    url: String,
    service: &'static str,
    next_id: Arc<AtomicU64>,
}

impl JsonRpc {
    pub fn new(url: impl Into<String>, service: &'static str) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
            service,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Ok(http) = Client::builder().timeout(timeout).build() {
            self.http = http;
        }
        self
    }

    /// One JSON-RPC round trip. Transport and HTTP failures are errors, an
    /// RPC-level error object is a reply.
    pub async fn call(&self, method: &str, params: Value) -> Result<RpcReply, AggrError> {
        let _timer = REQ_LATENCY
            .with_label_values(&[self.service, method])
            .start_timer();
        let result = self.call_inner(method, params).await;
        if !matches!(result, Ok(RpcReply::Result(_))) {
            REQ_ERRORS.with_label_values(&[self.service, method]).inc();
        }
        result
    }

    async fn call_inner(&self, method: &str, params: Value) -> Result<RpcReply, AggrError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AggrError::from_reqwest("jsonrpc send", e))?;
        if !resp.status().is_success() {
            return Err(AggrError::Provider(format!("http {}", resp.status())));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| AggrError::Decode(format!("json parse: {e}")))?;

        if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
            let err = serde_json::from_value(err.clone()).unwrap_or_else(|_| RpcErrorObject {
                code: 0,
                message: err.to_string(),
                data: None,
            });
            return Ok(RpcReply::Error(err));
        }
        match body.get("result") {
            Some(result) => Ok(RpcReply::Result(result.clone())),
            None => Err(AggrError::Decode("reply carries neither result nor error".into())),
        }
    }

    /// Status of a submitted transaction. An unknown transaction is pending.
    pub async fn tx_status(&self, tx_hash: &str, sender_id: &str) -> Result<TxStatus, AggrError> {
        match self.call("tx", json!([tx_hash, sender_id])).await? {
            RpcReply::Result(result) => Ok(tx_status_from_result(&result)),
            RpcReply::Error(err) => {
                debug!(tx_hash, error = %err.describe(), "transaction not final yet");
                Ok(TxStatus::Pending)
            }
        }
    }

    /// Read-only contract call; the result bytes are parsed as JSON.
    pub async fn view_function(
        &self,
        contract_id: &str,
        method_name: &str,
        args: &Value,
    ) -> Result<Value, AggrError> {
        let params = json!({
            "request_type": "call_function",
            "finality": "final",
            "account_id": contract_id,
            "method_name": method_name,
            "args_base64": B64.encode(args.to_string()),
        });
        let result = match self.call("query", params).await? {
            RpcReply::Result(result) => result,
            RpcReply::Error(err) => return Err(AggrError::Provider(err.describe())),
        };
        if let Some(err) = result.get("error").and_then(Value::as_str) {
            return Err(AggrError::Provider(err.to_string()));
        }
        let bytes: Vec<u8> = result
            .get("result")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| AggrError::Decode(format!("view result bytes: {e}")))?
            .ok_or_else(|| AggrError::Decode("view reply has no result bytes".into()))?;
        serde_json::from_slice(&bytes).map_err(|e| AggrError::Decode(format!("view result: {e}")))
    }

    /// NEP-141 balance of `account_id` on `token_contract`.
    pub async fn ft_balance_of(
        &self,
        token_contract: &str,
        account_id: &str,
    ) -> Result<BigUint, AggrError> {
        let value = self
            .view_function(
                token_contract,
                "ft_balance_of",
                &json!({ "account_id": account_id }),
            )
            .await?;
        value
            .as_str()
            .and_then(parse_base_units)
            .ok_or_else(|| AggrError::Decode(format!("ft_balance_of returned {value}")))
    }
}

fn tx_status_from_result(result: &Value) -> TxStatus {
    let Some(status) = result.get("status") else {
        return TxStatus::Pending;
    };
    if status.get("SuccessValue").is_some() {
        return TxStatus::Succeeded;
    }
    if let Some(failure) = status.get("Failure") {
        return TxStatus::Failed(failure.to_string());
    }
    TxStatus::Pending
}
