// Route types
// This file defines the normalized route handed from the resolver to the
// execution engine, and the execution steps it carries
//
// Numan Thabit 2025 Nov

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A method call inside a chain transaction. Amounts stay base-unit strings on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub method_name: String,
    /// base64-encoded argument payload
    #[serde(default)]
    pub args: String,
    #[serde(deserialize_with = "integer_string")]
    pub gas: String,
    #[serde(deserialize_with = "integer_string")]
    pub deposit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    FunctionCall(FunctionCall),
}

impl Action {
    pub fn function_call(
        method_name: impl Into<String>,
        args: impl Into<String>,
        gas: impl Into<String>,
        deposit: impl Into<String>,
    ) -> Self {
        Action::FunctionCall(FunctionCall {
            method_name: method_name.into(),
            args: args.into(),
            gas: gas.into(),
            deposit: deposit.into(),
        })
    }
}

/// One signed transaction against a single receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub receiver_id: String,
    pub actions: Vec<Action>,
    /// Whether the pipeline may move past a failure of this step.
    #[serde(default)]
    pub continue_if_failed: bool,
}

/// Steps execute strictly in order; a dependent step waits for its predecessor's confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStep {
    NearTransaction(ChainTransaction),
}

impl ExecutionStep {
    pub fn transaction(&self) -> &ChainTransaction {
        match self {
            ExecutionStep::NearTransaction(tx) => tx,
        }
    }
}

/// Off-chain settlement payload for routes served by the intents venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentsQuote {
    pub message_to_sign: String,
    pub quote_hash: String,
}

impl IntentsQuote {
    pub fn is_signable(&self) -> bool {
        !self.message_to_sign.trim().is_empty() && !self.quote_hash.trim().is_empty()
    }
}

/// Normalized best route for a swap request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Venue ids along the path, in order
    pub route: Vec<String>,
    /// Human units, six fractional digits
    pub amount_out: String,
    /// Human units, six fractional digits, never above `amount_out`
    pub minimum_received: String,
    /// Percentage as a decimal string
    pub price_impact: String,
    pub estimated_gas: String,
    pub fee: String,
    #[serde(rename = "transactions", default)]
    pub steps: Vec<ExecutionStep>,
    #[serde(default)]
    pub needs_unwrap: bool,
    /// Epoch millis after which the quote should be refreshed
    #[serde(default)]
    pub deadline: Option<u64>,
    #[serde(default)]
    pub has_slippage: bool,
    pub dex_id: String,
    #[serde(default)]
    pub use_intents: bool,
    #[serde(default)]
    pub intents_quote: Option<IntentsQuote>,
    /// Untouched upstream payload, for diagnostics only
    #[serde(default)]
    pub raw_response: Value,
}

impl Route {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.deadline.is_some_and(|deadline| now_ms >= deadline)
    }
}

/// Accept integer amounts as either JSON strings or JSON numbers.
fn integer_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) if n.is_u64() => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected an integer amount, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_upstream_transaction_shape() {
        let step: ExecutionStep = serde_json::from_value(json!({
            "NearTransaction": {
                "receiver_id": "v2.ref-finance.near",
                "actions": [{
                    "FunctionCall": {
                        "method_name": "ft_transfer_call",
                        "args": "e30=",
                        "gas": 30000000000000u64,
                        "deposit": "1"
                    }
                }]
            }
        }))
        .unwrap();

        let tx = step.transaction();
        assert_eq!(tx.receiver_id, "v2.ref-finance.near");
        assert!(!tx.continue_if_failed);
        assert_eq!(
            tx.actions[0],
            Action::function_call("ft_transfer_call", "e30=", "30000000000000", "1")
        );
    }

    #[test]
    fn rejects_fractional_gas() {
        let parsed = serde_json::from_value::<FunctionCall>(json!({
            "method_name": "swap",
            "args": "",
            "gas": 1.5,
            "deposit": "0"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn expiry_uses_deadline() {
        let route: Route = serde_json::from_value(json!({
            "route": ["Rhea"],
            "amountOut": "1.000000",
            "minimumReceived": "0.990000",
            "priceImpact": "0",
            "estimatedGas": "0.003",
            "fee": "0.003",
            "dexId": "Rhea",
            "deadline": 1_000
        }))
        .unwrap();
        assert!(!route.is_expired(999));
        assert!(route.is_expired(1_000));
        assert!(route.steps.is_empty());
    }
}
