// Solver relay client
// This file submits signed intents to the solver relay over JSON-RPC
//
// Numan Thabit 2025 Nov

use crate::errors::{AggrError, ExecutionError};
use crate::router::fields;
use crate::signing::SignedIntent;
use crate::transport::jsonrpc::{JsonRpc, RpcReply};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

const PUBLISH_INTENT: &str = "publish_intent";

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedIntent {
    pub settlement_id: Option<String>,
    pub receipts: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct SolverRelay {
    rpc: JsonRpc,
}

impl SolverRelay {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            rpc: JsonRpc::new(url, "relay"),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.rpc = self.rpc.with_timeout(timeout);
        self
    }

    /// Single submission. Never retried: a lost reply is surfaced, not resent.
    pub async fn publish_intent(
        &self,
        quote_hash: &str,
        signed: &SignedIntent,
    ) -> Result<PublishedIntent, ExecutionError> {
        let params = json!({
            "quote_hashes": [quote_hash],
            "signed_data": signed,
        });

        let reply = match self.rpc.call(PUBLISH_INTENT, params).await {
            Ok(reply) => reply,
            Err(AggrError::Timeout) => {
                // The relay may still have accepted it; resending could settle twice.
                warn!(quote_hash, "relay did not answer in time");
                return Err(ExecutionError::Transport(
                    "solver relay timed out; intent outcome unknown".into(),
                ));
            }
            Err(err) => return Err(err.into()),
        };
        let result = match reply {
            RpcReply::Result(result) => result,
            RpcReply::Error(err) => {
                warn!(quote_hash, error = %err.describe(), "relay rejected intent");
                return Err(ExecutionError::IntentRejected(err.describe()));
            }
        };

        if fields::RELAY_STATUS
            .string(&result)
            .is_some_and(|status| status.eq_ignore_ascii_case("FAILED"))
        {
            let reason = fields::RELAY_REASON.string_or(&result, "relay reported FAILED");
            warn!(quote_hash, reason = %reason, "relay failed intent");
            return Err(ExecutionError::IntentRejected(reason));
        }

        let published = PublishedIntent {
            settlement_id: fields::SETTLEMENT_ID.string(&result),
            receipts: fields::RECEIPTS.array(&result).to_vec(),
        };
        info!(
            quote_hash,
            settlement_id = published.settlement_id.as_deref().unwrap_or("-"),
            "intent published"
        );
        Ok(published)
    }
}
