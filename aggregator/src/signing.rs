// Signing capability module
// This file defines the wallet capability the execution engine drives:
// sign-and-submit for chain transactions and detached NEP-413 message
// signatures for intent settlement
//
// Numan Thabit 2025 Nov

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Signature standard tag used by the solver relay envelope.
pub const NEP413_STANDARD: &str = "nep413";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The user dismissed the wallet prompt.
    #[error("cancelled by user")]
    Cancelled,
    #[error("{0}")]
    Rejected(String),
}

/// One decoded method call ready for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCallAction {
    pub method_name: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub receiver_id: String,
    pub actions: Vec<FunctionCallAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedTransaction {
    pub tx_hash: String,
    pub receipts: Vec<Value>,
}

/// NEP-413 payload handed to the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageRequest {
    pub message: String,
    pub recipient: String,
    /// base64 of 32 random bytes
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl SignMessageRequest {
    pub fn new(
        message: impl Into<String>,
        recipient: impl Into<String>,
        callback_url: Option<String>,
    ) -> Self {
        let mut nonce = [0u8; 32];
        OsRng.fill_bytes(&mut nonce);
        Self {
            message: message.into(),
            recipient: recipient.into(),
            nonce: B64.encode(nonce),
            callback_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub signature: String,
    pub public_key: String,
}

/// `signed_data` envelope accepted by the solver relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedIntent {
    pub standard: String,
    pub payload: SignMessageRequest,
    pub signature: String,
    pub public_key: String,
}

impl SignedIntent {
    pub fn nep413(payload: SignMessageRequest, signed: SignedMessage) -> Self {
        Self {
            standard: NEP413_STANDARD.to_string(),
            payload,
            signature: signed.signature,
            public_key: signed.public_key,
        }
    }
}

/// Wallet capability. Either operation may prompt the user and may be cancelled.
#[allow(async_fn_in_trait)]
pub trait SigningHandle: Send + Sync {
    /// Account that signs and pays for submitted transactions.
    fn account_id(&self) -> &str;

    async fn sign_and_submit(
        &self,
        tx: &TransactionRequest,
    ) -> Result<SubmittedTransaction, SignerError>;

    async fn sign_message(&self, req: &SignMessageRequest) -> Result<SignedMessage, SignerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_are_fresh_32_byte_values() {
        let a = SignMessageRequest::new("m", "intents.near", None);
        let b = SignMessageRequest::new("m", "intents.near", None);
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(B64.decode(&a.nonce).unwrap().len(), 32);
    }

    #[test]
    fn envelope_uses_relay_field_names() {
        let payload = SignMessageRequest::new(
            "{\"intents\":[]}",
            "intents.near",
            Some("https://swap.example".into()),
        );
        let intent = SignedIntent::nep413(
            payload,
            SignedMessage {
                signature: "ed25519:sig".into(),
                public_key: "ed25519:pk".into(),
            },
        );
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["standard"], "nep413");
        assert_eq!(json["payload"]["recipient"], "intents.near");
        assert_eq!(json["payload"]["callbackUrl"], "https://swap.example");
        assert_eq!(json["public_key"], "ed25519:pk");
    }
}
