// Upstream field probing
// The routing service, token list and solver relay name the same logical
// field differently across deployments. Each logical field is an ordered
// list of synonym paths; the first present, non-null value wins and a miss
// falls back to a safe default instead of failing.
//
// Numan Thabit 2025 Nov

use crate::units::parse_base_units;
use num_bigint::BigUint;
use serde_json::Value;
use tracing::{debug, warn};

/// Ordered synonym paths for one logical field. Paths are dot-separated.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub paths: &'static [&'static str],
}

fn lookup<'a>(obj: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(obj, |node, key| node.get(key))
}

impl FieldSpec {
    /// First present, non-null value along the synonym list.
    pub fn probe<'a>(&self, obj: &'a Value) -> Option<&'a Value> {
        self.paths
            .iter()
            .filter_map(|path| lookup(obj, path))
            .find(|value| !value.is_null())
    }

    pub fn string(&self, obj: &Value) -> Option<String> {
        match self.probe(obj)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => {
                debug!(field = self.name, value = %other, "field is not a scalar");
                None
            }
        }
    }

    pub fn string_or(&self, obj: &Value, default: &str) -> String {
        self.string(obj).unwrap_or_else(|| default.to_string())
    }

    /// Base-unit integer given as a digit string or a JSON integer.
    pub fn base_units(&self, obj: &Value) -> Option<BigUint> {
        let parsed = match self.probe(obj)? {
            Value::String(s) => parse_base_units(s),
            Value::Number(n) => match n.as_u64() {
                Some(v) => Some(BigUint::from(v)),
                None => {
                    // Past u64 serde_json keeps only an f64; the exact digits are gone.
                    let parsed = parse_base_units(&n.to_string());
                    if parsed.is_none() {
                        warn!(field = self.name, value = %n, "numeric amount is not an exact integer; send it as a string");
                    }
                    return parsed;
                }
            },
            _ => None,
        };
        if parsed.is_none() {
            debug!(field = self.name, "field is not a base-unit integer");
        }
        parsed
    }

    pub fn flag(&self, obj: &Value) -> bool {
        match self.probe(obj) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(Value::Number(n)) => n.as_u64().is_some_and(|v| v != 0),
            _ => false,
        }
    }

    pub fn u64(&self, obj: &Value) -> Option<u64> {
        match self.probe(obj)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn f64(&self, obj: &Value) -> Option<f64> {
        let value = match self.probe(obj)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        value.is_finite().then_some(value)
    }

    pub fn array<'a>(&self, obj: &'a Value) -> &'a [Value] {
        match self.probe(obj) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }
}

// Route object returned by the routing service.
pub const AMOUNT_OUT: FieldSpec = FieldSpec {
    name: "amount_out",
    paths: &[
        "estimated_amount.amount_out",
        "estimated_amount_out",
        "amount_out",
        "amountOut",
        "expected_amount_out",
    ],
};
pub const MIN_AMOUNT_OUT: FieldSpec = FieldSpec {
    name: "min_amount_out",
    paths: &[
        "worst_case_amount.amount_out",
        "worst_case_amount_out",
        "min_amount_out",
        "minimum_amount_out",
        "minAmountOut",
    ],
};
pub const VENUE: FieldSpec = FieldSpec {
    name: "dex_id",
    paths: &["dex_id", "dexId", "dex", "venue"],
};
pub const PATH: FieldSpec = FieldSpec {
    name: "route",
    paths: &["route", "path", "dex_path"],
};
pub const STEPS: FieldSpec = FieldSpec {
    name: "execution_instructions",
    paths: &[
        "execution_instructions",
        "executionInstructions",
        "transactions",
        "instructions",
    ],
};
pub const NEEDS_UNWRAP: FieldSpec = FieldSpec {
    name: "needs_unwrap",
    paths: &["needs_unwrap", "needsUnwrap"],
};
pub const DEADLINE: FieldSpec = FieldSpec {
    name: "deadline",
    paths: &["deadline", "deadline_ms", "expires_at"],
};
pub const HAS_SLIPPAGE: FieldSpec = FieldSpec {
    name: "has_slippage",
    paths: &["has_slippage", "hasSlippage"],
};
pub const PRICE_IMPACT: FieldSpec = FieldSpec {
    name: "price_impact",
    paths: &["price_impact", "priceImpact"],
};
pub const ESTIMATED_GAS: FieldSpec = FieldSpec {
    name: "estimated_gas",
    paths: &["estimated_gas", "estimatedGas", "gas_estimate"],
};
pub const FEE: FieldSpec = FieldSpec {
    name: "fee",
    paths: &["fee", "total_fee", "totalFee"],
};

// Intents quote carried among the execution instructions.
pub const INTENTS_QUOTE_TAG: &str = "IntentsQuote";
pub const MESSAGE_TO_SIGN: FieldSpec = FieldSpec {
    name: "message_to_sign",
    paths: &["message_to_sign", "messageToSign", "message"],
};
pub const QUOTE_HASH: FieldSpec = FieldSpec {
    name: "quote_hash",
    paths: &["quote_hash", "quoteHash"],
};

// Token list records.
pub const TOKEN_ID: FieldSpec = FieldSpec {
    name: "token_id",
    paths: &["account_id", "token_id"],
};
pub const TOKEN_SYMBOL: FieldSpec = FieldSpec {
    name: "symbol",
    paths: &["metadata.symbol", "symbol"],
};
pub const TOKEN_NAME: FieldSpec = FieldSpec {
    name: "name",
    paths: &["metadata.name", "name"],
};
pub const TOKEN_DECIMALS: FieldSpec = FieldSpec {
    name: "decimals",
    paths: &["metadata.decimals", "decimals"],
};
pub const TOKEN_ICON: FieldSpec = FieldSpec {
    name: "icon",
    paths: &["metadata.icon", "icon"],
};
pub const TOKEN_PRICE: FieldSpec = FieldSpec {
    name: "price_usd",
    paths: &["price_usd"],
};
pub const TOKEN_CHANGE_24H: FieldSpec = FieldSpec {
    name: "change_24h",
    paths: &["change_24h"],
};
pub const TOKEN_MARKET_CAP: FieldSpec = FieldSpec {
    name: "market_cap",
    paths: &["market_cap"],
};
pub const TOKEN_VOLUME_24H: FieldSpec = FieldSpec {
    name: "volume_24h",
    paths: &["volume_24h"],
};
pub const TOKEN_REPUTATION: FieldSpec = FieldSpec {
    name: "reputation",
    paths: &["reputation"],
};

// Solver relay publish_intent result.
pub const SETTLEMENT_ID: FieldSpec = FieldSpec {
    name: "settlement_id",
    paths: &["hash", "transaction_hash", "intent_hash"],
};
pub const RECEIPTS: FieldSpec = FieldSpec {
    name: "receipts",
    paths: &["receipts", "receipts_outcome"],
};
pub const RELAY_STATUS: FieldSpec = FieldSpec {
    name: "status",
    paths: &["status"],
};
pub const RELAY_REASON: FieldSpec = FieldSpec {
    name: "reason",
    paths: &["reason", "message"],
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_path_wins_over_flat_synonym() {
        let obj = json!({
            "estimated_amount": {"amount_out": "100"},
            "amount_out": "5"
        });
        assert_eq!(AMOUNT_OUT.base_units(&obj), Some(BigUint::from(100u32)));
    }

    #[test]
    fn falls_through_null_and_missing_to_synonym() {
        let obj = json!({
            "estimated_amount": null,
            "amountOut": 42
        });
        assert_eq!(AMOUNT_OUT.base_units(&obj), Some(BigUint::from(42u32)));
    }

    #[test]
    fn misses_default_without_error() {
        let obj = json!({"unrelated": true});
        assert_eq!(AMOUNT_OUT.base_units(&obj), None);
        assert!(!NEEDS_UNWRAP.flag(&obj));
        assert_eq!(FEE.string_or(&obj, "0"), "0");
        assert!(STEPS.array(&obj).is_empty());
        assert_eq!(DEADLINE.u64(&obj), None);
    }

    #[test]
    fn scalar_coercions() {
        let obj = json!({
            "hasSlippage": "true",
            "deadline_ms": "1700000000000",
            "price_impact": 0.25,
            "dexId": "Veax"
        });
        assert!(HAS_SLIPPAGE.flag(&obj));
        assert_eq!(DEADLINE.u64(&obj), Some(1_700_000_000_000));
        assert_eq!(PRICE_IMPACT.string(&obj).as_deref(), Some("0.25"));
        assert_eq!(VENUE.string(&obj).as_deref(), Some("Veax"));
    }

    #[test]
    fn malformed_amount_is_a_miss() {
        let obj = json!({"amount_out": "12.5"});
        assert_eq!(AMOUNT_OUT.base_units(&obj), None);
    }

    #[test]
    fn oversized_json_number_is_a_miss() {
        let obj: Value = serde_json::from_str(r#"{"amount_out": 123456789012345678901234}"#).unwrap();
        assert_eq!(AMOUNT_OUT.base_units(&obj), None);

        let obj = json!({"amount_out": "123456789012345678901234"});
        assert_eq!(
            AMOUNT_OUT.base_units(&obj).map(|v| v.to_string()).as_deref(),
            Some("123456789012345678901234")
        );
    }
}
