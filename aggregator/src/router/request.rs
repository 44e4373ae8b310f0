// Swap request types
// This file defines the resolver input and the JSON body of the
// route-fetch endpoint, plus the conversion between the two
//
// Numan Thabit 2025 Nov

use crate::errors::ResolutionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlippageKind {
    Auto,
    Fixed,
}

/// Slippage bounds as fractions (0.01 = 1%).
#[derive(Debug, Clone, PartialEq)]
pub enum SlippagePolicy {
    Auto { max: f64, min: f64 },
    Fixed(f64),
}

impl SlippagePolicy {
    /// Query parameters understood by the routing service.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            SlippagePolicy::Auto { max, min } => vec![
                ("slippage_type", "Auto".to_string()),
                ("max_slippage", max.to_string()),
                ("min_slippage", min.to_string()),
            ],
            SlippagePolicy::Fixed(value) => vec![
                ("slippage_type", "Fixed".to_string()),
                ("slippage", value.to_string()),
            ],
        }
    }
}

/// Fallback slippage bounds applied when the caller leaves them out.
#[derive(Debug, Clone, Copy)]
pub struct SlippageDefaults {
    pub max: f64,
    pub min: f64,
}

impl Default for SlippageDefaults {
    fn default() -> Self {
        Self {
            max: 0.05,
            min: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    pub token_in: String,
    pub token_out: String,
    /// Human units, plain decimal notation
    pub amount_in: String,
    pub decimals_in: u32,
    pub decimals_out: u32,
    pub slippage: SlippagePolicy,
    pub trader_account_id: Option<String>,
    pub signing_public_key: Option<String>,
}

impl SwapRequest {
    pub fn new(
        token_in: impl Into<String>,
        token_out: impl Into<String>,
        amount_in: impl Into<String>,
        decimals_in: u32,
        decimals_out: u32,
    ) -> Self {
        let defaults = SlippageDefaults::default();
        Self {
            token_in: token_in.into(),
            token_out: token_out.into(),
            amount_in: amount_in.into(),
            decimals_in,
            decimals_out,
            slippage: SlippagePolicy::Auto {
                max: defaults.max,
                min: defaults.min,
            },
            trader_account_id: None,
            signing_public_key: None,
        }
    }

    pub fn with_slippage(mut self, slippage: SlippagePolicy) -> Self {
        self.slippage = slippage;
        self
    }

    pub fn with_trader(mut self, account_id: impl Into<String>, public_key: Option<String>) -> Self {
        self.trader_account_id = Some(account_id.into());
        self.signing_public_key = public_key;
        self
    }
}

/// Decimals assumed when the route-fetch body omits them (NEAR's native precision).
pub const DEFAULT_DECIMALS: u32 = 24;

/// JSON body of `POST /api/swap-route`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFetchRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals_in: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals_out: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage_type: Option<SlippageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_slippage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_slippage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trader_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_public_key: Option<String>,
}

impl RouteFetchRequest {
    pub fn into_swap_request(
        self,
        defaults: SlippageDefaults,
    ) -> Result<SwapRequest, ResolutionError> {
        let amount_in = match self.amount_in {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => {
                return Err(ResolutionError::InvalidInput(format!(
                    "amountIn must be a decimal string, got {other}"
                )))
            }
        };

        let slippage = match self.slippage_type.unwrap_or(SlippageKind::Auto) {
            SlippageKind::Auto => SlippagePolicy::Auto {
                max: self.max_slippage.unwrap_or(defaults.max),
                min: self.min_slippage.unwrap_or(defaults.min),
            },
            SlippageKind::Fixed => SlippagePolicy::Fixed(
                self.slippage
                    .or(self.max_slippage)
                    .unwrap_or(defaults.max),
            ),
        };

        Ok(SwapRequest {
            token_in: self.token_in,
            token_out: self.token_out,
            amount_in,
            decimals_in: parse_decimals("decimalsIn", self.decimals_in)?,
            decimals_out: parse_decimals("decimalsOut", self.decimals_out)?,
            slippage,
            trader_account_id: self.trader_account_id.filter(|s| !s.is_empty()),
            signing_public_key: self.signing_public_key.filter(|s| !s.is_empty()),
        })
    }
}

impl From<&SwapRequest> for RouteFetchRequest {
    fn from(req: &SwapRequest) -> Self {
        let (slippage_type, max_slippage, min_slippage, slippage) = match req.slippage {
            SlippagePolicy::Auto { max, min } => (SlippageKind::Auto, Some(max), Some(min), None),
            SlippagePolicy::Fixed(value) => (SlippageKind::Fixed, None, None, Some(value)),
        };
        Self {
            token_in: req.token_in.clone(),
            token_out: req.token_out.clone(),
            amount_in: Value::String(req.amount_in.clone()),
            decimals_in: Some(Value::from(req.decimals_in)),
            decimals_out: Some(Value::from(req.decimals_out)),
            slippage_type: Some(slippage_type),
            max_slippage,
            min_slippage,
            slippage,
            trader_account_id: req.trader_account_id.clone(),
            signing_public_key: req.signing_public_key.clone(),
        }
    }
}

fn parse_decimals(field: &str, raw: Option<Value>) -> Result<u32, ResolutionError> {
    let invalid =
        || ResolutionError::InvalidInput(format!("{field} must be a non-negative integer"));
    match raw {
        None | Some(Value::Null) => Ok(DEFAULT_DECIMALS),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<u32>().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}
