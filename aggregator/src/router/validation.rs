// Pre-resolution validation module
// Validates token ids, amounts, decimals and slippage before any upstream call
//
// Numan Thabit 2025 Nov

use crate::errors::ResolutionError;
use crate::router::request::{SlippagePolicy, SwapRequest};
use crate::units::{to_base_units, MAX_DECIMALS};
use num_bigint::BigUint;

/// Validation result collecting every problem with a request
#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn into_result(self) -> Result<(), ResolutionError> {
        if self.is_valid {
            Ok(())
        } else {
            Err(ResolutionError::InvalidInput(self.errors.join("; ")))
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

fn valid_fraction(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Validate a swap request and return its input amount in base units.
///
/// Token pair identity is the caller's concern and is not checked here.
pub fn validate_swap_request(req: &SwapRequest) -> Result<BigUint, ResolutionError> {
    let mut result = ValidationResult::new();

    if req.token_in.trim().is_empty() {
        result.add_error("tokenIn is required".to_string());
    }
    if req.token_out.trim().is_empty() {
        result.add_error("tokenOut is required".to_string());
    }
    if req.decimals_out > MAX_DECIMALS {
        result.add_error(format!(
            "decimalsOut {} exceeds maximum of {MAX_DECIMALS}",
            req.decimals_out
        ));
    }

    match &req.slippage {
        SlippagePolicy::Auto { max, min } => {
            if !valid_fraction(*max) || !valid_fraction(*min) || min > max {
                result.add_error(format!(
                    "auto slippage bounds must satisfy 0 <= min <= max <= 1 (min {min}, max {max})"
                ));
            }
        }
        SlippagePolicy::Fixed(value) => {
            if !valid_fraction(*value) {
                result.add_error(format!("fixed slippage {value} must be within [0, 1]"));
            }
        }
    }

    let amount = match to_base_units(&req.amount_in, req.decimals_in) {
        Ok(amount) => Some(amount),
        Err(e) => {
            result.add_error(format!("amountIn: {e}"));
            None
        }
    };

    result.into_result()?;
    amount.ok_or_else(|| ResolutionError::InvalidInput("amountIn is invalid".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_base_units_for_valid_request() {
        let req = SwapRequest::new("near", "usdt.tether-token.near", "0.25", 24, 6);
        let amount = validate_swap_request(&req).unwrap();
        assert_eq!(amount.to_string(), "250000000000000000000000");
    }

    #[test]
    fn rejects_bad_amounts() {
        for bad in ["0", "-1", "abc", ""] {
            let req = SwapRequest::new("near", "wrap.near", bad, 24, 24);
            assert!(
                matches!(validate_swap_request(&req), Err(ResolutionError::InvalidInput(_))),
                "amount {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn collects_every_problem() {
        let req = SwapRequest::new("", "wrap.near", "abc", 24, 24)
            .with_slippage(SlippagePolicy::Fixed(2.0));
        let Err(ResolutionError::InvalidInput(msg)) = validate_swap_request(&req) else {
            panic!("expected invalid input");
        };
        assert!(msg.contains("tokenIn"));
        assert!(msg.contains("fixed slippage"));
        assert!(msg.contains("amountIn"));
    }

    #[test]
    fn same_token_pair_is_not_rejected_here() {
        let req = SwapRequest::new("near", "near", "1", 24, 24);
        assert!(validate_swap_request(&req).is_ok());
    }
}
