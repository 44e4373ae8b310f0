// Route normalization
// Turns a routing service payload (one route object, or a best-first list)
// into the normalized `Route` the execution engine consumes
//
// Numan Thabit 2025 Nov

use crate::errors::ResolutionError;
use crate::router::fields::{self, INTENTS_QUOTE_TAG};
use crate::router::routes::{ExecutionStep, IntentsQuote, Route};
use crate::units::format_human;
use crate::venues::is_intents_venue;
use num_bigint::BigUint;
use serde_json::Value;
use tracing::{debug, warn};

/// Display estimate used when the routing service reports no gas figure.
pub const DEFAULT_GAS_ESTIMATE: &str = "0.003";
/// Display estimate used when the routing service reports no fee.
pub const DEFAULT_FEE_ESTIMATE: &str = "0.003";

/// Pick the best route object out of a payload.
fn best_route(body: &Value) -> Result<&Value, ResolutionError> {
    match body {
        Value::Array(routes) => routes.first().ok_or(ResolutionError::NoRouteAvailable),
        Value::Object(_) => Ok(body),
        Value::Null => Err(ResolutionError::NoRouteAvailable),
        other => Err(ResolutionError::upstream(
            None,
            format!("unexpected route payload: {other}"),
        )),
    }
}

/// Execution steps and the intents payload, split by structural tag.
fn split_instructions(
    instructions: &[Value],
) -> Result<(Vec<ExecutionStep>, Option<IntentsQuote>), ResolutionError> {
    let mut steps = Vec::with_capacity(instructions.len());
    let mut quote = None;

    for (index, item) in instructions.iter().enumerate() {
        if let Some(payload) = item.get(INTENTS_QUOTE_TAG) {
            if quote.is_none() {
                quote = Some(IntentsQuote {
                    message_to_sign: fields::MESSAGE_TO_SIGN.string_or(payload, ""),
                    quote_hash: fields::QUOTE_HASH.string_or(payload, ""),
                });
            }
            continue;
        }
        if item.get("NearTransaction").is_none() {
            warn!(index, instruction = %item, "skipping unrecognized execution instruction");
            continue;
        }
        let step: ExecutionStep = serde_json::from_value(item.clone()).map_err(|e| {
            ResolutionError::upstream(None, format!("malformed transaction at index {index}: {e}"))
        })?;
        steps.push(step);
    }

    Ok((steps, quote))
}

/// Normalize a routing service payload into a `Route`.
pub fn normalize_route(body: Value, decimals_out: u32) -> Result<Route, ResolutionError> {
    let best = best_route(&body)?;

    let zero = BigUint::from(0u32);
    let amount_out = fields::AMOUNT_OUT.base_units(best).unwrap_or_else(|| zero.clone());
    let mut min_out = fields::MIN_AMOUNT_OUT.base_units(best).unwrap_or(zero);
    if min_out > amount_out {
        debug!(
            amount_out = %amount_out,
            min_out = %min_out,
            "worst case above estimate; clamping"
        );
        min_out = amount_out.clone();
    }

    let dex_id = fields::VENUE.string_or(best, "");
    let mut path: Vec<String> = fields::PATH
        .array(best)
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    if path.is_empty() && !dex_id.is_empty() {
        path.push(dex_id.clone());
    }

    let has_slippage = fields::HAS_SLIPPAGE.flag(best);
    let price_impact = fields::PRICE_IMPACT
        .string(best)
        .unwrap_or_else(|| (if has_slippage { "0.5" } else { "0" }).to_string());

    let (steps, quote) = split_instructions(fields::STEPS.array(best))?;

    let use_intents = is_intents_venue(&dex_id);
    let intents_quote = if use_intents {
        match quote {
            Some(q) if q.is_signable() => Some(q),
            _ => {
                return Err(ResolutionError::upstream(
                    None,
                    "intents route without a signable quote",
                ))
            }
        }
    } else {
        None
    };

    let route = Route {
        route: path,
        amount_out: format_human(&amount_out, decimals_out),
        minimum_received: format_human(&min_out, decimals_out),
        price_impact,
        estimated_gas: fields::ESTIMATED_GAS.string_or(best, DEFAULT_GAS_ESTIMATE),
        fee: fields::FEE.string_or(best, DEFAULT_FEE_ESTIMATE),
        steps,
        needs_unwrap: fields::NEEDS_UNWRAP.flag(best),
        deadline: fields::DEADLINE.u64(best),
        has_slippage,
        dex_id,
        use_intents,
        intents_quote,
        raw_response: Value::Null,
    };

    Ok(Route {
        raw_response: body,
        ..route
    })
}
