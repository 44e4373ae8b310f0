// Execution engine - drives a normalized route to settlement
// This file implements the two settlement paths: ordered chain transactions
// with confirmation waits between dependent steps, and a single signed
// intent published to the solver relay
//
// Numan Thabit 2025 Nov

use crate::config::AppConfig;
use crate::errors::ExecutionError;
use crate::router::routes::{Action, ChainTransaction, Route};
use crate::signing::{
    FunctionCallAction, SignMessageRequest, SignedIntent, SignerError, SigningHandle,
    TransactionRequest,
};
use crate::transport::jsonrpc::{JsonRpc, TxStatus};
use crate::transport::relay::SolverRelay;
use crate::venues::{INTENTS_CONTRACT, WRAP_CONTRACT};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use num_bigint::BigUint;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Upstream argument payloads are padded inconsistently.
const ARGS_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// 30 TGas for the unwrap call.
const UNWRAP_GAS: u64 = 30_000_000_000_000;
/// One yoctoNEAR, required by `near_withdraw`.
const UNWRAP_DEPOSIT: u128 = 1;
/// `tokio::time::interval` rejects a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
    pub intents_recipient: String,
    pub wrap_contract: String,
    pub callback_origin: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            confirmation_timeout: Duration::from_secs(30),
            intents_recipient: INTENTS_CONTRACT.to_string(),
            wrap_contract: WRAP_CONTRACT.to_string(),
            callback_origin: None,
        }
    }
}

/// Per-call state machine. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionState {
    Idle,
    Submitting { step: usize },
    Confirming { step: usize },
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Transaction,
    Unwrap,
    Intent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub kind: StepKind,
    pub tx_hash: Option<String>,
    /// None on success
    pub error: Option<String>,
}

impl StepRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SwapExecutionResult {
    pub success: bool,
    pub settlement_id: Option<String>,
    pub error: Option<ExecutionError>,
    pub receipts: Vec<Value>,
    pub steps: Vec<StepRecord>,
}

/// Execution statistics for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ExecutionStats {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub cancelled_executions: u64,
    pub success_rate: f64,
}

/// Accumulates the outcome of one settlement attempt.
#[derive(Default)]
struct Ledger {
    steps: Vec<StepRecord>,
    receipts: Vec<Value>,
}

impl Ledger {
    fn record(&mut self, index: usize, kind: StepKind, tx_hash: Option<String>, error: Option<String>) {
        self.steps.push(StepRecord {
            index,
            kind,
            tx_hash,
            error,
        });
    }

    /// Hash of the last successful route step. Unwrap cleanup never counts,
    /// even though it is recorded last: the id names the swap, not the
    /// housekeeping withdraw that follows it.
    fn settlement_id(&self) -> Option<String> {
        self.steps
            .iter()
            .rev()
            .filter(|s| s.kind != StepKind::Unwrap && s.succeeded())
            .find_map(|s| s.tx_hash.clone())
    }

    fn any_route_step_succeeded(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.kind != StepKind::Unwrap && s.succeeded())
    }

    fn finish(self, error: Option<ExecutionError>) -> SwapExecutionResult {
        let success = error.is_none() && self.any_route_step_succeeded();
        SwapExecutionResult {
            success,
            settlement_id: if error.is_none() {
                self.settlement_id()
            } else {
                None
            },
            error,
            receipts: self.receipts,
            steps: self.steps,
        }
    }
}

enum ConfirmationError {
    TimedOut,
    Failed(String),
}

pub struct ExecutionEngine {
    rpc: JsonRpc,
    relay: SolverRelay,
    settings: EngineSettings,
    total_executions: AtomicU64,
    successful_executions: AtomicU64,
    failed_executions: AtomicU64,
    cancelled_executions: AtomicU64,
}

impl ExecutionEngine {
    pub fn new(rpc: JsonRpc, relay: SolverRelay, settings: EngineSettings) -> Self {
        Self {
            rpc,
            relay,
            settings,
            total_executions: AtomicU64::new(0),
            successful_executions: AtomicU64::new(0),
            failed_executions: AtomicU64::new(0),
            cancelled_executions: AtomicU64::new(0),
        }
    }

    /// Engine against the configured NEAR RPC node and solver relay.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            JsonRpc::new(config.near_rpc_endpoint.as_str(), "near_rpc")
                .with_timeout(config.rpc_timeout()),
            SolverRelay::new(config.solver_relay_endpoint.as_str())
                .with_timeout(config.relay_timeout()),
            config.engine_settings(),
        )
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn get_stats(&self) -> ExecutionStats {
        let total = self.total_executions.load(Ordering::Relaxed);
        let successful = self.successful_executions.load(Ordering::Relaxed);
        ExecutionStats {
            total_executions: total,
            successful_executions: successful,
            failed_executions: self.failed_executions.load(Ordering::Relaxed),
            cancelled_executions: self.cancelled_executions.load(Ordering::Relaxed),
            success_rate: if total > 0 {
                successful as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Settle `route` through `signer`. A fresh call always starts from step 0.
    pub async fn execute_swap<H: SigningHandle>(
        &self,
        route: &Route,
        signer: &H,
    ) -> SwapExecutionResult {
        let (state, _) = watch::channel(ExecutionState::Idle);
        self.execute_swap_observed(route, signer, &state).await
    }

    /// Like `execute_swap`, publishing every state transition on `state`.
    #[tracing::instrument(skip_all, fields(dex = %route.dex_id, intents = route.use_intents, account = %signer.account_id()))]
    pub async fn execute_swap_observed<H: SigningHandle>(
        &self,
        route: &Route,
        signer: &H,
        state: &watch::Sender<ExecutionState>,
    ) -> SwapExecutionResult {
        self.total_executions.fetch_add(1, Ordering::Relaxed);
        state.send_replace(ExecutionState::Idle);

        let result = if route.use_intents {
            self.settle_intent(route, signer, state).await
        } else {
            self.settle_transactions(route, signer, state).await
        };

        if result.success {
            self.successful_executions.fetch_add(1, Ordering::Relaxed);
            state.send_replace(ExecutionState::Completed);
            info!(
                settlement_id = result.settlement_id.as_deref().unwrap_or("-"),
                steps = result.steps.len(),
                "swap settled"
            );
        } else {
            if result.error == Some(ExecutionError::UserCancelled) {
                self.cancelled_executions.fetch_add(1, Ordering::Relaxed);
            } else {
                self.failed_executions.fetch_add(1, Ordering::Relaxed);
            }
            state.send_replace(ExecutionState::Failed);
            warn!(
                error = %result.error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                "swap failed"
            );
        }
        result
    }

    async fn settle_transactions<H: SigningHandle>(
        &self,
        route: &Route,
        signer: &H,
        state: &watch::Sender<ExecutionState>,
    ) -> SwapExecutionResult {
        let mut ledger = Ledger::default();

        if route.steps.is_empty() {
            return ledger.finish(Some(ExecutionError::InvalidQuote(
                "route has no execution steps".into(),
            )));
        }
        // Decode everything up front so a bad payload never leaves a half-executed swap.
        let requests = match route
            .steps
            .iter()
            .map(|step| build_transaction(step.transaction()))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(requests) => requests,
            Err(err) => return ledger.finish(Some(err)),
        };

        let last = requests.len() - 1;
        let mut last_failure = None;
        for (index, (step, request)) in route.steps.iter().zip(&requests).enumerate() {
            let continuable = step.transaction().continue_if_failed;
            state.send_replace(ExecutionState::Submitting { step: index });
            debug!(step = index, receiver = %request.receiver_id, "submitting transaction");

            let submitted = match signer.sign_and_submit(request).await {
                Ok(submitted) => submitted,
                Err(SignerError::Cancelled) => {
                    ledger.record(index, StepKind::Transaction, None, Some("cancelled".into()));
                    return ledger.finish(Some(ExecutionError::UserCancelled));
                }
                Err(SignerError::Rejected(reason)) => {
                    warn!(step = index, reason = %reason, continuable, "transaction failed");
                    ledger.record(index, StepKind::Transaction, None, Some(reason.clone()));
                    let err = ExecutionError::StepFailed { step: index, reason };
                    if !continuable {
                        return ledger.finish(Some(err));
                    }
                    last_failure = Some(err);
                    continue;
                }
            };
            ledger.receipts.extend(submitted.receipts);
            let tx_hash = submitted.tx_hash;

            if index < last {
                state.send_replace(ExecutionState::Confirming { step: index });
                match self.await_confirmation(&tx_hash, signer.account_id()).await {
                    Ok(()) => {}
                    Err(ConfirmationError::TimedOut) => {
                        ledger.record(
                            index,
                            StepKind::Transaction,
                            Some(tx_hash.clone()),
                            Some("confirmation timed out".into()),
                        );
                        return ledger.finish(Some(ExecutionError::ConfirmationTimeout {
                            step: index,
                            tx_hash,
                        }));
                    }
                    Err(ConfirmationError::Failed(reason)) => {
                        warn!(step = index, tx_hash = %tx_hash, reason = %reason, "transaction failed on chain");
                        ledger.record(
                            index,
                            StepKind::Transaction,
                            Some(tx_hash),
                            Some(reason.clone()),
                        );
                        let err = ExecutionError::StepFailed { step: index, reason };
                        if !continuable {
                            return ledger.finish(Some(err));
                        }
                        last_failure = Some(err);
                        continue;
                    }
                }
            }
            info!(step = index, tx_hash = %tx_hash, "transaction submitted");
            ledger.record(index, StepKind::Transaction, Some(tx_hash), None);
        }

        if route.needs_unwrap {
            self.unwrap_leftovers(signer, requests.len(), &mut ledger, state)
                .await;
        }

        let error = if ledger.any_route_step_succeeded() {
            None
        } else {
            last_failure
        };
        ledger.finish(error)
    }

    /// Poll the transaction until it is final. Bounded by the confirmation timeout.
    async fn await_confirmation(&self, tx_hash: &str, sender_id: &str) -> Result<(), ConfirmationError> {
        let poll = async {
            let mut ticker =
                tokio::time::interval(self.settings.poll_interval.max(MIN_POLL_INTERVAL));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.rpc.tx_status(tx_hash, sender_id).await {
                    Ok(TxStatus::Succeeded) => return Ok(()),
                    Ok(TxStatus::Failed(reason)) => return Err(ConfirmationError::Failed(reason)),
                    Ok(TxStatus::Pending) => debug!(tx_hash, "transaction pending"),
                    Err(err) => debug!(tx_hash, error = %err, "status poll failed"),
                }
            }
        };
        tokio::time::timeout(self.settings.confirmation_timeout, poll)
            .await
            .unwrap_or(Err(ConfirmationError::TimedOut))
    }

    /// Best effort: withdraw the whole wrapped balance. Never fails the swap.
    async fn unwrap_leftovers<H: SigningHandle>(
        &self,
        signer: &H,
        index: usize,
        ledger: &mut Ledger,
        state: &watch::Sender<ExecutionState>,
    ) {
        let wrap = &self.settings.wrap_contract;
        let balance = match self.rpc.ft_balance_of(wrap, signer.account_id()).await {
            Ok(balance) => balance,
            Err(err) => {
                warn!(error = %err, "wrapped balance lookup failed; skipping unwrap");
                return;
            }
        };
        if balance == BigUint::default() {
            debug!("no wrapped balance to unwrap");
            return;
        }

        state.send_replace(ExecutionState::Submitting { step: index });
        let request = unwrap_request(wrap, &balance);
        match signer.sign_and_submit(&request).await {
            Ok(submitted) => {
                info!(tx_hash = %submitted.tx_hash, amount = %balance, "unwrapped leftover balance");
                ledger.receipts.extend(submitted.receipts);
                ledger.record(index, StepKind::Unwrap, Some(submitted.tx_hash), None);
            }
            Err(err) => {
                warn!(error = %err, "unwrap failed");
                ledger.record(index, StepKind::Unwrap, None, Some(err.to_string()));
            }
        }
    }

    async fn settle_intent<H: SigningHandle>(
        &self,
        route: &Route,
        signer: &H,
        state: &watch::Sender<ExecutionState>,
    ) -> SwapExecutionResult {
        let mut ledger = Ledger::default();

        let Some(quote) = route.intents_quote.as_ref().filter(|q| q.is_signable()) else {
            return ledger.finish(Some(ExecutionError::InvalidQuote(
                "intents route without a signable quote".into(),
            )));
        };

        state.send_replace(ExecutionState::Submitting { step: 0 });
        let payload = SignMessageRequest::new(
            quote.message_to_sign.clone(),
            self.settings.intents_recipient.clone(),
            self.settings.callback_origin.clone(),
        );
        let signed = match signer.sign_message(&payload).await {
            Ok(signed) => signed,
            Err(SignerError::Cancelled) => {
                return ledger.finish(Some(ExecutionError::UserCancelled));
            }
            Err(SignerError::Rejected(reason)) => {
                ledger.record(0, StepKind::Intent, None, Some(reason.clone()));
                return ledger.finish(Some(ExecutionError::Signing(reason)));
            }
        };

        let intent = SignedIntent::nep413(payload, signed);
        match self.relay.publish_intent(&quote.quote_hash, &intent).await {
            Ok(published) => {
                ledger.receipts.extend(published.receipts);
                ledger.record(0, StepKind::Intent, published.settlement_id, None);
                ledger.finish(None)
            }
            Err(err) => {
                ledger.record(0, StepKind::Intent, None, Some(err.to_string()));
                ledger.finish(Some(err))
            }
        }
    }
}

/// Decode a route step into a signable transaction.
fn build_transaction(tx: &ChainTransaction) -> Result<TransactionRequest, ExecutionError> {
    let actions = tx
        .actions
        .iter()
        .map(|action| {
            let Action::FunctionCall(call) = action;
            let args = ARGS_B64.decode(call.args.trim()).map_err(|e| {
                ExecutionError::InvalidQuote(format!("{}: bad args payload: {e}", call.method_name))
            })?;
            let gas = call.gas.trim().parse::<u64>().map_err(|e| {
                ExecutionError::InvalidQuote(format!("{}: bad gas {:?}: {e}", call.method_name, call.gas))
            })?;
            let deposit = call.deposit.trim().parse::<u128>().map_err(|e| {
                ExecutionError::InvalidQuote(format!(
                    "{}: bad deposit {:?}: {e}",
                    call.method_name, call.deposit
                ))
            })?;
            Ok(FunctionCallAction {
                method_name: call.method_name.clone(),
                args,
                gas,
                deposit,
            })
        })
        .collect::<Result<Vec<_>, ExecutionError>>()?;

    Ok(TransactionRequest {
        receiver_id: tx.receiver_id.clone(),
        actions,
    })
}

fn unwrap_request(wrap_contract: &str, amount: &BigUint) -> TransactionRequest {
    TransactionRequest {
        receiver_id: wrap_contract.to_string(),
        actions: vec![FunctionCallAction {
            method_name: "near_withdraw".to_string(),
            args: json!({ "amount": amount.to_string() }).to_string().into_bytes(),
            gas: UNWRAP_GAS,
            deposit: UNWRAP_DEPOSIT,
        }],
    }
}
