//! Transaction orchestration
//!
//! [`TransactionController`] owns the single explicit state machine that
//! takes a user from "no wallet" to a confirmed deposit or withdrawal:
//!
//! ```text
//! Unbound ──connect──▶ Bound ──enter_amount──▶ AmountEntered ──select──▶ TypeSelected
//!                        ▲                                                  │ confirm
//!                        │                                                  ▼
//!                        └──── refresh ◀── Confirmed ◀── finality ◀── Submitting
//!
//!                 any failure ──▶ Failed ──acknowledge──▶ Bound
//!                                        ──enter_amount─▶ AmountEntered
//! ```
//!
//! The controller runs on one task. State lives in a `RefCell` and is never
//! borrowed across a suspension point, so a second trigger that arrives while
//! a remote call is outstanding sees the in-flight state and is refused.

use alloy_primitives::U256;
use std::cell::RefCell;
use std::fmt;
use tokio::time::timeout;

use crate::config::AtmConfig;
use crate::fee::{FeeEstimate, FeeEstimator, NetworkFeeParams};
use crate::input::{parse_amount, Amount};
use crate::ledger::{Finality, LedgerClient, TransactionRef};
use crate::provider::{WalletHost, WalletProvider};
use crate::wallet::{Account, SessionState, WalletSession};
use crate::AtmError;

/// Balance-mutating transaction type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one transaction the user is preparing or submitting
#[derive(Clone, Debug, PartialEq)]
pub struct PendingTransaction {
    pub kind: TransactionKind,
    pub amount: Amount,
    /// Advisory display fee, unrelated to the gas actually charged
    pub estimated_fee: FeeEstimate,
}

/// Controller state with the data valid in that state
#[derive(Clone, Debug, PartialEq)]
pub enum ControllerState {
    /// No account connected or no ledger binding
    Unbound,
    /// Ledger bound, nothing pending
    Bound,
    AmountEntered {
        amount: Amount,
    },
    TypeSelected {
        pending: PendingTransaction,
    },
    /// Submitted or awaiting finality
    Submitting {
        pending: PendingTransaction,
    },
    /// Final; the balance refresh is outstanding
    Confirmed {
        pending: PendingTransaction,
        tx_ref: TransactionRef,
    },
    Failed {
        reason: AtmError,
        /// Kept until the user acknowledges or re-enters an amount
        pending: Option<PendingTransaction>,
    },
}

impl ControllerState {
    pub fn name(&self) -> &'static str {
        match self {
            ControllerState::Unbound => "unbound",
            ControllerState::Bound => "bound",
            ControllerState::AmountEntered { .. } => "amount entered",
            ControllerState::TypeSelected { .. } => "type selected",
            ControllerState::Submitting { .. } => "submitting",
            ControllerState::Confirmed { .. } => "confirmed",
            ControllerState::Failed { .. } => "failed",
        }
    }

    fn in_flight(&self) -> bool {
        matches!(
            self,
            ControllerState::Submitting { .. } | ControllerState::Confirmed { .. }
        )
    }
}

/// Outcome of a confirmed transaction
#[derive(Clone, Debug, PartialEq)]
pub struct Confirmation {
    pub pending: PendingTransaction,
    pub finality: Finality,
    /// Fee rate the transaction was submitted with
    pub network_fee: NetworkFeeParams,
    /// Balance after the post-confirmation refresh
    pub balance: U256,
}

#[derive(Clone, Debug, PartialEq)]
enum BalanceCache {
    Unloaded,
    Loading,
    Loaded(U256),
    Failed(AtmError),
}

struct Binding<P> {
    ledger: LedgerClient<P>,
    balance: BalanceCache,
}

/// Orchestrates wallet connection, balance refresh and transaction submission
pub struct TransactionController<P> {
    session: WalletSession<P>,
    config: AtmConfig,
    estimator: FeeEstimator,
    state: RefCell<ControllerState>,
    binding: RefCell<Option<Binding<P>>>,
}

impl<P: WalletProvider> TransactionController<P> {
    /// A controller with no wallet detected yet
    pub fn new(config: AtmConfig) -> Self {
        Self::with_session(WalletSession::new(), config)
    }

    pub fn with_session(session: WalletSession<P>, config: AtmConfig) -> Self {
        Self {
            session,
            config,
            estimator: FeeEstimator::new(),
            state: RefCell::new(ControllerState::Unbound),
            binding: RefCell::new(None),
        }
    }

    pub fn session(&self) -> &WalletSession<P> {
        &self.session
    }

    pub fn config(&self) -> &AtmConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state.borrow().clone()
    }

    pub fn account(&self) -> Option<Account> {
        self.binding
            .borrow()
            .as_ref()
            .map(|binding| binding.ledger.account())
    }

    /// Cached ledger balance
    pub fn balance(&self) -> Option<U256> {
        match self.binding.borrow().as_ref().map(|b| &b.balance) {
            Some(BalanceCache::Loaded(balance)) => Some(*balance),
            _ => None,
        }
    }

    /// Why the last balance fetch failed, if it did
    pub fn balance_error(&self) -> Option<AtmError> {
        match self.binding.borrow().as_ref().map(|b| &b.balance) {
            Some(BalanceCache::Failed(err)) => Some(err.clone()),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<PendingTransaction> {
        match &*self.state.borrow() {
            ControllerState::TypeSelected { pending }
            | ControllerState::Submitting { pending }
            | ControllerState::Confirmed { pending, .. } => Some(pending.clone()),
            ControllerState::Failed { pending, .. } => pending.clone(),
            _ => None,
        }
    }

    /// Whether the confirm control should be enabled
    pub fn can_submit(&self) -> bool {
        matches!(*self.state.borrow(), ControllerState::TypeSelected { .. })
    }

    /// Run the wallet discovery probe
    pub async fn probe<H>(&self, host: &H) -> SessionState
    where
        H: WalletHost<Provider = P>,
    {
        self.session.probe(host).await
    }

    /// Connect the wallet, bind the ledger and load the initial balance
    ///
    /// A failed initial balance fetch does not undo the connection; it is
    /// recorded (see [`Self::balance_error`]) and retried by
    /// [`Self::load_balance`].
    pub async fn connect(&self) -> Result<Account, AtmError> {
        let account = self.session.connect().await?;
        self.bind()?;

        if let Err(e) = self.load_balance().await {
            log::warn!("⚠️  Initial balance fetch failed: {}", e);
        }
        Ok(account)
    }

    /// Create the ledger binding for the connected account
    fn bind(&self) -> Result<(), AtmError> {
        let (provider, account) = self.session.signer().ok_or(AtmError::InvalidState {
            operation: "bind ledger",
            state: "no account is connected",
        })?;

        let mut binding = self.binding.borrow_mut();
        if let Some(existing) = binding.as_ref() {
            if existing.ledger.account() == account {
                return Ok(());
            }
        }

        *binding = Some(Binding {
            ledger: LedgerClient::bind(
                provider,
                account,
                self.config.contract_address,
                self.config.gas_limit,
                self.config.receipt_poll_interval,
            ),
            balance: BalanceCache::Unloaded,
        });
        *self.state.borrow_mut() = ControllerState::Bound;
        Ok(())
    }

    fn ledger(&self) -> Result<LedgerClient<P>, AtmError> {
        self.binding
            .borrow()
            .as_ref()
            .map(|binding| binding.ledger.clone())
            .ok_or(AtmError::InvalidState {
                operation: "use the ledger",
                state: "unbound",
            })
    }

    fn set_balance(&self, cache: BalanceCache) {
        if let Some(binding) = self.binding.borrow_mut().as_mut() {
            binding.balance = cache;
        }
    }

    /// Initial balance fetch, at most once per binding
    ///
    /// Returns the cached balance without a remote call once it is loaded,
    /// and `None` while a fetch is already in flight. A failed fetch is retried.
    /// While a transaction is in flight the cache is returned as is.
    pub async fn load_balance(&self) -> Result<Option<U256>, AtmError> {
        let ledger = {
            let mut binding = self.binding.borrow_mut();
            let binding = binding.as_mut().ok_or(AtmError::InvalidState {
                operation: "load balance",
                state: "unbound",
            })?;

            match &binding.balance {
                BalanceCache::Loaded(balance) => return Ok(Some(*balance)),
                BalanceCache::Loading => return Ok(None),
                _ if self.state.borrow().in_flight() => return Ok(None),
                BalanceCache::Unloaded | BalanceCache::Failed(_) => {}
            }
            binding.balance = BalanceCache::Loading;
            binding.ledger.clone()
        };

        let _guard = CancelGuard {
            controller: self,
            abandon: Self::abandon_balance_load,
        };
        let result = ledger.get_balance().await;
        self.set_balance(match &result {
            Ok(balance) => BalanceCache::Loaded(*balance),
            Err(e) => BalanceCache::Failed(e.clone()),
        });
        result.map(Some)
    }

    /// React to the wallet reporting a new account list
    ///
    /// A different (or missing) first account ends the binding: the
    /// controller returns to `Unbound` and the session to `Available`.
    /// Returns whether the binding was dropped.
    pub fn handle_accounts_changed(&self, accounts: &[Account]) -> Result<bool, AtmError> {
        if self.state.borrow().in_flight() {
            return Err(AtmError::TransactionPending);
        }
        let current = self.session.account();
        if current.is_none() || accounts.first() == current.as_ref() {
            return Ok(false);
        }

        log::info!(
            "🔄 Wallet account changed from {:?} to {:?}; unbinding ledger",
            current,
            accounts.first()
        );
        *self.binding.borrow_mut() = None;
        *self.state.borrow_mut() = ControllerState::Unbound;
        self.session.revoke();
        Ok(true)
    }

    /// Enter the transaction amount from raw field text
    ///
    /// Keeps a prior deposit/withdraw selection, re-estimating its fee.
    /// From `Failed` this starts a fresh attempt.
    pub fn enter_amount(&self, raw: &str) -> Result<Amount, AtmError> {
        let mut state = self.state.borrow_mut();
        let selected = match &*state {
            ControllerState::Bound
            | ControllerState::AmountEntered { .. }
            | ControllerState::Failed { .. } => None,
            ControllerState::TypeSelected { pending } => Some(pending.kind),
            s if s.in_flight() => return Err(AtmError::TransactionPending),
            s => {
                return Err(AtmError::InvalidState {
                    operation: "enter an amount",
                    state: s.name(),
                })
            }
        };

        let amount = parse_amount(raw)?;
        *state = match selected {
            Some(kind) => ControllerState::TypeSelected {
                pending: self.prepare(kind, amount),
            },
            None => ControllerState::AmountEntered { amount },
        };
        log::debug!("✏️  Amount entered: {}", amount);
        Ok(amount)
    }

    /// Choose deposit or withdraw, replacing any earlier choice
    pub fn select(&self, kind: TransactionKind) -> Result<PendingTransaction, AtmError> {
        let mut state = self.state.borrow_mut();
        let amount = match &*state {
            ControllerState::AmountEntered { amount } => *amount,
            ControllerState::TypeSelected { pending } => pending.amount,
            s if s.in_flight() => return Err(AtmError::TransactionPending),
            s => {
                return Err(AtmError::InvalidState {
                    operation: "select a transaction type",
                    state: s.name(),
                })
            }
        };

        let pending = self.prepare(kind, amount);
        log::info!(
            "🧾 {} of {} selected, estimated fee {}",
            kind,
            amount,
            pending.estimated_fee
        );
        *state = ControllerState::TypeSelected {
            pending: pending.clone(),
        };
        Ok(pending)
    }

    fn prepare(&self, kind: TransactionKind, amount: Amount) -> PendingTransaction {
        PendingTransaction {
            kind,
            amount,
            estimated_fee: self.estimator.estimate(amount.units()),
        }
    }

    /// Abandon the prepared transaction
    pub fn cancel(&self) -> Result<(), AtmError> {
        let mut state = self.state.borrow_mut();
        match &*state {
            ControllerState::AmountEntered { .. } | ControllerState::TypeSelected { .. } => {
                *state = ControllerState::Bound;
                Ok(())
            }
            s if s.in_flight() => Err(AtmError::TransactionPending),
            s => Err(AtmError::InvalidState {
                operation: "cancel",
                state: s.name(),
            }),
        }
    }

    /// Dismiss a failure, clearing the pending transaction
    pub fn acknowledge(&self) -> Result<(), AtmError> {
        let mut state = self.state.borrow_mut();
        match &*state {
            ControllerState::Failed { .. } => {
                *state = ControllerState::Bound;
                Ok(())
            }
            s => Err(AtmError::InvalidState {
                operation: "acknowledge",
                state: s.name(),
            }),
        }
    }

    /// Submit the selected transaction and wait for it to become final
    ///
    /// Fetches the fee rate fresh, dispatches exactly one ledger call, waits
    /// for finality and refreshes the balance once. Any failure moves the
    /// controller to `Failed` and is returned.
    pub async fn confirm(&self) -> Result<Confirmation, AtmError> {
        let (ledger, pending) = {
            let mut state = self.state.borrow_mut();
            let pending = match &*state {
                ControllerState::TypeSelected { pending } => pending.clone(),
                s if s.in_flight() => return Err(AtmError::TransactionPending),
                s => {
                    return Err(AtmError::InvalidState {
                        operation: "confirm",
                        state: s.name(),
                    })
                }
            };
            let ledger = self.ledger()?;
            *state = ControllerState::Submitting {
                pending: pending.clone(),
            };
            (ledger, pending)
        };

        log::info!("🚀 Confirming {} of {}", pending.kind, pending.amount);
        let _guard = CancelGuard {
            controller: self,
            abandon: Self::abandon_submission,
        };

        let (finality, network_fee) = match self.submit(&ledger, &pending).await {
            Ok(outcome) => outcome,
            Err(reason) => {
                log::error!("   ❌ {} failed: {}", pending.kind, reason);
                *self.state.borrow_mut() = ControllerState::Failed {
                    reason: reason.clone(),
                    pending: Some(pending),
                };
                return Err(reason);
            }
        };

        *self.state.borrow_mut() = ControllerState::Confirmed {
            pending: pending.clone(),
            tx_ref: finality.tx_ref,
        };

        match ledger.get_balance().await {
            Ok(balance) => {
                self.set_balance(BalanceCache::Loaded(balance));
                *self.state.borrow_mut() = ControllerState::Bound;
                log::info!("   ✅ {} confirmed, balance now {}", pending.kind, balance);
                Ok(Confirmation {
                    pending,
                    finality,
                    network_fee,
                    balance,
                })
            }
            Err(reason) => {
                // The transaction itself is final; only the refresh failed
                self.set_balance(BalanceCache::Failed(reason.clone()));
                *self.state.borrow_mut() = ControllerState::Failed {
                    reason: reason.clone(),
                    pending: None,
                };
                Err(reason)
            }
        }
    }

    async fn submit(
        &self,
        ledger: &LedgerClient<P>,
        pending: &PendingTransaction,
    ) -> Result<(Finality, NetworkFeeParams), AtmError> {
        let rate_bound = self.config.rate_fetch_timeout;
        let network_fee = timeout(rate_bound, ledger.network_fee_params())
            .await
            .map_err(|_| AtmError::RateFetchTimeout(rate_bound))??;

        let tx_ref = match pending.kind {
            TransactionKind::Deposit => ledger.deposit(pending.amount, &network_fee).await?,
            TransactionKind::Withdraw => ledger.withdraw(pending.amount, &network_fee).await?,
        };

        let finality_bound = self.config.finality_timeout;
        let finality = timeout(finality_bound, ledger.await_finality(tx_ref))
            .await
            .map_err(|_| AtmError::FinalityTimeout {
                tx_ref,
                waited: finality_bound,
            })??;

        Ok((finality, network_fee))
    }
}

impl<P> TransactionController<P> {
    /// Fail a submission whose `confirm` future was dropped mid-flight
    fn abandon_submission(&self) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };
        let pending = match &*state {
            ControllerState::Submitting { pending } => Some(pending.clone()),
            // Final, but the balance was never refreshed
            ControllerState::Confirmed { .. } => None,
            _ => return,
        };

        log::warn!("⚠️  Submission abandoned in state '{}'", state.name());
        *state = ControllerState::Failed {
            reason: AtmError::SubmissionCancelled,
            pending,
        };
        if let Ok(mut binding) = self.binding.try_borrow_mut() {
            if let Some(binding) = binding.as_mut() {
                binding.balance = BalanceCache::Unloaded;
            }
        }
    }

    /// Let the next `load_balance` retry a fetch that was dropped mid-flight
    fn abandon_balance_load(&self) {
        if let Ok(mut binding) = self.binding.try_borrow_mut() {
            if let Some(binding) = binding.as_mut() {
                if binding.balance == BalanceCache::Loading {
                    binding.balance = BalanceCache::Unloaded;
                }
            }
        }
    }
}

/// Runs `abandon` if the owning future is dropped; a no-op once the
/// operation has settled
struct CancelGuard<'a, P> {
    controller: &'a TransactionController<P>,
    abandon: fn(&TransactionController<P>),
}

impl<P> Drop for CancelGuard<'_, P> {
    fn drop(&mut self) {
        (self.abandon)(self.controller);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names_are_distinct() {
        let pending = PendingTransaction {
            kind: TransactionKind::Deposit,
            amount: Amount::new(1).unwrap(),
            estimated_fee: FeeEstimate::default(),
        };
        let states = [
            ControllerState::Unbound,
            ControllerState::Bound,
            ControllerState::AmountEntered {
                amount: pending.amount,
            },
            ControllerState::TypeSelected {
                pending: pending.clone(),
            },
            ControllerState::Submitting {
                pending: pending.clone(),
            },
            ControllerState::Confirmed {
                pending: pending.clone(),
                tx_ref: TransactionRef::ZERO,
            },
            ControllerState::Failed {
                reason: AtmError::TransactionPending,
                pending: None,
            },
        ];
        let mut names: Vec<_> = states.iter().map(ControllerState::name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), states.len());

        let in_flight: Vec<_> = states.iter().filter(|s| s.in_flight()).collect();
        assert_eq!(in_flight.len(), 2);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(TransactionKind::Deposit.to_string(), "deposit");
        assert_eq!(TransactionKind::Withdraw.to_string(), "withdraw");
    }
}
