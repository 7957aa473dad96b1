//! Wallet session lifecycle
//!
//! ```text
//! Unavailable ──probe──▶ Available ──connect──▶ Connected
//!                            ▲                      │
//!                            └──────── revoke ──────┘
//! ```
//!
//! The session owns the wallet capability and the single active account.
//! Only one authorization request may be outstanding at a time.

use alloy_primitives::Address;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;

use crate::error::FailureCause;
use crate::provider::{WalletHost, WalletProvider};
use crate::AtmError;

/// Address of the authorized signer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Account(Address);

impl Account {
    pub fn new(address: Address) -> Self {
        Self(address)
    }

    pub fn address(&self) -> Address {
        self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Account {
    type Err = AtmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_str(s.trim())
            .map(Self)
            .map_err(|e| AtmError::invalid_input(format!("invalid account '{}': {}", s, e)))
    }
}

/// Externally visible session state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No wallet capability detected
    Unavailable,
    /// Wallet detected, no account authorized
    Available,
    /// Authorization request outstanding
    Connecting,
    /// Account authorized
    Connected(Account),
}

enum Slot<P> {
    Unavailable,
    Available(P),
    Connecting(P),
    Connected(P, Account),
}

impl<P> Slot<P> {
    fn state(&self) -> SessionState {
        match self {
            Slot::Unavailable => SessionState::Unavailable,
            Slot::Available(_) => SessionState::Available,
            Slot::Connecting(_) => SessionState::Connecting,
            Slot::Connected(_, account) => SessionState::Connected(*account),
        }
    }
}

/// Connection lifecycle to the external wallet capability
pub struct WalletSession<P> {
    slot: RefCell<Slot<P>>,
}

impl<P: WalletProvider> WalletSession<P> {
    /// A session with no wallet detected yet
    pub fn new() -> Self {
        Self {
            slot: RefCell::new(Slot::Unavailable),
        }
    }

    /// A session around an already-detected wallet
    pub fn with_provider(provider: P) -> Self {
        Self {
            slot: RefCell::new(Slot::Available(provider)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.slot.borrow().state()
    }

    /// The active account, once connected
    pub fn account(&self) -> Option<Account> {
        match &*self.slot.borrow() {
            Slot::Connected(_, account) => Some(*account),
            _ => None,
        }
    }

    /// Provider and account of a connected session
    pub fn signer(&self) -> Option<(P, Account)> {
        match &*self.slot.borrow() {
            Slot::Connected(provider, account) => Some((provider.clone(), *account)),
            _ => None,
        }
    }

    /// Discovery probe
    ///
    /// Asks the host for a wallet capability while `Unavailable`. Any other
    /// state is left untouched without consulting the host.
    pub async fn probe<H>(&self, host: &H) -> SessionState
    where
        H: WalletHost<Provider = P>,
    {
        if !matches!(*self.slot.borrow(), Slot::Unavailable) {
            return self.state();
        }

        let detected = host.detect().await;

        let mut slot = self.slot.borrow_mut();
        // Another probe may have resolved first
        if matches!(*slot, Slot::Unavailable) {
            match detected {
                Some(provider) => {
                    log::info!("👛 Wallet capability available");
                    *slot = Slot::Available(provider);
                }
                None => log::info!("👛 No wallet capability in host environment"),
            }
        }
        slot.state()
    }

    /// Request account authorization from the wallet
    ///
    /// Issues exactly one `eth_requestAccounts`. A declined request leaves the
    /// session `Available`. While a request is outstanding further calls return
    /// [`AtmError::ConnectPending`] without contacting the wallet.
    pub async fn connect(&self) -> Result<Account, AtmError> {
        let provider = {
            let mut slot = self.slot.borrow_mut();
            let provider = match &*slot {
                Slot::Unavailable => return Err(AtmError::WalletUnavailable),
                Slot::Connecting(_) => return Err(AtmError::ConnectPending),
                Slot::Connected(_, account) => return Ok(*account),
                Slot::Available(provider) => provider.clone(),
            };
            *slot = Slot::Connecting(provider.clone());
            provider
        };

        log::info!("🔑 Requesting wallet account authorization");
        let guard = ConnectGuard { slot: &self.slot };
        let outcome = provider.request("eth_requestAccounts", json!([])).await;
        guard.disarm();

        let result = match outcome {
            Ok(value) => parse_accounts(&value)
                .map_err(|cause| AtmError::remote("eth_requestAccounts", cause))
                .and_then(|accounts| {
                    accounts.first().copied().ok_or_else(|| {
                        AtmError::ConnectionDeclined("wallet returned no accounts".to_string())
                    })
                }),
            Err(e) if e.is_user_rejection() => Err(AtmError::ConnectionDeclined(e.to_string())),
            Err(e) => Err(AtmError::remote("eth_requestAccounts", e.into())),
        };

        *self.slot.borrow_mut() = match &result {
            Ok(account) => {
                log::info!("   ✅ Account connected: {}", account);
                Slot::Connected(provider, *account)
            }
            Err(e) => {
                log::warn!("   ⚠️  Wallet connection failed: {}", e);
                Slot::Available(provider)
            }
        };
        result
    }

    /// Drop the authorized account, returning to `Available`
    ///
    /// Returns whether an account was revoked.
    pub fn revoke(&self) -> bool {
        let mut slot = self.slot.borrow_mut();
        let current = std::mem::replace(&mut *slot, Slot::Unavailable);
        let (next, revoked) = match current {
            Slot::Connected(provider, account) => {
                log::info!("🔒 Account {} revoked", account);
                (Slot::Available(provider), true)
            }
            other => (other, false),
        };
        *slot = next;
        revoked
    }
}

impl<P: WalletProvider> Default for WalletSession<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the session to `Available` if a connect future is dropped mid-request
struct ConnectGuard<'a, P> {
    slot: &'a RefCell<Slot<P>>,
}

impl<P> ConnectGuard<'_, P> {
    fn disarm(self) {
        std::mem::forget(self);
    }
}

impl<P> Drop for ConnectGuard<'_, P> {
    fn drop(&mut self) {
        let mut slot = self.slot.borrow_mut();
        let current = std::mem::replace(&mut *slot, Slot::Unavailable);
        *slot = match current {
            Slot::Connecting(provider) => Slot::Available(provider),
            other => other,
        };
    }
}

/// Parse an `eth_accounts`/`eth_requestAccounts` result
pub(crate) fn parse_accounts(value: &Value) -> Result<Vec<Account>, FailureCause> {
    let entries = value
        .as_array()
        .ok_or_else(|| FailureCause::Malformed(format!("expected account array, got {}", value)))?;

    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .and_then(|s| Address::from_str(s).ok())
                .map(Account)
                .ok_or_else(|| FailureCause::Malformed(format!("invalid account entry {}", entry)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accounts() {
        let accounts = parse_accounts(&json!([
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
        ]))
        .unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(
            accounts[0],
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Account>()
                .unwrap()
        );

        assert!(parse_accounts(&json!([])).unwrap().is_empty());
        assert!(parse_accounts(&json!("0xabc")).is_err());
        assert!(parse_accounts(&json!(["not-an-address"])).is_err());
    }

    #[test]
    fn test_account_from_str_rejects_garbage() {
        assert!(matches!(
            "wallet".parse::<Account>(),
            Err(AtmError::InvalidInput(_))
        ));
    }
}
