//! The account ledger — balances and public keys, height-versioned.
//!
//! Every mutation records an undo entry tagged with the block height that
//! caused it, so the ledger can be rolled back when blocks are popped off.
//! The genesis creator account is exempt from negative-balance checks: the
//! genesis allocation drives it negative by the full supply.

use crate::derived::DerivedTable;
use crate::error::ValidationError;
use ignis_types::amount::ONE_IGNIS;
use ignis_types::{AccountId, PublicKey};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountState {
    pub public_key: Option<PublicKey>,
    pub balance_nqt: i64,
    pub unconfirmed_balance_nqt: i64,
}

struct Undo {
    height: u32,
    id: AccountId,
    prior: Option<AccountState>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, AccountState>,
    undo_log: Vec<Undo>,
}

pub struct AccountLedger {
    creator_id: AccountId,
    inner: Mutex<Inner>,
}

impl AccountLedger {
    pub fn new(creator_id: AccountId) -> Self {
        Self {
            creator_id,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn account(&self, id: AccountId) -> Option<AccountState> {
        self.inner.lock().unwrap().accounts.get(&id).cloned()
    }

    pub fn balance_nqt(&self, id: AccountId) -> i64 {
        self.account(id).map(|a| a.balance_nqt).unwrap_or(0)
    }

    pub fn unconfirmed_balance_nqt(&self, id: AccountId) -> i64 {
        self.account(id)
            .map(|a| a.unconfirmed_balance_nqt)
            .unwrap_or(0)
    }

    /// Stake counted toward forging targets, in whole coins.
    pub fn effective_balance_coins(&self, id: AccountId) -> u64 {
        self.balance_nqt(id).max(0) as u64 / ONE_IGNIS
    }

    pub fn public_key(&self, id: AccountId) -> Option<PublicKey> {
        self.account(id).and_then(|a| a.public_key)
    }

    pub fn account_count(&self) -> usize {
        self.inner.lock().unwrap().accounts.len()
    }

    fn mutate<R>(
        &self,
        id: AccountId,
        height: u32,
        f: impl FnOnce(&mut AccountState) -> R,
    ) -> R {
        let mut inner = self.inner.lock().unwrap();
        let prior = inner.accounts.get(&id).cloned();
        inner.undo_log.push(Undo { height, id, prior });
        let state = inner.accounts.entry(id).or_default();
        f(state)
    }

    /// Bind a public key to an account. A key, once set, is permanent; a
    /// conflicting binding is rejected.
    pub fn apply_public_key(
        &self,
        id: AccountId,
        key: &PublicKey,
        height: u32,
    ) -> Result<(), ValidationError> {
        let existing = self.public_key(id);
        match existing {
            Some(bound) if bound != *key => Err(ValidationError::not_valid(format!(
                "public key mismatch for account {id}"
            ))),
            Some(_) => Ok(()),
            None => {
                self.mutate(id, height, |state| state.public_key = Some(*key));
                Ok(())
            }
        }
    }

    /// Adjust the unconfirmed balance. Refuses (without mutating) when the
    /// result would go negative, except for the genesis creator.
    pub fn add_to_unconfirmed(&self, id: AccountId, delta_nqt: i64, height: u32) -> bool {
        let current = self.unconfirmed_balance_nqt(id);
        let next = current + delta_nqt;
        if next < 0 && id != self.creator_id {
            return false;
        }
        self.mutate(id, height, |state| state.unconfirmed_balance_nqt = next);
        true
    }

    /// Adjust the confirmed balance.
    pub fn add_to_balance(&self, id: AccountId, delta_nqt: i64, height: u32) {
        self.mutate(id, height, |state| state.balance_nqt += delta_nqt);
    }

    /// Adjust both balances together (credits, fees).
    pub fn add_to_balance_and_unconfirmed(&self, id: AccountId, delta_nqt: i64, height: u32) {
        self.mutate(id, height, |state| {
            state.balance_nqt += delta_nqt;
            state.unconfirmed_balance_nqt += delta_nqt;
        });
    }
}

impl DerivedTable for AccountLedger {
    fn name(&self) -> &'static str {
        "account"
    }

    fn rollback(&self, height: u32) {
        let mut inner = self.inner.lock().unwrap();
        while let Some(entry) = inner.undo_log.last() {
            if entry.height <= height {
                break;
            }
            let entry = inner.undo_log.pop().expect("peeked above");
            match entry.prior {
                Some(state) => {
                    inner.accounts.insert(entry.id, state);
                }
                None => {
                    inner.accounts.remove(&entry.id);
                }
            }
        }
    }

    fn trim(&self, height: u32) {
        self.inner
            .lock()
            .unwrap()
            .undo_log
            .retain(|entry| entry.height > height);
    }

    fn truncate(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.accounts.clear();
        inner.undo_log.clear();
    }
}
