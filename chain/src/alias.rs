//! The alias ledger — name-to-account bindings, height-versioned.
//!
//! Aliases are claimed by alias-assignment transactions. Names are unique
//! case-insensitively; a later assignment by the owner updates the URI.
//! Like the account ledger, every change carries an undo entry so popped
//! blocks unwind cleanly.

use crate::derived::DerivedTable;
use ignis_types::AccountId;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasEntry {
    /// The name as assigned (original casing).
    pub name: String,
    pub owner: AccountId,
    pub uri: String,
}

struct Undo {
    height: u32,
    key: String,
    prior: Option<AliasEntry>,
}

#[derive(Default)]
struct Inner {
    aliases: HashMap<String, AliasEntry>,
    undo_log: Vec<Undo>,
}

#[derive(Default)]
pub struct AliasLedger {
    inner: Mutex<Inner>,
}

impl AliasLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alias(&self, name: &str) -> Option<AliasEntry> {
        self.inner
            .lock()
            .unwrap()
            .aliases
            .get(&name.to_lowercase())
            .cloned()
    }

    pub fn alias_count(&self) -> usize {
        self.inner.lock().unwrap().aliases.len()
    }

    /// Bind or rebind an alias.
    pub fn set_alias(&self, name: &str, owner: AccountId, uri: &str, height: u32) {
        let key = name.to_lowercase();
        let mut inner = self.inner.lock().unwrap();
        let prior = inner.aliases.get(&key).cloned();
        inner.undo_log.push(Undo {
            height,
            key: key.clone(),
            prior,
        });
        inner.aliases.insert(
            key,
            AliasEntry {
                name: name.to_string(),
                owner,
                uri: uri.to_string(),
            },
        );
    }
}

impl DerivedTable for AliasLedger {
    fn name(&self) -> &'static str {
        "alias"
    }

    fn rollback(&self, height: u32) {
        let mut inner = self.inner.lock().unwrap();
        while let Some(entry) = inner.undo_log.last() {
            if entry.height <= height {
                break;
            }
            let entry = inner.undo_log.pop().expect("peeked above");
            match entry.prior {
                Some(alias) => {
                    inner.aliases.insert(entry.key, alias);
                }
                None => {
                    inner.aliases.remove(&entry.key);
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
        inner.aliases.clear();
        inner.undo_log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: AccountId = AccountId::new(10);
    const BOB: AccountId = AccountId::new(11);

    #[test]
    fn lookup_is_case_insensitive() {
        let ledger = AliasLedger::new();
        ledger.set_alias("Nakamoto", ALICE, "https://a", 1);
        let entry = ledger.alias("nakamoto").unwrap();
        assert_eq!(entry.owner, ALICE);
        assert_eq!(entry.name, "Nakamoto");
    }

    #[test]
    fn reassignment_replaces_entry() {
        let ledger = AliasLedger::new();
        ledger.set_alias("shop", ALICE, "https://old", 1);
        ledger.set_alias("shop", ALICE, "https://new", 2);
        assert_eq!(ledger.alias("shop").unwrap().uri, "https://new");
        assert_eq!(ledger.alias_count(), 1);
    }

    #[test]
    fn rollback_restores_previous_owner() {
        let ledger = AliasLedger::new();
        ledger.set_alias("shop", ALICE, "https://a", 1);
        ledger.set_alias("shop", BOB, "https://b", 5);

        ledger.rollback(4);
        assert_eq!(ledger.alias("shop").unwrap().owner, ALICE);

        ledger.rollback(0);
        assert!(ledger.alias("shop").is_none());
    }

    #[test]
    fn trim_keeps_state() {
        let ledger = AliasLedger::new();
        ledger.set_alias("keep", ALICE, "", 1);
        ledger.trim(3);
        assert!(ledger.alias("keep").is_some());
    }

    #[test]
    fn truncate_clears() {
        let ledger = AliasLedger::new();
        ledger.set_alias("gone", ALICE, "", 1);
        ledger.truncate();
        assert_eq!(ledger.alias_count(), 0);
    }
}
