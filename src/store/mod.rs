use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{account::AccountId, amount::Amount, chain::Height};

/// Per-account custody record.
///
/// The zero value doubles as the state of an account that was never seen:
/// nothing held and unlocked from block 0.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AccountState {
    pub balance: Amount,
    pub unlock_block: Height,
}

/// Backing storage for account records.
///
/// Reads are total: `load` returns [`AccountState::default`] for unknown
/// accounts so callers never special-case absence.
pub trait AccountStore {
    fn load(&self, account: &AccountId) -> AccountState;

    fn save(&mut self, account: &AccountId, state: AccountState);

    /// All non-default records in account order.
    fn entries(&self) -> Vec<(AccountId, AccountState)>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    accounts: BTreeMap<AccountId, AccountState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl FromIterator<(AccountId, AccountState)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (AccountId, AccountState)>>(iter: I) -> Self {
        let mut store = Self::new();
        for (account, state) in iter {
            store.save(&account, state);
        }
        store
    }
}

impl AccountStore for MemoryStore {
    fn load(&self, account: &AccountId) -> AccountState {
        self.accounts.get(account).copied().unwrap_or_default()
    }

    fn save(&mut self, account: &AccountId, state: AccountState) {
        if state == AccountState::default() {
            self.accounts.remove(account);
        } else {
            self.accounts.insert(account.clone(), state);
        }
    }

    fn entries(&self) -> Vec<(AccountId, AccountState)> {
        self.accounts
            .iter()
            .map(|(account, state)| (account.clone(), *state))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountKey;

    fn acct(seed: u8) -> AccountId {
        AccountKey::from_bytes(&[seed; 32]).address()
    }

    #[test]
    fn unknown_accounts_read_as_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.load(&acct(1)), AccountState::default());
        assert!(store.entries().is_empty());
    }

    #[test]
    fn saving_default_state_drops_the_record() {
        let mut store = MemoryStore::new();
        let alice = acct(1);
        store.save(
            &alice,
            AccountState {
                balance: 5,
                unlock_block: 10,
            },
        );
        assert_eq!(store.len(), 1);
        store.save(&alice, AccountState::default());
        assert!(store.is_empty());
    }

    #[test]
    fn empty_balance_keeps_its_threshold() {
        let mut store = MemoryStore::new();
        let bob = acct(2);
        let drained = AccountState {
            balance: 0,
            unlock_block: 42,
        };
        store.save(&bob, drained);
        assert_eq!(store.load(&bob), drained);
        assert_eq!(store.entries(), vec![(bob, drained)]);
    }
}
