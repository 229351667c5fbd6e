use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{
    account::AccountId,
    amount::Amount,
    chain::Height,
    custody::{PayoutSink, TransferError},
    store::{AccountState, AccountStore, MemoryStore},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("funds of {account} locked until block {unlock_block} (current block {current})")]
    Locked {
        account: AccountId,
        unlock_block: Height,
        current: Height,
    },
    #[error("insufficient balance in {account}: requested {requested}, held {available}")]
    InsufficientBalance {
        account: AccountId,
        requested: Amount,
        available: Amount,
    },
    #[error("no funds held for {account}")]
    NoFunds { account: AccountId },
    #[error("transfer to {account} failed: {source}")]
    TransferFailure {
        account: AccountId,
        #[source]
        source: TransferError,
    },
    #[error("arithmetic overflow for {account}")]
    Overflow { account: AccountId },
    #[error("snapshot state root does not match its contents")]
    CorruptSnapshot,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VaultEvent {
    Deposited {
        account: AccountId,
        amount: Amount,
        balance: Amount,
    },
    Withdrawn {
        account: AccountId,
        amount: Amount,
        balance: Amount,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub lock_duration: Height,
    pub accounts: BTreeMap<AccountId, AccountState>,
    pub events: Vec<VaultEvent>,
    #[serde(with = "hex32")]
    pub state_root: [u8; 32],
}

/// Time-locked custody ledger.
///
/// Every deposit re-locks the depositor's whole balance until
/// `deposit_block + lock_duration`. Withdrawals never move the threshold.
/// Callers are expected to serialize access; nothing here is shared.
#[derive(Clone, Debug)]
pub struct Vault<S = MemoryStore> {
    lock_duration: Height,
    store: S,
    events: Vec<VaultEvent>,
}

impl Vault<MemoryStore> {
    pub fn new(lock_duration: Height) -> Self {
        Self::with_store(lock_duration, MemoryStore::new())
    }

    /// Rebuilds a vault from a snapshot, refusing one whose root was tampered with.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, VaultError> {
        let store: MemoryStore = snapshot.accounts.into_iter().collect();
        let root = compute_state_root(
            snapshot.lock_duration,
            &store.entries(),
            &snapshot.events,
        );
        if root != snapshot.state_root {
            return Err(VaultError::CorruptSnapshot);
        }
        Ok(Self {
            lock_duration: snapshot.lock_duration,
            store,
            events: snapshot.events,
        })
    }
}

impl<S: AccountStore> Vault<S> {
    pub fn with_store(lock_duration: Height, store: S) -> Self {
        Self {
            lock_duration,
            store,
            events: Vec::new(),
        }
    }

    pub fn lock_duration(&self) -> Height {
        self.lock_duration
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    pub fn balance(&self, account: &AccountId) -> Amount {
        self.store.load(account).balance
    }

    pub fn unlock_block(&self, account: &AccountId) -> Height {
        self.store.load(account).unlock_block
    }

    pub fn is_unlocked(&self, account: &AccountId, current: Height) -> bool {
        current >= self.unlock_block(account)
    }

    pub fn blocks_remaining(&self, account: &AccountId, current: Height) -> Height {
        self.unlock_block(account).saturating_sub(current)
    }

    /// Sum of all balances, i.e. everything deposited and not yet withdrawn.
    pub fn total_held(&self) -> u128 {
        self.store
            .entries()
            .iter()
            .map(|(_, state)| u128::from(state.balance))
            .sum()
    }

    pub fn deposit(
        &mut self,
        account: &AccountId,
        amount: Amount,
        current: Height,
    ) -> Result<(), VaultError> {
        if amount == 0 {
            debug!(%account, "rejecting zero deposit");
            return Err(VaultError::InvalidAmount);
        }
        let overflow = || VaultError::Overflow {
            account: account.clone(),
        };
        let prior = self.store.load(account);
        let balance = prior.balance.checked_add(amount).ok_or_else(overflow)?;
        let unlock_block = current
            .checked_add(self.lock_duration)
            .ok_or_else(overflow)?;

        self.store.save(
            account,
            AccountState {
                balance,
                unlock_block,
            },
        );
        info!(%account, amount, balance, unlock_block, "deposit");
        self.events.push(VaultEvent::Deposited {
            account: account.clone(),
            amount,
            balance,
        });
        Ok(())
    }

    pub fn withdraw<P>(
        &mut self,
        account: &AccountId,
        amount: Amount,
        current: Height,
        sink: &mut P,
    ) -> Result<(), VaultError>
    where
        P: PayoutSink + ?Sized,
    {
        if amount == 0 {
            debug!(%account, "rejecting zero withdrawal");
            return Err(VaultError::InvalidAmount);
        }
        let state = self.store.load(account);
        self.ensure_unlocked(account, &state, current)?;
        if amount > state.balance {
            debug!(%account, amount, held = state.balance, "insufficient balance");
            return Err(VaultError::InsufficientBalance {
                account: account.clone(),
                requested: amount,
                available: state.balance,
            });
        }
        self.release(account, state, amount, sink)
    }

    pub fn withdraw_all<P>(
        &mut self,
        account: &AccountId,
        current: Height,
        sink: &mut P,
    ) -> Result<(), VaultError>
    where
        P: PayoutSink + ?Sized,
    {
        let state = self.store.load(account);
        if state.balance == 0 {
            debug!(%account, "nothing to withdraw");
            return Err(VaultError::NoFunds {
                account: account.clone(),
            });
        }
        self.ensure_unlocked(account, &state, current)?;
        self.release(account, state, state.balance, sink)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let entries = self.store.entries();
        LedgerSnapshot {
            lock_duration: self.lock_duration,
            state_root: compute_state_root(self.lock_duration, &entries, &self.events),
            accounts: entries.into_iter().collect(),
            events: self.events.clone(),
        }
    }

    fn ensure_unlocked(
        &self,
        account: &AccountId,
        state: &AccountState,
        current: Height,
    ) -> Result<(), VaultError> {
        if current < state.unlock_block {
            debug!(%account, current, unlock_block = state.unlock_block, "funds locked");
            return Err(VaultError::Locked {
                account: account.clone(),
                unlock_block: state.unlock_block,
                current,
            });
        }
        Ok(())
    }

    // Debit is persisted before the payout runs; a failed payout restores it.
    fn release<P>(
        &mut self,
        account: &AccountId,
        state: AccountState,
        amount: Amount,
        sink: &mut P,
    ) -> Result<(), VaultError>
    where
        P: PayoutSink + ?Sized,
    {
        let debited = AccountState {
            balance: state.balance - amount,
            ..state
        };
        self.store.save(account, debited);

        if let Err(source) = sink.transfer(account, amount, &self.store) {
            self.store.save(account, state);
            warn!(%account, amount, error = %source, "payout failed, debit reverted");
            return Err(VaultError::TransferFailure {
                account: account.clone(),
                source,
            });
        }

        info!(%account, amount, balance = debited.balance, "withdrawal");
        self.events.push(VaultEvent::Withdrawn {
            account: account.clone(),
            amount,
            balance: debited.balance,
        });
        Ok(())
    }
}

/// Root over the lock duration, every account record and the event log in order.
fn compute_state_root(
    lock_duration: Height,
    accounts: &[(AccountId, AccountState)],
    events: &[VaultEvent],
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(1 + accounts.len() + events.len());
    let mut hasher = Sha256::new();
    hasher.update(b"cfg");
    hasher.update(lock_duration.to_le_bytes());
    leaves.push(hasher.finalize().into());

    for (account, state) in accounts {
        let mut hasher = Sha256::new();
        hasher.update(b"acct");
        hasher.update(account.as_str().as_bytes());
        hasher.update(state.balance.to_le_bytes());
        hasher.update(state.unlock_block.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for (idx, event) in events.iter().enumerate() {
        let (tag, account, amount, balance) = match event {
            VaultEvent::Deposited {
                account,
                amount,
                balance,
            } => (b"dep", account, amount, balance),
            VaultEvent::Withdrawn {
                account,
                amount,
                balance,
            } => (b"wdr", account, amount, balance),
        };
        let mut hasher = Sha256::new();
        hasher.update(b"evt");
        hasher.update((idx as u64).to_le_bytes());
        hasher.update(tag);
        hasher.update(account.as_str().as_bytes());
        hasher.update(amount.to_le_bytes());
        hasher.update(balance.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"timelock-vault-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod hex32 {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| D::Error::custom(format!("expected 32 bytes, got {}", bytes.len())))
    }
}
