use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{account::AccountId, amount::Amount, store::AccountStore};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("recipient {0} rejected the transfer")]
    Rejected(AccountId),
    #[error("custody reserve holds {available}, cannot release {needed}")]
    ReserveExhausted { needed: Amount, available: Amount },
    #[error("wallet of {account} holds {available}, cannot send {needed}")]
    InsufficientWallet {
        account: AccountId,
        needed: Amount,
        available: Amount,
    },
    #[error("wallet balance overflow for {0}")]
    Overflow(AccountId),
}

/// Outbound leg of a withdrawal.
///
/// Called after the vault has already debited the account, so `ledger`
/// reflects the reduced balance. Returning an error makes the vault undo
/// the debit.
pub trait PayoutSink {
    fn transfer(
        &mut self,
        to: &AccountId,
        amount: Amount,
        ledger: &dyn AccountStore,
    ) -> Result<(), TransferError>;
}

/// External wallets plus the pool of value the vault holds in custody.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Treasury {
    wallets: BTreeMap<AccountId, Amount>,
    reserve: Amount,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    rejecting: BTreeSet<AccountId>,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wallet(&self, account: &AccountId) -> Amount {
        self.wallets.get(account).copied().unwrap_or_default()
    }

    pub fn reserve(&self) -> Amount {
        self.reserve
    }

    /// Credits an external wallet with freshly minted value.
    pub fn fund(&mut self, account: &AccountId, amount: Amount) -> Result<(), TransferError> {
        let wallet = self.wallets.entry(account.clone()).or_default();
        *wallet = wallet
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow(account.clone()))?;
        Ok(())
    }

    /// Moves value from a wallet into custody.
    pub fn collect(&mut self, from: &AccountId, amount: Amount) -> Result<(), TransferError> {
        let available = self.wallet(from);
        if available < amount {
            return Err(TransferError::InsufficientWallet {
                account: from.clone(),
                needed: amount,
                available,
            });
        }
        let reserve = self
            .reserve
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow(from.clone()))?;
        self.wallets.insert(from.clone(), available - amount);
        self.reserve = reserve;
        Ok(())
    }

    /// Undoes a [`Treasury::collect`] whose deposit was rejected.
    pub fn refund(&mut self, to: &AccountId, amount: Amount) {
        self.reserve = self.reserve.saturating_sub(amount);
        let wallet = self.wallets.entry(to.clone()).or_default();
        *wallet = wallet.saturating_add(amount);
    }

    /// Makes every payout to `account` fail, like a recipient that reverts.
    pub fn reject_payouts_to(&mut self, account: &AccountId) {
        self.rejecting.insert(account.clone());
    }

    pub fn accept_payouts_to(&mut self, account: &AccountId) {
        self.rejecting.remove(account);
    }
}

impl PayoutSink for Treasury {
    fn transfer(
        &mut self,
        to: &AccountId,
        amount: Amount,
        _ledger: &dyn AccountStore,
    ) -> Result<(), TransferError> {
        if self.rejecting.contains(to) {
            return Err(TransferError::Rejected(to.clone()));
        }
        if self.reserve < amount {
            return Err(TransferError::ReserveExhausted {
                needed: amount,
                available: self.reserve,
            });
        }
        let wallet = self
            .wallet(to)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow(to.clone()))?;
        self.reserve -= amount;
        self.wallets.insert(to.clone(), wallet);
        Ok(())
    }
}
