//! Local chain harness and the two-depositor walkthrough built on it.
//!
//! The harness plays the host environment: every transaction is included in
//! the next block, failed transactions are dropped without mining, and view
//! calls read at the current tip.

use tracing::{info, warn};

use crate::{
    account::{AccountId, AccountKey},
    amount::{format_amount, Amount, UNIT_SCALE},
    chain::{BlockCounter, Height, ProgressSource},
    custody::{TransferError, Treasury},
    ledger::{Vault, VaultError},
};

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Wallet(#[from] TransferError),
}

#[derive(Clone, Debug)]
pub struct Harness {
    pub vault: Vault,
    pub treasury: Treasury,
    pub chain: BlockCounter,
}

impl Harness {
    pub fn new(lock_duration: Height) -> Self {
        Self {
            vault: Vault::new(lock_duration),
            treasury: Treasury::new(),
            chain: BlockCounter::default(),
        }
    }

    pub fn height(&self) -> Height {
        self.chain.current()
    }

    pub fn mine(&mut self, blocks: u64) -> Height {
        let tip = self.chain.mine(blocks);
        info!(blocks, tip, "mined");
        tip
    }

    pub fn is_unlocked(&self, account: &AccountId) -> bool {
        self.vault.is_unlocked(account, self.height())
    }

    pub fn blocks_remaining(&self, account: &AccountId) -> Height {
        self.vault.blocks_remaining(account, self.height())
    }

    /// Moves `amount` from the caller's wallet into the vault. Returns the inclusion block.
    pub fn deposit(&mut self, account: &AccountId, amount: Amount) -> Result<Height, HarnessError> {
        let block = self.chain.next_block();
        self.treasury.collect(account, amount)?;
        if let Err(err) = self.vault.deposit(account, amount, block) {
            self.treasury.refund(account, amount);
            return Err(err.into());
        }
        self.chain.mine(1);
        Ok(block)
    }

    pub fn withdraw(&mut self, account: &AccountId, amount: Amount) -> Result<Height, HarnessError> {
        let block = self.chain.next_block();
        self.vault
            .withdraw(account, amount, block, &mut self.treasury)?;
        self.chain.mine(1);
        Ok(block)
    }

    pub fn withdraw_all(&mut self, account: &AccountId) -> Result<Height, HarnessError> {
        let block = self.chain.next_block();
        self.vault
            .withdraw_all(account, block, &mut self.treasury)?;
        self.chain.mine(1);
        Ok(block)
    }
}

#[derive(Clone, Debug)]
pub struct Actor {
    pub name: String,
    pub key: AccountKey,
    pub deposit: Amount,
    pub withdraw: Amount,
}

impl Actor {
    pub fn new(name: &str, deposit: Amount, withdraw: Amount) -> Self {
        Self {
            name: name.to_string(),
            key: AccountKey::generate(),
            deposit,
            withdraw,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    pub lock_duration: Height,
    /// Blocks mined before the first (premature) withdrawal attempts.
    pub early_wait: u64,
    /// Additional blocks mined before the second attempts.
    pub late_wait: u64,
    pub starting_wallet: Amount,
    pub actors: Vec<Actor>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            lock_duration: 50,
            early_wait: 30,
            late_wait: 25,
            starting_wallet: 10_000 * UNIT_SCALE,
            actors: vec![
                Actor::new("Alice", 2 * UNIT_SCALE, UNIT_SCALE),
                Actor::new("Pierre", 3 * UNIT_SCALE / 2, UNIT_SCALE / 2),
            ],
        }
    }
}

#[derive(Clone, Debug)]
pub struct DepositorReport {
    pub name: String,
    pub account: AccountId,
    pub deposited: Amount,
    pub withdrawn: Amount,
    pub remaining: Amount,
    pub wallet: Amount,
    pub deposit_block: Height,
    pub unlock_block: Height,
    /// Why the early attempt was refused; `None` if it went through.
    pub early_rejection: Option<VaultError>,
    pub late_rejection: Option<VaultError>,
}

#[derive(Clone, Debug)]
pub struct ScenarioReport {
    pub lock_duration: Height,
    pub final_block: Height,
    pub total_held: u128,
    pub depositors: Vec<DepositorReport>,
}

pub fn run(config: ScenarioConfig) -> Result<ScenarioReport, HarnessError> {
    let mut harness = Harness::new(config.lock_duration);
    info!(lock_duration = config.lock_duration, "vault deployed");

    let mut reports = Vec::with_capacity(config.actors.len());
    for actor in &config.actors {
        let account = actor.key.address();
        harness.treasury.fund(&account, config.starting_wallet)?;
        let deposit_block = harness.deposit(&account, actor.deposit)?;
        let unlock_block = harness.vault.unlock_block(&account);
        info!(
            name = %actor.name,
            %account,
            amount = %format_amount(actor.deposit),
            deposit_block,
            unlock_block,
            "deposited"
        );
        reports.push(DepositorReport {
            name: actor.name.clone(),
            account,
            deposited: actor.deposit,
            withdrawn: 0,
            remaining: 0,
            wallet: 0,
            deposit_block,
            unlock_block,
            early_rejection: None,
            late_rejection: None,
        });
    }

    harness.mine(config.early_wait);
    for (actor, report) in config.actors.iter().zip(reports.iter_mut()) {
        report.early_rejection = attempt(&mut harness, actor, report)?;
    }

    harness.mine(config.late_wait);
    for (actor, report) in config.actors.iter().zip(reports.iter_mut()) {
        report.late_rejection = attempt(&mut harness, actor, report)?;
    }

    for report in &mut reports {
        report.remaining = harness.vault.balance(&report.account);
        report.wallet = harness.treasury.wallet(&report.account);
    }

    Ok(ScenarioReport {
        lock_duration: config.lock_duration,
        final_block: harness.height(),
        total_held: harness.vault.total_held(),
        depositors: reports,
    })
}

fn attempt(
    harness: &mut Harness,
    actor: &Actor,
    report: &mut DepositorReport,
) -> Result<Option<VaultError>, HarnessError> {
    let remaining = harness.blocks_remaining(&report.account);
    match harness.withdraw(&report.account, actor.withdraw) {
        Ok(block) => {
            info!(name = %actor.name, amount = %format_amount(actor.withdraw), block, "withdrawal accepted");
            report.withdrawn += actor.withdraw;
            Ok(None)
        }
        Err(HarnessError::Vault(err)) => {
            warn!(name = %actor.name, blocks_remaining = remaining, error = %err, "withdrawal refused");
            Ok(Some(err))
        }
        Err(other) => Err(other),
    }
}
