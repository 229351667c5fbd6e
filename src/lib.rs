//! Time-locked custodial vault.
//!
//! Depositors park value in the [`ledger::Vault`]; it becomes withdrawable
//! once the chain reaches `deposit_block + lock_duration`, and every new
//! deposit pushes that point forward for the whole balance.
//!
//! * [`ledger`] — the vault state machine, its events and snapshots.
//! * [`store`] — pluggable per-account storage with total reads.
//! * [`custody`] — the outbound transfer leg of withdrawals and a local treasury.
//! * [`chain`] — the block-height progress source.
//! * [`account`] — ed25519 keys and the addresses derived from them.
//! * [`amount`] — fixed-point unit parsing and display.
//! * [`config`] — configuration and the CLI state file.
//! * [`scenario`] — a local-chain harness and the two-depositor walkthrough.

pub mod account;
pub mod amount;
pub mod chain;
pub mod config;
pub mod custody;
pub mod ledger;
pub mod scenario;
pub mod store;

pub use ledger::{LedgerSnapshot, Vault, VaultError, VaultEvent};
