use std::{fs, path::PathBuf, process::ExitCode};

use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use timelock_vault::{
    account::{AccountError, AccountId, AccountKey},
    amount::{format_amount, format_total, parse_amount, AmountError},
    config::{ConfigError, StateFile, VaultConfig},
    scenario::{self, Harness, HarnessError, ScenarioConfig},
};

//==================== CLI ====================//

#[derive(Parser)]
#[command(name = "vault", version, about = "Time-locked custodial vault", long_about = None)]
struct Cli {
    /// JSON config file (lock_duration, state_path)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// State file, overrides the config's state_path
    #[arg(long, global = true, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Verbose mode (-v, -vv)
    #[arg(short, action = ArgAction::Count, global = true)]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates a fresh vault; the lock duration cannot change afterwards
    Init {
        /// Blocks a deposit stays locked (defaults to the config value)
        #[arg(long)]
        lock_duration: Option<u64>,
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Generates an account keypair
    Keygen {
        /// Write sk.hex / pk.hex / address.txt here instead of printing
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Prints the address controlled by a secret key
    Address {
        #[arg(long)]
        sk_hex: String,
    },
    /// Credits an external wallet on the local chain
    Fund {
        #[arg(long)]
        to: AccountId,
        amount: String,
    },
    /// Deposits from the caller's wallet and restarts its lock window
    Deposit {
        #[arg(long)]
        sk_hex: String,
        amount: String,
    },
    /// Withdraws part of the caller's unlocked balance
    Withdraw {
        #[arg(long)]
        sk_hex: String,
        amount: String,
    },
    /// Withdraws the caller's whole unlocked balance
    WithdrawAll {
        #[arg(long)]
        sk_hex: String,
    },
    /// Prints the vault balance of an account
    Balance { account: AccountId },
    /// Prints balance, lock state and wallet of an account
    Status { account: AccountId },
    /// Mines empty blocks
    Mine {
        #[arg(default_value_t = 1)]
        blocks: u64,
    },
    /// Dumps the ledger snapshot as JSON
    Snapshot {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Runs the two-depositor walkthrough on a throwaway chain
    Scenario {
        #[arg(long, default_value_t = 50)]
        lock_duration: u64,
        #[arg(long, default_value_t = 30)]
        early_wait: u64,
        #[arg(long, default_value_t = 25)]
        late_wait: u64,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Harness(#[from] HarnessError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

//==================== state helpers ====================//

struct Session {
    path: PathBuf,
    harness: Harness,
}

impl Session {
    fn open(path: PathBuf) -> Result<Self, CliError> {
        let harness = StateFile::load(&path)?.into_harness()?;
        debug!(path = %path.display(), height = harness.height(), "session opened");
        Ok(Self { path, harness })
    }

    fn commit(self) -> Result<(), CliError> {
        StateFile::capture(&self.harness).save(&self.path)?;
        Ok(())
    }
}

//==================== commands ====================//

fn init_cmd(
    path: PathBuf,
    config: &VaultConfig,
    lock_duration: Option<u64>,
    force: bool,
) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyInitialized(path).into());
    }
    let lock = lock_duration.unwrap_or(config.lock_duration);
    StateFile::capture(&Harness::new(lock)).save(&path)?;
    println!("Vault initialised → {} (lock duration {lock} blocks)", path.display());
    Ok(())
}

fn keygen_cmd(out_dir: Option<PathBuf>) -> Result<(), CliError> {
    let key = AccountKey::generate();
    match out_dir {
        Some(dir) => {
            fs::create_dir_all(&dir)?;
            fs::write(dir.join("sk.hex"), key.secret_hex())?;
            fs::write(dir.join("pk.hex"), key.public_hex())?;
            fs::write(dir.join("address.txt"), key.address().to_string())?;
            println!("keypair written → {}", dir.display());
        }
        None => {
            println!("address: {}", key.address());
            println!("pk:      {}", key.public_hex());
            println!("sk:      {}", key.secret_hex());
        }
    }
    Ok(())
}

fn fund_cmd(path: PathBuf, to: AccountId, amount: &str) -> Result<(), CliError> {
    let amount = parse_amount(amount)?;
    let mut session = Session::open(path)?;
    session
        .harness
        .treasury
        .fund(&to, amount)
        .map_err(HarnessError::from)?;
    let wallet = session.harness.treasury.wallet(&to);
    session.commit()?;
    println!("Funded {to}: wallet {}", format_amount(wallet));
    Ok(())
}

fn deposit_cmd(path: PathBuf, sk_hex: &str, amount: &str) -> Result<(), CliError> {
    let account = AccountKey::from_hex(sk_hex)?.address();
    let amount = parse_amount(amount)?;
    let mut session = Session::open(path)?;
    let block = session.harness.deposit(&account, amount)?;
    let balance = session.harness.vault.balance(&account);
    let unlock = session.harness.vault.unlock_block(&account);
    session.commit()?;
    println!(
        "Deposited {} in block {block}; vault balance {}, unlocks at block {unlock}",
        format_amount(amount),
        format_amount(balance)
    );
    Ok(())
}

fn withdraw_cmd(path: PathBuf, sk_hex: &str, amount: Option<&str>) -> Result<(), CliError> {
    let account = AccountKey::from_hex(sk_hex)?.address();
    let mut session = Session::open(path)?;
    let held = session.harness.vault.balance(&account);
    let (block, amount) = match amount {
        Some(raw) => {
            let amount = parse_amount(raw)?;
            (session.harness.withdraw(&account, amount)?, amount)
        }
        None => (session.harness.withdraw_all(&account)?, held),
    };
    let balance = session.harness.vault.balance(&account);
    let wallet = session.harness.treasury.wallet(&account);
    session.commit()?;
    println!(
        "Withdrew {} in block {block}; vault balance {}, wallet {}",
        format_amount(amount),
        format_amount(balance),
        format_amount(wallet)
    );
    Ok(())
}

fn status_cmd(path: PathBuf, account: &AccountId, full: bool) -> Result<(), CliError> {
    let session = Session::open(path)?;
    let h = &session.harness;
    let balance = format_amount(h.vault.balance(account));
    if !full {
        println!("{balance}");
        return Ok(());
    }
    println!("account:        {account}");
    println!("vault balance:  {balance}");
    println!("wallet:         {}", format_amount(h.treasury.wallet(account)));
    println!("current block:  {}", h.height());
    println!("unlock block:   {}", h.vault.unlock_block(account));
    println!(
        "unlocked:       {}",
        if h.is_unlocked(account) { "yes" } else { "no" }
    );
    println!("blocks left:    {}", h.blocks_remaining(account));
    Ok(())
}

fn mine_cmd(path: PathBuf, blocks: u64) -> Result<(), CliError> {
    let mut session = Session::open(path)?;
    let tip = session.harness.mine(blocks);
    session.commit()?;
    println!("Mined {blocks} blocks; tip {tip}");
    Ok(())
}

fn snapshot_cmd(path: PathBuf, out: Option<PathBuf>) -> Result<(), CliError> {
    let session = Session::open(path)?;
    let json = serde_json::to_string_pretty(&session.harness.vault.snapshot())?;
    match out {
        Some(out) => {
            fs::write(&out, json)?;
            println!("Snapshot → {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn scenario_cmd(lock_duration: u64, early_wait: u64, late_wait: u64) -> Result<(), CliError> {
    let report = scenario::run(ScenarioConfig {
        lock_duration,
        early_wait,
        late_wait,
        ..ScenarioConfig::default()
    })?;

    println!("{}", "=".repeat(70));
    println!("Lock duration: {} blocks", report.lock_duration);
    println!("Final block:   {}", report.final_block);
    println!("Held in vault: {}", format_total(report.total_held));
    println!("{}", "=".repeat(70));
    for d in &report.depositors {
        println!("{} ({})", d.name, d.account);
        println!("  deposited     : {}", format_amount(d.deposited));
        println!("  withdrawn     : {}", format_amount(d.withdrawn));
        println!("  left in vault : {}", format_amount(d.remaining));
        println!("  wallet        : {}", format_amount(d.wallet));
        println!("  deposit block : {}", d.deposit_block);
        println!("  unlock block  : {}", d.unlock_block);
        for (label, outcome) in [("early", &d.early_rejection), ("late", &d.late_rejection)] {
            match outcome {
                Some(err) => println!("  {label:<5} attempt: refused ({err})"),
                None => println!("  {label:<5} attempt: accepted"),
            }
        }
    }
    Ok(())
}

//==================== main ====================//

fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => VaultConfig::load(path)?,
        None => VaultConfig::default(),
    };
    let state = cli.state.unwrap_or_else(|| config.state_path.clone());

    match cli.command {
        Commands::Init {
            lock_duration,
            force,
        } => init_cmd(state, &config, lock_duration, force),
        Commands::Keygen { out_dir } => keygen_cmd(out_dir),
        Commands::Address { sk_hex } => {
            println!("{}", AccountKey::from_hex(&sk_hex)?.address());
            Ok(())
        }
        Commands::Fund { to, amount } => fund_cmd(state, to, &amount),
        Commands::Deposit { sk_hex, amount } => deposit_cmd(state, &sk_hex, &amount),
        Commands::Withdraw { sk_hex, amount } => withdraw_cmd(state, &sk_hex, Some(&amount)),
        Commands::WithdrawAll { sk_hex } => withdraw_cmd(state, &sk_hex, None),
        Commands::Balance { account } => status_cmd(state, &account, false),
        Commands::Status { account } => status_cmd(state, &account, true),
        Commands::Mine { blocks } => mine_cmd(state, blocks),
        Commands::Snapshot { out } => snapshot_cmd(state, out),
        Commands::Scenario {
            lock_duration,
            early_wait,
            late_wait,
        } => scenario_cmd(lock_duration, early_wait, late_wait),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbosity);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}
