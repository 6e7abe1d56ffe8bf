//! These structs provide the CLI interface for pocketsheet.

use crate::config::BackendKind;
use crate::model::{Amount, TransactionKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// pocketsheet: a personal finance ledger backed by your own spreadsheet.
///
/// Transactions live in a Google Sheet that you own, reached either through
/// a deployed webhook script or directly through the spreadsheet API. A
/// local cache keeps the ledger usable offline; edits sync back
/// automatically.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where pocketsheet data and configuration is held.
    /// Defaults to ~/.pocketsheet
    #[arg(long, env = "POCKETSHEET_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file.
    Init(InitArgs),
    /// List, add, remove or switch wallets (accounts).
    Wallet(WalletArgs),
    /// Record a new transaction.
    Add(AddArgs),
    /// Edit an existing transaction.
    Edit(EditArgs),
    /// Delete a transaction.
    Delete(DeleteArgs),
    /// Mark a pending transaction as paid.
    Pay(PayArgs),
    /// Show the active wallet's transactions, newest first.
    List,
    /// Show income/expense totals and the per-category breakdown.
    Summary,
    /// Re-fetch the active wallet from the remote store.
    Pull,
    /// Push any unsynced local changes immediately.
    Push,
    /// Record a transaction from an audio file using voice recognition.
    Voice(VoiceArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// Which remote store backend to use: "webhook" or "sheets"
    #[arg(long, default_value_t = BackendKind::Webhook)]
    backend: BackendKind,
}

impl InitArgs {
    pub fn backend(&self) -> BackendKind {
        self.backend
    }
}

#[derive(Debug, Parser, Clone)]
pub struct WalletArgs {
    #[command(subcommand)]
    entity: WalletSubcommand,
}

impl WalletArgs {
    pub fn entity(&self) -> &WalletSubcommand {
        &self.entity
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum WalletSubcommand {
    /// List the known wallets.
    List,
    /// Add a wallet. With the sheets backend this provisions (or reuses) a
    /// spreadsheet; with the webhook backend an endpoint URL is required.
    Add(WalletAddArgs),
    /// Remove a wallet from the configuration. The remote data is kept.
    Remove(WalletIdArgs),
    /// Make a wallet the active one.
    Use(WalletIdArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct WalletAddArgs {
    /// Display name for the wallet.
    name: String,

    /// The deployed webhook URL (webhook backend only).
    #[arg(long)]
    endpoint: Option<String>,

    /// Monthly spending budget. Shown against the month's expenses in
    /// `pocketsheet summary`.
    #[arg(long)]
    budget: Option<Decimal>,
}

impl WalletAddArgs {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn budget(&self) -> Option<Decimal> {
        self.budget
    }
}

#[derive(Debug, Parser, Clone)]
pub struct WalletIdArgs {
    /// The wallet id, as shown by `pocketsheet wallet list`.
    id: String,
}

impl WalletIdArgs {
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// "income" or "expense"
    kind: TransactionKind,

    /// The amount, always given as a positive number.
    amount: Amount,

    /// Category, e.g. "Groceries". Defaults to the kind's catch-all
    /// ("Other Expense" or "Other Income").
    #[arg(long)]
    category: Option<String>,

    /// Transaction date as YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Free-form description. Defaults to the category name.
    #[arg(long, default_value = "")]
    description: String,

    /// Record the transaction as pending rather than paid.
    #[arg(long)]
    pending: bool,
}

impl AddArgs {
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn pending(&self) -> bool {
        self.pending
    }
}

#[derive(Debug, Parser, Clone)]
pub struct EditArgs {
    /// The transaction id.
    id: String,

    #[arg(long)]
    kind: Option<TransactionKind>,

    #[arg(long)]
    amount: Option<Amount>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long)]
    description: Option<String>,
}

impl EditArgs {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> Option<TransactionKind> {
        self.kind
    }

    pub fn amount(&self) -> Option<Amount> {
        self.amount
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The transaction id.
    id: String,
}

impl DeleteArgs {
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Parser, Clone)]
pub struct PayArgs {
    /// The transaction id.
    id: String,
}

impl PayArgs {
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Parser, Clone)]
pub struct VoiceArgs {
    /// Path to the recorded audio file.
    file: PathBuf,

    /// The audio MIME type, e.g. "audio/webm". Guessed from the file
    /// extension when omitted.
    #[arg(long)]
    mime: Option<String>,
}

impl VoiceArgs {
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join(".pocketsheet"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or POCKETSHEET_HOME instead of relying on the default \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from(".pocketsheet")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let args =
            Args::parse_from(["pocketsheet", "add", "expense", "50.5", "--category", "Food"]);
        let Command::Add(add) = args.command() else {
            panic!("expected add");
        };
        assert_eq!(add.kind(), TransactionKind::Expense);
        assert_eq!(add.amount(), Amount::from_str("50.5").unwrap());
        assert_eq!(add.category(), Some("Food"));
        assert!(!add.pending());
    }

    #[test]
    fn test_parse_wallet_add_with_budget() {
        let args = Args::parse_from([
            "pocketsheet",
            "wallet",
            "add",
            "Personal",
            "--budget",
            "2500.50",
        ]);
        let Command::Wallet(wallet) = args.command() else {
            panic!("expected wallet");
        };
        let WalletSubcommand::Add(add) = wallet.entity() else {
            panic!("expected wallet add");
        };
        assert_eq!(add.budget(), Some(Decimal::from_str("2500.50").unwrap()));
    }

    #[test]
    fn test_parse_wallet_add_with_endpoint() {
        let args = Args::parse_from([
            "pocketsheet",
            "wallet",
            "add",
            "Personal",
            "--endpoint",
            "https://script.example/exec",
        ]);
        let Command::Wallet(wallet) = args.command() else {
            panic!("expected wallet");
        };
        let WalletSubcommand::Add(add) = wallet.entity() else {
            panic!("expected wallet add");
        };
        assert_eq!(add.name(), "Personal");
        assert_eq!(add.endpoint(), Some("https://script.example/exec"));
    }

    #[test]
    fn test_home_from_flag() {
        let args = Args::parse_from(["pocketsheet", "--home", "/tmp/ps", "list"]);
        assert_eq!(args.common().home().path(), Path::new("/tmp/ps"));
    }

    #[test]
    fn test_bad_amount_is_rejected() {
        let result = Args::try_parse_from(["pocketsheet", "add", "expense", "not-a-number"]);
        assert!(result.is_err());
    }
}
