//! These structs provide the CLI interface for the viccoin CLI.

use crate::model::{Kind, Period};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// viccoin: A command-line client for the VicCoin personal finance backend.
///
/// The library behind this program keeps a VicCoin client in sync with its backend: it records
/// expenses, income and salaries, lists and updates them, and computes a financial summary that
/// stays correct even when the backend's own arithmetic does not. The commands here are a thin
/// diagnostic surface over it.
///
/// Set VICCOIN_SYNC_IN_TEST_MODE to any non-empty value to run against an in-memory fake backend
/// instead of the network.
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

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and the configuration file.
    ///
    /// This is the first command you should run. Pass the backend's base URL with --base-url and,
    /// if you do not want the default of $HOME/viccoin, the data directory with --viccoin-home.
    Init(InitArgs),
    /// Store or forget the auth token used for backend calls.
    Session(SessionArgs),
    /// Probe the health endpoints until one answers.
    Health(HealthArgs),
    /// Show the financial summary: balance, totals and the most recent transactions.
    Summary,
    /// List transactions.
    List(ListArgs),
    /// Record a new expense, income or salary.
    Add(AddArgs),
    /// Change fields of an existing transaction.
    Update(UpdateArgs),
    /// List or add locally stored category labels.
    Categories(CategoriesArgs),
    /// Show a report for a period.
    Report(ReportArgs),
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

    /// The directory where viccoin configuration and the local cache are kept. Defaults to
    /// ~/viccoin
    #[arg(long, env = "VICCOIN_HOME", default_value_t = default_viccoin_home())]
    viccoin_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, viccoin_home: PathBuf) -> Self {
        Self {
            log_level,
            viccoin_home: viccoin_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn viccoin_home(&self) -> &DisplayPath {
        &self.viccoin_home
    }
}

/// Args for the `viccoin init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The backend's base URL, e.g. https://viccoin.onrender.com
    #[arg(long)]
    base_url: String,
}

impl InitArgs {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Args for the `viccoin session` command.
#[derive(Debug, Parser, Clone)]
pub struct SessionArgs {
    #[command(subcommand)]
    action: SessionAction,
}

impl SessionArgs {
    pub fn action(&self) -> &SessionAction {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SessionAction {
    /// Store a token obtained by logging in elsewhere.
    SetToken {
        token: String,
        /// The user's id, used by endpoints that are scoped per user.
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Show whether a token is stored, and for which user.
    Show,
    /// Log out: forget the token and user.
    Clear,
}

/// Args for the `viccoin health` command.
#[derive(Debug, Parser, Clone)]
pub struct HealthArgs {
    /// How many rounds of probing to do before giving up.
    #[arg(long, default_value_t = 1)]
    attempts: u32,

    /// Seconds to wait between rounds.
    #[arg(long, default_value_t = 30)]
    interval_secs: u64,
}

impl HealthArgs {
    pub fn new(attempts: u32, interval_secs: u64) -> Self {
        Self {
            attempts,
            interval_secs,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }
}

/// Args for the `viccoin list` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct ListArgs {
    /// Only list this kind: despesa, ganho or salario (expense, income and salary also work).
    #[arg(long)]
    kind: Option<Kind>,

    /// At most this many transactions.
    #[arg(long)]
    limit: Option<usize>,
}

impl ListArgs {
    pub fn new(kind: Option<Kind>, limit: Option<usize>) -> Self {
        Self { kind, limit }
    }

    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// Args for the `viccoin add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// expense, income or salary.
    pub kind: Kind,

    /// The amount, e.g. 50, 12.5 or "R$ 1.234,56".
    #[arg(long)]
    pub amount: String,

    /// The date of the transaction, YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// For salaries: the date it was received, YYYY-MM-DD.
    #[arg(long)]
    pub received_at: Option<String>,

    /// A category label or numeric category id.
    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// For salaries: whether it repeats. Defaults to true.
    #[arg(long)]
    pub recurring: Option<bool>,

    /// For salaries: mensal, quinzenal, semanal or anual. Defaults to mensal.
    #[arg(long)]
    pub period: Option<Period>,
}

/// Args for the `viccoin update` command.
#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    pub kind: Kind,

    pub id: String,

    /// A field to change, as name=value. Values that parse as JSON are sent as JSON, anything
    /// else as a string. Repeat for several fields.
    #[arg(long = "field", required = true)]
    pub fields: Vec<FieldArg>,
}

/// One `name=value` pair from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldArg {
    pub name: String,
    pub value: Value,
}

impl FromStr for FieldArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, raw) = s
            .split_once('=')
            .ok_or_else(|| format!("Expected name=value, got '{s}'"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("The field name is empty in '{s}'"));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        Ok(Self {
            name: name.to_string(),
            value,
        })
    }
}

/// Args for the `viccoin categories` command.
#[derive(Debug, Parser, Clone)]
pub struct CategoriesArgs {
    #[command(subcommand)]
    action: CategoriesAction,
}

impl CategoriesArgs {
    pub fn action(&self) -> &CategoriesAction {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoriesAction {
    /// List the labels for one kind, or for all kinds.
    List {
        #[arg(long)]
        kind: Option<Kind>,
        /// Ask the backend first and fall back to the local labels.
        #[arg(long)]
        remote: bool,
    },
    /// Add a label for a kind.
    Add { kind: Kind, label: String },
}

/// Args for the `viccoin report` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct ReportArgs {
    /// mensal, quinzenal, semanal or anual.
    #[arg(long)]
    pub period: Option<Period>,

    /// The first day of the report, YYYY-MM-DD.
    #[arg(long)]
    pub from: Option<String>,

    /// The last day of the report, YYYY-MM-DD.
    #[arg(long)]
    pub to: Option<String>,

    #[arg(long)]
    pub kind: Option<Kind>,

    #[arg(long)]
    pub limit: Option<usize>,
}

fn default_viccoin_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("viccoin"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --viccoin-home or VICCOIN_HOME instead of relying on the \
                default viccoin home directory. If you continue using the program right now, you \
                may have problems!",
            );
            PathBuf::from("viccoin")
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
    pub fn path(&self) -> &Path {
        &self.0
    }
}
