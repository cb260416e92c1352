//! These structs provide the CLI interface for the chat-ledger CLI.

use crate::model::YearMonth;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// chat-ledger: A chat bot that keeps a shared household expense ledger.
///
/// Members of a group chat post purchases as lines like `鮮奶 255`. The bot records them under
/// today's date, shows the ledger on `查看`, undoes the last recording on `打錯`, and on `整理` asks
/// a classifier to sort the month's purchases into categories and replies with a summary.
///
/// Run `chat-ledger init` once, then `chat-ledger serve` to receive webhook events. The other
/// subcommands work on the same ledger from the command line.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and write a default config.json.
    ///
    /// Edit `$LEDGER_HOME/config.json` afterwards to change the timezone, the listen address or
    /// the classifier model.
    Init,
    /// Listen for chat webhook events and answer them.
    Serve,
    /// Record expense lines under today's date, as if they had been posted in the chat.
    Record(RecordArgs),
    /// Print the whole ledger.
    View,
    /// Restore the ledger to the state before the last change.
    Undo,
    /// Categorize a month's expenses and print the summary.
    Organize(OrganizeArgs),
    /// Import a pasted history of `M/D` headers, each followed by expense lines.
    Import(ImportArgs),
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

    /// The directory where the ledger and its configuration are held. Defaults to ~/chat-ledger
    #[arg(long, env = "LEDGER_HOME", default_value_t = default_ledger_home())]
    ledger_home: DisplayPath,

    /// API key for the classifier used by `整理` and `organize`.
    #[arg(long, env = "CLASSIFIER_API_KEY", hide_env_values = true)]
    classifier_api_key: Option<String>,

    /// Channel access token used to reply to chat messages.
    #[arg(long, env = "CHANNEL_ACCESS_TOKEN", hide_env_values = true)]
    channel_access_token: Option<String>,
}

impl Common {
    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn ledger_home(&self) -> &DisplayPath {
        &self.ledger_home
    }

    pub fn classifier_api_key(&self) -> Option<&str> {
        self.classifier_api_key.as_deref()
    }

    pub fn channel_access_token(&self) -> Option<&str> {
        self.channel_access_token.as_deref()
    }
}

/// Args for the `chat-ledger record` command.
#[derive(Debug, Parser, Clone)]
pub struct RecordArgs {
    /// Expense lines, e.g. `鮮奶 255`. Each argument is one line.
    #[arg(required = true)]
    lines: Vec<String>,
}

impl RecordArgs {
    /// The arguments joined into a multi-line message.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Args for the `chat-ledger organize` command.
#[derive(Debug, Parser, Clone)]
pub struct OrganizeArgs {
    /// The month to organize as YYYYMM. Defaults to the current month.
    #[arg(conflicts_with = "all")]
    month: Option<YearMonth>,

    /// Organize every entry in the ledger instead of a single month.
    #[arg(long)]
    all: bool,
}

impl OrganizeArgs {
    pub fn month(&self) -> Option<YearMonth> {
        self.month
    }

    pub fn all(&self) -> bool {
        self.all
    }
}

/// Args for the `chat-ledger import` command.
#[derive(Debug, Parser, Clone)]
pub struct ImportArgs {
    /// The file to read. Reads stdin when omitted.
    #[arg(long)]
    file: Option<PathBuf>,
}

impl ImportArgs {
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

fn default_ledger_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("chat-ledger"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --ledger-home or LEDGER_HOME instead of relying on the default \
                ledger home directory.",
            );
            PathBuf::from("chat-ledger")
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
