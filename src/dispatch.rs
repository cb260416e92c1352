//! Maps incoming chat text to a command and carries it out, replying through the chat platform.

use crate::api::Reply;
use crate::ledger::{self, LedgerStore, UndoOutcome};
use crate::model::{Period, YearMonth};
use crate::organize::{Organized, Organizer};
use crate::parse::{parse_expenses, Expenses};
use crate::Result;
use chrono::Utc;
use chrono_tz::Tz;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error, info, warn};

const VIEW: &str = "查看";
const UNDO: &str = "打錯";

static ORGANIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^整理\s*(?P<month>[0-9]{6})?$").expect("valid regex"));

pub const UNDO_DONE: &str = "↩️ 已復原到上一次記錄前的狀態";
pub const UNDO_NOTHING: &str = "⚠️ 沒有可以復原的記錄";
pub const ORGANIZE_FAILED: &str = "❌ 整理失敗，請稍後再試";
pub const BAD_MONTH: &str = "⚠️ 月份格式錯誤，請輸入「整理YYYYMM」，例如：整理202408";

/// What a message asks for.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Command {
    /// `查看`: show the whole ledger.
    View,
    /// `打錯`: restore the ledger to before the last add.
    Undo,
    /// `整理` or `整理YYYYMM`: organize a month, the current one when `None`.
    Organize(Option<YearMonth>),
    /// `整理` followed by six digits that are not a valid month.
    BadMonth(String),
    /// One or more expense lines.
    Record(Expenses),
    /// Ordinary chatter. No reply is sent.
    Ignore,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text {
            VIEW => return Command::View,
            UNDO => return Command::Undo,
            _ => {}
        }
        if let Some(caps) = ORGANIZE.captures(text) {
            return match caps.name("month") {
                None => Command::Organize(None),
                Some(m) => match m.as_str().parse::<YearMonth>() {
                    Ok(month) => Command::Organize(Some(month)),
                    Err(_) => Command::BadMonth(m.as_str().to_string()),
                },
            };
        }
        let expenses = parse_expenses(text);
        if expenses.is_empty() {
            Command::Ignore
        } else {
            Command::Record(expenses)
        }
    }
}

/// How a message was handled.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Handled {
    /// The message was not meant for the bot and nothing was sent.
    Ignored,
    /// This text was sent as the reply.
    Replied(String),
}

/// Carries out chat commands against the ledger and replies with the result.
#[derive(Clone)]
pub struct Dispatcher {
    ledger: LedgerStore,
    organizer: Organizer,
    reply: Arc<dyn Reply>,
    timezone: Tz,
}

impl Dispatcher {
    pub fn new(ledger: LedgerStore, organizer: Organizer, reply: Arc<dyn Reply>, timezone: Tz) -> Self {
        Self {
            ledger,
            organizer,
            reply,
            timezone,
        }
    }

    /// Today's canonical `YYYY-MM-DD` date in the configured timezone.
    pub fn today(&self) -> String {
        today(self.timezone)
    }

    /// Handles one message and replies using `reply_token`.
    ///
    /// Recorded expenses are acknowledged before they are written, and a failed write is only
    /// logged since the person has already seen the acknowledgment. Errors reading the ledger for
    /// view, undo or organize are returned.
    pub async fn handle(&self, text: &str, reply_token: &str) -> Result<Handled> {
        let command = Command::parse(text);
        debug!("Handling {command:?}");
        let reply = match command {
            Command::Ignore => return Ok(Handled::Ignored),
            Command::Record(expenses) => return Ok(self.record(expenses, reply_token).await),
            Command::View => ledger::render(&self.ledger.aggregated().await?),
            Command::Undo => match self.ledger.undo_last_change().await? {
                UndoOutcome::Restored { .. } => UNDO_DONE.to_string(),
                UndoOutcome::NothingToRestore => UNDO_NOTHING.to_string(),
            },
            Command::Organize(month) => self.organize(month).await?,
            Command::BadMonth(month) => {
                warn!("Ignoring an invalid month '{month}'");
                BAD_MONTH.to_string()
            }
        };
        self.send(reply_token, &reply).await;
        Ok(Handled::Replied(reply))
    }

    async fn record(&self, expenses: Expenses, reply_token: &str) -> Handled {
        let reply = format!(
            "✅ 已記錄 {} 項消費，總計：{}",
            expenses.len(),
            expenses.total()
        );
        self.send(reply_token, &reply).await;

        let date = self.today();
        if let Err(e) = self.ledger.add_expenses(expenses.items(), &date).await {
            error!("Unable to save {} items for {date}: {e:#}", expenses.len());
        }
        Handled::Replied(reply)
    }

    async fn organize(&self, month: Option<YearMonth>) -> Result<String> {
        let month = month.unwrap_or_else(|| YearMonth::current(self.timezone));
        let ledger = self.ledger.aggregated().await?;
        Ok(match self.organizer.organize(&ledger, Period::Month(month)).await {
            Ok(Organized::Report(report)) => report.to_string(),
            Ok(Organized::Nothing(period)) => nothing_to_organize(period),
            Err(e) => {
                error!("Unable to organize {}: {e:#}", month.label());
                ORGANIZE_FAILED.to_string()
            }
        })
    }

    /// Replies are fire-and-forget: failures are logged and never retried.
    async fn send(&self, reply_token: &str, text: &str) {
        match self.reply.send(reply_token, text).await {
            Ok(()) => info!("Replied with {} characters", text.chars().count()),
            Err(e) => error!("Unable to send a reply: {e:#}"),
        }
    }
}

/// Today's date as `YYYY-MM-DD` in `tz`.
pub fn today(tz: Tz) -> String {
    Utc::now().with_timezone(&tz).format("%Y-%m-%d").to_string()
}

/// The reply for a period without any entries.
pub fn nothing_to_organize(period: Period) -> String {
    format!("📭 {} 沒有可以整理的消費記錄", period.label())
}
