//! One handler per `chat-ledger` subcommand. `serve` runs the webhook; the others act on the
//! stored ledger directly from the terminal and answer with the same text the bot would reply in
//! the chat, so a pasted `view` output looks like the `查看` reply.

mod init;
mod ledger;
mod organize;
mod serve;

use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use init::init;
pub use ledger::{import, record, undo, view};
pub use organize::organize;
pub use serve::serve;

/// What a subcommand hands back: the chat-style reply text and, when there is one, the ledger
/// value behind it (an `AddSummary`, the `Ledger`, a `Report`) for `--log-level debug` output.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    message: String,
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A reply backed by `structure`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// A bare reply, e.g. `nothing_to_organize` or a backup notice.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Logs the reply text at `info!` and the backing value as pretty JSON at `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Ledger data:\n{json}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AddSummary;

    #[test]
    fn test_out_from_message_has_no_data() {
        let out: Out<AddSummary> = "There is no backup to restore".into();
        assert_eq!(out.message(), "There is no backup to restore");
        assert!(out.structure().is_none());
    }

    #[test]
    fn test_out_with_data() {
        let summary = AddSummary {
            total_items: 1,
            total: 255,
        };
        let out = Out::new("✅ 已記錄 1 項消費，總計：255", summary);
        assert_eq!(out.structure(), Some(&summary));
    }
}
