//! Implements the `chat-ledger serve` command.

use crate::commands::Out;
use crate::dispatch::Dispatcher;
use crate::ledger::LedgerStore;
use crate::organize::Organizer;
use crate::{api, server, Config, Mode, Result};
use std::sync::Arc;
use tracing::info;

/// Wires the store, classifier and reply channel together and runs the webhook server until
/// ctrl-c. In `Mode::Test` no secrets are needed and nothing leaves the process.
pub async fn serve(
    config: Config,
    mode: Mode,
    api_key: Option<&str>,
    access_token: Option<&str>,
) -> Result<Out<()>> {
    let ledger = LedgerStore::from_config(&config, api::store(&config));
    let organizer = Organizer::new(api::classifier(&config, mode, api_key)?);
    let reply = api::reply(&config, mode, access_token)?;
    let dispatcher = Dispatcher::new(ledger, organizer, reply, config.timezone());

    info!(
        "Serving in {mode:?} mode with timezone {}",
        config.timezone()
    );
    server::serve(config.listen_addr(), Arc::new(dispatcher)).await?;
    Ok("Done serving webhook requests".into())
}
