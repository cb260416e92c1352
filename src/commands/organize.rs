use crate::commands::Out;
use crate::dispatch::nothing_to_organize;
use crate::ledger::LedgerStore;
use crate::model::Period;
use crate::organize::{Organized, Organizer, Report};
use crate::{api, Config, Mode, Result};

/// Categorizes the ledger entries in `period` and returns the summary report.
///
/// # Errors
/// - Returns an error if the classifier cannot be created or fails, or the ledger cannot be read.
pub async fn organize(
    config: Config,
    mode: Mode,
    api_key: Option<&str>,
    period: Period,
) -> Result<Out<Report>> {
    let ledger = LedgerStore::from_config(&config, api::store(&config))
        .aggregated()
        .await?;
    let organizer = Organizer::new(api::classifier(&config, mode, api_key)?);
    Ok(match organizer.organize(&ledger, period).await? {
        Organized::Report(report) => Out::new(report.to_string(), report),
        Organized::Nothing(period) => Out::new_message(nothing_to_organize(period)),
    })
}
