use chat_ledger::args::{Args, Command};
use chat_ledger::model::{Period, YearMonth};
use chat_ledger::{commands, Config, Mode, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let common = args.common();
    let home = common.ledger_home().path();

    // This allows for running the program without a classifier or chat platform. When
    // CHAT_LEDGER_IN_TEST_MODE is set and non-zero in length, then the mode will be Mode::Test,
    // otherwise it will be Mode::Live.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init => commands::init(home).await?.print(),

        Command::Serve => {
            let config = Config::load(home).await?;
            commands::serve(
                config,
                mode,
                common.classifier_api_key(),
                common.channel_access_token(),
            )
            .await?
            .print()
        }

        Command::Record(record_args) => {
            let config = Config::load(home).await?;
            commands::record(config, &record_args.text())
                .await?
                .print()
        }

        Command::View => commands::view(Config::load(home).await?)
            .await?
            .print(),

        Command::Undo => commands::undo(Config::load(home).await?)
            .await?
            .print(),

        Command::Organize(organize_args) => {
            let config = Config::load(home).await?;
            let period = if organize_args.all() {
                Period::All
            } else {
                Period::Month(
                    organize_args
                        .month()
                        .unwrap_or_else(|| YearMonth::current(config.timezone())),
                )
            };
            commands::organize(config, mode, common.classifier_api_key(), period)
                .await?
                .print()
        }

        Command::Import(import_args) => {
            let config = Config::load(home).await?;
            commands::import(config, import_args.file())
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            // The binary and the library share the crate name.
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
