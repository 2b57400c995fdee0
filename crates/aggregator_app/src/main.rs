use std::process::ExitCode;
use std::sync::mpsc;

use aggregator_app::cli::{Cli, Command};
use aggregator_app::logging::{self, LogDestination};
use aggregator_app::{commands, persistence};
use aggregator_core::Msg;
use anyhow::Context as _;
use clap::Parser as _;
use engine_logging::{engine_debug, engine_warn};

#[tokio::main]
async fn main() -> ExitCode {
    match try_main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::initialize(LogDestination::from_verbose(cli.verbose));
    engine_debug!("parsed cli: {cli:?}");
    let state_dir = persistence::resolve_state_dir(cli.state_dir.as_deref());

    match cli.command {
        Command::Download(args) => {
            let (msg_tx, msg_rx) = mpsc::channel();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    engine_warn!("Interrupted, cancelling download");
                    let _ = msg_tx.send(Msg::CancelClicked);
                }
            });
            let outcome = commands::download(args, &state_dir, msg_rx)
                .await
                .context("download")?;
            if outcome.document.is_none() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Scan(args) => commands::scan(args).await.context("scan")?,
        Command::Settings { command } => {
            commands::settings(command, &state_dir).context("settings")?
        }
    }
    Ok(ExitCode::SUCCESS)
}
