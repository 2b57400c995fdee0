use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use aggregator_core::{AppState, Msg, Notice, Setting};
use aggregator_engine::{
    ChapterExtractor, EngineHandle, EventLog, FetchSettings, Pipeline, ReqwestFetcher,
};
use anyhow::{bail, Context as _};
use engine_logging::{engine_info, engine_warn};

use crate::cli::{DownloadArgs, ScanArgs, SettingsCommand, TransportArgs};
use crate::effects::EffectRunner;
use crate::persistence::{export_logs, open_settings};
use crate::session::{drive, selection_msgs};
use crate::sources::load_work_items;

/// What a finished `download` produced.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub document: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

fn fetch_settings(transport: &TransportArgs) -> FetchSettings {
    FetchSettings {
        cookie_header: transport.cookie.clone(),
        referer: transport.referer.clone(),
        ..FetchSettings::default()
    }
}

/// Scan or read the work list, run the pipeline over the selected range and
/// save the document. `cancel` is the inbox for Ctrl-C style cancellation.
pub async fn download(
    args: DownloadArgs,
    state_dir: &Path,
    cancel: mpsc::Receiver<Msg>,
) -> anyhow::Result<DownloadOutcome> {
    let settings_store = open_settings(state_dir);
    let settings = settings_store.settings().clone();
    engine_logging::set_enabled(settings.logging_enabled);

    let fetcher = Arc::new(
        ReqwestFetcher::new(fetch_settings(&args.transport)).context("build http client")?,
    );
    let items = load_work_items(&args.source, fetcher.as_ref()).await?;

    let log = Arc::new(EventLog::default());
    log.set_enabled(settings.logging_enabled);
    let pipeline = Pipeline::new(
        fetcher,
        Arc::new(ChapterExtractor::default()),
        settings_store.pipeline_config(),
    )
    .with_event_log(Arc::clone(&log));
    let engine = EngineHandle::new(pipeline).context("start engine")?;
    let mut runner = EffectRunner::new(engine, &args.out, settings.compact_ui);

    let len = items.len();
    let mut initial = vec![Msg::ChaptersScanned(items)];
    initial.extend(selection_msgs(args.from, args.to, len));
    let state = drive(AppState::new(), &mut runner, &cancel, initial)?;
    if let Some(notice) = runner.notices().iter().find(|n| n.is_error()) {
        bail!("{notice}");
    }

    let state = tokio::task::block_in_place(|| {
        drive(state, &mut runner, &cancel, vec![Msg::StartClicked])
    })?;
    if runner.notices().iter().any(|n| *n == Notice::EmptySelection) {
        bail!("{}", Notice::EmptySelection);
    }

    let log_file = match args.export_logs.as_deref() {
        Some(dir) => Some(export_logs(dir, &log).context("export logs")?),
        None => None,
    };
    if let Some(path) = &log_file {
        println!("Logs exported to {}", path.display());
    }

    let summary = state.view().last_summary.unwrap_or_default();
    engine_info!(
        "Download finished: {} succeeded, {} failed, cancelled={}",
        summary.succeeded,
        summary.failed,
        summary.cancelled
    );
    Ok(DownloadOutcome {
        document: runner.saved_document().map(Path::to_path_buf),
        log_file,
        succeeded: summary.succeeded,
        failed: summary.failed,
        cancelled: summary.cancelled,
    })
}

pub async fn scan(args: ScanArgs) -> anyhow::Result<()> {
    let fetcher = ReqwestFetcher::new(fetch_settings(&args.transport)).context("build http client")?;
    let items = load_work_items(&args.source, &fetcher).await?;
    if items.is_empty() {
        engine_warn!("No chapters found");
        bail!("{}", Notice::NoChapters);
    }
    for item in &items {
        println!("{:>5}. {} <{}>", item.ordinal_index + 1, item.title, item.url);
    }
    println!("{}", Notice::ChaptersFound { count: items.len() });
    Ok(())
}

pub fn settings(command: SettingsCommand, state_dir: &Path) -> anyhow::Result<()> {
    let mut store = open_settings(state_dir);
    let current = match command {
        SettingsCommand::Show => store.settings().clone(),
        SettingsCommand::Set { key, value } => {
            let setting = Setting::parse(&key, &value)?;
            store.set(setting)?.clone()
        }
        SettingsCommand::Reset => store.reset()?.clone(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&current).context("serialize settings")?
    );
    Ok(())
}
