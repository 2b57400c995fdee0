use std::path::{Path, PathBuf};

use aggregator_engine::{
    AtomicFileWriter, EventLog, FileKeyValueStore, PersistError, SettingsStore,
};
use chrono::Utc;
use engine_logging::engine_info;

const DEFAULT_STATE_DIR: &str = ".chapter-aggregator";

pub fn resolve_state_dir(flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
}

pub fn open_settings(state_dir: &Path) -> SettingsStore<FileKeyValueStore> {
    let store = FileKeyValueStore::in_dir(state_dir);
    engine_info!("Loading settings from {}", store.path().display());
    SettingsStore::load(store)
}

/// Write the run log as `novelbin-aggregator-logs-<time>.txt` into `dir`.
pub fn export_logs(dir: &Path, log: &EventLog) -> Result<PathBuf, PersistError> {
    let filename = EventLog::export_filename(Utc::now());
    let path = AtomicFileWriter::new(dir).write(&filename, &log.export_text())?;
    engine_info!("Exported {} log entries to {}", log.entries().len(), path.display());
    Ok(path)
}
