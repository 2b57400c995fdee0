//! Aggregator engine: fetching, retry pipeline, extraction and document output.
mod assemble;
mod body;
mod challenge;
mod chapter_list;
mod engine;
mod event_log;
mod extract;
mod fetch;
mod filename;
mod persist;
mod pipeline;
mod settings_store;
mod sleep;
mod types;

pub use assemble::{assemble, escape_html, AssembleError, Document};
pub use body::{decode_body, DecodedBody};
pub use challenge::{has_challenge_marker, is_challenge, is_challenge_status, CHALLENGE_STATUSES};
pub use chapter_list::scan_chapter_list;
pub use engine::EngineHandle;
pub use event_log::{EventLog, LogEntry, DEFAULT_LOG_CAPACITY};
pub use extract::{ChapterExtractor, ExtractionError, Extractor, UNKNOWN_CHAPTER, UNKNOWN_NOVEL};
pub use fetch::{ChannelProgressSink, FetchSettings, Fetcher, ProgressSink, ReqwestFetcher};
pub use filename::{document_filename, sanitize_file_name, title_hash};
pub use persist::{ensure_output_dir, save_document, AtomicFileWriter, PersistError};
pub use pipeline::{Canceller, Pipeline, PipelineConfig, PipelineError};
pub use settings_store::{
    FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, SettingsStore, SettingsStoreError,
    StoreError, SETTINGS_FILE_NAME, SETTINGS_KEY,
};
pub use sleep::{backoff_delay, sleep_or_cancel, stagger_delay, Cancelled};
pub use types::{EngineEvent, FetchError, FetchMetadata, FetchOutput, FetchStrategy, PipelineEvent};
