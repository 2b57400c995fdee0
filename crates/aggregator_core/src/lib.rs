//! Aggregator core: data model, settings schema and the pure session state machine.
mod effect;
mod model;
mod msg;
mod range;
mod settings;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, Notice};
pub use model::{
    ExtractedChapter, Failure, FailureKind, FetchOutcome, ProgressEvent, RunReport, RunSummary,
    WorkItem,
};
pub use msg::Msg;
pub use range::{ChapterRange, RangeError};
pub use settings::{Setting, Settings, SettingsError};
pub use state::{AppState, SessionState};
pub use update::update;
pub use view_model::AppViewModel;
