use crate::{ProgressEvent, RunSummary, WorkItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The listing page was scanned into work items.
    ChaptersScanned(Vec<WorkItem>),
    /// User asked for a 1-based inclusive chapter range.
    RangeRequested { from: usize, to: usize },
    /// User cleared the range.
    SelectAll,
    StartClicked,
    CancelClicked,
    /// Engine progress for one resolved item.
    Progress(ProgressEvent),
    /// Engine switched to the fallback strategy.
    ChallengeDetected { url: String },
    /// Engine finished (or cancelled) the run.
    RunFinished(RunSummary),
}
