use crate::{ChapterRange, ProgressEvent, RunSummary, SessionState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub session: SessionState,
    pub chapter_count: usize,
    pub selected_count: usize,
    pub range: Option<ChapterRange>,
    pub progress: Option<ProgressEvent>,
    pub last_summary: Option<RunSummary>,
    pub dirty: bool,
}

impl AppViewModel {
    /// One-line status as shown next to the progress bar.
    pub fn status_line(&self) -> String {
        match (self.session, self.progress) {
            (SessionState::Cancelling, _) => "Cancelling...".to_string(),
            (_, Some(p)) if p.cancelled => "Download cancelled".to_string(),
            (_, Some(p)) if p.is_complete() => "Processing complete!".to_string(),
            (_, Some(p)) => format!(
                "Processing {}/{} ({}%)",
                p.completed_count, p.total_count, p.percentage
            ),
            (SessionState::Running, None) => "Starting...".to_string(),
            _ => match self.range {
                Some(range) => format!(
                    "{} chapters detected, {} selected ({}-{})",
                    self.chapter_count,
                    self.selected_count,
                    range.first(),
                    range.last()
                ),
                None => format!("{} chapters detected", self.chapter_count),
            },
        }
    }
}
