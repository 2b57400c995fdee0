use crate::view_model::AppViewModel;
use crate::{ChapterRange, ProgressEvent, RunSummary, WorkItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Cancelling,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    chapters: Vec<WorkItem>,
    range: Option<ChapterRange>,
    session: SessionState,
    progress: Option<ProgressEvent>,
    challenge_notified: bool,
    last_summary: Option<RunSummary>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            session: self.session,
            chapter_count: self.chapters.len(),
            selected_count: self.selected_chapters().len(),
            range: self.range,
            progress: self.progress,
            last_summary: self.last_summary,
            dirty: self.dirty,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn range(&self) -> Option<ChapterRange> {
        self.range
    }

    pub fn chapters(&self) -> &[WorkItem] {
        &self.chapters
    }

    pub fn selected_chapters(&self) -> &[WorkItem] {
        match self.range {
            Some(range) => range.select(&self.chapters),
            None => &self.chapters,
        }
    }

    /// Returns the dirty flag and clears it.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn set_chapters(&mut self, chapters: Vec<WorkItem>) {
        self.chapters = chapters;
        self.range = None;
        self.mark_dirty();
    }

    pub(crate) fn set_range(&mut self, range: Option<ChapterRange>) {
        self.range = range;
        self.mark_dirty();
    }

    pub(crate) fn start_run(&mut self) {
        self.session = SessionState::Running;
        self.progress = None;
        self.challenge_notified = false;
        self.last_summary = None;
        self.mark_dirty();
    }

    pub(crate) fn request_cancel(&mut self) {
        self.session = SessionState::Cancelling;
        self.mark_dirty();
    }

    pub(crate) fn apply_progress(&mut self, progress: ProgressEvent) {
        self.progress = Some(progress);
        self.mark_dirty();
    }

    /// Returns true only for the first challenge of the current run.
    pub(crate) fn note_challenge(&mut self) -> bool {
        if self.challenge_notified {
            return false;
        }
        self.challenge_notified = true;
        self.mark_dirty();
        true
    }

    pub(crate) fn finish_run(&mut self, summary: RunSummary) {
        self.session = SessionState::Finished;
        self.last_summary = Some(summary);
        self.mark_dirty();
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
