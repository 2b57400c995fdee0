use crate::{AppState, ChapterRange, Effect, Msg, Notice, RunSummary, SessionState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ChaptersScanned(chapters) => {
            if state.session() == SessionState::Running {
                return (state, Vec::new());
            }
            let count = chapters.len();
            state.set_chapters(chapters);
            if count == 0 {
                vec![Effect::Notify(Notice::NoChapters)]
            } else {
                vec![Effect::Notify(Notice::ChaptersFound { count })]
            }
        }
        Msg::RangeRequested { from, to } => {
            match ChapterRange::new(from, to, state.chapters().len()) {
                Ok(range) => {
                    state.set_range(Some(range));
                    vec![Effect::Notify(Notice::RangeSelected { range })]
                }
                Err(err) => vec![Effect::Notify(Notice::InvalidRange(err))],
            }
        }
        Msg::SelectAll => {
            state.set_range(None);
            vec![Effect::Notify(Notice::AllSelected {
                count: state.chapters().len(),
            })]
        }
        Msg::StartClicked => match state.session() {
            SessionState::Running | SessionState::Cancelling => Vec::new(),
            SessionState::Idle | SessionState::Finished => {
                if state.chapters().is_empty() {
                    vec![Effect::Notify(Notice::NoChapters)]
                } else if state.selected_chapters().is_empty() {
                    vec![Effect::Notify(Notice::EmptySelection)]
                } else {
                    let items = state.selected_chapters().to_vec();
                    state.start_run();
                    vec![Effect::StartRun { items }]
                }
            }
        },
        Msg::CancelClicked => {
            if state.session() == SessionState::Running {
                state.request_cancel();
                vec![Effect::CancelRun]
            } else {
                Vec::new()
            }
        }
        Msg::Progress(progress) => {
            state.apply_progress(progress);
            Vec::new()
        }
        Msg::ChallengeDetected { url } => {
            if state.note_challenge() {
                vec![Effect::Notify(Notice::ChallengeAdvisory { url })]
            } else {
                Vec::new()
            }
        }
        Msg::RunFinished(summary) => {
            let range = state.range();
            state.finish_run(summary);
            finish_effects(summary, range)
        }
    };

    (state, effects)
}

fn finish_effects(summary: RunSummary, range: Option<ChapterRange>) -> Vec<Effect> {
    if summary.cancelled {
        return vec![Effect::Notify(Notice::Cancelled)];
    }
    let mut effects = Vec::with_capacity(2);
    if summary.succeeded > 0 {
        effects.push(Effect::AssembleDocument);
    }
    if summary.failed > 0 {
        effects.push(Effect::Notify(Notice::Partial {
            succeeded: summary.succeeded,
            failed: summary.failed,
            total: summary.total,
            challenge_failures: summary.challenge_failures,
        }));
    } else {
        effects.push(Effect::Notify(Notice::Completed {
            succeeded: summary.succeeded,
            range,
        }));
    }
    effects
}
