use std::collections::VecDeque;
use std::sync::mpsc;
use std::time::Duration;

use aggregator_core::{update, AppState, Msg, SessionState};

use crate::effects::EffectRunner;

const ENGINE_POLL: Duration = Duration::from_millis(100);

/// Feed `initial` through the state machine, then keep dispatching engine
/// events and messages from `inbox` until no run is active.
pub fn drive(
    mut state: AppState,
    runner: &mut EffectRunner,
    inbox: &mpsc::Receiver<Msg>,
    initial: Vec<Msg>,
) -> anyhow::Result<AppState> {
    let mut queue: VecDeque<Msg> = initial.into();
    loop {
        while let Some(msg) = queue.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;
            runner.apply(effects)?;
            if state.consume_dirty() {
                runner.render(&state.view());
            }
        }

        if !matches!(
            state.session(),
            SessionState::Running | SessionState::Cancelling
        ) {
            return Ok(state);
        }

        queue.extend(inbox.try_iter());
        if let Some(msg) = runner.poll_engine(ENGINE_POLL) {
            queue.push_back(msg);
        }
    }
}

/// Messages that select the requested range; a missing bound defaults to
/// the first or last chapter.
pub fn selection_msgs(from: Option<usize>, to: Option<usize>, len: usize) -> Vec<Msg> {
    match (from, to) {
        (None, None) => vec![Msg::SelectAll],
        (from, to) => vec![Msg::RangeRequested {
            from: from.unwrap_or(1),
            to: to.unwrap_or(len),
        }],
    }
}
