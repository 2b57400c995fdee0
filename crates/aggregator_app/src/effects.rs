use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use aggregator_core::{AppViewModel, Effect, Msg, Notice, RunReport, RunSummary, SessionState};
use aggregator_engine::{assemble, save_document, EngineEvent, EngineHandle, PipelineEvent};
use anyhow::Context as _;
use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};

/// Executes effects from the state machine against the engine and the
/// terminal, and turns engine events back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
    output_dir: PathBuf,
    compact: bool,
    last_report: Option<RunReport>,
    saved: Option<PathBuf>,
    notices: Vec<Notice>,
    progress_line_open: bool,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, output_dir: impl Into<PathBuf>, compact: bool) -> Self {
        Self {
            engine,
            output_dir: output_dir.into(),
            compact,
            last_report: None,
            saved: None,
            notices: Vec::new(),
            progress_line_open: false,
        }
    }

    /// Path of the document written by the last `AssembleDocument`.
    pub fn saved_document(&self) -> Option<&Path> {
        self.saved.as_deref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn apply(&mut self, effects: Vec<Effect>) -> anyhow::Result<()> {
        for effect in effects {
            match effect {
                Effect::StartRun { items } => {
                    engine_info!("Starting run with {} chapters", items.len());
                    self.last_report = None;
                    self.saved = None;
                    self.engine.start(items);
                }
                Effect::CancelRun => {
                    engine_info!("Cancel requested");
                    self.engine.cancel();
                }
                Effect::AssembleDocument => self.assemble_document()?,
                Effect::Notify(notice) => self.notify(notice),
            }
        }
        Ok(())
    }

    /// Wait up to `timeout` for the next engine event.
    pub fn poll_engine(&mut self, timeout: Duration) -> Option<Msg> {
        let event = self.engine.recv_timeout(timeout)?;
        Some(self.map_event(event))
    }

    pub fn render(&mut self, view: &AppViewModel) {
        if view.progress.is_none() || view.session == SessionState::Idle {
            return;
        }
        let line = view.status_line();
        let mut stderr = io::stderr().lock();
        if self.compact {
            let _ = write!(stderr, "\r{line:<60}");
            self.progress_line_open = true;
            let _ = stderr.flush();
        } else {
            let _ = writeln!(stderr, "{line}");
        }
    }

    fn map_event(&mut self, event: EngineEvent) -> Msg {
        match event {
            EngineEvent::Pipeline(PipelineEvent::Progress(progress)) => Msg::Progress(progress),
            EngineEvent::Pipeline(PipelineEvent::ChallengeDetected { url }) => {
                Msg::ChallengeDetected { url }
            }
            EngineEvent::RunFinished(Ok(report)) => {
                for failure in &report.failures {
                    engine_warn!("Chapter failed: {failure}");
                }
                let summary = report.summary();
                self.last_report = Some(report);
                Msg::RunFinished(summary)
            }
            EngineEvent::RunFinished(Err(err)) => {
                engine_error!("Run did not start: {err}");
                Msg::RunFinished(RunSummary::default())
            }
        }
    }

    fn assemble_document(&mut self) -> anyhow::Result<()> {
        let Some(report) = self.last_report.as_ref() else {
            engine_warn!("AssembleDocument without a finished run");
            return Ok(());
        };
        let document = assemble(&report.results, Utc::now()).context("assemble document")?;
        let path = save_document(&self.output_dir, &document)
            .with_context(|| format!("save document into {}", self.output_dir.display()))?;
        engine_info!(
            "Saved {} chapters of {} to {}",
            document.chapter_count,
            document.title,
            path.display()
        );
        self.end_progress_line();
        println!("Saved {}", path.display());
        self.saved = Some(path);
        Ok(())
    }

    fn notify(&mut self, notice: Notice) {
        self.end_progress_line();
        if notice.is_error() {
            eprintln!("error: {notice}");
        } else {
            println!("{notice}");
        }
        self.notices.push(notice);
    }

    fn end_progress_line(&mut self) {
        if self.progress_line_open {
            eprintln!();
            self.progress_line_open = false;
        }
    }
}
