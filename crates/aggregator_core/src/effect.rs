use std::fmt;

use crate::{ChapterRange, RangeError, WorkItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartRun { items: Vec<WorkItem> },
    CancelRun,
    /// Build and save the offline document from the finished run's chapters.
    AssembleDocument,
    Notify(Notice),
}

/// User-visible notification decided by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    ChaptersFound { count: usize },
    NoChapters,
    EmptySelection,
    RangeSelected { range: ChapterRange },
    AllSelected { count: usize },
    InvalidRange(RangeError),
    /// Shown once per run when the remote starts answering with challenges.
    ChallengeAdvisory { url: String },
    Cancelled,
    Completed {
        succeeded: usize,
        range: Option<ChapterRange>,
    },
    Partial {
        succeeded: usize,
        failed: usize,
        total: usize,
        challenge_failures: usize,
    },
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notice::NoChapters
                | Notice::EmptySelection
                | Notice::InvalidRange(_)
                | Notice::Partial { .. }
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ChaptersFound { count } => write!(f, "Found {count} chapters"),
            Notice::NoChapters => write!(f, "No chapters detected"),
            Notice::EmptySelection => write!(f, "No chapters in selected range"),
            Notice::RangeSelected { range } => write!(
                f,
                "Selected chapters {} to {} ({} chapters)",
                range.first(),
                range.last(),
                range.count()
            ),
            Notice::AllSelected { count } => write!(f, "Selected all chapters ({count})"),
            Notice::InvalidRange(err) => write!(f, "{err}"),
            Notice::ChallengeAdvisory { url } => write!(
                f,
                "Anti-bot challenge detected at {url}; switched to fallback requests. \
                 If chapters keep failing, open that page in a browser and solve the check."
            ),
            Notice::Cancelled => write!(f, "Download cancelled"),
            Notice::Completed {
                succeeded,
                range: Some(range),
            } => write!(
                f,
                "Successfully downloaded chapters {}-{} ({succeeded} chapters)!",
                range.first(),
                range.last()
            ),
            Notice::Completed {
                succeeded,
                range: None,
            } => write!(
                f,
                "Successfully downloaded all chapters ({succeeded} chapters)!"
            ),
            Notice::Partial {
                succeeded,
                failed,
                total,
                challenge_failures,
            } => {
                write!(f, "Downloaded {succeeded}/{total} chapters. {failed} failed.")?;
                if *challenge_failures > 0 {
                    write!(
                        f,
                        " {challenge_failures} blocked by an anti-bot check; open those pages manually and retry."
                    )?;
                }
                Ok(())
            }
        }
    }
}
