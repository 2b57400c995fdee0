use std::fmt;

/// One chapter page to fetch. Identity is the url.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem {
    pub title: String,
    pub url: String,
    pub ordinal_index: usize,
}

impl WorkItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>, ordinal_index: usize) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ordinal_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedChapter {
    pub novel_title: String,
    pub chapter_title: String,
    /// Sanitized inner markup of the content region.
    pub content_html: String,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
    /// Anti-bot interstitial or rate-limit response.
    Challenge { status: Option<u16> },
    Extraction,
    Cancelled,
}

impl FailureKind {
    pub fn is_challenge(&self) -> bool {
        matches!(self, FailureKind::Challenge { .. })
    }

    /// Transport and challenge failures are worth another attempt; the
    /// rest will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            FailureKind::InvalidUrl | FailureKind::Extraction | FailureKind::Cancelled
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Challenge { status: Some(code) } => {
                write!(f, "anti-bot challenge (http {code})")
            }
            FailureKind::Challenge { status: None } => write!(f, "anti-bot challenge"),
            FailureKind::Extraction => write!(f, "content not found"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub item: WorkItem,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({}): {}: {}",
            self.item.ordinal_index + 1,
            self.item.title,
            self.item.url,
            self.kind,
            self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { content: ExtractedChapter },
    Failure(Failure),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub completed_count: usize,
    pub total_count: usize,
    pub percentage: u8,
    pub succeeded: bool,
    pub cancelled: bool,
}

impl ProgressEvent {
    pub fn new(completed_count: usize, total_count: usize, succeeded: bool, cancelled: bool) -> Self {
        let percentage = if total_count == 0 {
            0
        } else {
            ((completed_count as f64 / total_count as f64) * 100.0).round() as u8
        };
        Self {
            completed_count,
            total_count,
            percentage,
            succeeded,
            cancelled,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_count == self.total_count
    }
}

/// Result of one pipeline run. `results` are in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    pub results: Vec<ExtractedChapter>,
    pub failures: Vec<Failure>,
    pub cancelled: bool,
    pub challenge_detected: bool,
    pub total: usize,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total: self.total,
            succeeded: self.results.len(),
            failed: self.failures.len(),
            challenge_failures: self
                .failures
                .iter()
                .filter(|f| f.kind.is_challenge())
                .count(),
            cancelled: self.cancelled,
        }
    }
}

/// Counts-only view of a [`RunReport`], enough to decide notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub challenge_failures: usize,
    pub cancelled: bool,
}
