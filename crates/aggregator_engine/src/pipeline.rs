//! Batched fetch/retry pipeline.
//!
//! Items run in fixed-size batches. Every item of a batch is polled on the
//! calling task; batches run strictly one after another. The first
//! challenge response of a run moves the whole run to the fallback fetch
//! strategy for good.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use aggregator_core::{
    Failure, FailureKind, FetchOutcome, ProgressEvent, RunReport, Settings, WorkItem,
};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::event_log::EventLog;
use crate::extract::Extractor;
use crate::fetch::{Fetcher, ProgressSink};
use crate::sleep::{backoff_delay, sleep_or_cancel, stagger_delay};
use crate::{FetchError, FetchStrategy, PipelineEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub base_delay: Duration,
    pub max_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            batch_size: settings.batch_size as usize,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_retries: settings.max_retries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("no chapters to download")]
    EmptyWorkList,
}

/// Cancels the most recently armed run of the owning [`Pipeline`].
///
/// A cancel issued before a run is armed has no effect on that run.
#[derive(Debug, Clone)]
pub struct Canceller {
    current: Arc<Mutex<CancellationToken>>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Install a fresh token for the next run and return it.
    pub(crate) fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }
}

pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    config: PipelineConfig,
    current: Arc<Mutex<CancellationToken>>,
    log: Arc<EventLog>,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            config,
            current: Arc::new(Mutex::new(CancellationToken::new())),
            log: Arc::new(EventLog::default()),
        }
    }

    pub fn with_event_log(mut self, log: Arc<EventLog>) -> Self {
        self.log = log;
        self
    }

    pub fn canceller(&self) -> Canceller {
        Canceller {
            current: Arc::clone(&self.current),
        }
    }

    /// Fetch and extract every item. `results` come back in the order of
    /// `items` regardless of completion order.
    pub async fn run(
        &self,
        items: &[WorkItem],
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, PipelineError> {
        let token = self.canceller().arm();
        self.run_armed(items, sink, token).await
    }

    /// Like [`Pipeline::run`], with a token armed earlier through
    /// [`Canceller::arm`].
    pub(crate) async fn run_armed(
        &self,
        items: &[WorkItem],
        sink: &dyn ProgressSink,
        token: CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        if items.is_empty() {
            return Err(PipelineError::EmptyWorkList);
        }

        let mut config = self.config;
        config.batch_size = config.batch_size.max(1);
        let run = PipelineRun {
            config,
            token,
            fallback: AtomicBool::new(false),
            fetcher: self.fetcher.as_ref(),
            extractor: self.extractor.as_ref(),
            sink,
            log: &self.log,
        };
        run.execute(items).await
    }
}

/// State private to one call of [`Pipeline::run`].
struct PipelineRun<'a> {
    config: PipelineConfig,
    token: CancellationToken,
    fallback: AtomicBool,
    fetcher: &'a dyn Fetcher,
    extractor: &'a dyn Extractor,
    sink: &'a dyn ProgressSink,
    log: &'a EventLog,
}

impl PipelineRun<'_> {
    async fn execute(&self, items: &[WorkItem]) -> Result<RunReport, PipelineError> {
        let total = items.len();
        let batch_count = total.div_ceil(self.config.batch_size);
        self.log.info(
            format!("Starting download of {total} chapters"),
            Some(json!({
                "batchSize": self.config.batch_size,
                "baseDelayMs": self.config.base_delay.as_millis() as u64,
                "maxRetries": self.config.max_retries,
            })),
        );

        let mut report = RunReport {
            total,
            ..RunReport::default()
        };
        let mut completed = 0;

        for (batch_index, batch) in items.chunks(self.config.batch_size).enumerate() {
            if self.is_cancelled() {
                break;
            }
            self.log.debug(
                format!("Processing batch {}/{}", batch_index + 1, batch_count),
                Some(json!({ "size": batch.len() })),
            );

            let mut pending: FuturesUnordered<_> = batch
                .iter()
                .enumerate()
                .map(|(position, item)| self.process_item(position, item))
                .collect();
            let mut resolved = Vec::with_capacity(batch.len());
            while let Some((position, outcome)) = pending.next().await {
                if let Some(outcome) = outcome {
                    resolved.push((position, outcome));
                }
            }
            resolved.sort_by_key(|(position, _)| *position);

            for (_, outcome) in resolved {
                completed += 1;
                let succeeded = outcome.is_success();
                match outcome {
                    FetchOutcome::Success { content } => report.results.push(content),
                    FetchOutcome::Failure(failure) => report.failures.push(failure),
                }
                self.sink.emit(PipelineEvent::Progress(ProgressEvent::new(
                    completed,
                    total,
                    succeeded,
                    self.is_cancelled(),
                )));
            }

            let more = batch_index + 1 < batch_count;
            if more && sleep_or_cancel(self.config.base_delay, &self.token).await.is_err() {
                break;
            }
        }

        report.cancelled = self.is_cancelled();
        report.challenge_detected = self.challenge_detected();
        if report.cancelled {
            self.log.warn(
                "Download cancelled by user",
                Some(json!({ "completed": completed, "total": total })),
            );
        } else {
            self.log.info(
                format!(
                    "Download finished: {} succeeded, {} failed",
                    report.results.len(),
                    report.failures.len()
                ),
                None,
            );
        }
        Ok(report)
    }

    /// `None` when the item was abandoned because the run was cancelled.
    async fn process_item(&self, position: usize, item: &WorkItem) -> (usize, Option<FetchOutcome>) {
        let stagger = stagger_delay(self.config.base_delay, position);
        if sleep_or_cancel(stagger, &self.token).await.is_err() {
            return (position, None);
        }

        let body = match self.fetch_with_retry(item).await {
            Ok(body) => body,
            Err(err) if err.kind == FailureKind::Cancelled => return (position, None),
            Err(err) => return (position, Some(self.failure(item, err.kind, err.message))),
        };
        if self.is_cancelled() {
            return (position, None);
        }

        let outcome = match self.extractor.extract(&body, &item.url) {
            Ok(content) => {
                self.log.debug(
                    format!("Extracted chapter: {}", content.chapter_title),
                    Some(json!({ "url": item.url })),
                );
                FetchOutcome::Success { content }
            }
            Err(err) => self.failure(item, FailureKind::Extraction, err.to_string()),
        };
        (position, Some(outcome))
    }

    async fn fetch_with_retry(&self, item: &WorkItem) -> Result<String, FetchError> {
        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 0;
        loop {
            if self.is_cancelled() {
                return Err(FetchError::cancelled());
            }
            let strategy = self.strategy();
            let result = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(FetchError::cancelled()),
                result = self.fetcher.fetch(&item.url, strategy) => result,
            };

            let err = match result {
                Ok(output) => {
                    self.log.debug(
                        format!("Fetched {}", item.title),
                        Some(json!({
                            "url": item.url,
                            "status": output.metadata.status,
                            "strategy": strategy.to_string(),
                            "bytes": output.metadata.byte_len,
                        })),
                    );
                    return Ok(output.body);
                }
                Err(err) => err,
            };

            if err.kind == FailureKind::Cancelled {
                return Err(err);
            }
            let switched = err.kind.is_challenge()
                && strategy == FetchStrategy::Primary
                && self.switch_to_fallback(&item.url);
            if !switched && !err.kind.is_retryable() {
                self.log.error(
                    format!("Failed {}: {err}", item.title),
                    Some(json!({ "url": item.url })),
                );
                return Err(err);
            }

            attempt += 1;
            if attempt >= max_attempts {
                self.log.error(
                    format!("Giving up on {} after {attempt} attempts: {err}", item.title),
                    Some(json!({ "url": item.url, "strategy": strategy.to_string() })),
                );
                return Err(err);
            }
            // The switching item goes straight to the fallback strategy.
            if switched {
                continue;
            }

            let delay = backoff_delay(self.config.base_delay, attempt - 1);
            self.log.warn(
                format!(
                    "Retry {attempt}/{} for {} in {}ms: {err}",
                    self.config.max_retries,
                    item.title,
                    delay.as_millis()
                ),
                Some(json!({ "url": item.url, "strategy": strategy.to_string() })),
            );
            if sleep_or_cancel(delay, &self.token).await.is_err() {
                return Err(FetchError::cancelled());
            }
        }
    }

    fn strategy(&self) -> FetchStrategy {
        if self.fallback.load(Ordering::Acquire) {
            FetchStrategy::Fallback
        } else {
            FetchStrategy::Primary
        }
    }

    /// Returns `true` for the single call that performed the switch.
    fn switch_to_fallback(&self, url: &str) -> bool {
        let switched = self
            .fallback
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if switched {
            self.log.warn(
                "Anti-bot challenge detected, switching to fallback requests",
                Some(json!({ "url": url })),
            );
            self.sink.emit(PipelineEvent::ChallengeDetected {
                url: url.to_string(),
            });
        }
        switched
    }

    fn challenge_detected(&self) -> bool {
        self.fallback.load(Ordering::Acquire)
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn failure(&self, item: &WorkItem, kind: FailureKind, message: String) -> FetchOutcome {
        FetchOutcome::Failure(Failure {
            item: item.clone(),
            kind,
            message,
        })
    }
}
