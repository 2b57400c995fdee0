use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aggregator_core::{FailureKind, ProgressEvent, WorkItem};
use aggregator_engine::{
    ChapterExtractor, FetchError, FetchMetadata, FetchOutput, FetchStrategy, Fetcher, Pipeline,
    PipelineConfig, PipelineError, PipelineEvent,
};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

struct Reply {
    latency: Duration,
    result: Result<String, FailureKind>,
}

impl Reply {
    fn page(url: &str) -> Self {
        Self {
            latency: Duration::ZERO,
            result: Ok(chapter_page(url)),
        }
    }

    fn fail(kind: FailureKind) -> Self {
        Self {
            latency: Duration::ZERO,
            result: Err(kind),
        }
    }

    fn after(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Call {
    url: String,
    strategy: FetchStrategy,
    at: Duration,
}

type Responder = Box<dyn Fn(&str, FetchStrategy) -> Reply + Send + Sync>;

/// Answers from a closure and records every call with its start time.
struct ScriptedFetcher {
    responder: Responder,
    started: Instant,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(responder: impl Fn(&str, FetchStrategy) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            started: Instant::now(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, url: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.url == url).collect()
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, strategy: FetchStrategy) -> Result<FetchOutput, FetchError> {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            strategy,
            at: self.started.elapsed(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let reply = (self.responder)(url, strategy);
        tokio::time::sleep(reply.latency).await;
        match reply.result {
            Ok(body) => Ok(FetchOutput {
                metadata: FetchMetadata {
                    original_url: url.to_string(),
                    final_url: url.to_string(),
                    status: 200,
                    content_type: Some("text/html".into()),
                    encoding_label: "UTF-8".into(),
                    byte_len: body.len() as u64,
                    strategy,
                },
                body,
            }),
            Err(kind) => Err(FetchError::new(kind, "scripted failure")),
        }
    }
}

fn chapter_page(url: &str) -> String {
    format!(
        r#"<html><body>
            <a class="novel-title">Test Novel</a>
            <div class="chr-title"><span>Title of {url}</span></div>
            <div id="chr-content"><p>Body of {url}</p></div>
        </body></html>"#
    )
}

fn url(n: usize) -> String {
    format!("https://novel.example/chapter/{n}")
}

fn work_items(count: usize) -> Vec<WorkItem> {
    (0..count)
        .map(|i| WorkItem::new(format!("Chapter {}", i + 1), url(i + 1), i))
        .collect()
}

fn config(batch_size: usize, base_delay_ms: u64, max_retries: u32) -> PipelineConfig {
    PipelineConfig {
        batch_size,
        base_delay: Duration::from_millis(base_delay_ms),
        max_retries,
    }
}

fn pipeline(fetcher: &Arc<ScriptedFetcher>, config: PipelineConfig) -> Pipeline {
    Pipeline::new(
        fetcher.clone(),
        Arc::new(ChapterExtractor::default()),
        config,
    )
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<PipelineEvent>>,
}

impl Recorder {
    fn sink(&self) -> impl Fn(PipelineEvent) + Send + Sync + '_ {
        move |event| self.events.lock().unwrap().push(event)
    }

    fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().clone()
    }

    fn progress(&self) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PipelineEvent::Progress(progress) => Some(progress),
                _ => None,
            })
            .collect()
    }

    fn challenges(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PipelineEvent::ChallengeDetected { url } => Some(url),
                _ => None,
            })
            .collect()
    }
}

fn ms(at: Duration) -> u128 {
    at.as_millis()
}

fn assert_near(actual: Duration, expected_ms: u128) {
    let actual = ms(actual);
    assert!(
        actual.abs_diff(expected_ms) <= 10,
        "expected ~{expected_ms}ms, got {actual}ms"
    );
}

#[tokio::test(start_paused = true)]
async fn twelve_items_in_batches_of_five_all_succeed_in_order() {
    let fetcher = ScriptedFetcher::new(|u, _| Reply::page(u));
    let pipeline = pipeline(&fetcher, config(5, 1000, 3));
    let recorder = Recorder::default();
    let items = work_items(12);

    let report = pipeline.run(&items, &recorder.sink()).await.unwrap();

    assert_eq!(report.total, 12);
    assert!(report.failures.is_empty());
    assert!(!report.cancelled);
    assert!(!report.challenge_detected);
    let urls: Vec<_> = report.results.iter().map(|c| c.source_url.clone()).collect();
    let expected: Vec<_> = items.iter().map(|i| i.url.clone()).collect();
    assert_eq!(urls, expected);
    assert_eq!(report.results[3].chapter_title, format!("Title of {}", url(4)));
    assert_eq!(report.results[0].novel_title, "Test Novel");

    let progress = recorder.progress();
    assert_eq!(progress.len(), 12);
    let completed: Vec<_> = progress.iter().map(|p| p.completed_count).collect();
    assert_eq!(completed, (1..=12).collect::<Vec<_>>());
    assert!(progress.iter().all(|p| p.total_count == 12 && p.succeeded));
    assert_eq!(progress.last().unwrap().percentage, 100);
    assert!(fetcher.max_in_flight() <= 5);
}

#[tokio::test(start_paused = true)]
async fn items_are_staggered_and_batches_cool_down() {
    let fetcher = ScriptedFetcher::new(|u, _| Reply::page(u));
    let pipeline = pipeline(&fetcher, config(2, 1000, 3));
    let recorder = Recorder::default();

    pipeline.run(&work_items(4), &recorder.sink()).await.unwrap();

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 4);
    assert_near(fetcher.calls_for(&url(1))[0].at, 0);
    assert_near(fetcher.calls_for(&url(2))[0].at, 500);
    assert_near(fetcher.calls_for(&url(3))[0].at, 1500);
    assert_near(fetcher.calls_for(&url(4))[0].at, 2000);
}

#[tokio::test(start_paused = true)]
async fn results_keep_source_order_when_completion_order_differs() {
    let fetcher = ScriptedFetcher::new(|u, _| {
        let n: u64 = u.rsplit('/').next().unwrap().parse().unwrap();
        Reply::page(u).after(Duration::from_secs(10 - n))
    });
    let pipeline = pipeline(&fetcher, config(5, 100, 3));
    let recorder = Recorder::default();
    let items = work_items(5);

    let report = pipeline.run(&items, &recorder.sink()).await.unwrap();

    let urls: Vec<_> = report.results.iter().map(|c| c.source_url.as_str()).collect();
    let expected: Vec<_> = items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, expected);
    assert_eq!(fetcher.max_in_flight(), 5);
}

#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_batch_size() {
    let fetcher = ScriptedFetcher::new(|u, _| Reply::page(u).after(Duration::from_secs(10)));
    let pipeline = pipeline(&fetcher, config(3, 100, 3));
    let recorder = Recorder::default();

    let report = pipeline.run(&work_items(7), &recorder.sink()).await.unwrap();

    assert_eq!(report.results.len(), 7);
    assert_eq!(fetcher.max_in_flight(), 3);
}

#[tokio::test(start_paused = true)]
async fn first_challenge_switches_the_run_to_fallback_for_good() {
    let challenged = url(2);
    let fetcher = ScriptedFetcher::new(move |u, strategy| {
        if strategy == FetchStrategy::Primary && u == challenged {
            Reply::fail(FailureKind::Challenge { status: Some(403) })
        } else {
            Reply::page(u)
        }
    });
    let pipeline = pipeline(&fetcher, config(3, 1000, 3));
    let recorder = Recorder::default();

    let report = pipeline.run(&work_items(4), &recorder.sink()).await.unwrap();

    assert_eq!(report.results.len(), 4);
    assert!(report.failures.is_empty());
    assert!(report.challenge_detected);
    assert_eq!(recorder.challenges(), vec![url(2)]);
    assert!(matches!(
        recorder.events()[0],
        PipelineEvent::ChallengeDetected { .. }
    ));

    let strategies = |u: &str| -> Vec<FetchStrategy> {
        fetcher.calls_for(u).into_iter().map(|c| c.strategy).collect()
    };
    assert_eq!(strategies(&url(1)), vec![FetchStrategy::Primary]);
    assert_eq!(
        strategies(&url(2)),
        vec![FetchStrategy::Primary, FetchStrategy::Fallback]
    );
    assert_eq!(strategies(&url(3)), vec![FetchStrategy::Fallback]);
    assert_eq!(strategies(&url(4)), vec![FetchStrategy::Fallback]);

    // The switching item retries without waiting.
    let calls = fetcher.calls_for(&url(2));
    assert!(calls[1].at - calls[0].at < Duration::from_millis(10));
}

#[tokio::test(start_paused = true)]
async fn persistent_challenge_stops_at_the_retry_bound() {
    let fetcher = ScriptedFetcher::new(|_, _| Reply::fail(FailureKind::Challenge { status: Some(503) }));
    let max_retries = 3;
    let pipeline = pipeline(&fetcher, config(5, 1000, max_retries));
    let recorder = Recorder::default();

    let report = pipeline.run(&work_items(1), &recorder.sink()).await.unwrap();

    let calls = fetcher.calls();
    assert!(calls.len() <= max_retries as usize + 1);
    let strategies: Vec<_> = calls.iter().map(|c| c.strategy).collect();
    assert_eq!(
        strategies,
        vec![
            FetchStrategy::Primary,
            FetchStrategy::Fallback,
            FetchStrategy::Fallback,
            FetchStrategy::Fallback,
        ]
    );
    // Immediate switch, then base * 1.5^i where i counts earlier failures.
    assert_near(calls[0].at, 0);
    assert_near(calls[1].at, 0);
    assert_near(calls[2].at, 1500);
    assert_near(calls[3].at, 3750);

    assert!(report.results.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].kind,
        FailureKind::Challenge { status: Some(503) }
    );
    assert_eq!(recorder.challenges().len(), 1);
    let progress = recorder.progress();
    assert_eq!(progress.len(), 1);
    assert!(!progress[0].succeeded);
}

#[tokio::test(start_paused = true)]
async fn switching_attempt_counts_against_a_small_budget() {
    let fetcher = ScriptedFetcher::new(|_, _| Reply::fail(FailureKind::Challenge { status: Some(403) }));
    let pipeline = pipeline(&fetcher, config(5, 500, 1));
    let recorder = Recorder::default();

    let report = pipeline.run(&work_items(1), &recorder.sink()).await.unwrap();

    let strategies: Vec<_> = fetcher.calls().into_iter().map(|c| c.strategy).collect();
    assert_eq!(strategies, vec![FetchStrategy::Primary, FetchStrategy::Fallback]);
    assert_eq!(report.failures.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn one_blocked_chapter_fails_while_its_neighbours_succeed() {
    let blocked = url(2);
    let fetcher = ScriptedFetcher::new(move |u, _| {
        if u == blocked {
            Reply::fail(FailureKind::Challenge { status: Some(403) })
        } else {
            Reply::page(u)
        }
    });
    let max_retries = 3;
    let pipeline = pipeline(&fetcher, config(5, 1000, max_retries));
    let recorder = Recorder::default();

    let report = pipeline.run(&work_items(3), &recorder.sink()).await.unwrap();

    assert!(!report.cancelled);
    assert!(report.challenge_detected);
    let urls: Vec<_> = report.results.iter().map(|c| c.source_url.clone()).collect();
    assert_eq!(urls, vec![url(1), url(3)]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].item.url, url(2));
    assert!(report.failures[0].kind.is_challenge());

    let blocked_calls = fetcher.calls_for(&url(2));
    assert_eq!(blocked_calls.len(), max_retries as usize + 1);
    assert_eq!(blocked_calls[0].strategy, FetchStrategy::Primary);
    assert!(blocked_calls[1..]
        .iter()
        .all(|c| c.strategy == FetchStrategy::Fallback));
    assert_eq!(recorder.challenges(), vec![url(2)]);
    assert_eq!(recorder.progress().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn concurrent_challenges_notify_once() {
    let fetcher = ScriptedFetcher::new(|u, strategy| match strategy {
        FetchStrategy::Primary => Reply::fail(FailureKind::Challenge { status: Some(403) })
            .after(Duration::from_millis(300)),
        FetchStrategy::Fallback => Reply::page(u),
    });
    let pipeline = pipeline(&fetcher, config(3, 100, 3));
    let recorder = Recorder::default();

    let report = pipeline.run(&work_items(3), &recorder.sink()).await.unwrap();

    assert_eq!(report.results.len(), 3);
    assert_eq!(recorder.challenges(), vec![url(1)]);
    // Items whose primary request was already in flight retry under fallback.
    for n in 2..=3 {
        let strategies: Vec<_> = fetcher.calls_for(&url(n)).into_iter().map(|c| c.strategy).collect();
        assert_eq!(strategies, vec![FetchStrategy::Primary, FetchStrategy::Fallback]);
    }
}

#[tokio::test(start_paused = true)]
async fn transport_failures_retry_with_backoff_up_to_the_bound() {
    let fetcher = ScriptedFetcher::new(|_, _| Reply::fail(FailureKind::Timeout));
    let pipeline = pipeline(&fetcher, config(5, 2000, 2));
    let recorder = Recorder::default();

    let report = pipeline.run(&work_items(1), &recorder.sink()).await.unwrap();

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.strategy == FetchStrategy::Primary));
    assert_near(calls[0].at, 0);
    assert_near(calls[1].at, 2000);
    assert_near(calls[2].at, 5000);
    assert_eq!(report.failures[0].kind, FailureKind::Timeout);
    assert!(!report.challenge_detected);
    assert!(recorder.challenges().is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_failure_recovers_on_retry() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let fetcher = ScriptedFetcher::new(move |u, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Reply::fail(FailureKind::HttpStatus(500))
        } else {
            Reply::page(u)
        }
    });
    let pipeline = pipeline(&fetcher, config(5, 500, 3));
    let recorder = Recorder::default();

    let report = pipeline.run(&work_items(1), &recorder.sink()).await.unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(report.results.len(), 1);
    assert!(report.failures.is_empty());
}

#[tokio::test(start_paused = true)]
async fn extraction_failure_is_not_retried() {
    let fetcher = ScriptedFetcher::new(|_, _| Reply {
        latency: Duration::ZERO,
        result: Ok("<html><body><p>no content region</p></body></html>".into()),
    });
    let pipeline = pipeline(&fetcher, config(5, 500, 3));
    let recorder = Recorder::default();

    let report = pipeline.run(&work_items(1), &recorder.sink()).await.unwrap();

    assert_eq!(fetcher.calls().len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, FailureKind::Extraction);
    assert_eq!(report.failures[0].item.url, url(1));
}

#[tokio::test(start_paused = true)]
async fn cancel_mid_batch_keeps_resolved_items_only() {
    let fetcher = ScriptedFetcher::new(|u, _| Reply::page(u).after(Duration::from_secs(1)));
    let pipeline = pipeline(&fetcher, config(5, 1000, 3));
    let canceller = pipeline.canceller();
    let recorder = Recorder::default();
    let items = work_items(10);
    let started = Instant::now();

    let sink = recorder.sink();
    let (report, ()) = tokio::join!(pipeline.run(&items, &sink), async {
        tokio::time::sleep(Duration::from_millis(1200)).await;
        canceller.cancel();
    });
    let report = report.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].source_url, url(1));
    assert!(report.failures.is_empty());
    assert_eq!(recorder.progress().len(), 1);
    assert!(fetcher.calls_for(&url(6)).is_empty());
    assert!(started.elapsed() < Duration::from_millis(1300));
}

#[tokio::test(start_paused = true)]
async fn cancel_during_cooldown_stops_before_next_batch() {
    let fetcher = ScriptedFetcher::new(|u, _| Reply::page(u));
    let pipeline = pipeline(&fetcher, config(2, 1000, 3));
    let canceller = pipeline.canceller();
    let recorder = Recorder::default();
    let items = work_items(4);

    let sink = recorder.sink();
    let (report, ()) = tokio::join!(pipeline.run(&items, &sink), async {
        tokio::time::sleep(Duration::from_millis(800)).await;
        canceller.cancel();
    });
    let report = report.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.results.len(), 2);
    assert_eq!(fetcher.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_between_runs_does_not_leak_into_next_run() {
    let fetcher = ScriptedFetcher::new(|u, _| Reply::page(u));
    let pipeline = pipeline(&fetcher, config(5, 100, 3));
    pipeline.canceller().cancel();
    let recorder = Recorder::default();

    let report = pipeline.run(&work_items(2), &recorder.sink()).await.unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.results.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn fallback_does_not_carry_over_to_the_next_run() {
    let fetcher = ScriptedFetcher::new(|u, strategy| {
        if strategy == FetchStrategy::Primary && u == url(1) {
            Reply::fail(FailureKind::Challenge { status: Some(403) })
        } else {
            Reply::page(u)
        }
    });
    let pipeline = pipeline(&fetcher, config(5, 100, 3));
    let recorder = Recorder::default();

    let first = pipeline.run(&work_items(1), &recorder.sink()).await.unwrap();
    assert!(first.challenge_detected);

    let second_items = vec![WorkItem::new("Chapter 2", url(2), 0)];
    let second = pipeline.run(&second_items, &recorder.sink()).await.unwrap();
    assert!(!second.challenge_detected);
    assert_eq!(fetcher.calls_for(&url(2))[0].strategy, FetchStrategy::Primary);
}

#[tokio::test]
async fn empty_work_list_is_rejected() {
    let fetcher = ScriptedFetcher::new(|u, _| Reply::page(u));
    let pipeline = pipeline(&fetcher, PipelineConfig::default());
    let recorder = Recorder::default();

    let err = pipeline.run(&[], &recorder.sink()).await.unwrap_err();
    assert_eq!(err, PipelineError::EmptyWorkList);
    assert!(fetcher.calls().is_empty());
    assert!(recorder.events().is_empty());
}
