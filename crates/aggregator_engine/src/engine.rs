use std::io;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use aggregator_core::WorkItem;
use engine_logging::{engine_debug, engine_error};
use tokio_util::sync::CancellationToken;

use crate::fetch::ChannelProgressSink;
use crate::pipeline::{Canceller, Pipeline};
use crate::EngineEvent;

enum EngineCommand {
    Start {
        items: Vec<WorkItem>,
        token: CancellationToken,
    },
}

/// Runs the pipeline on a dedicated thread with its own single-threaded
/// runtime. Runs are processed one at a time in the order they were started.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    canceller: Canceller,
}

impl EngineHandle {
    pub fn new(pipeline: Pipeline) -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let canceller = pipeline.canceller();
        let pipeline = Arc::new(pipeline);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        thread::Builder::new()
            .name("aggregator-engine".into())
            .spawn(move || {
                while let Ok(command) = cmd_rx.recv() {
                    match command {
                        EngineCommand::Start { items, token } => {
                            engine_debug!("Engine starting run of {} items", items.len());
                            let sink = ChannelProgressSink::new(event_tx.clone());
                            let result =
                                runtime.block_on(pipeline.run_armed(&items, &sink, token));
                            if event_tx.send(EngineEvent::RunFinished(result)).is_err() {
                                engine_error!("Engine event receiver dropped; stopping worker");
                                break;
                            }
                        }
                    }
                }
            })?;

        Ok(Self {
            cmd_tx,
            event_rx,
            canceller,
        })
    }

    /// Queue a run. Its cancellation token is armed here, so a `cancel`
    /// issued any time after this call reaches the run.
    pub fn start(&self, items: Vec<WorkItem>) {
        let token = self.canceller.arm();
        let _ = self.cmd_tx.send(EngineCommand::Start { items, token });
    }

    /// Cancels the most recently started run right away; queued commands
    /// are not consulted.
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}
