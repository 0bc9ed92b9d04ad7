//! Background job runner.
//!
//! The HTTP handler hands each verified command to a [`CommandDispatcher`]
//! and returns immediately. [`CommandWorker`] spawns one tracked task per
//! command so jobs run concurrently, and on shutdown stops taking new work
//! and waits a bounded time for in-flight jobs.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::{BotError, BotResult};
use crate::models::Command;
use crate::pipeline::CommandPipeline;

/// Sending half handed to the HTTP layer.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandDispatcher {
    /// Queue a command. Fails only once the worker has shut down.
    pub fn submit(&self, command: Command) -> BotResult<()> {
        self.tx
            .send(command)
            .map_err(|_| BotError::internal("Command worker is not accepting jobs"))
    }
}

pub struct CommandWorker {
    dispatcher: CommandDispatcher,
    cancel: CancellationToken,
    tracker: TaskTracker,
    receiver: JoinHandle<()>,
}

impl CommandWorker {
    /// Start receiving commands for `pipeline`.
    pub fn start(pipeline: Arc<CommandPipeline>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        let jobs = tracker.clone();
        let stop = cancel.clone();
        let receiver = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(command) => spawn_job(&jobs, &pipeline, command),
                        None => break,
                    },
                }
            }

            // Commands already queued were acknowledged; run them too
            rx.close();
            while let Ok(command) = rx.try_recv() {
                spawn_job(&jobs, &pipeline, command);
            }
        });

        Self {
            dispatcher: CommandDispatcher { tx },
            cancel,
            tracker,
            receiver,
        }
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        self.dispatcher.clone()
    }

    /// Stop accepting commands and wait up to `grace` for running jobs.
    ///
    /// Returns `true` when every job finished in time.
    pub async fn shutdown(self, grace: Duration) -> bool {
        self.cancel.cancel();
        if let Err(e) = self.receiver.await {
            error!(error = %e, "Command receiver task failed");
        }
        self.tracker.close();

        let in_flight = self.tracker.len();
        if in_flight > 0 {
            info!(in_flight, "Waiting for in-flight commands");
        }

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                info!("Command worker stopped");
                true
            }
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    grace_secs = grace.as_secs(),
                    "Timed out waiting for in-flight commands"
                );
                false
            }
        }
    }
}

fn spawn_job(tracker: &TaskTracker, pipeline: &Arc<CommandPipeline>, command: Command) {
    let span = info_span!(
        "command",
        request_id = %Uuid::new_v4(),
        user = %command.user_id,
        channel = %command.channel_id,
    );
    tracker.spawn(run_job(Arc::clone(pipeline), command).instrument(span));
}

/// Run one job, turning a panic into the generic error message.
async fn run_job(pipeline: Arc<CommandPipeline>, command: Command) {
    let response_url = command.response_url.clone();
    let job = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.run(command).await }.in_current_span())
    };

    match job.await {
        Ok(outcome) => info!(stage = %outcome.final_stage(), "Command finished"),
        Err(e) if e.is_panic() => {
            error!("Command job panicked");
            pipeline.report_unexpected(&response_url).await;
        }
        Err(e) => warn!(error = %e, "Command job was cancelled"),
    }
}
