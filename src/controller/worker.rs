use crate::controller::jobs::{JobOutcome, ReconcileContext, ReconcileJob};
use crate::server::ShutdownSignal;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::time::DelayQueue;

pub(super) fn create(
    logger: slog::Logger,
    context: Arc<ReconcileContext>,
    retry_delay: Duration,
    shutdown: ShutdownSignal,
) -> (WorkerClient, ReconcileWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = WorkerClient { sender: tx };
    let worker = ReconcileWorker {
        logger,
        receiver: rx,
        delayed: DelayQueue::new(),
        shutdown,
        context,
        retry_delay,
    };

    (client, worker)
}

#[derive(Clone)]
pub(super) struct WorkerClient {
    // Unbounded so event handlers never wait on the worker.
    sender: mpsc::UnboundedSender<ReconcileJob>,
}

impl WorkerClient {
    /// Returns false if the worker has exited.
    pub(super) fn submit(&self, job: ReconcileJob) -> bool {
        self.sender.send(job).is_ok()
    }
}

/// ReconcileWorker runs jobs one at a time, so no two read-modify-write sequences against the
/// replica set config ever overlap. Jobs that can't finish yet wait out the retry delay in
/// `delayed` rather than occupying the worker.
pub(super) struct ReconcileWorker {
    logger: slog::Logger,
    receiver: mpsc::UnboundedReceiver<ReconcileJob>,
    delayed: DelayQueue<ReconcileJob>,
    shutdown: ShutdownSignal,
    context: Arc<ReconcileContext>,
    retry_delay: Duration,
}

impl ReconcileWorker {
    pub(super) async fn run_event_loop(mut self) {
        loop {
            // Shutdown is only observed between jobs. A job that is mid-call finishes its call
            // and is then dropped with everything still queued.
            let job = tokio::select! {
                biased;
                _ = &mut self.shutdown => break,
                Some(job) = self.receiver.recv() => job,
                Some(expired) = std::future::poll_fn(|cx| self.delayed.poll_expired(cx)) => expired.into_inner(),
                else => break,
            };

            self.handle_job(job).await;
        }

        slog::info!(
            self.logger,
            "Reconcile worker exited, discarding {} delayed job(s)",
            self.delayed.len()
        );
    }

    async fn handle_job(&mut self, job: ReconcileJob) {
        match job.attempt(&self.context).await {
            JobOutcome::Done => {}
            JobOutcome::Reschedule => {
                slog::debug!(
                    self.logger,
                    "Retrying {} of {} in {:?}",
                    job_kind(&job),
                    job.member(),
                    self.retry_delay
                );
                self.delayed.insert(job, self.retry_delay);
            }
        }
    }
}

fn job_kind(job: &ReconcileJob) -> &'static str {
    match job {
        ReconcileJob::Initialize { .. } => "initialize",
        ReconcileJob::AddMember(_) => "add",
        ReconcileJob::RemoveMember(_) => "remove",
    }
}
