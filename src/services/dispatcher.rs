use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::models::submission::{AssessmentType, Task};
use crate::services::pipeline::{EvaluationPipeline, PipelineOutcome};
use crate::services::queue::TaskQueue;
use crate::services::sync::SourceSync;

/// Control-loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Queue empty: sync from the record store, then back off.
    Refilling,
    /// Queue non-empty: evaluate one task at a time.
    Draining,
}

/// Result of a single dispatcher step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepReport {
    Synced { enqueued: usize },
    SyncFailed,
    Processed(PipelineOutcome),
    /// No pipeline is configured for the task's assessment type.
    Skipped { submission_id: String },
}

/// Drains the task queue through the pipeline of each task's assessment
/// type, refilling from source sync whenever the queue runs dry. Exactly one
/// pipeline run is in flight at a time.
pub struct Dispatcher {
    queue: TaskQueue,
    sync: SourceSync,
    pipelines: HashMap<AssessmentType, EvaluationPipeline>,
    backoff: Duration,
    state: DispatchState,
}

impl Dispatcher {
    pub fn new(
        sync: SourceSync,
        pipelines: HashMap<AssessmentType, EvaluationPipeline>,
        backoff: Duration,
    ) -> Self {
        Self {
            queue: TaskQueue::new(),
            sync,
            pipelines,
            backoff,
            state: DispatchState::Refilling,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Perform one transition of the control loop. A draining step that
    /// finds the queue empty refills instead.
    pub async fn step(&mut self) -> StepReport {
        let task = match self.state {
            DispatchState::Draining => self.queue.pop(),
            DispatchState::Refilling => None,
        };
        let report = match task {
            Some(task) => self.dispatch(task).await,
            None => self.refill().await,
        };

        self.state = if self.queue.is_empty() {
            DispatchState::Refilling
        } else {
            DispatchState::Draining
        };
        metrics::gauge!("evaluation_queue_depth").set(self.queue.remaining() as f64);

        report
    }

    async fn refill(&mut self) -> StepReport {
        let report = match self.sync.sync(&mut self.queue).await {
            Ok(enqueued) => StepReport::Synced { enqueued },
            Err(e) => {
                tracing::error!(error = %e, "Source sync failed");
                StepReport::SyncFailed
            }
        };
        tokio::time::sleep(self.backoff).await;
        report
    }

    async fn dispatch(&self, task: Task) -> StepReport {
        match self.pipelines.get(&task.kind) {
            Some(pipeline) => StepReport::Processed(pipeline.process(task).await),
            None => {
                tracing::warn!(
                    submission_id = %task.submission.id,
                    assessment_type = %task.kind,
                    "No pipeline configured for assessment type, skipping"
                );
                StepReport::Skipped {
                    submission_id: task.submission.id,
                }
            }
        }
    }

    /// Run until `shutdown` resolves. A task in flight at shutdown is
    /// abandoned; its record keeps its status and is picked up again on the
    /// next start.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        tracing::info!(filter = %self.sync.filter(), "Dispatcher started");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                report = self.step() => {
                    tracing::trace!(?report, "Dispatcher step complete");
                }
            }
        }

        tracing::info!(remaining = self.queue.remaining(), "Dispatcher shut down");
    }
}
