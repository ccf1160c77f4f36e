// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run lifecycle: start, signal, cancel, resume, recover.
//!
//! The manager owns the set of live control loops. Each loop runs as its
//! own task under an optional deadline; when the deadline expires the
//! loop is dropped and the run is failed from the substrate side.

use crate::broker::{EventBroker, Subscription};
use crate::error::RunError;
use crate::journal::RunJournal;
use crate::launcher::{RunLauncher, RunOutcome, StartRun};
use crate::orchestrator::{RunOrchestrator, Signal, SignalInbox};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tl_adapters::ActivityAdapter;
use tl_core::{
    sources, Clock, CompletionReason, EventKind, MessageRole, Run, RunEvent, RunId, RunMessage, RunResult,
    RunStatus,
};
use tl_storage::{RunFilter, Store};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Default wall-clock budget for one run.
pub const DEFAULT_RUN_DEADLINE: Duration = Duration::from_secs(60 * 60);

/// Knobs applied to every run the manager starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub retry: RetryPolicy,
    /// `None` disables the deadline.
    pub deadline: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { retry: RetryPolicy::default(), deadline: Some(DEFAULT_RUN_DEADLINE) }
    }
}

struct ActiveRun {
    signals: mpsc::UnboundedSender<Signal>,
    done: watch::Receiver<Option<RunResult>>,
}

/// Channel ends handed to a loop that has been registered but not spawned.
struct Registration {
    rx: mpsc::UnboundedReceiver<Signal>,
    done: watch::Sender<Option<RunResult>>,
}

struct ManagerInner<S, A, C> {
    journal: RunJournal<S, C>,
    adapter: A,
    config: RunConfig,
    active: Mutex<HashMap<RunId, ActiveRun>>,
}

/// Entry point for starting and steering runs.
pub struct RunManager<S, A, C> {
    inner: Arc<ManagerInner<S, A, C>>,
}

impl<S, A, C> Clone for RunManager<S, A, C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S, A, C> RunManager<S, A, C>
where
    S: Store,
    A: ActivityAdapter,
    C: Clock,
{
    pub fn new(store: Arc<S>, broker: EventBroker, adapter: A, clock: C, config: RunConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                journal: RunJournal::new(store, broker, clock),
                adapter,
                config,
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        self.inner.journal.store()
    }

    pub fn broker(&self) -> &EventBroker {
        self.inner.journal.broker()
    }

    pub fn is_active(&self, run_id: &RunId) -> bool {
        self.inner.active.lock().contains_key(run_id)
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.lock().len()
    }

    /// Create a run, record its prompt, and start its control loop.
    pub async fn start_run(&self, request: StartRun) -> Result<RunId, RunError> {
        let now = self.inner.journal.clock().now();
        let run_id = RunId::new();
        let mut run = Run::new(run_id.clone(), request.prompt.clone(), now);
        run.automation_id = request.automation_id.clone();

        let store = self.store();
        store.upsert_run(run).await?;
        let initial = non_blank(&request.prompt);
        if let Some(prompt) = &initial {
            store.append_message(RunMessage::user(run_id.clone(), prompt.clone(), now)).await?;
        }

        let registration = self.register(&run_id)?;
        let started = RunEvent::new(run_id.clone(), EventKind::RunStarted, sources::ORCHESTRATOR)
            .with_payload(json!({ "prompt": request.prompt, "automation_id": request.automation_id }));
        if let Err(e) = self.inner.journal.append(started).await {
            self.inner.active.lock().remove(&run_id);
            return Err(e);
        }

        tracing::info!(run_id = %run_id, automation_id = ?request.automation_id, "run started");
        self.spawn_loop(run_id.clone(), registration, initial);
        Ok(run_id)
    }

    /// Deliver a follow-up message to a live run.
    pub async fn signal_message(&self, run_id: &RunId, message: &str) -> Result<(), RunError> {
        let run = self.load_run(run_id).await?;
        if run.is_terminal() {
            return Err(RunError::Terminal(run_id.clone()));
        }
        let sender = self.sender(run_id).ok_or_else(|| RunError::NotActive(run_id.clone()))?;

        let now = self.inner.journal.clock().now();
        self.store().append_message(RunMessage::user(run_id.clone(), message, now)).await?;
        sender.send(Signal::Message(message.to_string())).map_err(|_| RunError::NotActive(run_id.clone()))?;
        tracing::info!(run_id = %run_id, "message signalled");
        Ok(())
    }

    /// Request cancellation. Cancelling a finished run is a no-op.
    ///
    /// A run with no live loop (left over from a previous process) is
    /// cancelled directly.
    pub async fn cancel_run(&self, run_id: &RunId) -> Result<(), RunError> {
        let run = self.load_run(run_id).await?;
        if run.is_terminal() {
            tracing::debug!(run_id = %run_id, status = %run.status, "cancel of finished run ignored");
            return Ok(());
        }

        if let Some(sender) = self.sender(run_id) {
            if sender.send(Signal::Cancel).is_ok() {
                tracing::info!(run_id = %run_id, "cancel signalled");
                return Ok(());
            }
        }

        // A loop removes itself only after its terminal event is stored.
        let event = RunEvent::new(run_id.clone(), EventKind::RunCancelled, sources::SUBSTRATE)
            .with_payload(json!({ "completion_reason": CompletionReason::UserCancelled.as_str() }));
        if self.inner.journal.append_if_running(event).await?.is_some() {
            tracing::info!(run_id = %run_id, "orphaned run cancelled");
        }
        Ok(())
    }

    /// Restart the control loop of a run that has none.
    ///
    /// With no `message`, the loop picks up the run's last user message.
    pub async fn resume_run(&self, run_id: &RunId, message: Option<&str>) -> Result<(), RunError> {
        let run = self.load_run(run_id).await?;
        let store = self.store();

        let fresh = message.and_then(non_blank);
        let message = match fresh {
            Some(ref message) => Some(message.clone()),
            None => self.last_user_message(&run).await?,
        };
        if message.is_none() && run.is_terminal() {
            return Err(RunError::NoMessage(run_id.clone()));
        }

        let registration = self.register(run_id)?;
        if let Some(content) = fresh {
            let now = self.inner.journal.clock().now();
            if let Err(e) = store.append_message(RunMessage::user(run_id.clone(), content, now)).await {
                self.inner.active.lock().remove(run_id);
                return Err(e.into());
            }
        }
        let resumed = RunEvent::new(run_id.clone(), EventKind::RunResumed, sources::SUBSTRATE).with_payload(json!({
            "resumed_from": run.checkpoint_seq,
            "previous_status": run.status.as_str(),
            "previous_reason": run.completion_reason.as_ref().map(|r| r.as_str().to_string()),
        }));
        if let Err(e) = self.inner.journal.append(resumed).await {
            self.inner.active.lock().remove(run_id);
            return Err(e);
        }

        tracing::info!(run_id = %run_id, resumed_from = run.checkpoint_seq, previous = %run.status, "run resumed");
        self.spawn_loop(run_id.clone(), registration, message);
        Ok(())
    }

    /// Resume every non-terminal run that has no live loop.
    pub async fn recover(&self) -> Result<Vec<RunId>, RunError> {
        let running = self.store().list_runs(&RunFilter::with_status(RunStatus::Running)).await?;
        let mut recovered = Vec::new();
        for run in running {
            if self.is_active(&run.id) {
                continue;
            }
            match self.resume_run(&run.id, None).await {
                Ok(()) => recovered.push(run.id),
                Err(e) => tracing::warn!(run_id = %run.id, error = %e, "failed to recover run"),
            }
        }
        if !recovered.is_empty() {
            tracing::info!(count = recovered.len(), "recovered runs");
        }
        Ok(recovered)
    }

    /// Live events for `run_id` until `token` is cancelled.
    pub fn subscribe(&self, run_id: &RunId, token: CancellationToken) -> Subscription {
        self.broker().subscribe(run_id, token)
    }

    /// Wait for the run's result.
    pub async fn wait(&self, run_id: &RunId) -> Result<RunResult, RunError> {
        let done = self.inner.active.lock().get(run_id).map(|a| a.done.clone());
        if let Some(mut done) = done {
            loop {
                let current = done.borrow_and_update().clone();
                if let Some(result) = current {
                    return Ok(result);
                }
                if done.changed().await.is_err() {
                    break;
                }
            }
        }

        let run = self.load_run(run_id).await?;
        run.result().ok_or_else(|| RunError::NotActive(run_id.clone()))
    }

    /// Wait for the run, then gather what its launcher reports.
    pub async fn outcome(&self, run_id: &RunId) -> Result<RunOutcome, RunError> {
        let result = self.wait(run_id).await?;
        let run = self.load_run(run_id).await?;
        let events = self.store().list_events(run_id, 0).await?;
        let diagnostics = events
            .iter()
            .rev()
            .find(|e| e.kind().is_terminal())
            .map(|e| e.payload_str_list("diagnostics"))
            .unwrap_or_default();
        Ok(RunOutcome {
            run_id: run_id.clone(),
            status: result.status,
            phase: run.phase,
            completion_reason: result.completion_reason,
            diagnostics,
        })
    }

    async fn load_run(&self, run_id: &RunId) -> Result<Run, RunError> {
        self.store().get_run(run_id).await?.ok_or_else(|| RunError::NotFound(run_id.clone()))
    }

    async fn last_user_message(&self, run: &Run) -> Result<Option<String>, RunError> {
        let messages = self.store().list_messages(&run.id).await?;
        let last = messages.into_iter().rev().find(|m| m.role == MessageRole::User).map(|m| m.content);
        Ok(last.and_then(|m| non_blank(&m)).or_else(|| non_blank(&run.prompt)))
    }

    fn sender(&self, run_id: &RunId) -> Option<mpsc::UnboundedSender<Signal>> {
        self.inner.active.lock().get(run_id).map(|a| a.signals.clone())
    }

    /// Claim the single loop slot for `run_id`.
    fn register(&self, run_id: &RunId) -> Result<Registration, RunError> {
        let mut active = self.inner.active.lock();
        if active.contains_key(run_id) {
            return Err(RunError::Conflict(format!("run {run_id} is still active")));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = watch::channel(None);
        active.insert(run_id.clone(), ActiveRun { signals: tx, done: done_rx });
        Ok(Registration { rx, done: done_tx })
    }

    fn spawn_loop(&self, run_id: RunId, registration: Registration, initial: Option<String>) {
        let Registration { rx, done } = registration;
        let mut inbox = SignalInbox::new(rx);
        if let Some(message) = initial {
            inbox.push_message(message);
        }

        let inner = Arc::clone(&self.inner);
        let orchestrator = RunOrchestrator::new(
            run_id.clone(),
            inner.journal.clone(),
            inner.adapter.clone(),
            inner.config.retry.clone(),
        );

        tokio::spawn(async move {
            let outcome = match inner.config.deadline {
                Some(deadline) => tokio::time::timeout(deadline, orchestrator.run(inbox)).await.map_err(|_| deadline),
                None => Ok(orchestrator.run(inbox).await),
            };

            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    tracing::error!(run_id = %run_id, error = %e, "control loop aborted");
                    inner.fail_from_substrate(&run_id, CompletionReason::ActivityError, &e.to_string()).await
                }
                Err(deadline) => {
                    tracing::warn!(run_id = %run_id, deadline_secs = deadline.as_secs(), "run deadline exceeded");
                    inner.fail_from_substrate(&run_id, CompletionReason::Timeout, "run deadline exceeded").await
                }
            };

            inner.active.lock().remove(&run_id);
            inner.journal.release(&run_id);
            let _ = done.send(Some(result));
        });
    }
}

impl<S, A, C> ManagerInner<S, A, C>
where
    S: Store,
    A: ActivityAdapter,
    C: Clock,
{
    /// Fail a run whose loop can no longer do it itself.
    async fn fail_from_substrate(&self, run_id: &RunId, reason: CompletionReason, error: &str) -> RunResult {
        let event = RunEvent::new(run_id.clone(), EventKind::RunFailed, sources::SUBSTRATE)
            .with_payload(json!({ "completion_reason": reason.as_str(), "error": error }));
        match self.journal.append_if_running(event).await {
            Ok(Some(_)) => {}
            Ok(None) => match self.journal.store().get_run(run_id).await {
                Ok(Some(run)) => {
                    if let Some(result) = run.result() {
                        return result;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(run_id = %run_id, error = %e, "failed to load finished run"),
            },
            Err(e) => tracing::error!(run_id = %run_id, error = %e, "failed to record run failure"),
        }
        RunResult::failed(reason)
    }
}

#[async_trait]
impl<S, A, C> RunLauncher for RunManager<S, A, C>
where
    S: Store,
    A: ActivityAdapter,
    C: Clock,
{
    async fn launch(&self, request: StartRun) -> Result<RunId, RunError> {
        self.start_run(request).await
    }

    async fn wait_outcome(&self, run_id: &RunId) -> Result<RunOutcome, RunError> {
        self.outcome(run_id).await
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
