//! Background task dispatcher.
//!
//! Delivers a call payload to a consumer that is not resident, asking the
//! host to revive it once per attempt. Each task runs on its own tokio task
//! and owns its state machine:
//!
//! ```text
//!   Pending ──Start──► Running ──Succeed──► Delivered
//!                       │  ▲
//!                  Fail │  │ Resume
//!                       ▼  │
//!                     Retrying
//!
//!   Running  ──Exhaust──► Exhausted
//!   Running  ──Expire───► TimedOut
//!   Retrying ──Expire───► TimedOut
//! ```
//!
//! Attempts are strictly sequential. The overall deadline is the only way a
//! running task is cancelled; it applies to both the revival call and the
//! pause between attempts.

use crate::call::{CallEvent, CallId, CallState};
use crate::contract::{HeadlessTask, HostEvent, CONTRACT_VERSION};
use crate::decision::ScreeningDecision;
use crate::error::{WardenError, WardenResult};
use crate::retry::{RetryPolicy, RetryVerdict};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub dispatch_machine(Pending)

    Pending => {
        Start => Running
    },
    Running => {
        Succeed => Delivered,
        Fail => Retrying,
        Exhaust => Exhausted,
        Expire => TimedOut
    },
    Retrying => {
        Resume => Running,
        Expire => TimedOut
    }
}

pub use dispatch_machine::Input as DispatchInput;
pub use dispatch_machine::State as DispatchState;
pub use dispatch_machine::StateMachine as DispatchMachine;

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Pending => "PENDING",
            DispatchState::Running => "RUNNING",
            DispatchState::Retrying => "RETRYING",
            DispatchState::Delivered => "DELIVERED",
            DispatchState::Exhausted => "EXHAUSTED",
            DispatchState::TimedOut => "TIMED_OUT",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::Delivered | DispatchState::Exhausted | DispatchState::TimedOut
        )
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload handed to the revived consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload {
    pub contract_version: u32,
    pub task_name: String,
    pub event_name: String,
    pub call_id: CallId,
    /// `None` when the caller number is unknown.
    pub phone_number: Option<String>,
    pub lookup_key: Option<String>,
    pub state: CallState,
    pub observed_at: DateTime<Utc>,
    pub decision: Option<ScreeningDecision>,
}

impl DispatchPayload {
    /// Payload for `event`. `phone_number` may differ from the event's own
    /// number when it was resolved from the call log.
    pub fn for_event(
        event: &CallEvent,
        phone_number: &crate::call::PhoneNumber,
        decision: Option<ScreeningDecision>,
    ) -> Self {
        Self {
            contract_version: CONTRACT_VERSION,
            task_name: HeadlessTask::CallBackgroundMessaging.as_str().to_string(),
            event_name: HostEvent::CallScreening.as_str().to_string(),
            call_id: event.call_id(),
            phone_number: phone_number.as_str().map(str::to_string),
            lookup_key: phone_number.lookup_key(),
            state: event.state(),
            observed_at: event.observed_at(),
            decision,
        }
    }

    pub fn to_json(&self) -> WardenResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// A unit of background delivery, owned by the dispatcher until it ends.
#[derive(Debug, Clone)]
pub struct DispatchTask {
    pub id: Uuid,
    pub payload: DispatchPayload,
    /// Attempts made so far.
    pub attempt: u32,
    pub deadline_from_start: Duration,
    /// Whether the background consumer was already running when the task
    /// was created.
    pub resident: bool,
}

impl DispatchTask {
    pub fn new(payload: DispatchPayload, deadline_from_start: Duration, resident: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            attempt: 0,
            deadline_from_start,
            resident,
        }
    }
}

/// Result of a single revival attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevivalOutcome {
    Delivered,
    Failed(String),
}

/// Host runtime able to start a headless consumer.
#[async_trait]
pub trait BackgroundRuntime: Send + Sync {
    /// Revive the consumer and hand it `payload`. Called once per attempt.
    async fn revive(
        &self,
        task_id: Uuid,
        payload: &DispatchPayload,
        budget: Duration,
    ) -> RevivalOutcome;

    /// Whether a headless consumer is already running.
    fn is_resident(&self) -> bool {
        false
    }
}

/// Terminal outcome of a dispatch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Exhausted,
    TimedOut,
}

/// What happened to a dispatch task.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub task_id: Uuid,
    pub call_id: CallId,
    pub outcome: DispatchOutcome,
    pub attempts: u32,
    pub elapsed: Duration,
    /// Every state the task went through, starting with `Pending`.
    pub transitions: Vec<DispatchState>,
}

impl DispatchReport {
    pub fn into_result(self) -> WardenResult<()> {
        match self.outcome {
            DispatchOutcome::Delivered => Ok(()),
            DispatchOutcome::Exhausted => Err(WardenError::DispatchExhausted {
                task_id: self.task_id,
                attempts: self.attempts,
            }),
            DispatchOutcome::TimedOut => Err(WardenError::DispatchTimedOut {
                task_id: self.task_id,
                elapsed_ms: self.elapsed.as_millis() as u64,
            }),
        }
    }
}

/// Receives the report of every finished task.
pub trait DispatchSink: Send + Sync {
    fn report(&self, report: &DispatchReport);
}

/// Reports dispatch outcomes to the log. Failures are warnings: the call
/// itself was already handled, only the supplementary update was lost.
#[derive(Debug, Default)]
pub struct TracingDispatchSink;

impl DispatchSink for TracingDispatchSink {
    fn report(&self, report: &DispatchReport) {
        let task_id = report.task_id;
        let call_id = report.call_id;
        let attempts = report.attempts;
        let elapsed_ms = report.elapsed.as_millis() as u64;
        match report.clone().into_result() {
            Ok(()) => info!(%task_id, %call_id, attempts, elapsed_ms, "dispatch delivered"),
            Err(e) => warn!(%task_id, %call_id, attempts, elapsed_ms, error = %e, "dispatch abandoned"),
        }
    }
}

/// Tracks the task's machine and the states it visited.
struct Progress {
    machine: DispatchMachine,
    transitions: Vec<DispatchState>,
}

impl Progress {
    fn new() -> Self {
        let machine = DispatchMachine::new();
        let transitions = vec![*machine.state()];
        Self {
            machine,
            transitions,
        }
    }

    fn apply(&mut self, task_id: Uuid, input: DispatchInput) {
        match self.machine.consume(&input) {
            Ok(_) => {
                let state = *self.machine.state();
                debug!(%task_id, state = %state, "dispatch state changed");
                self.transitions.push(state);
            }
            Err(_) => warn!(%task_id, ?input, state = %self.machine.state(), "invalid dispatch transition"),
        }
    }
}

/// Runs dispatch tasks under a retry policy and an overall deadline.
pub struct BackgroundDispatcher {
    runtime: Arc<dyn BackgroundRuntime>,
    policy: RetryPolicy,
    timeout: Duration,
    sink: Arc<dyn DispatchSink>,
}

impl BackgroundDispatcher {
    pub fn new(
        runtime: Arc<dyn BackgroundRuntime>,
        policy: RetryPolicy,
        timeout: Duration,
        sink: Arc<dyn DispatchSink>,
    ) -> Self {
        Self {
            runtime,
            policy,
            timeout,
            sink,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Overall execution budget given to new tasks.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build a task for `payload` with this dispatcher's budget.
    pub fn task(&self, payload: DispatchPayload) -> DispatchTask {
        DispatchTask::new(payload, self.timeout, self.runtime.is_resident())
    }

    /// Take ownership of `task` and run it in the background.
    ///
    /// Must be called from within a tokio runtime. Awaiting the handle is
    /// optional; the report also goes to the sink.
    pub fn submit(&self, task: DispatchTask) -> JoinHandle<DispatchReport> {
        info!(
            task_id = %task.id,
            call_id = %task.payload.call_id,
            budget_ms = task.deadline_from_start.as_millis() as u64,
            resident = task.resident,
            "dispatch task submitted"
        );
        let runtime = self.runtime.clone();
        let sink = self.sink.clone();
        let policy = self.policy;
        tokio::spawn(async move {
            let report = run_task(task, runtime.as_ref(), policy).await;
            sink.report(&report);
            report
        })
    }
}

async fn run_task(
    mut task: DispatchTask,
    runtime: &dyn BackgroundRuntime,
    policy: RetryPolicy,
) -> DispatchReport {
    let started = Instant::now();
    let deadline = started + task.deadline_from_start;
    let mut progress = Progress::new();
    progress.apply(task.id, DispatchInput::Start);

    let outcome = loop {
        // An expired deadline wins over a revival that is ready at once.
        if Instant::now() >= deadline {
            progress.apply(task.id, DispatchInput::Expire);
            break DispatchOutcome::TimedOut;
        }
        task.attempt += 1;
        let budget = deadline.saturating_duration_since(Instant::now());
        debug!(task_id = %task.id, attempt = task.attempt, budget_ms = budget.as_millis() as u64, "reviving consumer");

        let revival = timeout_at(deadline, runtime.revive(task.id, &task.payload, budget)).await;
        let reason = match revival {
            Ok(RevivalOutcome::Delivered) => {
                progress.apply(task.id, DispatchInput::Succeed);
                break DispatchOutcome::Delivered;
            }
            Ok(RevivalOutcome::Failed(reason)) => reason,
            Err(_) => {
                progress.apply(task.id, DispatchInput::Expire);
                break DispatchOutcome::TimedOut;
            }
        };

        match policy.after_attempt(task.attempt) {
            RetryVerdict::GiveUp => {
                progress.apply(task.id, DispatchInput::Exhaust);
                break DispatchOutcome::Exhausted;
            }
            RetryVerdict::RetryAfter(delay) => {
                warn!(
                    task_id = %task.id,
                    attempt = task.attempt,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "revival failed, retrying"
                );
                progress.apply(task.id, DispatchInput::Fail);
                if timeout_at(deadline, tokio::time::sleep(delay)).await.is_err() {
                    progress.apply(task.id, DispatchInput::Expire);
                    break DispatchOutcome::TimedOut;
                }
                progress.apply(task.id, DispatchInput::Resume);
            }
        }
    };

    DispatchReport {
        task_id: task.id,
        call_id: task.payload.call_id,
        outcome,
        attempts: task.attempt,
        elapsed: started.elapsed(),
        transitions: progress.transitions,
    }
}
