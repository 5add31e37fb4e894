//! Wiring of the call pipeline.

use crate::call::{CallDetails, CallEvent, CallState, TelephonySignal};
use crate::call_fsm::CallStateMachine;
use crate::call_log::CallLog;
use crate::config::WardenConfig;
use crate::decision::ScreeningDecision;
use crate::dispatcher::{BackgroundDispatcher, BackgroundRuntime, DispatchSink, TracingDispatchSink};
use crate::error::WardenResult;
use crate::lifecycle::LifecycleController;
use crate::notification::Notifier;
use crate::relay::{EventRelay, RelayHandle};
use crate::screening::{Classifier, ScreeningCoordinator, ScreeningOutcome};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Host collaborators the pipeline talks to.
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub runtime: Arc<dyn BackgroundRuntime>,
    pub classifier: Option<Arc<dyn Classifier>>,
    pub call_log: Option<Arc<dyn CallLog>>,
    pub dispatch_sink: Arc<dyn DispatchSink>,
}

impl Collaborators {
    /// Collaborators with no classifier, no call log and log-only dispatch
    /// reporting.
    pub fn new(notifier: Arc<dyn Notifier>, runtime: Arc<dyn BackgroundRuntime>) -> Self {
        Self {
            notifier,
            runtime,
            classifier: None,
            call_log: None,
            dispatch_sink: Arc::new(TracingDispatchSink),
        }
    }
}

/// The incoming call pipeline.
pub struct CallWarden {
    calls: Arc<CallStateMachine>,
    lifecycle: Arc<LifecycleController>,
    screening: ScreeningCoordinator,
    relay: RelayHandle,
    worker: JoinHandle<()>,
}

impl CallWarden {
    /// Validate `config` and start the relay worker. Must be called within a
    /// tokio runtime.
    pub fn start(config: &WardenConfig, collaborators: Collaborators) -> WardenResult<Self> {
        config.validate()?;

        let calls = Arc::new(CallStateMachine::new());
        let lifecycle = Arc::new(LifecycleController::new(collaborators.notifier.clone()));
        let dispatcher = Arc::new(BackgroundDispatcher::new(
            collaborators.runtime,
            config.retry_policy(),
            config.dispatch_timeout(),
            collaborators.dispatch_sink,
        ));

        let mut relay = EventRelay::new(
            lifecycle.clone(),
            collaborators.notifier,
            dispatcher,
            config.dedup_window,
        );
        if let Some(call_log) = collaborators.call_log {
            relay = relay.with_call_log(call_log, config.recent_call_log_limit);
        }
        let (relay, worker) = Arc::new(relay).spawn(config.relay_queue_capacity);

        let screening = ScreeningCoordinator::new(
            calls.clone(),
            collaborators.classifier,
            config.classifier_budget().min(config.screening_deadline()),
            relay.clone(),
            config.dedup_window,
        );

        info!(
            screening_deadline_ms = config.screening_deadline_ms,
            classifier_budget_ms = config.classifier_budget_ms,
            retry_max_attempts = config.retry_max_attempts,
            retry_delay_ms = config.retry_delay_ms,
            dispatch_timeout_ms = config.dispatch_timeout_ms,
            "call pipeline started"
        );

        Ok(Self {
            calls,
            lifecycle,
            screening,
            relay,
            worker,
        })
    }

    /// Attach/detach control for the foreground runtime.
    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn call_state(&self) -> CallState {
        self.calls.state()
    }

    /// Telephony listener entry point.
    ///
    /// Every signal advances the state machine. Only ringing events are
    /// relayed, and only while the foreground runtime is attached: the
    /// listener lives as long as that runtime does. Calls arriving while it
    /// is away are reported by the screening hook.
    pub fn on_signal(&self, signal: &TelephonySignal) -> Option<CallEvent> {
        let event = self.calls.observe(signal)?;
        if event.state() == CallState::Ringing {
            if self.lifecycle.is_attached() {
                if let Err(e) = self.relay.try_relay(event.clone(), None) {
                    warn!(call_id = %event.call_id(), error = %e, "ringing event not relayed");
                }
            } else {
                debug!(call_id = %event.call_id(), "listener detached, ringing left to screening");
            }
        }
        Some(event)
    }

    /// Screening hook entry point.
    pub async fn on_screen_call(&self, details: &CallDetails) -> ScreeningDecision {
        self.screening.screen(details).await.decision
    }

    /// Like [`Self::on_screen_call`], with the full outcome.
    pub async fn screen_call(&self, details: &CallDetails) -> ScreeningOutcome {
        self.screening.screen(details).await
    }

    /// Stop accepting relay requests and wait for queued ones to be routed.
    /// Dispatch tasks already submitted keep running.
    pub async fn shutdown(self) {
        let Self {
            screening,
            relay,
            worker,
            ..
        } = self;
        drop(screening);
        drop(relay);
        if let Err(e) = worker.await {
            warn!(error = %e, "relay worker ended abnormally");
        }
    }
}
