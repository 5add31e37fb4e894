//! Event relay.
//!
//! Routes a call event, with the screening decision when there is one, to
//! whichever consumer can take it: the attached foreground runtime directly,
//! or the background dispatcher otherwise. Requests arrive over a bounded
//! channel so callers on the screening path never wait for routing.

use crate::call::{CallEvent, CallId, CallState, PhoneNumber};
use crate::call_log::CallLog;
use crate::contract::{foreground_message, HostEvent};
use crate::decision::ScreeningDecision;
use crate::dispatcher::{BackgroundDispatcher, DispatchPayload};
use crate::error::{WardenError, WardenResult};
use crate::lifecycle::{DeliveryKind, ForegroundDelivery, LifecycleController, Reachability};
use crate::notification::{NotificationRecord, Notifier};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One routing request.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub event: CallEvent,
    pub decision: Option<ScreeningDecision>,
}

/// How a request was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Handed to the foreground consumer.
    Delivered,
    /// Submitted to the background dispatcher as the given task.
    Dispatched(Uuid),
    /// The decision was sent to the foreground consumer for an event it
    /// already had. No notification is shown.
    DecisionUpdated,
    /// This (call, state) pair was already relayed.
    Duplicate,
}

/// What the seen window says about a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// First relay of this (call, state) pair.
    New,
    /// Already relayed without a decision; this request brings one.
    DecisionOnly,
    Duplicate,
}

/// Remembers recently relayed (call, state) pairs and whether a decision
/// went out with them.
struct SeenWindow {
    entries: VecDeque<((CallId, CallState), bool)>,
    capacity: usize,
}

impl SeenWindow {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn admit(&mut self, key: (CallId, CallState), has_decision: bool) -> Admission {
        if let Some((_, decided)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            if has_decision && !*decided {
                *decided = true;
                return Admission::DecisionOnly;
            }
            return Admission::Duplicate;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((key, has_decision));
        Admission::New
    }
}

/// Routes call events to the reachable consumer.
pub struct EventRelay {
    lifecycle: Arc<LifecycleController>,
    notifier: Arc<dyn Notifier>,
    dispatcher: Arc<BackgroundDispatcher>,
    call_log: Option<Arc<dyn CallLog>>,
    call_log_limit: usize,
    seen: Mutex<SeenWindow>,
}

impl EventRelay {
    pub fn new(
        lifecycle: Arc<LifecycleController>,
        notifier: Arc<dyn Notifier>,
        dispatcher: Arc<BackgroundDispatcher>,
        dedup_window: usize,
    ) -> Self {
        Self {
            lifecycle,
            notifier,
            dispatcher,
            call_log: None,
            call_log_limit: crate::call_log::MAX_RECENT_ENTRIES,
            seen: Mutex::new(SeenWindow::new(dedup_window)),
        }
    }

    /// Resolve unknown caller numbers from `call_log`.
    pub fn with_call_log(mut self, call_log: Arc<dyn CallLog>, limit: usize) -> Self {
        self.call_log = Some(call_log);
        self.call_log_limit = limit;
        self
    }

    /// Route one event. Must run inside a tokio runtime when the consumer
    /// is unreachable, since dispatch spawns a task.
    pub fn relay(&self, event: &CallEvent, decision: Option<ScreeningDecision>) -> RelayOutcome {
        let call_id = event.call_id();
        let admission = self
            .seen
            .lock()
            .admit((call_id, event.state()), decision.is_some());
        match admission {
            Admission::New => {}
            Admission::DecisionOnly => return self.update_decision(event, decision),
            Admission::Duplicate => {
                debug!(%call_id, state = %event.state(), "duplicate relay dropped");
                return RelayOutcome::Duplicate;
            }
        }

        let phone_number = self.resolve_number(event);

        match self.lifecycle.reachability() {
            Reachability::Reachable(consumer) => {
                let delivery = ForegroundDelivery {
                    kind: DeliveryKind::Event,
                    host_event: HostEvent::CallScreening,
                    call: event.clone(),
                    decision,
                    message: foreground_message(&phone_number.to_string()),
                };
                consumer.deliver(&delivery);
                self.notifier.show(NotificationRecord::incoming_call(&phone_number));
                debug!(%call_id, state = %event.state(), "delivered to foreground consumer");
                RelayOutcome::Delivered
            }
            Reachability::Unreachable => {
                info!(%call_id, state = %event.state(), "foreground consumer unreachable, dispatching");
                let payload = DispatchPayload::for_event(event, &phone_number, decision);
                let task = self.dispatcher.task(payload);
                let task_id = task.id;
                // The dispatcher owns the task from here; its report goes to the sink.
                drop(self.dispatcher.submit(task));
                RelayOutcome::Dispatched(task_id)
            }
        }
    }

    /// Send a late decision to the foreground consumer. A dispatched task
    /// already carries what was known at dispatch time, so nothing is sent
    /// while the consumer is away.
    fn update_decision(&self, event: &CallEvent, decision: Option<ScreeningDecision>) -> RelayOutcome {
        let call_id = event.call_id();
        let Reachability::Reachable(consumer) = self.lifecycle.reachability() else {
            debug!(%call_id, "decision update dropped, foreground consumer unreachable");
            return RelayOutcome::Duplicate;
        };
        let phone_number = self.resolve_number(event);
        consumer.deliver(&ForegroundDelivery {
            kind: DeliveryKind::DecisionUpdate,
            host_event: HostEvent::CallScreening,
            call: event.clone(),
            decision,
            message: foreground_message(&phone_number.to_string()),
        });
        debug!(%call_id, state = %event.state(), "decision update delivered to foreground consumer");
        RelayOutcome::DecisionUpdated
    }

    fn resolve_number(&self, event: &CallEvent) -> PhoneNumber {
        let number = event.phone_number().clone();
        if number.is_known() {
            return number;
        }
        let Some(call_log) = self.call_log.as_ref() else {
            return number;
        };
        match call_log.last_incoming_number(self.call_log_limit) {
            Ok(resolved) => {
                debug!(
                    call_id = %event.call_id(),
                    resolved = resolved.is_known(),
                    "looked up caller number in call log"
                );
                resolved
            }
            Err(e) => {
                warn!(call_id = %event.call_id(), error = %e, "call log lookup failed");
                number
            }
        }
    }

    /// Start the relay worker. Requests beyond `capacity` are rejected.
    pub fn spawn(self: Arc<Self>, capacity: usize) -> (RelayHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<RelayRequest>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let outcome = self.relay(&request.event, request.decision);
                debug!(call_id = %request.event.call_id(), ?outcome, "relay request handled");
            }
            debug!("relay worker stopped");
        });
        (RelayHandle { tx }, worker)
    }
}

/// Sending side of the relay worker. Cheap to clone.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayRequest>,
}

impl RelayHandle {
    /// Queue a request without waiting.
    pub fn try_relay(&self, event: CallEvent, decision: Option<ScreeningDecision>) -> WardenResult<()> {
        self.tx
            .try_send(RelayRequest { event, decision })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => WardenError::RelayFull,
                mpsc::error::TrySendError::Closed(_) => WardenError::RelayClosed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seen_window_rejects_duplicates() {
        let mut window = SeenWindow::new(4);
        let call = CallId::new();
        assert_eq!(window.admit((call, CallState::Ringing), false), Admission::New);
        assert_eq!(window.admit((call, CallState::Ringing), false), Admission::Duplicate);
        assert_eq!(window.admit((call, CallState::OffHook), false), Admission::New);
    }

    #[test]
    fn test_seen_window_admits_one_late_decision() {
        let mut window = SeenWindow::new(4);
        let call = CallId::new();
        assert_eq!(window.admit((call, CallState::Ringing), false), Admission::New);
        assert_eq!(window.admit((call, CallState::Ringing), true), Admission::DecisionOnly);
        assert_eq!(window.admit((call, CallState::Ringing), true), Admission::Duplicate);

        let decided = CallId::new();
        assert_eq!(window.admit((decided, CallState::Ringing), true), Admission::New);
        assert_eq!(window.admit((decided, CallState::Ringing), true), Admission::Duplicate);
    }

    #[test]
    fn test_seen_window_is_bounded() {
        let mut window = SeenWindow::new(2);
        let first = CallId::new();
        window.admit((first, CallState::Ringing), false);
        window.admit((CallId::new(), CallState::Ringing), false);
        window.admit((CallId::new(), CallState::Ringing), false);
        assert_eq!(window.entries.len(), 2);
        // The oldest entry was evicted.
        assert_eq!(window.admit((first, CallState::Ringing), false), Admission::New);
    }
}
