//! Call lifecycle state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//!            Ring
//!   Idle ──────────► Ringing
//!    ▲  ▲              │
//!    │  │  Hangup      │ Answer
//!    │  └──────────────┤
//!    │                 ▼
//!    │   Hangup     OffHook
//!    └─────────────────┘
//! ```
//!
//! Platform callbacks repeat. A signal for the state the machine is already
//! in is dropped without producing an event, and so is any signal the
//! diagram does not allow (for example `Idle -> OffHook`, an outgoing call).

use crate::call::{CallEvent, CallId, CallState, PhoneNumber, TelephonySignal};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_fsm::*;
use tracing::{debug, info};

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub call_machine(Idle)

    Idle => {
        Ring => Ringing
    },
    Ringing => {
        Answer => OffHook,
        Hangup => Idle
    },
    OffHook => {
        Hangup => Idle
    }
}

pub use call_machine::Input as CallMachineInput;
pub use call_machine::State as CallMachineState;
pub use call_machine::StateMachine as CallMachine;

impl From<&CallMachineState> for CallState {
    fn from(state: &CallMachineState) -> Self {
        match state {
            CallMachineState::Idle => CallState::Idle,
            CallMachineState::Ringing => CallState::Ringing,
            CallMachineState::OffHook => CallState::OffHook,
        }
    }
}

/// Input that moves the machine into `target`.
fn input_for(target: CallState) -> CallMachineInput {
    match target {
        CallState::Ringing => CallMachineInput::Ring,
        CallState::OffHook => CallMachineInput::Answer,
        CallState::Idle => CallMachineInput::Hangup,
    }
}

/// The call currently tracked by the machine.
#[derive(Debug, Clone)]
struct Lineage {
    call_id: CallId,
    phone_number: PhoneNumber,
    ringing: CallEvent,
}

struct Tracker {
    machine: CallMachine,
    lineage: Option<Lineage>,
    last_observed_at: Option<DateTime<Utc>>,
}

impl Tracker {
    fn state(&self) -> CallState {
        CallState::from(self.machine.state())
    }

    /// Timestamps never go backwards, so events of one call are totally
    /// ordered even if the wall clock steps back.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_observed_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_observed_at = Some(stamp);
        stamp
    }

    fn open_lineage(&mut self, phone_number: PhoneNumber) -> CallEvent {
        let call_id = CallId::new();
        let event = CallEvent::new(call_id, phone_number.clone(), CallState::Ringing, self.stamp());
        self.lineage = Some(Lineage {
            call_id,
            phone_number,
            ringing: event.clone(),
        });
        event
    }
}

/// Turns raw telephony signals into typed [`CallEvent`]s.
///
/// Each method holds the internal lock only for an in-memory transition, so
/// it is safe to call from the platform's callback context.
pub struct CallStateMachine {
    tracker: Mutex<Tracker>,
}

impl CallStateMachine {
    pub fn new() -> Self {
        Self {
            tracker: Mutex::new(Tracker {
                machine: CallMachine::new(),
                lineage: None,
                last_observed_at: None,
            }),
        }
    }

    pub fn state(&self) -> CallState {
        self.tracker.lock().state()
    }

    /// Lineage of the call in progress, if any.
    pub fn current_call(&self) -> Option<CallId> {
        self.tracker.lock().lineage.as_ref().map(|l| l.call_id)
    }

    /// Apply a platform signal. Returns the event for a real transition,
    /// `None` for duplicates and impossible transitions.
    pub fn observe(&self, signal: &TelephonySignal) -> Option<CallEvent> {
        let mut tracker = self.tracker.lock();
        let current = tracker.state();

        if signal.state == current {
            debug!(state = %current, "duplicate telephony signal dropped");
            return None;
        }

        if tracker.machine.consume(&input_for(signal.state)).is_err() {
            debug!(
                from = %current,
                to = %signal.state,
                "telephony signal has no transition, ignoring"
            );
            return None;
        }

        let event = match signal.state {
            CallState::Ringing => {
                let phone_number = PhoneNumber::from_raw(signal.number.as_deref());
                if !phone_number.is_known() {
                    debug!("incoming number withheld by platform");
                }
                tracker.open_lineage(phone_number)
            }
            CallState::OffHook | CallState::Idle => {
                // Ringing always opened a lineage before these transitions.
                let (call_id, phone_number) = match tracker.lineage.as_ref() {
                    Some(lineage) => (lineage.call_id, lineage.phone_number.clone()),
                    None => (CallId::new(), PhoneNumber::Unknown),
                };
                let stamp = tracker.stamp();
                if signal.state == CallState::Idle {
                    tracker.lineage = None;
                }
                CallEvent::new(call_id, phone_number, signal.state, stamp)
            }
        };

        info!(
            call_id = %event.call_id(),
            from = %current,
            to = %event.state(),
            "call state changed"
        );
        Some(event)
    }

    /// Ringing event for a call reported by the screening hook.
    ///
    /// The hook and the telephony listener usually both report the same
    /// ring; whichever comes first opens the lineage and the other one gets
    /// the same event back.
    ///
    /// - `Idle`: opens a new lineage.
    /// - `Ringing` with the same (or an unknown) number: existing lineage.
    /// - `Ringing` with a different number: the previous lineage never saw
    ///   its hangup, so it is closed and a new one opened.
    /// - `OffHook`: a waiting call; a standalone lineage is returned without
    ///   disturbing the call in progress.
    pub fn observe_screening(&self, phone_number: PhoneNumber) -> CallEvent {
        let mut tracker = self.tracker.lock();

        match tracker.state() {
            CallState::Idle => {
                // Idle -> Ringing always exists.
                let _ = tracker.machine.consume(&CallMachineInput::Ring);
                tracker.open_lineage(phone_number)
            }
            CallState::Ringing => {
                let same_call = match tracker.lineage.as_ref() {
                    Some(lineage) => {
                        !phone_number.is_known()
                            || !lineage.phone_number.is_known()
                            || lineage.phone_number == phone_number
                    }
                    None => false,
                };
                if same_call {
                    if let Some(lineage) = tracker.lineage.as_ref() {
                        debug!(call_id = %lineage.call_id, "screening joined existing call");
                        return lineage.ringing.clone();
                    }
                }
                debug!("stale ringing lineage replaced by screened call");
                let _ = tracker.machine.consume(&CallMachineInput::Hangup);
                let _ = tracker.machine.consume(&CallMachineInput::Ring);
                tracker.open_lineage(phone_number)
            }
            CallState::OffHook => {
                let stamp = tracker.stamp();
                CallEvent::new(CallId::new(), phone_number, CallState::Ringing, stamp)
            }
        }
    }
}

impl Default for CallStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
