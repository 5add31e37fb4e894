//! Callwarden: incoming-call detection, screening and relay.
//!
//! Callwarden sits between a telephony platform and a presentation runtime.
//! It turns raw call-state signals into typed call events, answers the
//! platform's screening hook before its deadline, and gets every incoming
//! call in front of the user: directly when the UI runtime is attached, via
//! a revived background task when it is not.
//!
//! # Core Invariants
//!
//! 1. **Fail-Open**: when no classifier verdict is available in time, the
//!    call is allowed. Nothing on the screening path returns an error.
//! 2. **No Waiting on the Relay**: the screening path only queues work for
//!    the relay; it never awaits delivery.
//! 3. **One Event per Transition**: duplicate platform signals are collapsed
//!    and a relayed ringing event is never delivered twice.
//! 4. **Bounded Dispatch**: background delivery stops after the configured
//!    attempts or the overall timeout, whichever comes first.
//!
//! # Architecture
//!
//! ```text
//! telephony signal ─► CallStateMachine ─┐
//!                                       ├─► EventRelay ─► foreground consumer
//! screening hook ─► ScreeningCoordinator┘        │          + notification
//!        │                                       └─► BackgroundDispatcher
//!        └─► ScreeningDecision (to platform)              └─► revive (retry)
//! ```

pub mod call;
pub mod call_fsm;
pub mod call_log;
pub mod config;
pub mod contract;
pub mod decision;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod notification;
pub mod relay;
pub mod retry;
pub mod screening;
pub mod warden;

#[cfg(test)]
mod tests;

pub use call::{CallDetails, CallEvent, CallId, CallState, PhoneNumber, TelephonySignal};
pub use call_fsm::CallStateMachine;
pub use call_log::{CallKind, CallLog, CallLogEntry};
pub use config::WardenConfig;
pub use decision::ScreeningDecision;
pub use dispatcher::{
    BackgroundDispatcher, BackgroundRuntime, DispatchOutcome, DispatchPayload, DispatchReport,
    DispatchSink, DispatchState, DispatchTask, RevivalOutcome, TracingDispatchSink,
};
pub use error::{WardenError, WardenResult};
pub use lifecycle::{
    DeliveryKind, ForegroundConsumer, ForegroundDelivery, LifecycleController, Reachability,
};
pub use notification::{NotificationRecord, Notifier, NullNotifier};
pub use relay::{EventRelay, RelayHandle, RelayOutcome};
pub use retry::{RetryPolicy, RetryVerdict};
pub use screening::{Classifier, FallbackReason, ScreeningCoordinator, ScreeningOutcome, ScreeningSource};
pub use warden::{CallWarden, Collaborators};
