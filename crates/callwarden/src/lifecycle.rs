//! Foreground runtime attachment.
//!
//! The presentation runtime attaches while it is active (resume) and
//! detaches when it goes away (pause, destroy). The controller owns the
//! attachment; there is no process-wide listener handle.
//!
//! Both operations are idempotent: attaching again replaces the current
//! consumer instead of adding a second one, and detaching while detached is
//! a no-op.

use crate::call::CallEvent;
use crate::contract::{HostEvent, CALL_DETECTION_CHANNEL};
use crate::decision::ScreeningDecision;
use crate::notification::Notifier;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Why a delivery was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    /// First delivery of a call transition. Comes with a notification.
    Event,
    /// The screening decision for an event already delivered without one.
    DecisionUpdate,
}

/// What the foreground runtime receives for a call event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundDelivery {
    pub kind: DeliveryKind,
    pub host_event: HostEvent,
    pub call: CallEvent,
    pub decision: Option<ScreeningDecision>,
    /// Display message, e.g. `Incoming call from: +15551234567`.
    pub message: String,
}

/// The foreground presentation runtime.
///
/// `deliver` is an in-process call made only while the consumer is attached.
/// Implementations must return promptly.
pub trait ForegroundConsumer: Send + Sync {
    fn deliver(&self, delivery: &ForegroundDelivery);
}

/// Whether the foreground consumer can take a delivery right now.
#[derive(Clone)]
pub enum Reachability {
    Reachable(Arc<dyn ForegroundConsumer>),
    Unreachable,
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Reachability::Reachable(_))
    }
}

/// Result of an attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached,
    /// A consumer was already attached and has been replaced.
    Replaced,
}

struct Attachment {
    consumer: Arc<dyn ForegroundConsumer>,
    generation: u64,
}

/// Owns the foreground attachment.
pub struct LifecycleController {
    attachment: RwLock<Option<Attachment>>,
    generation: RwLock<u64>,
    notifier: Arc<dyn Notifier>,
}

impl LifecycleController {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            attachment: RwLock::new(None),
            generation: RwLock::new(0),
            notifier,
        }
    }

    /// Attach `consumer`, replacing any current one.
    ///
    /// Also makes sure the call notification channel exists.
    pub fn attach(&self, consumer: Arc<dyn ForegroundConsumer>) -> AttachOutcome {
        self.notifier.ensure_channel(&CALL_DETECTION_CHANNEL);

        let generation = {
            let mut generation = self.generation.write();
            *generation += 1;
            *generation
        };

        let previous = self.attachment.write().replace(Attachment {
            consumer,
            generation,
        });

        match previous {
            Some(previous) => {
                info!(
                    generation,
                    replaced_generation = previous.generation,
                    "foreground consumer re-attached"
                );
                AttachOutcome::Replaced
            }
            None => {
                info!(generation, "foreground consumer attached");
                AttachOutcome::Attached
            }
        }
    }

    /// Detach the current consumer. Returns whether one was attached.
    pub fn detach(&self) -> bool {
        match self.attachment.write().take() {
            Some(attachment) => {
                info!(generation = attachment.generation, "foreground consumer detached");
                true
            }
            None => {
                debug!("detach requested while already detached");
                false
            }
        }
    }

    /// Host resumed the foreground runtime.
    pub fn on_resume(&self, consumer: Arc<dyn ForegroundConsumer>) -> AttachOutcome {
        self.attach(consumer)
    }

    /// Host paused the foreground runtime.
    pub fn on_pause(&self) {
        self.detach();
    }

    /// Host destroyed the foreground runtime.
    pub fn on_destroy(&self) {
        self.detach();
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.read().is_some()
    }

    /// Capability check; never blocks on the consumer itself.
    pub fn reachability(&self) -> Reachability {
        match self.attachment.read().as_ref() {
            Some(attachment) => Reachability::Reachable(attachment.consumer.clone()),
            None => Reachability::Unreachable,
        }
    }
}
