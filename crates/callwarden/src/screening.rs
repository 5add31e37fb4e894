//! Screening coordinator.
//!
//! Answers the platform's screening hook before its hard deadline. The
//! classifier, if any, runs under a budget strictly below the deadline;
//! anything that goes wrong resolves to letting the call through. After the
//! decision is made, the event and decision are queued for the relay without
//! waiting on it.

use crate::call::{CallDetails, CallEvent, CallId};
use crate::call_fsm::CallStateMachine;
use crate::decision::ScreeningDecision;
use crate::error::WardenResult;
use crate::relay::RelayHandle;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// External call classifier, e.g. a spam database lookup.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, event: &CallEvent) -> WardenResult<ScreeningDecision>;
}

/// Why the default decision was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    NoClassifier,
    /// The classifier did not answer within its budget.
    Timeout,
    ClassifierError,
}

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreeningSource {
    Classifier,
    /// Already issued for this call.
    Cached,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone)]
pub struct ScreeningOutcome {
    pub event: CallEvent,
    pub decision: ScreeningDecision,
    pub source: ScreeningSource,
    pub elapsed: Duration,
}

/// Decisions already issued, by call.
struct Issued {
    entries: VecDeque<(CallId, ScreeningDecision)>,
    capacity: usize,
}

impl Issued {
    fn get(&self, call_id: CallId) -> Option<ScreeningDecision> {
        self.entries
            .iter()
            .find(|(id, _)| *id == call_id)
            .map(|(_, decision)| *decision)
    }

    fn insert(&mut self, call_id: CallId, decision: ScreeningDecision) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((call_id, decision));
    }
}

pub struct ScreeningCoordinator {
    calls: Arc<CallStateMachine>,
    classifier: Option<Arc<dyn Classifier>>,
    budget: Duration,
    relay: RelayHandle,
    issued: Mutex<Issued>,
}

impl ScreeningCoordinator {
    /// `budget` bounds the classifier; callers keep it below the platform
    /// deadline.
    pub fn new(
        calls: Arc<CallStateMachine>,
        classifier: Option<Arc<dyn Classifier>>,
        budget: Duration,
        relay: RelayHandle,
        history: usize,
    ) -> Self {
        let capacity = history.max(1);
        Self {
            calls,
            classifier,
            budget,
            relay,
            issued: Mutex::new(Issued {
                entries: VecDeque::with_capacity(capacity),
                capacity,
            }),
        }
    }

    /// Screen one incoming call. Never fails; see [`ScreeningSource`] for
    /// how the decision was reached.
    pub async fn screen(&self, details: &CallDetails) -> ScreeningOutcome {
        let started = Instant::now();
        let event = self.calls.observe_screening(details.phone_number());
        let call_id = event.call_id();

        if let Some(decision) = self.issued.lock().get(call_id) {
            debug!(%call_id, "call already screened, reusing decision");
            return ScreeningOutcome {
                event,
                decision,
                source: ScreeningSource::Cached,
                elapsed: started.elapsed(),
            };
        }

        let (decision, mut source) = self.classify(&event).await;

        // A concurrent screen of the same call may have finished first.
        let decision = {
            let mut issued = self.issued.lock();
            match issued.get(call_id) {
                Some(existing) => {
                    source = ScreeningSource::Cached;
                    existing
                }
                None => {
                    issued.insert(call_id, decision);
                    decision
                }
            }
        };

        if source != ScreeningSource::Cached {
            if let Err(e) = self.relay.try_relay(event.clone(), Some(decision)) {
                warn!(%call_id, error = %e, "screened call not relayed");
            }
        }

        let elapsed = started.elapsed();
        info!(
            %call_id,
            block = decision.blocks(),
            silence = decision.silences(),
            ?source,
            elapsed_ms = elapsed.as_millis() as u64,
            "call screened"
        );
        ScreeningOutcome {
            event,
            decision,
            source,
            elapsed,
        }
    }

    async fn classify(&self, event: &CallEvent) -> (ScreeningDecision, ScreeningSource) {
        let call_id = event.call_id();
        let Some(classifier) = self.classifier.as_ref() else {
            return (
                ScreeningDecision::allow(),
                ScreeningSource::Fallback(FallbackReason::NoClassifier),
            );
        };

        match tokio::time::timeout(self.budget, classifier.classify(event)).await {
            Ok(Ok(decision)) => (decision, ScreeningSource::Classifier),
            Ok(Err(e)) => {
                warn!(%call_id, error = %e, "classifier failed, allowing call");
                (
                    ScreeningDecision::allow(),
                    ScreeningSource::Fallback(FallbackReason::ClassifierError),
                )
            }
            Err(_) => {
                warn!(
                    %call_id,
                    budget_ms = self.budget.as_millis() as u64,
                    "classifier missed its budget, allowing call"
                );
                (
                    ScreeningDecision::allow(),
                    ScreeningSource::Fallback(FallbackReason::Timeout),
                )
            }
        }
    }
}
