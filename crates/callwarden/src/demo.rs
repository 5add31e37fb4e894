//! Log-backed host collaborators for the simulator binary.

use async_trait::async_trait;
use callwarden::{
    BackgroundRuntime, CallEvent, Classifier, DispatchPayload, DispatchReport, DispatchSink,
    ForegroundConsumer, ForegroundDelivery, NotificationRecord, Notifier, RevivalOutcome,
    ScreeningDecision, WardenResult,
};
use callwarden::contract::ChannelSpec;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Foreground runtime that logs what it receives.
pub struct LoggingForeground;

impl ForegroundConsumer for LoggingForeground {
    fn deliver(&self, delivery: &ForegroundDelivery) {
        info!(
            event = delivery.host_event.as_str(),
            kind = ?delivery.kind,
            call_id = %delivery.call.call_id(),
            message = %delivery.message,
            blocked = delivery.decision.map(|d| d.blocks()),
            "foreground delivery"
        );
    }
}

pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn ensure_channel(&self, channel: &ChannelSpec) {
        info!(channel_id = channel.id, name = channel.name, "notification channel ensured");
    }

    fn show(&self, record: NotificationRecord) {
        info!(id = record.id, title = %record.title, body = %record.body, "notification shown");
    }
}

/// Background runtime that fails a fixed number of revivals first.
pub struct ScriptedRuntime {
    failures_left: Mutex<u32>,
}

impl ScriptedRuntime {
    pub fn new(failures: u32) -> Self {
        Self {
            failures_left: Mutex::new(failures),
        }
    }
}

#[async_trait]
impl BackgroundRuntime for ScriptedRuntime {
    async fn revive(&self, task_id: Uuid, payload: &DispatchPayload, budget: Duration) -> RevivalOutcome {
        let fail = {
            let mut left = self.failures_left.lock();
            let fail = *left > 0;
            *left = left.saturating_sub(1);
            fail
        };
        if fail {
            return RevivalOutcome::Failed("headless runtime not ready".to_string());
        }
        info!(
            %task_id,
            task = %payload.task_name,
            phone_number = payload.phone_number.as_deref().unwrap_or("unknown"),
            budget_ms = budget.as_millis() as u64,
            "background consumer revived"
        );
        RevivalOutcome::Delivered
    }
}

/// Classifier that blocks every call.
pub struct BlockAll;

#[async_trait]
impl Classifier for BlockAll {
    async fn classify(&self, _event: &CallEvent) -> WardenResult<ScreeningDecision> {
        Ok(ScreeningDecision::block())
    }
}

/// Forwards dispatch reports to the simulator's main task.
pub struct ChannelSink(pub mpsc::UnboundedSender<DispatchReport>);

impl DispatchSink for ChannelSink {
    fn report(&self, report: &DispatchReport) {
        callwarden::TracingDispatchSink.report(report);
        let _ = self.0.send(report.clone());
    }
}
