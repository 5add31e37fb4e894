//! Notification collaborator contract.

use crate::call::PhoneNumber;
use crate::contract::{
    call_notification_body, ChannelSpec, CALL_DETECTION_CHANNEL, CALL_NOTIFICATION_ID,
    CALL_NOTIFICATION_TITLE,
};

/// A notification to surface. Records sharing an `id` replace each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub id: u32,
    pub channel_id: &'static str,
    pub title: String,
    pub body: String,
}

impl NotificationRecord {
    /// The record shown for an incoming call.
    pub fn incoming_call(phone_number: &PhoneNumber) -> Self {
        Self {
            id: CALL_NOTIFICATION_ID,
            channel_id: CALL_DETECTION_CHANNEL.id,
            title: CALL_NOTIFICATION_TITLE.to_string(),
            body: call_notification_body(&phone_number.to_string()),
        }
    }
}

/// Host notification surface. Fire-and-forget: nothing is returned and
/// implementations must not block.
pub trait Notifier: Send + Sync {
    /// Create the channel if it does not exist yet.
    fn ensure_channel(&self, channel: &ChannelSpec);

    /// Show `record`, replacing any record with the same id.
    fn show(&self, record: NotificationRecord);
}

/// A notifier that discards everything.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn ensure_channel(&self, _channel: &ChannelSpec) {}

    fn show(&self, _record: NotificationRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_call_record() {
        let record = NotificationRecord::incoming_call(&PhoneNumber::Known("+15551234567".into()));
        assert_eq!(record.id, 1);
        assert_eq!(record.channel_id, "call_detection_channel");
        assert_eq!(record.title, "Call detected");
        assert_eq!(record.body, "Incoming call detected: +15551234567");
    }

    #[test]
    fn test_incoming_call_record_unknown_number() {
        let record = NotificationRecord::incoming_call(&PhoneNumber::Unknown);
        assert_eq!(record.body, "Incoming call detected: unknown");
    }
}
