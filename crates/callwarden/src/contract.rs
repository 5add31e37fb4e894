//! Fixed string contract shared with the host runtime.
//!
//! Every name the host or the presentation runtime matches on lives here.
//! Changing any value is a breaking change and must bump
//! [`CONTRACT_VERSION`].

/// Version of the host contract.
pub const CONTRACT_VERSION: u32 = 1;

/// Payload key carrying the caller number.
pub const PHONE_NUMBER_KEY: &str = "phoneNumber";

/// Payload key carrying the contact lookup key.
pub const LOOKUP_KEY: &str = "lookupKey";

/// Placeholder rendered wherever an unknown caller number is displayed.
pub const UNKNOWN_NUMBER_LABEL: &str = "unknown";

/// Events emitted to the foreground runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// An incoming call was detected or screened.
    CallScreening,
}

impl HostEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            HostEvent::CallScreening => "CallScreeningEvent",
        }
    }
}

/// Background tasks the host can revive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessTask {
    /// Receives call payloads while no foreground runtime is attached.
    CallBackgroundMessaging,
}

impl HeadlessTask {
    pub fn as_str(self) -> &'static str {
        match self {
            HeadlessTask::CallBackgroundMessaging => "CallBackgroundMessaging",
        }
    }
}

/// Notification importance levels understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelImportance {
    High,
}

/// A notification channel definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub importance: ChannelImportance,
}

/// The channel all call notifications are posted to.
pub const CALL_DETECTION_CHANNEL: ChannelSpec = ChannelSpec {
    id: "call_detection_channel",
    name: "Call Detection Notifications",
    importance: ChannelImportance::High,
};

/// Stable notification id; each new record replaces the previous one.
pub const CALL_NOTIFICATION_ID: u32 = 1;

/// Title of the call notification.
pub const CALL_NOTIFICATION_TITLE: &str = "Call detected";

/// Body of the call notification.
pub fn call_notification_body(number: &str) -> String {
    format!("Incoming call detected: {}", number)
}

/// Message delivered to the foreground runtime with the typed event.
pub fn foreground_message(number: &str) -> String {
    format!("Incoming call from: {}", number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_names_are_stable() {
        assert_eq!(CONTRACT_VERSION, 1);
        assert_eq!(HostEvent::CallScreening.as_str(), "CallScreeningEvent");
        assert_eq!(
            HeadlessTask::CallBackgroundMessaging.as_str(),
            "CallBackgroundMessaging"
        );
        assert_eq!(PHONE_NUMBER_KEY, "phoneNumber");
        assert_eq!(CALL_DETECTION_CHANNEL.id, "call_detection_channel");
        assert_eq!(CALL_DETECTION_CHANNEL.importance, ChannelImportance::High);
        assert_eq!(CALL_NOTIFICATION_ID, 1);
    }

    #[test]
    fn test_message_formats() {
        assert_eq!(
            call_notification_body("+15551234567"),
            "Incoming call detected: +15551234567"
        );
        assert_eq!(foreground_message("+15551234567"), "Incoming call from: +15551234567");
    }
}
