//! Call data model: caller numbers, lifecycle states and typed call events.

use crate::contract::UNKNOWN_NUMBER_LABEL;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of trailing digits used as a contact lookup key.
const LOOKUP_KEY_DIGITS: usize = 10;

/// Caller number as reported by the platform.
///
/// The platform may withhold or redact the number. That is a normal value,
/// not an error, and flows through the pipeline as `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum PhoneNumber {
    Known(String),
    Unknown,
}

impl PhoneNumber {
    /// Build from an optional raw platform field. Blank strings are unknown.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(number) if !number.is_empty() => PhoneNumber::Known(number.to_string()),
            _ => PhoneNumber::Unknown,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PhoneNumber::Known(number) => Some(number),
            PhoneNumber::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, PhoneNumber::Known(_))
    }

    /// Last ten digits with all non-digits stripped.
    ///
    /// `None` for unknown numbers or numbers without any digits.
    pub fn lookup_key(&self) -> Option<String> {
        let digits: Vec<char> = self.as_str()?.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return None;
        }
        let start = digits.len().saturating_sub(LOOKUP_KEY_DIGITS);
        Some(digits[start..].iter().collect())
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhoneNumber::Known(number) => f.write_str(number),
            PhoneNumber::Unknown => f.write_str(UNKNOWN_NUMBER_LABEL),
        }
    }
}

/// Telephony call state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "RINGING")]
    Ringing,
    #[serde(rename = "OFFHOOK")]
    OffHook,
}

impl CallState {
    pub fn as_str(self) -> &'static str {
        match self {
            CallState::Idle => "IDLE",
            CallState::Ringing => "RINGING",
            CallState::OffHook => "OFFHOOK",
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of one physical call; shared by all of its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A typed call lifecycle event.
///
/// Only the call state machine creates these; fields are read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEvent {
    call_id: CallId,
    phone_number: PhoneNumber,
    state: CallState,
    observed_at: DateTime<Utc>,
}

impl CallEvent {
    pub(crate) fn new(
        call_id: CallId,
        phone_number: PhoneNumber,
        state: CallState,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            call_id,
            phone_number,
            state,
            observed_at,
        }
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn phone_number(&self) -> &PhoneNumber {
        &self.phone_number
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// Raw call-out from the telephony signal source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelephonySignal {
    pub state: CallState,
    pub number: Option<String>,
}

impl TelephonySignal {
    pub fn ringing(number: Option<&str>) -> Self {
        Self {
            state: CallState::Ringing,
            number: number.map(str::to_string),
        }
    }

    pub fn offhook() -> Self {
        Self {
            state: CallState::OffHook,
            number: None,
        }
    }

    pub fn idle() -> Self {
        Self {
            state: CallState::Idle,
            number: None,
        }
    }
}

/// Call details handed over by the synchronous screening hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDetails {
    /// Call handle URI, e.g. `tel:+15551234567`.
    pub handle: Option<String>,
}

impl CallDetails {
    pub fn from_handle(handle: impl Into<String>) -> Self {
        Self {
            handle: Some(handle.into()),
        }
    }

    /// The scheme-specific part of the handle.
    pub fn phone_number(&self) -> PhoneNumber {
        let Some(handle) = self.handle.as_deref() else {
            return PhoneNumber::Unknown;
        };
        let number = match handle.split_once(':') {
            Some((_scheme, rest)) => rest,
            None => handle,
        };
        PhoneNumber::from_raw(Some(number))
    }
}
