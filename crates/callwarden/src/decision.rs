//! Screening decision returned to the platform's call-screening hook.

use crate::error::{WardenError, WardenResult};
use serde::{Deserialize, Serialize};

/// How the platform should treat an incoming call.
///
/// `ScreeningDecision::default()` (all flags false) lets the call through
/// unmodified. Values are validated at construction against the platform's
/// response rules:
///
/// - `silence` applies to calls that are let through, so it cannot be
///   combined with `block`.
/// - `skip_call_log` and `skip_notification` apply to blocked calls only.
///
/// A decision with `block == true` is final for its call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawScreeningDecision")]
pub struct ScreeningDecision {
    block: bool,
    silence: bool,
    skip_call_log: bool,
    skip_notification: bool,
}

/// Wire form of a decision, checked by [`ScreeningDecision::new`] on decode.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawScreeningDecision {
    block: bool,
    silence: bool,
    skip_call_log: bool,
    skip_notification: bool,
}

impl TryFrom<RawScreeningDecision> for ScreeningDecision {
    type Error = WardenError;

    fn try_from(raw: RawScreeningDecision) -> WardenResult<Self> {
        Self::new(raw.block, raw.silence, raw.skip_call_log, raw.skip_notification)
    }
}

impl ScreeningDecision {
    /// Validate and build a decision.
    pub fn new(
        block: bool,
        silence: bool,
        skip_call_log: bool,
        skip_notification: bool,
    ) -> WardenResult<Self> {
        if block && silence {
            return Err(WardenError::InvalidDecision(
                "silence only applies to calls that are let through".to_string(),
            ));
        }
        if !block && (skip_call_log || skip_notification) {
            return Err(WardenError::InvalidDecision(
                "skip_call_log and skip_notification only apply to blocked calls".to_string(),
            ));
        }
        Ok(Self {
            block,
            silence,
            skip_call_log,
            skip_notification,
        })
    }

    /// Let the call through unmodified.
    pub const fn allow() -> Self {
        Self {
            block: false,
            silence: false,
            skip_call_log: false,
            skip_notification: false,
        }
    }

    /// Let the call through without ringing.
    pub const fn silence() -> Self {
        Self {
            block: false,
            silence: true,
            skip_call_log: false,
            skip_notification: false,
        }
    }

    /// Reject the call, keeping its call-log entry and missed-call notification.
    pub const fn block() -> Self {
        Self {
            block: true,
            silence: false,
            skip_call_log: false,
            skip_notification: false,
        }
    }

    pub fn blocks(&self) -> bool {
        self.block
    }

    pub fn silences(&self) -> bool {
        self.silence
    }

    pub fn skips_call_log(&self) -> bool {
        self.skip_call_log
    }

    pub fn skips_notification(&self) -> bool {
        self.skip_notification
    }

    /// True when no further decision may be issued for the call.
    pub fn is_terminal(&self) -> bool {
        self.block
    }
}
