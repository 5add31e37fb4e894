//! Read-only call log collaborator.
//!
//! Used to fill in the caller number when the ringing signal came without
//! one. Never consulted on the screening path.

use crate::call::PhoneNumber;
use crate::error::WardenResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Most entries the relay ever asks for.
pub const MAX_RECENT_ENTRIES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Incoming,
    Outgoing,
    Missed,
    Rejected,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallLogEntry {
    pub number: String,
    pub kind: CallKind,
    pub date: DateTime<Utc>,
    pub duration_secs: u64,
    pub country_iso: Option<String>,
}

/// Platform call log.
pub trait CallLog: Send + Sync {
    /// Up to `limit` entries, newest first.
    fn recent(&self, limit: usize) -> WardenResult<Vec<CallLogEntry>>;

    /// Number of the newest incoming entry among the `limit` most recent.
    fn last_incoming_number(&self, limit: usize) -> WardenResult<PhoneNumber> {
        let entries = self.recent(limit.min(MAX_RECENT_ENTRIES))?;
        let newest = entries
            .into_iter()
            .filter(|entry| entry.kind == CallKind::Incoming)
            .max_by_key(|entry| entry.date);
        Ok(PhoneNumber::from_raw(newest.as_ref().map(|e| e.number.as_str())))
    }
}

/// Keep the `limit` newest entries, newest first.
pub fn newest_first(mut entries: Vec<CallLogEntry>, limit: usize) -> Vec<CallLogEntry> {
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries.truncate(limit);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(number: &str, kind: CallKind, secs: i64) -> CallLogEntry {
        CallLogEntry {
            number: number.to_string(),
            kind,
            date: Utc.timestamp_opt(secs, 0).unwrap(),
            duration_secs: 0,
            country_iso: Some("US".to_string()),
        }
    }

    struct Fixed(Vec<CallLogEntry>);

    impl CallLog for Fixed {
        fn recent(&self, limit: usize) -> WardenResult<Vec<CallLogEntry>> {
            Ok(newest_first(self.0.clone(), limit))
        }
    }

    #[test]
    fn test_newest_first_sorts_and_truncates() {
        let entries = vec![
            entry("1", CallKind::Incoming, 10),
            entry("2", CallKind::Outgoing, 30),
            entry("3", CallKind::Missed, 20),
        ];
        let recent = newest_first(entries, 2);
        let numbers: Vec<_> = recent.iter().map(|e| e.number.as_str()).collect();
        assert_eq!(numbers, vec!["2", "3"]);
    }

    #[test]
    fn test_last_incoming_skips_other_kinds() {
        let log = Fixed(vec![
            entry("+15550000001", CallKind::Incoming, 10),
            entry("+15550000002", CallKind::Outgoing, 30),
            entry("+15550000003", CallKind::Incoming, 20),
        ]);
        assert_eq!(
            log.last_incoming_number(5).unwrap(),
            PhoneNumber::Known("+15550000003".into())
        );
    }

    #[test]
    fn test_last_incoming_unknown_when_none() {
        let log = Fixed(vec![entry("1", CallKind::Outgoing, 10)]);
        assert_eq!(log.last_incoming_number(5).unwrap(), PhoneNumber::Unknown);
        assert_eq!(Fixed(vec![]).last_incoming_number(5).unwrap(), PhoneNumber::Unknown);
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(CallKind::Rejected).unwrap(), "rejected");
    }
}
