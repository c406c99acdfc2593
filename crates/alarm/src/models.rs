use serde::{Deserialize, Serialize};
use std::fmt;

/// One sample of the monitored metric, as delivered by a reading source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Human-readable capture time, in whatever format the source uses.
    pub timestamp: String,
    /// Capture time in epoch milliseconds.
    pub timestamp_ms: i64,
    pub value: f64,
    /// Rate-of-change label, passed through untouched.
    pub trend: String,
    /// Provenance label, passed through untouched.
    pub source: String,
}

/// Out-of-range condition that an alarm is raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmReason {
    Low,
    High,
}

impl fmt::Display for AlarmReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmReason::Low => write!(f, "Low"),
            AlarmReason::High => write!(f, "High"),
        }
    }
}

/// Result of comparing a value against the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Normal,
    OutOfRange(AlarmReason),
}

/// Emitted by the engine whenever it decides a notification should go out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmEvent {
    pub reason: AlarmReason,
    pub value: f64,
    /// Timestamp of the reading that caused the alarm.
    pub timestamp: String,
    /// Evaluation time, epoch milliseconds.
    pub fired_at_ms: i64,
}
