//! Alarm evaluation and debouncing.
//!
//! The engine classifies each reading against static thresholds and decides
//! whether to fire, renew, suppress or reset an alarm. Its only memory is an
//! [`AlarmState`], which it owns exclusively. Notification is left to the
//! caller so the decision logic never touches the network.

use crate::{
    models::{AlarmEvent, AlarmReason, Classification, Reading},
    window::ActiveWindow,
};
use std::time::Duration;
use thiserror::Error;

/// Static alarm policy, set once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    /// Readings strictly below this are `Low`.
    pub low: f64,
    /// Readings strictly above this are `High`.
    pub high: f64,
    pub cooldown_low: Duration,
    pub cooldown_high: Duration,
    /// Hours during which readings are evaluated. `None` means always.
    pub active_window: Option<ActiveWindow>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low: 70.0,
            high: 180.0,
            cooldown_low: Duration::from_secs(30 * 60),
            cooldown_high: Duration::from_secs(150 * 60),
            active_window: None,
        }
    }
}

impl ThresholdConfig {
    /// Boundary values are normal: both comparisons are strict.
    pub fn classify(&self, value: f64) -> Classification {
        if value < self.low {
            Classification::OutOfRange(AlarmReason::Low)
        } else if value > self.high {
            Classification::OutOfRange(AlarmReason::High)
        } else {
            Classification::Normal
        }
    }

    pub fn cooldown_for(&self, reason: AlarmReason) -> Duration {
        match reason {
            AlarmReason::Low => self.cooldown_low,
            AlarmReason::High => self.cooldown_high,
        }
    }
}

/// The engine's memory between evaluations.
///
/// An inactive state carries no alarm time and no reason, and an active state
/// always carries both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmState {
    #[default]
    Inactive,
    Active {
        reason: AlarmReason,
        last_alarm_ms: i64,
    },
}

/// What a single evaluation decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// In range and no alarm was being tracked.
    Normal,
    /// In range after an alarm. State was reset silently.
    Recovered,
    Fired(AlarmEvent),
    /// Out of range, but the cooldown for `reason` has not elapsed yet.
    Suppressed {
        reason: AlarmReason,
        elapsed_ms: i64,
        remaining_ms: i64,
    },
}

impl Decision {
    pub fn event(&self) -> Option<&AlarmEvent> {
        match self {
            Decision::Fired(event) => Some(event),
            _ => None,
        }
    }

    pub fn into_event(self) -> Option<AlarmEvent> {
        match self {
            Decision::Fired(event) => Some(event),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("reading value is not a finite number: {0}")]
    NonFiniteValue(f64),
}

impl AlarmState {
    pub fn is_active(&self) -> bool {
        matches!(self, AlarmState::Active { .. })
    }

    pub fn last_alarm_time(&self) -> Option<i64> {
        match self {
            AlarmState::Active { last_alarm_ms, .. } => Some(*last_alarm_ms),
            AlarmState::Inactive => None,
        }
    }

    pub fn reason(&self) -> Option<AlarmReason> {
        match self {
            AlarmState::Active { reason, .. } => Some(*reason),
            AlarmState::Inactive => None,
        }
    }

    /// Computes the next state and the decision for `reading` observed at `now_ms`.
    ///
    /// A reading whose condition differs from the active reason is a new
    /// condition: it fires at once and restarts the cooldown for its own reason.
    pub fn transition(
        self,
        thresholds: &ThresholdConfig,
        reading: &Reading,
        now_ms: i64,
    ) -> Result<(AlarmState, Decision), EngineError> {
        if !reading.value.is_finite() {
            return Err(EngineError::NonFiniteValue(reading.value));
        }

        let reason = match thresholds.classify(reading.value) {
            Classification::Normal if self.is_active() => {
                return Ok((AlarmState::Inactive, Decision::Recovered));
            }
            Classification::Normal => return Ok((AlarmState::Inactive, Decision::Normal)),
            Classification::OutOfRange(reason) => reason,
        };

        match self {
            AlarmState::Active {
                reason: active_reason,
                last_alarm_ms,
            } if active_reason == reason => {
                let elapsed_ms = now_ms.saturating_sub(last_alarm_ms);
                let cooldown_ms = duration_to_millis(thresholds.cooldown_for(reason));

                if elapsed_ms >= cooldown_ms {
                    Ok(fire(reason, reading, now_ms))
                } else {
                    Ok((
                        self,
                        Decision::Suppressed {
                            reason,
                            elapsed_ms,
                            remaining_ms: cooldown_ms.saturating_sub(elapsed_ms),
                        },
                    ))
                }
            }
            _ => Ok(fire(reason, reading, now_ms)),
        }
    }
}

fn fire(reason: AlarmReason, reading: &Reading, now_ms: i64) -> (AlarmState, Decision) {
    (
        AlarmState::Active {
            reason,
            last_alarm_ms: now_ms,
        },
        Decision::Fired(AlarmEvent {
            reason,
            value: reading.value,
            timestamp: reading.timestamp.clone(),
            fired_at_ms: now_ms,
        }),
    )
}

fn duration_to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone)]
pub struct AlarmEngine {
    thresholds: ThresholdConfig,
    state: AlarmState,
}

impl AlarmEngine {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self::with_state(thresholds, AlarmState::Inactive)
    }

    pub fn with_state(thresholds: ThresholdConfig, state: AlarmState) -> Self {
        Self { thresholds, state }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    /// Evaluates `reading` at `now_ms` and commits the resulting state.
    ///
    /// On error the previous state is left untouched.
    pub fn evaluate(&mut self, reading: &Reading, now_ms: i64) -> Result<Decision, EngineError> {
        let (next, decision) = self.state.transition(&self.thresholds, reading, now_ms)?;
        self.state = next;
        Ok(decision)
    }
}
