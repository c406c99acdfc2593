//! Periodic driver for the alarm engine.
//!
//! Each tick checks the active window, fetches the latest reading, evaluates
//! it and forwards a fired alarm to the notifier. Ticks run one after another
//! on a single task, so the engine never sees concurrent evaluations.

use crate::{
    engine::{AlarmEngine, Decision},
    models::AlarmEvent,
    notifier::Notifier,
    source::ReadingSource,
};
use chrono::Timelike;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Source of wall-clock time for evaluations and the active window.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
    fn local_hour(&self) -> u32;
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }

    fn local_hour(&self) -> u32 {
        (**self).local_hour()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn local_hour(&self) -> u32 {
        chrono::Local::now().hour()
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Skipped: the local hour is outside the active window.
    OutsideWindow { hour: u32 },
    FetchFailed,
    /// The engine refused the reading. State is unchanged.
    Rejected,
    /// Evaluated without firing.
    Evaluated(Decision),
    Alarmed { event: AlarmEvent, delivered: bool },
}

pub struct Scheduler<S, N, C = SystemClock> {
    engine: AlarmEngine,
    source: S,
    notifier: N,
    clock: C,
}

impl<S, N, C> Scheduler<S, N, C>
where
    S: ReadingSource,
    N: Notifier,
    C: Clock,
{
    pub fn new(engine: AlarmEngine, source: S, notifier: N, clock: C) -> Self {
        Self {
            engine,
            source,
            notifier,
            clock,
        }
    }

    pub fn engine(&self) -> &AlarmEngine {
        &self.engine
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub async fn tick(&mut self) -> TickOutcome {
        if let Some(window) = self.engine.thresholds().active_window {
            let hour = self.clock.local_hour();
            if !window.contains(hour) {
                debug!(hour, window = %window, "outside active window, tick skipped");
                return TickOutcome::OutsideWindow { hour };
            }
        }

        let reading = match self.source.fetch_latest().await {
            Ok(reading) => reading,
            Err(error) => {
                warn!(error = %error, "reading fetch failed");
                return TickOutcome::FetchFailed;
            }
        };

        info!(
            timestamp = %reading.timestamp,
            value = reading.value,
            trend = %reading.trend,
            "reading received"
        );

        let now_ms = self.clock.now_ms();
        let decision = match self.engine.evaluate(&reading, now_ms) {
            Ok(decision) => decision,
            Err(error) => {
                warn!(error = %error, "reading rejected by alarm engine");
                return TickOutcome::Rejected;
            }
        };

        match decision {
            Decision::Fired(event) => {
                warn!(
                    reason = %event.reason,
                    value = event.value,
                    timestamp = %event.timestamp,
                    "alarm"
                );
                let delivered = match self.notifier.notify(&event).await {
                    Ok(()) => {
                        info!(reason = %event.reason, "alarm notification delivered");
                        true
                    }
                    Err(error) => {
                        warn!(reason = %event.reason, error = %error, "alarm notification failed");
                        false
                    }
                };
                TickOutcome::Alarmed { event, delivered }
            }
            Decision::Recovered => {
                info!(value = reading.value, "value back to normal, alarm reset");
                TickOutcome::Evaluated(decision)
            }
            Decision::Suppressed {
                reason, elapsed_ms, ..
            } => {
                info!(
                    reason = %reason,
                    value = reading.value,
                    since_last_alarm_secs = elapsed_ms / 1_000,
                    "cooldown active, alarm skipped"
                );
                TickOutcome::Evaluated(decision)
            }
            Decision::Normal => TickOutcome::Evaluated(decision),
        }
    }

    /// Ticks every `interval` until `shutdown` is cancelled.
    ///
    /// A tick in progress always completes. Ticks missed while a slow fetch
    /// was pending are dropped rather than replayed.
    pub async fn run(mut self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = interval.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }
}
