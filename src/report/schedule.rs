//! Repeat scheduling.
//!
//! A report can be produced once, or repeatedly every `interval` minutes for
//! `duration` hours. Iterations run back to back with a sleep in between; no
//! sleep follows the last one.

use crate::error::{DiagnosticsError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// How many times a report is produced and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatSchedule {
    interval: Duration,
    iterations: u64,
}

impl RepeatSchedule {
    /// A single run with no sleep.
    pub fn once() -> Self {
        Self {
            interval: Duration::ZERO,
            iterations: 1,
        }
    }

    /// Builds a schedule from an interval in minutes and a duration in hours.
    ///
    /// Negative values are rejected. If either value is zero the report runs
    /// once. Otherwise it runs `floor(duration * 60 / interval)` times, and at
    /// least once when the interval is longer than the duration.
    pub fn from_minutes_hours(interval_minutes: i64, duration_hours: i64) -> Result<Self> {
        if interval_minutes < 0 {
            return Err(DiagnosticsError::config(format!(
                "Interval must not be negative, got {interval_minutes} minutes"
            )));
        }
        if duration_hours < 0 {
            return Err(DiagnosticsError::config(format!(
                "Duration must not be negative, got {duration_hours} hours"
            )));
        }
        if interval_minutes == 0 || duration_hours == 0 {
            return Ok(Self::once());
        }

        let total_minutes = duration_hours.checked_mul(60).ok_or_else(|| {
            DiagnosticsError::config(format!("Duration of {duration_hours} hours is too large"))
        })?;
        let interval_secs = interval_minutes
            .checked_mul(60)
            .and_then(|secs| u64::try_from(secs).ok())
            .ok_or_else(|| {
                DiagnosticsError::config(format!(
                    "Interval of {interval_minutes} minutes is too large"
                ))
            })?;
        // Both operands are positive here.
        let iterations = (total_minutes / interval_minutes).max(1) as u64;

        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            iterations,
        })
    }

    /// Number of times the report is produced.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Sleep between two consecutive iterations.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of sleeps over the whole schedule.
    pub fn sleeps(&self) -> u64 {
        self.iterations.saturating_sub(1)
    }

    pub fn is_repeating(&self) -> bool {
        self.iterations > 1
    }

    /// Drives `iteration` through the schedule, collecting each result.
    ///
    /// Stops at the first error. Cancellation interrupts the sleep between
    /// iterations but never an iteration in progress.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut iteration: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut results = Vec::with_capacity(self.iterations as usize);

        for n in 1..=self.iterations {
            if self.is_repeating() {
                info!("Starting iteration {n} of {}", self.iterations);
            }
            results.push(iteration(n).await?);

            if n == self.iterations {
                break;
            }

            info!(
                "Sleeping {} minutes before the next iteration",
                self.interval.as_secs() / 60
            );
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    return Err(DiagnosticsError::cancelled(format!(
                        "Cancelled after iteration {n} of {}",
                        self.iterations
                    )));
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        Ok(results)
    }
}

impl Default for RepeatSchedule {
    fn default() -> Self {
        Self::once()
    }
}
