use std::time::Duration;

use crate::FlowKind;

/// A results table counts as populated once it has a header row plus at
/// least one data row.
pub fn is_table_ready(row_count: usize) -> bool {
    row_count > 1
}

/// Where a flow learns that its results are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessSource {
    /// Re-fetch the page fragment until its table has data rows.
    #[default]
    Fragment,
    /// Treat a successful upload response as the completion signal.
    Response,
}

/// Bounded polling with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub backoff_factor: f64,
    pub max_interval: Duration,
}

impl PollPolicy {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Delay before the tick that follows `attempt` unsuccessful checks.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = if self.backoff_factor.is_finite() && self.backoff_factor >= 1.0 {
            self.backoff_factor
        } else {
            1.0
        };
        if attempt == 0 || factor == 1.0 {
            return self.interval.min(self.max_interval);
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.interval.as_secs_f64() * factor.powi(exponent);
        let capped = scaled.min(self.max_interval.as_secs_f64()).max(0.0);
        if capped.is_finite() {
            Duration::from_secs_f64(capped)
        } else {
            self.max_interval
        }
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts.max(1)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 60,
            backoff_factor: 1.5,
            max_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub acti: PollPolicy,
    pub wrist: PollPolicy,
    pub readiness: ReadinessSource,
}

impl PollSettings {
    pub fn policy(&self, flow: FlowKind) -> &PollPolicy {
        match flow {
            FlowKind::Acti => &self.acti,
            FlowKind::Wrist => &self.wrist,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            acti: PollPolicy::with_interval(Duration::from_secs(1)),
            wrist: PollPolicy::with_interval(Duration::from_secs(5)),
            readiness: ReadinessSource::Fragment,
        }
    }
}
