use std::time::Duration;

/// Error while configuring the emission rate limit.
#[derive(Debug)]
pub enum RateError {
    InvalidRate { value: f64 },
}

impl std::fmt::Display for RateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateError::InvalidRate { value } => {
                write!(f, "invalid target_mps: {value}")
            }
        }
    }
}

impl std::error::Error for RateError {}

/// Cooperative messages-per-second throttle: sleeps `1 / target_mps` after
/// each emitted log. A target of 0 disables throttling.
pub struct RateLimiter {
    interval: Option<Duration>,
}

impl RateLimiter {
    pub fn from_mps(target_mps: f64) -> Result<Self, RateError> {
        if !target_mps.is_finite() || target_mps < 0.0 {
            return Err(RateError::InvalidRate { value: target_mps });
        }
        let interval = if target_mps > 0.0 {
            Some(Duration::from_secs_f64(1.0 / target_mps))
        } else {
            None
        };
        Ok(Self { interval })
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Blocks for one emission interval, if throttled.
    pub fn pause(&self) {
        if let Some(interval) = self.interval {
            std::thread::sleep(interval);
        }
    }
}
