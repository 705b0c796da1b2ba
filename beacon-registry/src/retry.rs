//! Retry policy for heartbeat sends.

use std::time::Duration;

use rand::Rng;

use crate::error::RegistryError;

/// How often, and how patiently, a failed beat is resent before the
/// heartbeat gives up.
///
/// Delays grow geometrically from `initial_delay` by `multiplier` per
/// attempt and are capped at `max_delay`. With jitter on, up to a quarter of
/// the delay is added at random so servers sharing a registry spread out.
///
/// The default never retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Resends allowed per beat; zero is fail-fast.
    pub max_retries: u32,
    /// Wait before the first resend.
    pub initial_delay: Duration,
    /// Ceiling on any single wait, before jitter.
    pub max_delay: Duration,
    /// Growth factor between waits; at least 1.0.
    pub multiplier: f64,
    /// Add random spread to each wait.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Fail-fast policy; use the setters to allow resends.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many resends a beat may use.
    #[must_use]
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the first wait.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the wait ceiling.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the growth factor.
    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Turn jitter on or off.
    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Reject a growth factor that is not a finite number of at least 1.0.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(RegistryError::InvalidConfig(format!(
                "retry multiplier must be finite and at least 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }

    /// Wait before resend number `attempt`, counting from zero.
    ///
    /// Never panics: a wait that does not fit a `Duration` becomes
    /// `max_delay`, and jitter saturates.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay));

        if !self.jitter {
            return delay;
        }
        let spread = delay.as_secs_f64() * rand::rng().random_range(0.0..=0.25);
        delay.saturating_add(Duration::try_from_secs_f64(spread).unwrap_or(Duration::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryConfig {
        RetryConfig::new().jitter(false)
    }

    #[test]
    fn test_default_is_fail_fast() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_geometric_growth() {
        let config = no_jitter().initial_delay(Duration::from_millis(250)).multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(1));
    }

    #[test]
    fn test_capped_at_max_delay() {
        let config = no_jitter()
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(5))
            .multiplier(10.0);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
        // 10^i32::MAX is infinite.
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_adds_at_most_a_quarter() {
        let config = RetryConfig::new().initial_delay(Duration::from_secs(2));

        for _ in 0..100 {
            let delay = config.delay_for_attempt(0);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_bad_multiplier_rejected() {
        for multiplier in [-2.0, 0.5, f64::NAN, f64::INFINITY] {
            let config = RetryConfig::new().multiplier(multiplier);
            assert!(matches!(
                config.validate(),
                Err(RegistryError::InvalidConfig(_))
            ));
        }
        assert!(RetryConfig::new().multiplier(1.0).validate().is_ok());
    }

    #[test]
    fn test_out_of_range_delays_do_not_panic() {
        let negative = no_jitter().max_retries(2).multiplier(-2.0);
        assert_eq!(negative.delay_for_attempt(1), negative.max_delay);

        let nan = no_jitter().multiplier(f64::NAN);
        assert_eq!(nan.delay_for_attempt(3), nan.max_delay);

        let huge = RetryConfig::new()
            .initial_delay(Duration::MAX)
            .max_delay(Duration::MAX)
            .jitter(true);
        assert_eq!(huge.delay_for_attempt(4), Duration::MAX);
    }
}
