//! Configuration for a supervised run

use crate::core::constants::{polling, shutdown};
use crate::error::{Result, RunError};
use std::time::Duration;

/// Timing configuration for the process supervisor
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Time between two ticks of the poll loop
    pub poll_interval: Duration,
    /// Total runtime allowed before the shutdown escalation starts
    pub timeout: Option<Duration>,
    /// Grace period between the graceful signal and the forced kill.
    /// `None` waits for the process to exit and never kills it.
    pub shutdown: Option<Duration>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: polling::STANDARD,
            timeout: None,
            shutdown: Some(shutdown::GRACE),
        }
    }
}

impl SupervisorConfig {
    pub fn builder() -> SupervisorConfigBuilder {
        SupervisorConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(RunError::InvalidConfiguration(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`SupervisorConfig`]
#[derive(Debug, Default)]
pub struct SupervisorConfigBuilder {
    config: SupervisorConfig,
}

impl SupervisorConfigBuilder {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn poll_interval_ms(self, ms: u64) -> Self {
        self.poll_interval(Duration::from_millis(ms))
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the timeout in seconds; `0` leaves the run without a timeout
    pub fn timeout_secs(self, secs: u64) -> Self {
        self.timeout((secs > 0).then(|| Duration::from_secs(secs)))
    }

    pub fn shutdown(mut self, grace: Option<Duration>) -> Self {
        self.config.shutdown = grace;
        self
    }

    /// Set the shutdown grace period in seconds; `0` disables the forced kill
    pub fn shutdown_secs(self, secs: u64) -> Self {
        self.shutdown((secs > 0).then(|| Duration::from_secs(secs)))
    }

    pub fn build(self) -> Result<SupervisorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.timeout, None);
        assert_eq!(config.shutdown, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_builder() -> Result<()> {
        let config = SupervisorConfig::builder()
            .poll_interval_ms(200)
            .timeout_secs(60)
            .shutdown_secs(10)
            .build()?;

        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.shutdown, Some(Duration::from_secs(10)));
        Ok(())
    }

    #[test]
    fn test_zero_seconds_means_unset() -> Result<()> {
        let config = SupervisorConfig::builder()
            .timeout_secs(0)
            .shutdown_secs(0)
            .build()?;

        assert_eq!(config.timeout, None);
        assert_eq!(config.shutdown, None);
        Ok(())
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let config = SupervisorConfig::builder().poll_interval_ms(0).build();
        assert!(matches!(config, Err(RunError::InvalidConfiguration(_))));
    }
}
