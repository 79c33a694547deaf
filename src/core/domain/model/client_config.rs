use crate::core::domain::error::ValidationError;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// Client-side request throttling for the HTTPS transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

impl RateLimitConfig {
    pub(crate) fn quota(&self) -> Result<governor::Quota, ValidationError> {
        let rate = NonZeroU32::new(self.requests_per_second)
            .ok_or_else(|| ValidationError::field("requests_per_second", "must be at least 1"))?;
        let burst = NonZeroU32::new(self.burst_size)
            .ok_or_else(|| ValidationError::field("burst_size", "must be at least 1"))?;
        Ok(governor::Quota::per_second(rate).allow_burst(burst))
    }
}

/// Transport tuning shared by the `pvesh` and HTTPS transports.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Tickets are renewed once older than this. Proxmox issues them for 2h.
    pub ticket_lifetime: Duration,
    pub rate_limit: Option<RateLimitConfig>,
    pub pvesh_binary: PathBuf,
    /// Upper bound on a single `pvesh` invocation.
    pub command_timeout: Option<Duration>,
    /// Delay between two reads of a running task's status.
    pub task_poll_interval: Duration,
    /// Longest wait for one task before giving up.
    pub task_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ticket_lifetime: Duration::from_secs(2 * 60 * 60),
            rate_limit: None,
            pvesh_binary: PathBuf::from("pvesh"),
            command_timeout: None,
            task_poll_interval: Duration::from_secs(1),
            task_timeout: Duration::from_secs(5 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rate_rejected() {
        let rl = RateLimitConfig {
            requests_per_second: 0,
            burst_size: 1,
        };
        assert!(rl.quota().is_err());
        let rl = RateLimitConfig {
            requests_per_second: 5,
            burst_size: 10,
        };
        assert!(rl.quota().is_ok());
    }
}
