use std::time::{Duration, SystemTime};

/// Ticket and CSRF token obtained from `/access/ticket`.
#[derive(Debug, Clone)]
pub struct ProxmoxAuth {
    ticket: String,
    csrf_token: String,
    issued_at: SystemTime,
}

impl ProxmoxAuth {
    pub fn new(ticket: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            ticket: ticket.into(),
            csrf_token: csrf_token.into(),
            issued_at: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn ticket(&self) -> &str {
        &self.ticket
    }

    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    /// Checks if the ticket is older than `lifetime`.
    #[must_use]
    pub fn is_expired(&self, lifetime: Duration) -> bool {
        self.issued_at
            .elapsed()
            .map(|age| age > lifetime)
            .unwrap_or(true)
    }

    /// Formats the ticket as a cookie header value.
    #[must_use]
    pub fn cookie_header(&self) -> String {
        format!("PVEAuthCookie={}", self.ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ticket_not_expired() {
        let auth = ProxmoxAuth::new("PVE:root@pam:4EEC61E2::sig", "4EEC61E2:token");
        assert!(!auth.is_expired(Duration::from_secs(7200)));
        assert_eq!(auth.csrf_token(), "4EEC61E2:token");
        assert_eq!(auth.cookie_header(), "PVEAuthCookie=PVE:root@pam:4EEC61E2::sig");
    }
}
