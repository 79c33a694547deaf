use crate::core::domain::{
    error::{ProxmoxResult, ValidationError},
    value_object::{ProxmoxHost, ProxmoxPassword, ProxmoxPort, ProxmoxRealm, ProxmoxUsername},
};
use url::Url;

/// Everything the HTTPS transport needs to reach and log into a node.
#[derive(Debug, Clone)]
pub struct ProxmoxConnection {
    host: ProxmoxHost,
    port: ProxmoxPort,
    username: ProxmoxUsername,
    password: ProxmoxPassword,
    realm: ProxmoxRealm,
    accept_invalid_certs: bool,
    url: Url,
}

impl ProxmoxConnection {
    pub fn new(
        host: ProxmoxHost,
        port: ProxmoxPort,
        username: ProxmoxUsername,
        password: ProxmoxPassword,
        realm: ProxmoxRealm,
        secure: bool,
        accept_invalid_certs: bool,
    ) -> ProxmoxResult<Self> {
        let scheme = if secure { "https" } else { "http" };
        let raw = match host.as_str().parse::<std::net::Ipv6Addr>() {
            Ok(_) => format!("{}://[{}]:{}/", scheme, host.as_str(), port.get()),
            Err(_) => format!("{}://{}:{}/", scheme, host.as_str(), port.get()),
        };
        let url = Url::parse(&raw)
            .map_err(|e| ValidationError::Format(format!("Invalid URL '{}': {}", raw, e)))?;
        Ok(Self {
            host,
            port,
            username,
            password,
            realm,
            accept_invalid_certs,
            url,
        })
    }

    /// Points the connection at an explicit base URL (proxies, test servers).
    #[must_use]
    pub fn with_base_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    pub fn host(&self) -> &ProxmoxHost {
        &self.host
    }

    pub fn port(&self) -> ProxmoxPort {
        self.port
    }

    pub fn username(&self) -> &ProxmoxUsername {
        &self.username
    }

    pub fn password(&self) -> &ProxmoxPassword {
        &self.password
    }

    pub fn realm(&self) -> &ProxmoxRealm {
        &self.realm
    }

    /// `user@realm`, as the ticket endpoint expects it.
    pub fn login_name(&self) -> String {
        format!("{}@{}", self.username.as_str(), self.realm.as_str())
    }

    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `<base>/api2/json/<path>`.
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api2/json/{}",
            self.url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(host: &str, secure: bool) -> ProxmoxConnection {
        ProxmoxConnection::new(
            ProxmoxHost::new(host).unwrap(),
            ProxmoxPort::default(),
            ProxmoxUsername::new("automation").unwrap(),
            ProxmoxPassword::new("secret").unwrap(),
            ProxmoxRealm::new("pve").unwrap(),
            secure,
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let conn = connection("pve1.lab", true);
        assert_eq!(conn.url().as_str(), "https://pve1.lab:8006/");
        assert_eq!(
            conn.api_url("/cluster/resources"),
            "https://pve1.lab:8006/api2/json/cluster/resources"
        );
        assert_eq!(conn.login_name(), "automation@pve");
        assert_eq!(connection("fd00::5", false).url().as_str(), "http://[fd00::5]:8006/");
    }
}
