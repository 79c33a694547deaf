use crate::{
    auth::application::{
        request::login_request::LoginRequest, response::login_response::LoginResponse,
    },
    core::domain::{
        error::{ProxmoxError, ProxmoxResult, ValidationError},
        model::{proxmox_auth::ProxmoxAuth, proxmox_connection::ProxmoxConnection},
    },
};
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use tracing::debug;

/// Exchanges username and password for a ticket at `/access/ticket`.
pub struct LoginService {
    default_headers: HeaderMap,
}

impl LoginService {
    pub fn new() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Self { default_headers }
    }

    pub async fn execute(
        &self,
        client: &Client,
        connection: &ProxmoxConnection,
    ) -> ProxmoxResult<ProxmoxAuth> {
        let url = connection.api_url("access/ticket");
        let request = LoginRequest {
            username: connection.username().as_str().to_string(),
            password: connection.password().as_str().to_string(),
            realm: connection.realm().as_str().to_string(),
        };
        debug!(user = %connection.login_name(), %url, "requesting ticket");

        let response = client
            .post(&url)
            .headers(self.default_headers.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProxmoxError::Transport(format!("login request failed: {}", e)))?;

        match response.status() {
            StatusCode::OK => self.handle_successful_login(response).await,
            StatusCode::UNAUTHORIZED => Err(ProxmoxError::Authentication(
                "Invalid credentials provided".to_string(),
            )),
            StatusCode::BAD_REQUEST => Err(ValidationError::field(
                "request",
                "Invalid login request format",
            )
            .into()),
            StatusCode::NOT_FOUND => Err(ProxmoxError::Transport(
                "Login endpoint not found".to_string(),
            )),
            status => Err(ProxmoxError::Transport(format!(
                "Unexpected login response status: {}",
                status
            ))),
        }
    }

    async fn handle_successful_login(
        &self,
        response: reqwest::Response,
    ) -> ProxmoxResult<ProxmoxAuth> {
        let login_response = response.json::<LoginResponse>().await.map_err(|e| {
            ProxmoxError::Authentication(format!("Failed to parse login response: {}", e))
        })?;

        let data = login_response.data;
        debug!(user = ?data.username, "ticket issued");
        if !data.ticket.starts_with("PVE:") {
            return Err(ProxmoxError::Authentication(
                "Ticket does not start with 'PVE:'".to_string(),
            ));
        }
        Ok(ProxmoxAuth::new(data.ticket, data.csrf_token))
    }
}

impl Default for LoginService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::value_object::{
        ProxmoxHost, ProxmoxPassword, ProxmoxPort, ProxmoxRealm, ProxmoxUsername,
    };
    use url::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path},
    };

    fn connection(server: &MockServer) -> ProxmoxConnection {
        ProxmoxConnection::new(
            ProxmoxHost::new("127.0.0.1").unwrap(),
            ProxmoxPort::default(),
            ProxmoxUsername::new("automation").unwrap(),
            ProxmoxPassword::new("secret").unwrap(),
            ProxmoxRealm::new("pve").unwrap(),
            false,
            false,
        )
        .unwrap()
        .with_base_url(Url::parse(&server.uri()).unwrap())
    }

    #[tokio::test]
    async fn test_login_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api2/json/access/ticket"))
            .and(body_json(serde_json::json!({
                "username": "automation", "password": "secret", "realm": "pve"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "ticket": "PVE:automation@pve:4EEC61E2::sig",
                    "CSRFPreventionToken": "4EEC61E2:abc123"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = LoginService::new()
            .execute(&Client::new(), &connection(&server))
            .await
            .unwrap();
        assert_eq!(auth.ticket(), "PVE:automation@pve:4EEC61E2::sig");
        assert_eq!(auth.csrf_token(), "4EEC61E2:abc123");
    }

    #[tokio::test]
    async fn test_login_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api2/json/access/ticket"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = LoginService::new()
            .execute(&Client::new(), &connection(&server))
            .await;
        assert!(matches!(result, Err(ProxmoxError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_login_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api2/json/access/ticket"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = LoginService::new()
            .execute(&Client::new(), &connection(&server))
            .await;
        assert!(matches!(result, Err(ProxmoxError::Transport(_))));
    }
}
