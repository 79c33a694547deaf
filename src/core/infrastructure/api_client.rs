//! HTTPS transport that handles authentication and automatic ticket refresh.

use crate::{
    auth::application::service::login_service::LoginService,
    core::{
        domain::{
            error::{ProxmoxError, ProxmoxResult},
            model::{
                client_config::ClientConfig, proxmox_auth::ProxmoxAuth,
                proxmox_connection::ProxmoxConnection,
            },
        },
        infrastructure::transport::{ApiResponse, Params, Transport, Verb},
    },
};
use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Transport that calls the Proxmox REST API over HTTPS.
///
/// This client automatically adds the necessary authentication headers (`PVEAuthCookie` and
/// `CSRFPreventionToken`) to each request. If a request receives a `401 Unauthorized` response,
/// it attempts to refresh the ticket once using the stored credentials and retries the request.
#[derive(Debug)]
pub struct ApiClient {
    http_client: Client,
    connection: Arc<ProxmoxConnection>,
    auth: Arc<RwLock<Option<ProxmoxAuth>>>,
    config: Arc<ClientConfig>,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl ApiClient {
    /// Creates a new `ApiClient`. The client starts unauthenticated.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Transport` if the HTTP client cannot be built and
    /// `ProxmoxError::Validation` for a zero rate limit.
    pub fn new(connection: ProxmoxConnection, config: ClientConfig) -> ProxmoxResult<Self> {
        let http_client = Client::builder()
            .danger_accept_invalid_certs(connection.accept_invalid_certs())
            .build()
            .map_err(|e| ProxmoxError::Transport(e.to_string()))?;

        let rate_limiter = match config.rate_limit {
            Some(rl) => Some(Arc::new(DefaultDirectRateLimiter::direct(rl.quota()?))),
            None => None,
        };

        Ok(Self {
            http_client,
            connection: Arc::new(connection),
            auth: Arc::new(RwLock::new(None)),
            config: Arc::new(config),
            rate_limiter,
        })
    }

    /// Sets the authentication state (used after a successful login or session restore).
    pub async fn set_auth(&self, auth: ProxmoxAuth) {
        let mut lock = self.auth.write().await;
        *lock = Some(auth);
    }

    /// Returns the current authentication state, if any.
    pub async fn auth(&self) -> Option<ProxmoxAuth> {
        self.auth.read().await.clone()
    }

    /// Logs in now instead of on the first request.
    pub async fn login(&self) -> ProxmoxResult<()> {
        self.refresh_auth().await
    }

    /// Returns `true` if there is a valid (non‑expired) ticket.
    pub async fn is_authenticated(&self) -> bool {
        let lock = self.auth.read().await;
        lock.as_ref()
            .map(|a| !a.is_expired(self.config.ticket_lifetime))
            .unwrap_or(false)
    }

    /// Sends a request once. `Ok(None)` means the server answered 401.
    async fn send_once(
        &self,
        verb: Verb,
        path: &str,
        params: &Params,
    ) -> ProxmoxResult<Option<ApiResponse>> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let url = self.connection.api_url(path);
        let mut req_builder = self.http_client.request(verb.http_method(), &url);

        {
            let auth_guard = self.auth.read().await;
            if let Some(auth) = auth_guard.as_ref() {
                req_builder = req_builder.header("Cookie", auth.cookie_header());
                if verb != Verb::Get {
                    req_builder = req_builder.header("CSRFPreventionToken", auth.csrf_token());
                }
            }
        }

        req_builder = match verb {
            Verb::Get | Verb::Delete => req_builder.query(params),
            Verb::Create | Verb::Set => req_builder.json(params),
        };

        debug!(%verb, path, "sending API request");
        let response = req_builder
            .send()
            .await
            .map_err(|e| ProxmoxError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProxmoxError::Transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProxmoxError::Transport(format!(
                "API error ({}) on {} {}: {}",
                status,
                verb,
                path,
                body.trim()
            )));
        }

        trace!(path, %body, "API response");
        Ok(Some(unwrap_envelope(ApiResponse::parse(&body))))
    }

    /// Ensures that we have a valid (non‑expired) ticket. If not, attempts to refresh.
    async fn ensure_authenticated(&self) -> ProxmoxResult<()> {
        if !self.is_authenticated().await {
            self.refresh_auth().await?;
        }
        Ok(())
    }

    /// Performs a fresh login using the stored credentials to obtain a new ticket.
    async fn refresh_auth(&self) -> ProxmoxResult<()> {
        let service = LoginService::new();
        let auth = service.execute(&self.http_client, &self.connection).await?;
        self.set_auth(auth).await;
        Ok(())
    }
}

/// The REST API wraps every payload in `{"data": ...}`; pvesh does not.
fn unwrap_envelope(response: ApiResponse) -> ApiResponse {
    match response {
        ApiResponse::Structured(serde_json::Value::Object(mut map)) if map.contains_key("data") => {
            ApiResponse::Structured(map.remove("data").unwrap_or_default())
        }
        other => other,
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn request(&self, verb: Verb, path: &str, params: &Params) -> ProxmoxResult<ApiResponse> {
        self.ensure_authenticated().await?;

        if let Some(response) = self.send_once(verb, path, params).await? {
            return Ok(response);
        }

        // Ticket was revoked or expired early: log in again and retry exactly once.
        self.refresh_auth().await?;
        self.send_once(verb, path, params).await?.ok_or_else(|| {
            ProxmoxError::Authentication(format!(
                "{} {} still unauthorized after ticket refresh",
                verb, path
            ))
        })
    }
}
