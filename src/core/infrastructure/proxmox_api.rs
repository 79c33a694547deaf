//! Request/response bridge to the management API, independent of transport.

use crate::core::{
    domain::{
        error::{ProxmoxError, ProxmoxResult},
        model::{
            cluster_resource::ClusterResource,
            task::{TaskId, TaskStatus},
            vm_config::VmConfig,
        },
        value_object::VmId,
    },
    infrastructure::transport::{ApiResponse, Params, Transport, Verb},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

/// Thin verb-level wrapper over a [`Transport`], plus the few typed reads
/// the convergence engine needs.
///
/// Mutating calls that start a background task return once the task has
/// stopped. Nothing is cached between calls.
#[derive(Clone)]
pub struct ProxmoxApi {
    transport: Arc<dyn Transport>,
    poll_interval: Duration,
    task_timeout: Duration,
}

impl std::fmt::Debug for ProxmoxApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxmoxApi").finish_non_exhaustive()
    }
}

impl ProxmoxApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            poll_interval: Duration::from_secs(1),
            task_timeout: Duration::from_secs(5 * 60),
        }
    }

    #[must_use]
    pub fn with_task_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.task_timeout = timeout;
        self
    }

    /// Sends one request with an explicit verb.
    ///
    /// When a mutating call answers with a task id, waits for that task and
    /// still returns the task id.
    ///
    /// # Errors
    /// `Transport` when the request fails, or when the task it started ends
    /// in error or outlives the task timeout.
    pub async fn request(
        &self,
        verb: Verb,
        path: &str,
        params: &Params,
    ) -> ProxmoxResult<ApiResponse> {
        debug!(%verb, path, params = params.len(), "api call");
        let response = self.transport.request(verb, path, params).await?;
        if verb != Verb::Get {
            if let Some(task) = TaskId::from_response(&response) {
                self.wait_for_task(&task).await?;
            }
        }
        Ok(response)
    }

    /// Polls a task until it stops.
    ///
    /// # Errors
    /// `Transport` for a failed task or one still running after the timeout.
    pub async fn wait_for_task(&self, task: &TaskId) -> ProxmoxResult<TaskStatus> {
        let path = task.status_path();
        let started = Instant::now();
        loop {
            let status: TaskStatus = self
                .transport
                .request(Verb::Get, &path, &Params::new())
                .await?
                .into_typed(&path)?;

            if status.is_finished() {
                if !status.is_success() {
                    return Err(ProxmoxError::Transport(format!(
                        "task {} failed: {}",
                        task,
                        status.exitstatus.as_deref().unwrap_or("no exit status")
                    )));
                }
                if status.exitstatus.as_deref() != Some("OK") {
                    warn!(%task, exitstatus = ?status.exitstatus, "task finished with warnings");
                }
                debug!(%task, elapsed = ?started.elapsed(), "task finished");
                return Ok(status);
            }

            if started.elapsed() >= self.task_timeout {
                return Err(ProxmoxError::Transport(format!(
                    "task {} still running after {:?}",
                    task, self.task_timeout
                )));
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Reads a resource.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Transport` if the endpoint cannot be reached.
    pub async fn get(&self, path: &str, params: &Params) -> ProxmoxResult<ApiResponse> {
        self.request(Verb::Get, path, params).await
    }

    /// Creates a resource or triggers an action (`POST`).
    ///
    /// # Errors
    /// Returns `ProxmoxError::Transport` if the endpoint rejects the request.
    pub async fn create(&self, path: &str, params: &Params) -> ProxmoxResult<ApiResponse> {
        self.request(Verb::Create, path, params).await
    }

    /// Updates a resource in place (`PUT`).
    ///
    /// # Errors
    /// Returns `ProxmoxError::Transport` if the endpoint rejects the request.
    pub async fn set(&self, path: &str, params: &Params) -> ProxmoxResult<ApiResponse> {
        self.request(Verb::Set, path, params).await
    }

    /// Removes a resource.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Transport` if the endpoint rejects the request.
    pub async fn delete(&self, path: &str, params: &Params) -> ProxmoxResult<ApiResponse> {
        self.request(Verb::Delete, path, params).await
    }

    /// Asks the cluster for a currently unused VM id.
    ///
    /// The answer is only a hint: another caller may claim the same id before
    /// it is used, and the subsequent create then fails.
    ///
    /// # Errors
    /// `UnstructuredResponse` when the body holds no usable id.
    pub async fn next_id(&self) -> ProxmoxResult<VmId> {
        const PATH: &str = "/cluster/nextid";
        let raw = match self.get(PATH, &Params::new()).await? {
            ApiResponse::Structured(serde_json::Value::String(s)) => s,
            ApiResponse::Structured(serde_json::Value::Number(n)) => n.to_string(),
            ApiResponse::Unstructured(body) => body,
            ApiResponse::Structured(other) => {
                return Err(ProxmoxError::UnstructuredResponse {
                    path: PATH.to_string(),
                    body: other.to_string(),
                });
            }
        };

        let vmid = raw
            .parse::<VmId>()
            .map_err(|_| ProxmoxError::UnstructuredResponse {
                path: PATH.to_string(),
                body: raw.clone(),
            })?;
        debug!(%vmid, "allocated id");
        Ok(vmid)
    }

    /// Lists VM-type cluster resources (QEMU guests and containers).
    ///
    /// # Errors
    /// `UnstructuredResponse` when the listing cannot be decoded.
    pub async fn cluster_vms(&self) -> ProxmoxResult<Vec<ClusterResource>> {
        const PATH: &str = "/cluster/resources";
        self.get(PATH, &Params::new().with("type", "vm"))
            .await?
            .into_typed(PATH)
    }

    /// Fetches the current configuration of one VM.
    ///
    /// # Errors
    /// `UnstructuredResponse` when the config cannot be decoded.
    pub async fn vm_config(&self, node: &str, vmid: VmId) -> ProxmoxResult<VmConfig> {
        let path = format!("/nodes/{}/qemu/{}/config", node, vmid);
        self.get(&path, &Params::new()).await?.into_typed(&path)
    }

    /// Filesystem path backing a storage pool.
    ///
    /// # Errors
    /// `NotFound` when the pool has no `path` (it is not directory-backed).
    pub async fn storage_path(&self, storage: &str) -> ProxmoxResult<PathBuf> {
        let path = format!("/storage/{}", storage);
        let value = self.get(&path, &Params::new()).await?.into_structured(&path)?;
        value
            .get("path")
            .and_then(|p| p.as_str())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ProxmoxError::not_found("storage path", storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::infrastructure::transport::{MockTransport, ParamValue};
    use mockall::predicate::{always, eq};

    fn api_returning(verb: Verb, path: &'static str, response: ApiResponse) -> ProxmoxApi {
        let mut transport = MockTransport::new();
        transport
            .expect_request()
            .with(eq(verb), eq(path), always())
            .times(1)
            .return_once(move |_, _, _| Ok(response));
        ProxmoxApi::new(Arc::new(transport))
    }

    #[tokio::test]
    async fn test_next_id_accepts_every_shape() {
        for response in [
            ApiResponse::Structured("101".into()),
            ApiResponse::Structured(serde_json::json!(101)),
            ApiResponse::Unstructured("\"101\"\n".to_string()),
        ] {
            let api = api_returning(Verb::Get, "/cluster/nextid", response);
            assert_eq!(api.next_id().await.unwrap().get(), 101);
        }
    }

    #[tokio::test]
    async fn test_next_id_garbage() {
        let api = api_returning(
            Verb::Get,
            "/cluster/nextid",
            ApiResponse::Unstructured("no ids left".to_string()),
        );
        assert!(matches!(
            api.next_id().await,
            Err(ProxmoxError::UnstructuredResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_cluster_vms_filters_by_type() {
        let mut transport = MockTransport::new();
        transport
            .expect_request()
            .withf(|verb, path, params| {
                *verb == Verb::Get
                    && path == "/cluster/resources"
                    && params.get("type") == Some(&ParamValue::from("vm"))
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(ApiResponse::Structured(serde_json::json!([
                    {"type": "qemu", "vmid": 100, "name": "web1", "node": "node-a", "status": "running"},
                    {"type": "lxc", "vmid": 200, "name": "ct1", "node": "node-a", "status": "running"}
                ])))
            });

        let api = ProxmoxApi::new(Arc::new(transport));
        let vms = api.cluster_vms().await.unwrap();
        assert_eq!(vms.len(), 2);
        assert_eq!(vms[0].as_qemu().unwrap().name.as_deref(), Some("web1"));
        assert!(vms[1].as_qemu().is_none());
    }

    #[tokio::test]
    async fn test_cluster_vms_unstructured_is_error() {
        let api = api_returning(
            Verb::Get,
            "/cluster/resources",
            ApiResponse::Unstructured("500 proxy error".to_string()),
        );
        assert!(matches!(
            api.cluster_vms().await,
            Err(ProxmoxError::UnstructuredResponse { ref path, .. }) if path == "/cluster/resources"
        ));
    }

    #[tokio::test]
    async fn test_storage_path() {
        let api = api_returning(
            Verb::Get,
            "/storage/local",
            ApiResponse::Structured(serde_json::json!({
                "storage": "local", "type": "dir", "path": "/var/lib/vz"
            })),
        );
        assert_eq!(
            api.storage_path("local").await.unwrap(),
            PathBuf::from("/var/lib/vz")
        );

        let api = api_returning(
            Verb::Get,
            "/storage/ceph",
            ApiResponse::Structured(serde_json::json!({"storage": "ceph", "type": "rbd"})),
        );
        assert!(matches!(
            api.storage_path("ceph").await,
            Err(ProxmoxError::NotFound { .. })
        ));
    }

    const UPID: &str = "UPID:node-a:000A1B2C:0F3E:6700AA11:qmcreate:120:root@pam:";

    fn status_path() -> String {
        format!("/nodes/node-a/tasks/{}/status", UPID)
    }

    fn polling(transport: MockTransport) -> ProxmoxApi {
        ProxmoxApi::new(Arc::new(transport))
            .with_task_polling(Duration::from_millis(5), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_create_waits_for_its_task() {
        let mut transport = MockTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_request()
            .with(eq(Verb::Create), eq("/nodes/node-a/qemu"), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(ApiResponse::Structured(UPID.into())));
        transport
            .expect_request()
            .withf(|verb, path, _| *verb == Verb::Get && path == status_path())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(ApiResponse::Structured(serde_json::json!({"status": "running"})))
            });
        transport
            .expect_request()
            .withf(|verb, path, _| *verb == Verb::Get && path == status_path())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(ApiResponse::Structured(
                    serde_json::json!({"status": "stopped", "exitstatus": "OK"}),
                ))
            });

        let response = polling(transport)
            .create("/nodes/node-a/qemu", &Params::new().with("vmid", 120_u32))
            .await
            .unwrap();
        assert_eq!(response, ApiResponse::Structured(UPID.into()));
    }

    #[tokio::test]
    async fn test_failed_task_is_transport_error() {
        let mut transport = MockTransport::new();
        transport
            .expect_request()
            .with(eq(Verb::Create), always(), always())
            .returning(|_, _, _| Ok(ApiResponse::Structured(UPID.into())));
        transport
            .expect_request()
            .with(eq(Verb::Get), always(), always())
            .returning(|_, _, _| {
                Ok(ApiResponse::Structured(serde_json::json!({
                    "status": "stopped", "exitstatus": "VM 120 is locked (create)"
                })))
            });

        let result = polling(transport)
            .create("/nodes/node-a/qemu/120/status/start", &Params::new())
            .await;
        assert!(matches!(result, Err(ProxmoxError::Transport(ref msg)) if msg.contains("is locked")));
    }

    #[tokio::test]
    async fn test_task_timeout() {
        let mut transport = MockTransport::new();
        transport
            .expect_request()
            .with(eq(Verb::Create), always(), always())
            .returning(|_, _, _| Ok(ApiResponse::Structured(UPID.into())));
        transport
            .expect_request()
            .with(eq(Verb::Get), always(), always())
            .returning(|_, _, _| {
                Ok(ApiResponse::Structured(serde_json::json!({"status": "running"})))
            });

        let result = polling(transport)
            .create("/nodes/node-a/qemu/120/migrate", &Params::new())
            .await;
        assert!(matches!(result, Err(ProxmoxError::Transport(ref msg)) if msg.contains("still running")));
    }

    #[tokio::test]
    async fn test_reads_never_poll() {
        let api = api_returning(
            Verb::Get,
            "/nodes/node-a/tasks",
            ApiResponse::Structured(UPID.into()),
        );
        assert!(api.get("/nodes/node-a/tasks", &Params::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut transport = MockTransport::new();
        transport
            .expect_request()
            .returning(|_, _, _| Err(ProxmoxError::Transport("pvesh exited with 255".into())));
        let api = ProxmoxApi::new(Arc::new(transport));
        let result = api
            .create("/nodes/node-a/qemu", &Params::new().with("vmid", 101_u32))
            .await;
        assert!(matches!(result, Err(ProxmoxError::Transport(_))));
    }
}
