//! Local transport that shells out to `pvesh`, the Proxmox API CLI.
//!
//! Used when the engine runs on a cluster node as root. Arguments are passed
//! to the process directly; nothing goes through a shell.

use crate::core::{
    domain::error::{ProxmoxError, ProxmoxResult},
    infrastructure::transport::{ApiResponse, Params, Transport, Verb},
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

pub const DEFAULT_PVESH: &str = "pvesh";

#[derive(Debug, Clone)]
pub struct PveshTransport {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl Default for PveshTransport {
    fn default() -> Self {
        Self::new(DEFAULT_PVESH)
    }
}

impl PveshTransport {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Kills the command and fails with `Transport` after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<verb> <path> --output-format json --<key> <value>...`
    pub(crate) fn command_args(verb: Verb, path: &str, params: &Params) -> Vec<String> {
        let mut args = vec![
            verb.as_str().to_string(),
            path.to_string(),
            "--output-format".to_string(),
            "json".to_string(),
        ];
        for (key, value) in params.iter() {
            args.push(format!("--{}", key));
            args.push(value.to_string());
        }
        args
    }

    async fn run(&self, args: &[String]) -> ProxmoxResult<std::process::Output> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = command.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output).await.map_err(|_| {
                ProxmoxError::Transport(format!(
                    "{} {} timed out after {:?}",
                    self.binary.display(),
                    args.join(" "),
                    limit
                ))
            })?,
            None => output.await,
        };

        output.map_err(|e| {
            ProxmoxError::Transport(format!(
                "failed to run {}: {}",
                self.binary.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl Transport for PveshTransport {
    async fn request(&self, verb: Verb, path: &str, params: &Params) -> ProxmoxResult<ApiResponse> {
        let args = Self::command_args(verb, path, params);
        debug!(binary = %self.binary.display(), %verb, path, "invoking pvesh");

        let output = self.run(&args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProxmoxError::Transport(format!(
                "pvesh {} {} failed ({}): {}",
                verb,
                path,
                output.status,
                stderr.trim()
            )));
        }

        trace!(path, body = %stdout, "pvesh response");
        Ok(ApiResponse::parse(&stdout))
    }
}
