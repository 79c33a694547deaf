//! Background tasks started by mutating calls.
//!
//! Create, clone, migrate and start answer with a UPID
//! (`UPID:<node>:<pid>:<pstart>:<starttime>:<type>:<id>:<user>:`) as soon as
//! the worker is forked; the work itself finishes later.

use crate::core::infrastructure::transport::ApiResponse;
use serde::Deserialize;
use std::fmt;

/// A task handle parsed from a UPID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskId {
    pub node: String,
    pub upid: String,
}

impl TaskId {
    /// Parses `upid`. `None` for anything that is not a UPID.
    pub fn parse(upid: &str) -> Option<Self> {
        let upid = upid.trim().trim_matches('"');
        let mut fields = upid.split(':');
        if fields.next() != Some("UPID") {
            return None;
        }
        let node = fields.next().filter(|node| !node.is_empty())?;
        Some(Self {
            node: node.to_string(),
            upid: upid.to_string(),
        })
    }

    /// The task handle carried by a response body, if any.
    pub fn from_response(response: &ApiResponse) -> Option<Self> {
        match response {
            ApiResponse::Structured(serde_json::Value::String(s)) => Self::parse(s),
            ApiResponse::Unstructured(body) => Self::parse(body),
            ApiResponse::Structured(_) => None,
        }
    }

    /// `/nodes/{node}/tasks/{upid}/status`
    pub fn status_path(&self) -> String {
        format!("/nodes/{}/tasks/{}/status", self.node, self.upid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.upid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Running,
    Stopped,
}

/// Answer of `/nodes/{node}/tasks/{upid}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskStatus {
    pub status: TaskState,
    /// `OK`, `WARNINGS: <n>`, or the error message. Only set once stopped.
    #[serde(default)]
    pub exitstatus: Option<String>,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        self.status == TaskState::Stopped
    }

    /// Finished without error. Tasks that only logged warnings count.
    pub fn is_success(&self) -> bool {
        self.is_finished()
            && self
                .exitstatus
                .as_deref()
                .is_some_and(|exit| exit == "OK" || exit.starts_with("WARNINGS"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upid() {
        let task = TaskId::parse("UPID:node-a:000A1B2C:0F3E:6700AA11:qmstart:101:root@pam:").unwrap();
        assert_eq!(task.node, "node-a");
        assert_eq!(
            task.status_path(),
            "/nodes/node-a/tasks/UPID:node-a:000A1B2C:0F3E:6700AA11:qmstart:101:root@pam:/status"
        );
        assert!(TaskId::parse("101").is_none());
        assert!(TaskId::parse("UPID::x").is_none());
    }

    #[test]
    fn test_from_response() {
        let upid = "UPID:node-b:0001:0002:0003:qmigrate:101:root@pam:";
        assert!(TaskId::from_response(&ApiResponse::Structured(upid.into())).is_some());
        assert!(TaskId::from_response(&ApiResponse::Unstructured(format!("\"{}\"\n", upid))).is_some());
        assert!(TaskId::from_response(&ApiResponse::Structured(serde_json::Value::Null)).is_none());
    }

    #[test]
    fn test_task_status() {
        let running: TaskStatus =
            serde_json::from_value(serde_json::json!({"status": "running", "pid": 42})).unwrap();
        assert!(!running.is_finished());
        assert!(!running.is_success());

        let ok: TaskStatus =
            serde_json::from_value(serde_json::json!({"status": "stopped", "exitstatus": "OK"}))
                .unwrap();
        assert!(ok.is_success());

        let warned: TaskStatus = serde_json::from_value(
            serde_json::json!({"status": "stopped", "exitstatus": "WARNINGS: 1"}),
        )
        .unwrap();
        assert!(warned.is_success());

        let failed: TaskStatus = serde_json::from_value(
            serde_json::json!({"status": "stopped", "exitstatus": "VM 101 is locked (clone)"}),
        )
        .unwrap();
        assert!(failed.is_finished());
        assert!(!failed.is_success());
    }
}
