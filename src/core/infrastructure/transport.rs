//! The seam between the engine and the Proxmox management endpoint.
//!
//! A transport carries one `(verb, path, params)` request and hands back the
//! response body, either decoded JSON or the raw text when it is not JSON.

use crate::core::domain::{
    error::{ProxmoxError, ProxmoxResult},
    value_object::VmId,
};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::fmt;

/// The four verbs of the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Read.
    Get,
    /// Create (HTTP `POST`).
    Create,
    /// Partial update (HTTP `PUT`).
    Set,
    Delete,
}

impl Verb {
    /// The `pvesh` sub-command for this verb.
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Create => "create",
            Verb::Set => "set",
            Verb::Delete => "delete",
        }
    }

    pub fn http_method(self) -> reqwest::Method {
        match self {
            Verb::Get => reqwest::Method::GET,
            Verb::Create => reqwest::Method::POST,
            Verb::Set => reqwest::Method::PUT,
            Verb::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar request parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<&String> for ParamValue {
    fn from(s: &String) -> Self {
        ParamValue::Str(s.clone())
    }
}

impl From<u32> for ParamValue {
    fn from(n: u32) -> Self {
        ParamValue::Int(i64::from(n))
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Int(n)
    }
}

/// Flags travel as `0`/`1`; the API has no boolean literal.
impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Int(i64::from(b))
    }
}

impl From<VmId> for ParamValue {
    fn from(id: VmId) -> Self {
        ParamValue::from(id.get())
    }
}

/// A flat, ordered mapping of parameter names to scalars.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<ParamValue>> Extend<(K, V)> for Params {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// A response body: decoded JSON, or the raw text when decoding failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Structured(serde_json::Value),
    Unstructured(String),
}

impl ApiResponse {
    /// Decodes `body` as JSON. An empty body is `Structured(null)`.
    pub fn parse(body: &str) -> Self {
        if body.trim().is_empty() {
            return ApiResponse::Structured(serde_json::Value::Null);
        }
        match serde_json::from_str(body) {
            Ok(value) => ApiResponse::Structured(value),
            Err(_) => ApiResponse::Unstructured(body.to_string()),
        }
    }

    /// The JSON value, or `UnstructuredResponse` for raw text.
    pub fn into_structured(self, path: &str) -> ProxmoxResult<serde_json::Value> {
        match self {
            ApiResponse::Structured(value) => Ok(value),
            ApiResponse::Unstructured(body) => Err(ProxmoxError::UnstructuredResponse {
                path: path.to_string(),
                body,
            }),
        }
    }

    /// Decodes the JSON value into `T`. Shape mismatches are reported as
    /// `UnstructuredResponse` too; the caller cannot use either.
    pub fn into_typed<T: DeserializeOwned>(self, path: &str) -> ProxmoxResult<T> {
        let value = self.into_structured(path)?;
        serde_json::from_value(value.clone()).map_err(|e| ProxmoxError::UnstructuredResponse {
            path: path.to_string(),
            body: format!("{} ({})", value, e),
        })
    }
}

/// Carries a single request to the management endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and waits for its response.
    ///
    /// # Errors
    /// `Transport` when the endpoint cannot be reached or reports failure.
    async fn request(&self, verb: Verb, path: &str, params: &Params) -> ProxmoxResult<ApiResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        assert_eq!(
            ApiResponse::parse("{\"path\": \"/var/lib/vz\"}"),
            ApiResponse::Structured(serde_json::json!({"path": "/var/lib/vz"}))
        );
        assert_eq!(ApiResponse::parse("\"101\"\n"), ApiResponse::Structured("101".into()));
        assert_eq!(ApiResponse::parse("  \n"), ApiResponse::Structured(serde_json::Value::Null));
        assert_eq!(
            ApiResponse::parse("UPID:node-a:0000:task"),
            ApiResponse::Unstructured("UPID:node-a:0000:task".to_string())
        );
    }

    #[test]
    fn test_unstructured_is_an_error_when_structure_needed() {
        let err = ApiResponse::Unstructured("oops".to_string())
            .into_structured("/cluster/resources")
            .unwrap_err();
        assert!(matches!(
            err,
            ProxmoxError::UnstructuredResponse { ref path, ref body }
                if path == "/cluster/resources" && body == "oops"
        ));
    }

    #[test]
    fn test_params_serialize_flat() {
        let params = Params::new()
            .with("vmid", 101_u32)
            .with("numa", true)
            .with("ostype", "l26");
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!({"numa": 1, "ostype": "l26", "vmid": 101})
        );
        assert_eq!(params.get("numa").unwrap().to_string(), "1");
    }
}
