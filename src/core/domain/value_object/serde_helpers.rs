//! Serde helpers for the loosely typed values Proxmox hands back.
//!
//! `pvesh` and the REST API are inconsistent about scalar types: the same
//! config key can arrive as `2048`, `"2048"` or, for flags, `true`/`1`/`"1"`.

use serde::{Deserialize, Deserializer};

/// A scalar that may arrive either as a JSON number or as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum NumberOrString {
    Number(u64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl NumberOrString {
    pub(crate) fn as_u64(&self) -> Option<u64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
            NumberOrString::Float(_) => None,
            NumberOrString::Bool(b) => Some(u64::from(*b)),
            NumberOrString::String(s) => s.trim().trim_matches('"').parse().ok(),
        }
    }

    pub(crate) fn as_bool(&self) -> Option<bool> {
        match self {
            NumberOrString::Bool(b) => Some(*b),
            NumberOrString::String(s) => match s.trim() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            },
            other => other.as_u64().map(|n| n != 0),
        }
    }

    pub(crate) fn into_string(self) -> String {
        match self {
            NumberOrString::Number(n) => n.to_string(),
            NumberOrString::Float(f) => f.to_string(),
            NumberOrString::Bool(b) => u8::from(b).to_string(),
            NumberOrString::String(s) => s,
        }
    }
}

/// Deserialize an optional unsigned integer that may be encoded as a string.
pub mod lenient_u64 {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<NumberOrString>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => raw.as_u64().map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("expected an unsigned integer, got {:?}", raw))
            }),
        }
    }
}

/// Deserialize an optional boolean flag encoded as `0`/`1`, `"0"`/`"1"` or `true`/`false`.
pub mod lenient_bool {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<NumberOrString>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => raw.as_bool().map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("expected a boolean flag, got {:?}", raw))
            }),
        }
    }
}

/// Deserialize an optional string that Proxmox may have sent as a bare number.
pub mod lenient_string {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<NumberOrString>::deserialize(deserializer)?.map(NumberOrString::into_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, with = "lenient_u64")]
        memory: Option<u64>,
        #[serde(default, with = "lenient_bool")]
        numa: Option<bool>,
        #[serde(default, with = "lenient_string")]
        hugepages: Option<String>,
    }

    #[test]
    fn test_numbers_and_strings_agree() {
        let a: Probe =
            serde_json::from_str(r#"{"memory": 2048, "numa": 1, "hugepages": 2}"#).unwrap();
        let b: Probe =
            serde_json::from_str(r#"{"memory": "2048", "numa": "1", "hugepages": "2"}"#).unwrap();
        assert_eq!(a.memory, Some(2048));
        assert_eq!(a.memory, b.memory);
        assert_eq!(a.numa, Some(true));
        assert_eq!(a.numa, b.numa);
        assert_eq!(a.hugepages.as_deref(), Some("2"));
        assert_eq!(a.hugepages, b.hugepages);
    }

    #[test]
    fn test_missing_fields_are_none() {
        let p: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(p.memory, None);
        assert_eq!(p.numa, None);
        assert_eq!(p.hugepages, None);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(serde_json::from_str::<Probe>(r#"{"memory": "lots"}"#).is_err());
        assert!(serde_json::from_str::<Probe>(r#"{"numa": "maybe"}"#).is_err());
    }
}
