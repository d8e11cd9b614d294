//! # JSON Helpers
//!
//! Request bodies are parsed with simd-json, responses are written with
//! serde_json. Output keeps non-ASCII text as-is.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Message carried by the 400 reply for an unparseable JSON body
pub const INVALID_JSON_BODY: &str = "Invalid JSON body";

/// Parse a JSON request body using simd-json
///
/// simd-json parses in place, so the buffer is copied first.
///
/// # Errors
///
/// Returns `Error::BadRequest` with [`INVALID_JSON_BODY`] if parsing fails.
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut buf = bytes.to_vec();
    simd_json::from_slice(&mut buf).map_err(|e| {
        tracing::debug!("json body rejected: {e}");
        Error::bad_request(INVALID_JSON_BODY)
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::Json` if the value cannot be serialized.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::{Map, Value};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Signin {
        email: String,
        passwd: String,
    }

    #[test]
    fn test_parse_json_bytes() {
        let data: Signin = parse_json_bytes(br#"{"email": "a@b.c", "passwd": "x"}"#).unwrap();
        assert_eq!(data.email, "a@b.c");
    }

    #[test]
    fn test_parse_json_object_map() {
        let map: Map<String, Value> = parse_json_bytes(br#"{"name": "n", "count": 3}"#).unwrap();
        assert_eq!(map.get("count"), Some(&Value::from(3)));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_json_bytes::<Value>(b"not valid json").unwrap_err();
        assert!(matches!(err, Error::BadRequest { ref message } if message == INVALID_JSON_BODY));
    }

    #[test]
    fn test_to_json_keeps_unicode() {
        let json = to_json(&serde_json::json!({"title": "日志"})).unwrap();
        assert_eq!(json, r#"{"title":"日志"}"#);
    }
}
