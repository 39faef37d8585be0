use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::catalog::DEFAULT_LANGUAGE;
use crate::types::{JsonRpcVersion, RequestId};

/// Name of the optional `params` member that selects the error-text language.
pub const LANGUAGE_PARAM: &str = "language";

/// Reasons a JSON value is not a valid request object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestShapeError {
    #[error("request must be a JSON object")]
    NotAnObject,
    #[error("`jsonrpc` member must be exactly \"2.0\"")]
    UnsupportedVersion,
    #[error("`method` member must be a string")]
    MissingMethod,
}

/// A JSON-RPC request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl JsonRpcRequest {
    pub fn new(id: Option<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
            id,
        }
    }

    /// Validate the shape of an arbitrary JSON value and take it apart.
    ///
    /// `params` defaults to `null` and a missing `id` to `None`. The `id` is
    /// taken as is, whatever its type. Unknown members are ignored.
    pub fn from_value(value: Value) -> Result<Self, RequestShapeError> {
        let Value::Object(mut object) = value else {
            return Err(RequestShapeError::NotAnObject);
        };

        match object.get("jsonrpc") {
            Some(Value::String(version)) if version == crate::JSONRPC_VERSION => {}
            _ => return Err(RequestShapeError::UnsupportedVersion),
        }

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(RequestShapeError::MissingMethod),
        };

        let id = object.get("id").and_then(RequestId::from_value);

        let params = object.remove("params").unwrap_or(Value::Null);

        Ok(Self {
            version: JsonRpcVersion::V2_0,
            method,
            params,
            id,
        })
    }

    /// Language requested through `params.language`, `en-US` otherwise.
    ///
    /// Only object params carry a language; a non-string value is ignored.
    pub fn language(&self) -> &str {
        self.params
            .as_object()
            .and_then(|params| params.get(LANGUAGE_PARAM))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Object params, if the request carries them.
    pub fn params_object(&self) -> Option<&Map<String, Value>> {
        self.params.as_object()
    }

    /// Get a parameter by name (if params are an object)
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.as_object()?.get(name)
    }

    /// Get a parameter by index (if params are an array)
    pub fn get_param_index(&self, index: usize) -> Option<&Value> {
        self.params.as_array()?.get(index)
    }

    /// True when the client sent no id, i.e. a notification in JSON-RPC terms.
    /// Such requests are still answered.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_request_is_taken_apart() {
        let request = JsonRpcRequest::from_value(json!({
            "jsonrpc": "2.0",
            "method": "manageSecretData",
            "params": {"action": "get", "language": "ru-RU"},
            "id": "abc"
        }))
        .unwrap();

        assert_eq!(request.method, "manageSecretData");
        assert_eq!(request.id, Some(RequestId::from("abc")));
        assert_eq!(request.language(), "ru-RU");
        assert_eq!(request.get_param("action"), Some(&json!("get")));
    }

    #[test]
    fn test_defaults_for_missing_members() {
        let request =
            JsonRpcRequest::from_value(json!({"jsonrpc": "2.0", "method": "ping"})).unwrap();

        assert!(request.params.is_null());
        assert!(request.is_notification());
        assert_eq!(request.language(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_language_only_from_object_params() {
        let positional = JsonRpcRequest::new(None, "m", json!(["ru-RU"]));
        assert_eq!(positional.language(), DEFAULT_LANGUAGE);
        assert_eq!(positional.get_param_index(0), Some(&json!("ru-RU")));

        let non_string = JsonRpcRequest::new(None, "m", json!({"language": 7}));
        assert_eq!(non_string.language(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_shape_violations() {
        assert_eq!(
            JsonRpcRequest::from_value(json!("ping")),
            Err(RequestShapeError::NotAnObject)
        );
        assert_eq!(
            JsonRpcRequest::from_value(json!({"method": "ping", "id": 1})),
            Err(RequestShapeError::UnsupportedVersion)
        );
        assert_eq!(
            JsonRpcRequest::from_value(json!({"jsonrpc": "1.0", "method": "ping"})),
            Err(RequestShapeError::UnsupportedVersion)
        );
        assert_eq!(
            JsonRpcRequest::from_value(json!({"jsonrpc": "2.0", "method": 5})),
            Err(RequestShapeError::MissingMethod)
        );
    }

    #[test]
    fn test_structured_id_is_kept() {
        let request =
            JsonRpcRequest::from_value(json!({"jsonrpc": "2.0", "method": "ping", "id": {"k": 1}}))
                .unwrap();
        assert_eq!(request.id, Some(RequestId::Other(json!({"k": 1}))));
        assert!(!request.is_notification());
    }

    #[test]
    fn test_request_serialization_skips_empty_members() {
        let request = JsonRpcRequest::new(None, "ping", Value::Null);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"jsonrpc": "2.0", "method": "ping"})
        );
    }
}
