use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound request: `{id, method, params}`.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// Outbound reply: `{id, success, result | error}`.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub id: Option<Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: String,
    pub message: String,
}

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const SESSION_BUSY: i32 = -32001;

pub fn error_code_to_string(code: i32) -> &'static str {
    match code {
        PARSE_ERROR => "PARSE_ERROR",
        INVALID_REQUEST => "INVALID_REQUEST",
        METHOD_NOT_FOUND => "METHOD_NOT_FOUND",
        INVALID_PARAMS => "INVALID_PARAMS",
        INTERNAL_ERROR => "INTERNAL_ERROR",
        SESSION_BUSY => "SESSION_BUSY",
        _ => "UNKNOWN_ERROR",
    }
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self { id, success: true, result: Some(result), error: None }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(RpcError { code: error_code_to_string(code).to_string(), message: message.into() }),
        }
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, INVALID_PARAMS, msg)
    }

    pub fn internal_error(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, INTERNAL_ERROR, msg)
    }

    pub fn parse_error() -> Self {
        Self::error(None, PARSE_ERROR, "Parse error")
    }
}

/// Deserialize the params object into a typed struct.
pub fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, String> {
    serde_json::from_value(params.clone()).map_err(|e| format!("Invalid params: {e}"))
}

pub fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required parameter: {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_rpc_request() {
        let req: RpcRequest =
            serde_json::from_str(r#"{"method":"canvas.agent.cancel","params":{"sessionId":"s1"},"id":1}"#).unwrap();
        assert_eq!(req.method, "canvas.agent.cancel");
        assert_eq!(req.id, Some(json!(1)));
        assert_eq!(req.params.unwrap()["sessionId"], "s1");
    }

    #[test]
    fn success_shape() {
        let json = serde_json::to_value(RpcResponse::success(Some(json!("a")), json!({"pong": true}))).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["result"]["pong"], true);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn error_shape() {
        let json = serde_json::to_value(RpcResponse::method_not_found(Some(json!(7)), "foo.bar")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "METHOD_NOT_FOUND");
        assert!(json["error"]["message"].as_str().unwrap().contains("foo.bar"));
        assert!(json.get("result").is_none());
    }

    #[test]
    fn error_codes_map_to_strings() {
        assert_eq!(error_code_to_string(PARSE_ERROR), "PARSE_ERROR");
        assert_eq!(error_code_to_string(INVALID_PARAMS), "INVALID_PARAMS");
        assert_eq!(error_code_to_string(SESSION_BUSY), "SESSION_BUSY");
        assert_eq!(error_code_to_string(-99999), "UNKNOWN_ERROR");
    }

    #[test]
    fn require_str_rejects_missing_empty_and_non_string() {
        let params = json!({"sessionId": "s1", "empty": "", "count": 5});
        assert_eq!(require_str(&params, "sessionId").unwrap(), "s1");
        assert!(require_str(&params, "missing").is_err());
        assert!(require_str(&params, "empty").is_err());
        assert!(require_str(&params, "count").is_err());
    }

    #[test]
    fn parse_error_has_no_id() {
        let resp = RpcResponse::parse_error();
        assert!(resp.id.is_none());
        assert!(!resp.success);
    }
}
