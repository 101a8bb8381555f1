use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TABLE_NAME_ENV: &str = "TABLE_NAME";
pub const DEFAULT_TABLE_NAME: &str = "PageHitCounters";
pub const PAGE_PATH_ATTRIBUTE: &str = "pagePath";
pub const COUNT_ATTRIBUTE: &str = "count";
pub const DEFAULT_PAGE_PATH: &str = "/";
pub const INCREMENT_ROUTE: &str = "incrementCounter";

pub const INCREMENT_UPDATE_EXPRESSION: &str = "ADD #count :increment";
pub const COUNT_NAME_PLACEHOLDER: &str = "#count";
pub const INCREMENT_VALUE_PLACEHOLDER: &str = ":increment";

pub const DATABASE_ERROR_MESSAGE: &str = "Database error occurred";
pub const GENERAL_ERROR_MESSAGE: &str = "An error occurred processing the request";

/// Headers attached to every counter function response, success or failure.
pub const RESPONSE_CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "Content-Type"),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncrementSuccessBody {
    pub success: bool,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncrementFailureBody {
    pub success: bool,
    pub message: String,
}

impl IncrementSuccessBody {
    pub fn new(count: u64) -> Self {
        Self {
            success: true,
            count,
        }
    }
}

impl IncrementFailureBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    message: String,
}

impl RequestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RequestError {}

pub fn response_headers() -> Value {
    let headers = RESPONSE_CORS_HEADERS
        .iter()
        .map(|(name, value)| ((*name).to_string(), Value::from(*value)))
        .collect::<serde_json::Map<_, _>>();
    Value::Object(headers)
}

/// Extracts the JSON request body from an API Gateway proxy event.
///
/// A missing or `null` body is treated as an empty object, a string body is
/// parsed as JSON and an inline object is used as-is.
pub fn resolve_request_body(event: &Value) -> Result<Value, RequestError> {
    let Some(object) = event.as_object() else {
        return Err(RequestError::new("Request payload must be a JSON object"));
    };

    let body = match object.get("body") {
        None | Some(Value::Null) => json!({}),
        Some(Value::String(text)) => serde_json::from_str(text)
            .map_err(|error| RequestError::new(format!("Malformed JSON body: {error}")))?,
        Some(Value::Object(_)) => object["body"].clone(),
        Some(_) => return Err(RequestError::new("Request body must be a JSON object")),
    };

    if !body.is_object() {
        return Err(RequestError::new("Request body must be a JSON object"));
    }
    Ok(body)
}

/// Reads `pagePath` from a request body, falling back to the root path when
/// the field is absent or falsy (`null`, `""`, `0`, `false`, `[]`, `{}`).
pub fn resolve_page_path(body: &Value) -> Result<String, RequestError> {
    match body.get(PAGE_PATH_ATTRIBUTE) {
        None => Ok(DEFAULT_PAGE_PATH.to_string()),
        Some(value) if is_falsy(value) => Ok(DEFAULT_PAGE_PATH.to_string()),
        Some(Value::String(path)) => Ok(path.clone()),
        Some(_) => Err(RequestError::new(format!(
            "{PAGE_PATH_ATTRIBUTE} must be a string"
        ))),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

pub fn page_path_from_event(event: &Value) -> Result<String, RequestError> {
    let body = resolve_request_body(event)?;
    resolve_page_path(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_body_is_parsed() {
        let event = json!({"body": "{\"pagePath\":\"/test-page\"}"});
        assert_eq!(page_path_from_event(&event).unwrap(), "/test-page");
    }

    #[test]
    fn inline_object_body_is_accepted() {
        let event = json!({"body": {"pagePath": "/inline"}});
        assert_eq!(page_path_from_event(&event).unwrap(), "/inline");
    }

    #[test]
    fn missing_and_null_bodies_default_to_root() {
        assert_eq!(page_path_from_event(&json!({})).unwrap(), "/");
        assert_eq!(page_path_from_event(&json!({"body": null})).unwrap(), "/");
    }

    #[test]
    fn empty_or_null_page_path_defaults_to_root() {
        assert_eq!(resolve_page_path(&json!({"pagePath": ""})).unwrap(), "/");
        assert_eq!(resolve_page_path(&json!({"pagePath": null})).unwrap(), "/");
    }

    #[test]
    fn rejects_malformed_json_body() {
        let error = page_path_from_event(&json!({"body": "{not json"})).expect_err("should fail");
        assert!(error.message().starts_with("Malformed JSON body"));
    }

    #[test]
    fn rejects_non_object_bodies() {
        assert!(page_path_from_event(&json!({"body": "[1, 2]"})).is_err());
        assert!(page_path_from_event(&json!({"body": 42})).is_err());
        assert!(page_path_from_event(&json!("raw")).is_err());
    }

    #[test]
    fn falsy_page_path_defaults_to_root() {
        for value in [json!(0), json!(0.0), json!(false), json!([]), json!({})] {
            let body = json!({ "pagePath": value });
            assert_eq!(resolve_page_path(&body).unwrap(), "/", "pagePath {value}");
        }
    }

    #[test]
    fn rejects_truthy_non_string_page_path() {
        for value in [json!(7), json!(true), json!(["/a"]), json!({"path": "/a"})] {
            let error = resolve_page_path(&json!({ "pagePath": value })).expect_err("should fail");
            assert_eq!(error.message(), "pagePath must be a string");
        }
    }

    #[test]
    fn response_headers_allow_any_origin() {
        let headers = response_headers();
        assert_eq!(headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(headers["Access-Control-Allow-Methods"], "POST, OPTIONS");
        assert_eq!(headers.as_object().map(|h| h.len()), Some(3));
    }
}
