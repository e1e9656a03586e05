use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::auth::TokenStoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token storage error: {0}")]
    TokenStore(#[from] TokenStoreError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            // Field maps need the whole body to parse
            400 | 422 => ApiError::Validation(ValidationErrors::from_body(body)),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// A message suitable for showing to the person using the app.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::NetworkError(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            ApiError::NetworkError(e) if e.is_connect() => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            ApiError::NetworkError(_) => "Network error. Please try again.".to_string(),
            ApiError::Unauthorized => "Session expired. Please sign in again.".to_string(),
            ApiError::Validation(errors) => errors.to_string(),
            ApiError::AccessDenied(_) => "You are not allowed to do that.".to_string(),
            ApiError::NotFound(_) => "Not found.".to_string(),
            ApiError::RateLimited => "Too many requests. Please wait and try again.".to_string(),
            ApiError::ServerError(_) => "The server had a problem. Please try again later.".to_string(),
            ApiError::InvalidResponse(_) => "Unexpected response from server.".to_string(),
            ApiError::TokenStore(_) => "Could not save your sign-in. Please try again.".to_string(),
        }
    }
}

/// Field errors from a rejected request, keyed by field name.
///
/// The backend answers validation failures with either a map of field name
/// to messages (`{"username": ["already taken"]}`) or a single `detail` /
/// `error` string. Both shapes end up here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn from_body(body: &str) -> Self {
        let mut fields = BTreeMap::new();

        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(map)) => {
                for (field, value) in map {
                    let messages = Self::messages(&value);
                    if !messages.is_empty() {
                        fields.insert(field, messages);
                    }
                }
            }
            Ok(serde_json::Value::Array(items)) => {
                let messages: Vec<String> = items.iter().flat_map(Self::messages).collect();
                if !messages.is_empty() {
                    fields.insert("non_field_errors".to_string(), messages);
                }
            }
            _ => {
                if !body.trim().is_empty() {
                    let detail = ApiError::truncate_body(body.trim());
                    fields.insert("detail".to_string(), vec![detail]);
                }
            }
        }

        Self { fields }
    }

    fn messages(value: &serde_json::Value) -> Vec<String> {
        match value {
            serde_json::Value::String(s) => vec![s.clone()],
            serde_json::Value::Array(items) => items.iter().flat_map(Self::messages).collect(),
            serde_json::Value::Null => vec![],
            other => vec![other.to_string()],
        }
    }

    /// Messages for one field, if the server reported any.
    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return write!(f, "Invalid request");
        }
        let messages: Vec<&str> = self
            .fields
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        write!(f, "{}", messages.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_maps_taxonomy() {
        assert!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, "{}"),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, "nope"),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, ""),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_validation_errors_field_map() {
        let body = r#"{"username": ["A user with that username already exists."], "email": ["Enter a valid email address."]}"#;
        let errors = ValidationErrors::from_body(body);

        assert_eq!(
            errors.field("username"),
            Some(&["A user with that username already exists.".to_string()][..])
        );
        // BTreeMap keeps fields sorted, so email comes first
        assert_eq!(
            errors.to_string(),
            "Enter a valid email address., A user with that username already exists."
        );
    }

    #[test]
    fn test_validation_errors_single_message_shapes() {
        let errors = ValidationErrors::from_body(r#"{"error": "Cannot follow yourself"}"#);
        assert_eq!(errors.to_string(), "Cannot follow yourself");

        let errors = ValidationErrors::from_body("plain text failure");
        assert_eq!(errors.field("detail"), Some(&["plain text failure".to_string()][..]));

        let errors = ValidationErrors::from_body("");
        assert!(errors.is_empty());
        assert_eq!(errors.to_string(), "Invalid request");
    }

    #[test]
    fn test_long_validation_body_keeps_fields() {
        let long = "x".repeat(300);
        let body = serde_json::json!({"username": [long.clone()], "email": [long.clone()]}).to_string();
        assert!(body.len() > MAX_ERROR_BODY_LENGTH);

        let ApiError::Validation(errors) = ApiError::from_status(StatusCode::BAD_REQUEST, &body) else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.field("username"), Some(&[long.clone()][..]));
        assert_eq!(errors.field("email"), Some(&[long][..]));
        assert!(errors.field("detail").is_none());
        assert!(!errors.to_string().contains("truncated"));
    }

    #[test]
    fn test_long_plain_text_validation_body_is_truncated() {
        let body = "y".repeat(MAX_ERROR_BODY_LENGTH + 100);
        let errors = ValidationErrors::from_body(&body);
        let detail = &errors.field("detail").unwrap()[0];
        assert!(detail.contains("truncated, 600 total bytes"));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }
}
