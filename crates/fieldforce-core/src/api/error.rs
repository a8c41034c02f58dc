use std::collections::BTreeMap;
use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Request rejected: {0}")]
    Validation(FieldErrors),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network(format!("request timed out: {}", err))
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Key DRF uses for errors that are not tied to a single field.
const NON_FIELD_ERRORS: &str = "non_field_errors";

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

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let parsed = ErrorBody::parse(body);
        let message = parsed
            .detail
            .clone()
            .unwrap_or_else(|| Self::truncate_body(body));
        match status.as_u16() {
            400 if !parsed.fields.is_empty() => ApiError::Validation(parsed.fields),
            400 => ApiError::Validation(FieldErrors::single(NON_FIELD_ERRORS, message)),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// True for failures where the request never produced an HTTP response.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

/// Per-field validation messages as returned by the API on 400 responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn single(field: &str, message: String) -> Self {
        let mut map = BTreeMap::new();
        map.insert(field.to_string(), vec![message]);
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            if field == NON_FIELD_ERRORS {
                write!(f, "{}", messages.join(" "))?;
            } else {
                write!(f, "{}: {}", field, messages.join(" "))?;
            }
        }
        Ok(())
    }
}

/// Loosely parsed error payload.
///
/// The server answers either `{"detail": "..."}` or a map of field names to a
/// message or list of messages. Anything else yields an empty body.
#[derive(Debug, Default)]
pub(crate) struct ErrorBody {
    pub detail: Option<String>,
    pub fields: FieldErrors,
}

impl ErrorBody {
    pub fn parse(body: &str) -> Self {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
            return Self::default();
        };

        let mut parsed = Self::default();
        for (key, value) in map {
            if key == "detail" || key == "error" {
                if let Value::String(s) = value {
                    parsed.detail = Some(s);
                }
                continue;
            }
            // Token endpoints add a machine code alongside the detail
            if key == "code" || key == "messages" {
                continue;
            }
            let messages: Vec<String> = match value {
                Value::String(s) => vec![s],
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
                other => vec![other.to_string()],
            };
            parsed.fields.0.insert(key, messages);
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_codes() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        match ApiError::from_status(StatusCode::NOT_FOUND, r#"{"detail": "Not found."}"#) {
            ApiError::NotFound(msg) => assert_eq!(msg, "Not found."),
            other => panic!("unexpected {:?}", other),
        }
        match ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down") {
            ApiError::ServerError(msg) => assert_eq!(msg, "upstream down"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validation_errors_are_collected_per_field() {
        let body = r#"{"email": ["This field is required."], "end_date": "End date must be after start date."}"#;
        match ApiError::from_status(StatusCode::BAD_REQUEST, body) {
            ApiError::Validation(fields) => {
                assert_eq!(fields.get("email").unwrap(), ["This field is required."]);
                assert_eq!(
                    fields.get("end_date").unwrap(),
                    ["End date must be after start date."]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_request_without_fields_becomes_non_field_error() {
        match ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"detail": "Nope"}"#) {
            ApiError::Validation(fields) => {
                assert_eq!(fields.to_string(), "Nope");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.ends_with("(truncated, 520 total bytes)"));
        assert_eq!(ApiError::truncate_body("short"), "short");
    }

    #[test]
    fn test_field_errors_display() {
        let body = r#"{"password": ["Too short."], "non_field_errors": ["Passwords differ."]}"#;
        let parsed = ErrorBody::parse(body);
        assert_eq!(
            parsed.fields.to_string(),
            "Passwords differ.; password: Too short."
        );
    }
}
