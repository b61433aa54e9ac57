//! Maps failed HTTP exchanges onto the error taxonomy.

use log::debug;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{FailureCause, FieldErrors, HuefyError};

/// Retry-after used when a 429 carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Classifies a non-success HTTP response.
///
/// Total over every status code: anything without a dedicated mapping becomes
/// [`HuefyError::ApiFault`]. `retry_after` is the raw `Retry-After` header.
pub fn classify_status(status: StatusCode, retry_after: Option<&str>, body: &[u8]) -> HuefyError {
    let code = status.as_u16();
    let decoded: Option<Value> = serde_json::from_slice(body).ok();
    let message = decoded
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default_message(status));

    debug!("Classifying HTTP {} response: {}", code, message);

    let source = FailureCause::Status {
        status: code,
        body: String::from_utf8_lossy(body).into_owned(),
    };

    match status {
        StatusCode::BAD_REQUEST => {
            if mentions_missing_template(&message) {
                HuefyError::TemplateNotFound {
                    message,
                    status: code,
                    template_key: None,
                    source,
                }
            } else {
                HuefyError::ValidationFailed {
                    message,
                    status: code,
                    errors: field_errors(decoded.as_ref()),
                    source,
                }
            }
        }
        StatusCode::UNAUTHORIZED => HuefyError::Unauthorized {
            message: "Invalid API key".to_string(),
            source,
        },
        StatusCode::FORBIDDEN => HuefyError::Forbidden {
            message: "Access forbidden".to_string(),
            source,
        },
        StatusCode::NOT_FOUND => {
            if message.to_lowercase().contains("template") {
                HuefyError::TemplateNotFound {
                    message,
                    status: code,
                    template_key: None,
                    source,
                }
            } else {
                HuefyError::NotFound {
                    message: "Resource not found".to_string(),
                    source,
                }
            }
        }
        StatusCode::UNPROCESSABLE_ENTITY => HuefyError::ValidationFailed {
            message,
            status: code,
            errors: field_errors(decoded.as_ref()),
            source,
        },
        StatusCode::TOO_MANY_REQUESTS => HuefyError::RateLimited {
            retry_after: parse_retry_after(retry_after),
            message,
            source,
        },
        _ => HuefyError::ApiFault {
            message,
            status: Some(code),
            source,
        },
    }
}

/// Classifies a request that failed before a response was received.
pub fn classify_transport(error: reqwest::Error) -> HuefyError {
    let message = if error.is_timeout() {
        format!("Request timed out: {}", error)
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else {
        format!("Request failed: {}", error)
    };

    HuefyError::ApiFault {
        message,
        status: error.status().map(|s| s.as_u16()),
        source: FailureCause::Transport(error),
    }
}

fn default_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {}", status.as_u16(), reason),
        None => format!("HTTP {} error", status.as_u16()),
    }
}

fn mentions_missing_template(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("template") && message.contains("not found")
}

fn parse_retry_after(header: Option<&str>) -> u64 {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Reads the `errors` object of an error body.
///
/// Values may be a list of messages or a single message.
fn field_errors(body: Option<&Value>) -> FieldErrors {
    let Some(errors) = body.and_then(|v| v.get("errors")).and_then(Value::as_object) else {
        return FieldErrors::new();
    };

    errors
        .iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::Array(items) => items.iter().map(value_to_message).collect(),
                other => vec![value_to_message(other)],
            };
            (field.clone(), messages)
        })
        .collect()
}

fn value_to_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(code: u16, body: &str) -> HuefyError {
        classify_status(StatusCode::from_u16(code).unwrap(), None, body.as_bytes())
    }

    #[test]
    fn test_400_missing_template() {
        let err = classify(400, r#"{"message":"The template welcome was not found"}"#);
        assert!(matches!(err, HuefyError::TemplateNotFound { status: 400, .. }));
    }

    #[test]
    fn test_400_missing_template_case_insensitive() {
        let err = classify(400, r#"{"message":"Template Not Found"}"#);
        assert!(matches!(err, HuefyError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_400_validation() {
        let err = classify(400, r#"{"message":"recipient is required"}"#);
        match err {
            HuefyError::ValidationFailed {
                message, errors, ..
            } => {
                assert_eq!(message, "recipient is required");
                assert!(errors.is_empty());
            }
            other => panic!("Expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_401_unauthorized() {
        let err = classify(401, "");
        assert!(matches!(err, HuefyError::Unauthorized { .. }));
        assert_eq!(err.to_string(), "Invalid API key");
    }

    #[test]
    fn test_403_forbidden() {
        let err = classify(403, r#"{"message":"nope"}"#);
        assert!(matches!(err, HuefyError::Forbidden { .. }));
    }

    #[test]
    fn test_404_template_vs_resource() {
        let err = classify(404, r#"{"message":"template 'welcome' does not exist"}"#);
        assert!(matches!(err, HuefyError::TemplateNotFound { status: 404, .. }));

        let err = classify(404, r#"{"message":"no such route"}"#);
        assert!(matches!(err, HuefyError::NotFound { .. }));

        let err = classify(404, "");
        assert!(matches!(err, HuefyError::NotFound { .. }));
    }

    #[test]
    fn test_422_field_errors() {
        let err = classify(
            422,
            r#"{"message":"bad","errors":{"recipient":["invalid format"]}}"#,
        );
        match &err {
            HuefyError::ValidationFailed {
                message, status, ..
            } => {
                assert_eq!(message, "bad");
                assert_eq!(*status, 422);
            }
            other => panic!("Expected ValidationFailed, got {:?}", other),
        }

        let mut expected = FieldErrors::new();
        expected.insert("recipient".to_string(), vec!["invalid format".to_string()]);
        assert_eq!(err.field_errors(), Some(&expected));
    }

    #[test]
    fn test_422_single_string_field_error() {
        let err = classify(422, r#"{"message":"bad","errors":{"data.name":"required"}}"#);
        let errors = err.field_errors().unwrap();
        assert_eq!(errors["data.name"], vec!["required".to_string()]);
    }

    #[test]
    fn test_429_retry_after() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, Some("45"), b"");
        assert_eq!(err.retry_after(), Some(45));

        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, None, b"");
        assert_eq!(err.retry_after(), Some(DEFAULT_RETRY_AFTER_SECS));

        let err = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            Some("Wed, 21 Oct 2015 07:28:00 GMT"),
            b"",
        );
        assert_eq!(err.retry_after(), Some(DEFAULT_RETRY_AFTER_SECS));
    }

    #[test]
    fn test_unmapped_statuses_are_api_faults() {
        for code in [402, 409, 418, 500, 502, 503, 599] {
            let err = classify(code, "not json");
            match err {
                HuefyError::ApiFault { status, .. } => assert_eq!(status, Some(code)),
                other => panic!("Expected ApiFault for {}, got {:?}", code, other),
            }
        }
    }

    #[test]
    fn test_default_message_uses_reason() {
        let err = classify(500, "");
        assert_eq!(err.to_string(), "HTTP 500 Internal Server Error");
    }

    #[test]
    fn test_body_preserved_in_cause() {
        let err = classify(503, "upstream down");
        match err {
            HuefyError::ApiFault {
                source: FailureCause::Status { status, body },
                ..
            } => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream down");
            }
            other => panic!("Expected ApiFault with status cause, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_classify_transport_connection_refused() {
        // Nothing listens on port 1
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .unwrap_err();

        let classified = classify_transport(err);
        assert!(matches!(classified, HuefyError::ApiFault { status: None, .. }));
        assert!(classified.is_retryable());
    }
}
