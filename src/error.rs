//! Error taxonomy for Huefy API calls.
//!
//! Every failed call resolves to exactly one [`HuefyError`] variant. The raw
//! failure that produced it (transport error, HTTP status with body, JSON
//! parse error) is kept as a [`FailureCause`] and exposed through
//! [`std::error::Error::source`].

use std::collections::BTreeMap;

use thiserror::Error;

/// Result type alias for Huefy API operations.
pub type Result<T> = std::result::Result<T, HuefyError>;

/// Field name to validation messages, as reported by the API.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// The underlying failure a [`HuefyError`] was classified from.
#[derive(Debug, Error)]
pub enum FailureCause {
    /// The request never produced an HTTP response (connect, DNS, timeout, ...).
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Raw response body, possibly empty
        body: String,
    },

    /// The response body was not valid JSON.
    #[error(transparent)]
    Decode(#[from] serde_json::Error),

    /// The response body was empty where a JSON document was required.
    #[error("response body was empty")]
    EmptyBody,
}

/// Classified outcome of a failed Huefy API call.
#[derive(Debug, Error)]
pub enum HuefyError {
    /// The requested template does not exist.
    #[error("{message}")]
    TemplateNotFound {
        message: String,
        status: u16,
        /// Template key of the failed call, when the operation knows it
        template_key: Option<String>,
        source: FailureCause,
    },

    /// The request payload was rejected.
    #[error("{message}")]
    ValidationFailed {
        message: String,
        status: u16,
        errors: FieldErrors,
        source: FailureCause,
    },

    /// The API key was rejected (HTTP 401).
    #[error("{message}")]
    Unauthorized { message: String, source: FailureCause },

    /// The API key is valid but not allowed to do this (HTTP 403).
    #[error("{message}")]
    Forbidden { message: String, source: FailureCause },

    /// The endpoint or resource does not exist (HTTP 404).
    #[error("{message}")]
    NotFound { message: String, source: FailureCause },

    /// Too many requests (HTTP 429). Not retried by the client.
    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimited {
        /// Seconds the server asked us to wait
        retry_after: u64,
        message: String,
        source: FailureCause,
    },

    /// The response body could not be decoded.
    #[error("Invalid JSON response: {message}")]
    MalformedResponse {
        message: String,
        status: Option<u16>,
        source: FailureCause,
    },

    /// Any other failure: transport errors, 5xx, unmapped statuses.
    #[error("{message}")]
    ApiFault {
        message: String,
        status: Option<u16>,
        source: FailureCause,
    },

    /// Retryable failures continued until the attempt budget ran out.
    #[error("Request failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<HuefyError>,
    },

    /// The caller's cancellation signal fired before the call resolved.
    #[error("Request cancelled after {attempts} attempts")]
    Cancelled {
        attempts: u32,
        #[source]
        last: Option<Box<HuefyError>>,
    },

    /// A mail or notification could not be turned into an API call.
    #[error("{message}")]
    InvalidMessage { message: String },
}

impl HuefyError {
    pub(crate) fn invalid_message(message: impl Into<String>) -> Self {
        HuefyError::InvalidMessage {
            message: message.into(),
        }
    }

    /// HTTP status code associated with this error, if one is known.
    pub fn status(&self) -> Option<u16> {
        match self {
            HuefyError::TemplateNotFound { status, .. } => Some(*status),
            HuefyError::ValidationFailed { status, .. } => Some(*status),
            HuefyError::Unauthorized { .. } => Some(401),
            HuefyError::Forbidden { .. } => Some(403),
            HuefyError::NotFound { .. } => Some(404),
            HuefyError::RateLimited { .. } => Some(429),
            HuefyError::MalformedResponse { status, .. } => *status,
            HuefyError::ApiFault { status, .. } => *status,
            HuefyError::RetryExhausted { last, .. } => last.status(),
            HuefyError::Cancelled { .. } | HuefyError::InvalidMessage { .. } => None,
        }
    }

    /// Field-level validation errors, if the server supplied any.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            HuefyError::ValidationFailed { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Template key attached to a [`HuefyError::TemplateNotFound`].
    pub fn template_key(&self) -> Option<&str> {
        match self {
            HuefyError::TemplateNotFound { template_key, .. } => template_key.as_deref(),
            _ => None,
        }
    }

    /// Server-provided retry hint for [`HuefyError::RateLimited`].
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            HuefyError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether the request executor may try the call again.
    ///
    /// Only transport failures and 5xx responses are transient. Every 4xx
    /// (429 included) and every decode failure is deterministic.
    pub fn is_retryable(&self) -> bool {
        match self {
            HuefyError::ApiFault { status, .. } => match status {
                None => true,
                Some(code) => *code >= 500,
            },
            _ => false,
        }
    }

    /// Attaches the template key to a [`HuefyError::TemplateNotFound`] that has none.
    pub fn with_template_key(mut self, key: &str) -> Self {
        if let HuefyError::TemplateNotFound { template_key, .. } = &mut self {
            if template_key.is_none() {
                *template_key = Some(key.to_string());
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    fn status_cause(status: u16) -> FailureCause {
        FailureCause::Status {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_status_for_fixed_variants() {
        let err = HuefyError::Unauthorized {
            message: "Invalid API key".to_string(),
            source: status_cause(401),
        };
        assert_eq!(err.status(), Some(401));

        let err = HuefyError::RateLimited {
            retry_after: 45,
            message: "slow down".to_string(),
            source: status_cause(429),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.retry_after(), Some(45));
        assert!(err.to_string().contains("45 seconds"));
    }

    #[test]
    fn test_retry_exhausted_reports_last_status() {
        let last = HuefyError::ApiFault {
            message: "bad gateway".to_string(),
            status: Some(502),
            source: status_cause(502),
        };
        let err = HuefyError::RetryExhausted {
            attempts: 3,
            last: Box::new(last),
        };

        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("after 3 attempts"));
        assert!(err.to_string().contains("bad gateway"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_source_chain_preserves_cause() {
        let err = HuefyError::ApiFault {
            message: "Internal Server Error".to_string(),
            status: Some(500),
            source: FailureCause::Status {
                status: 500,
                body: "boom".to_string(),
            },
        };
        let wrapped = HuefyError::RetryExhausted {
            attempts: 2,
            last: Box::new(err),
        };

        let first = wrapped.source().unwrap();
        let cause = first.source().unwrap();
        assert_eq!(cause.to_string(), "HTTP 500: boom");
    }

    #[test]
    fn test_is_retryable() {
        let transport = HuefyError::ApiFault {
            message: "connection refused".to_string(),
            status: None,
            source: FailureCause::EmptyBody,
        };
        assert!(transport.is_retryable());

        let server = HuefyError::ApiFault {
            message: "unavailable".to_string(),
            status: Some(503),
            source: status_cause(503),
        };
        assert!(server.is_retryable());

        let conflict = HuefyError::ApiFault {
            message: "conflict".to_string(),
            status: Some(409),
            source: status_cause(409),
        };
        assert!(!conflict.is_retryable());

        let malformed = HuefyError::MalformedResponse {
            message: "expected value".to_string(),
            status: Some(200),
            source: FailureCause::EmptyBody,
        };
        assert!(!malformed.is_retryable());
    }

    #[test]
    fn test_with_template_key() {
        let err = HuefyError::TemplateNotFound {
            message: "template not found".to_string(),
            status: 404,
            template_key: None,
            source: status_cause(404),
        }
        .with_template_key("welcome");
        assert_eq!(err.template_key(), Some("welcome"));

        // Other variants are left alone
        let err = HuefyError::invalid_message("nope").with_template_key("welcome");
        assert_eq!(err.template_key(), None);
    }
}
