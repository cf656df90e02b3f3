//! Failure taxonomy for external model calls

/// One failed call to an external model service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceFailure {
    /// Service refused the call because of rate limiting
    #[error("rate limited: {message}")]
    RateLimited {
        /// Service message
        message: String,
    },

    /// Output could not be validated as the expected structure
    #[error("malformed structured output: {reason}")]
    Malformed {
        /// Why validation failed
        reason: String,
        /// Raw text the service generated, when available
        raw: Option<String>,
    },

    /// Request exceeded the service's size limits
    #[error("request too large: {message}")]
    Oversized {
        /// Service message
        message: String,
    },

    /// Credentials missing or rejected
    #[error("authentication failed: {message}")]
    Authentication {
        /// Service message
        message: String,
    },

    /// Network or decoding failure
    #[error("transport error: {message}")]
    Transport {
        /// Underlying error text
        message: String,
    },

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}

impl ServiceFailure {
    /// Malformed output with the raw text kept for salvage
    #[must_use]
    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
            raw: Some(raw.into()),
        }
    }

    /// Raw generated payload that may still contain a valid structure
    #[must_use]
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            Self::Malformed { raw, .. } => raw.as_deref(),
            _ => None,
        }
    }

    /// Check if the failure is rate limiting
    #[inline]
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Check if the request was rejected for size
    #[inline]
    #[must_use]
    pub fn is_oversized(&self) -> bool {
        matches!(self, Self::Oversized { .. })
    }
}

/// Raised when every attempt of an invocation failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("external service failed after {attempts} attempt(s): {last}")]
pub struct ExternalServiceError {
    /// Total calls made, including restarts
    pub attempts: u32,
    /// Failure of the final call
    pub last: ServiceFailure,
}

impl ExternalServiceError {
    /// Create error from the final failure
    #[inline]
    #[must_use]
    pub fn new(attempts: u32, last: ServiceFailure) -> Self {
        Self { attempts, last }
    }

    /// Whether shrinking the request might help
    #[must_use]
    pub fn is_shrinkable(&self) -> bool {
        self.last.is_oversized() || self.last.is_rate_limited()
    }
}

/// Map an unsuccessful HTTP response to a failure
///
/// 429 is rate limiting, 413 or a context-length complaint is oversize,
/// and a 400 carrying `failed_generation` keeps the generated text for
/// salvage.
#[must_use]
pub fn classify_http(status: u16, body: &str) -> ServiceFailure {
    let lowered = body.to_ascii_lowercase();
    match status {
        429 => ServiceFailure::RateLimited {
            message: body.to_string(),
        },
        413 => ServiceFailure::Oversized {
            message: body.to_string(),
        },
        401 | 403 => ServiceFailure::Authentication {
            message: body.to_string(),
        },
        400 if is_size_complaint(&lowered) => ServiceFailure::Oversized {
            message: body.to_string(),
        },
        400 => match failed_generation(body) {
            Some(raw) => ServiceFailure::Malformed {
                reason: "service rejected generated output".to_string(),
                raw: Some(raw),
            },
            None => ServiceFailure::Status {
                status,
                message: body.to_string(),
            },
        },
        _ if lowered.contains("rate limit") => ServiceFailure::RateLimited {
            message: body.to_string(),
        },
        _ => ServiceFailure::Status {
            status,
            message: body.to_string(),
        },
    }
}

fn is_size_complaint(lowered: &str) -> bool {
    ["context_length", "context length", "too large", "reduce the length", "maximum context"]
        .iter()
        .any(|needle| lowered.contains(needle))
}

fn failed_generation(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let generated = value.get("error")?.get("failed_generation")?;
    Some(match generated {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_classified() {
        assert!(classify_http(429, "slow down").is_rate_limited());
        assert!(classify_http(413, "payload").is_oversized());
        assert!(classify_http(400, "Please reduce the length of the messages").is_oversized());
        assert!(matches!(classify_http(401, "bad key"), ServiceFailure::Authentication { .. }));
        assert!(matches!(
            classify_http(503, "unavailable"),
            ServiceFailure::Status { status: 503, .. }
        ));
    }

    #[test]
    fn failed_generation_is_kept_as_raw_payload() {
        let body = r#"{"error":{"message":"json_validate_failed","failed_generation":"{\"score\": 4}"}}"#;
        let failure = classify_http(400, body);
        assert_eq!(failure.raw_payload(), Some(r#"{"score": 4}"#));
    }

    #[test]
    fn exhaustion_is_shrinkable_only_for_size_and_rate() {
        let oversized = ExternalServiceError::new(3, ServiceFailure::Oversized { message: String::new() });
        let malformed = ExternalServiceError::new(3, ServiceFailure::malformed("bad", "x"));
        assert!(oversized.is_shrinkable());
        assert!(!malformed.is_shrinkable());
    }
}
