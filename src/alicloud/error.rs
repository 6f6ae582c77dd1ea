use thiserror::Error;

/// Vendor codes that mean "the entity does not exist".
pub const NOT_FOUND_CODES: &[&str] = &[
    "InvalidDiskId.NotFound",
    "InvalidInstanceId.NotFound",
    "EntityNotExist.Disk",
    "NoSuchBucket",
    "TopicNotExist",
];

/// Vendor codes reported while an entity is still moving between statuses.
pub const RETRYABLE_CODES: &[&str] = &[
    "IncorrectDiskStatus",
    "IncorrectInstanceStatus",
    "OperationConflict",
    "DependencyViolation",
    "Throttling",
    "ServiceUnavailable",
];

/// Errors returned by the Alibaba Cloud API gateway.
///
/// SECURITY: Error messages must NEVER contain the access key secret or STS token.
#[derive(Debug, Error)]
pub enum AlicloudError {
    /// Credentials missing, malformed or rejected by the gateway
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// The API answered with a business error
    #[error("API error ({status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// Transport-level failure (connection refused, TLS, timeout)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode {operation} response: {message}")]
    Decode { operation: String, message: String },
}

impl AlicloudError {
    pub fn not_found(code: &str, message: impl Into<String>) -> Self {
        Self::Api {
            status: 404,
            code: code.to_string(),
            message: message.into(),
            request_id: None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_code(&self, codes: &[&str]) -> bool {
        self.code().is_some_and(|code| codes.contains(&code))
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { status, code, .. } => {
                NOT_FOUND_CODES.contains(&code.as_str()) || (*status == 404 && code.is_empty())
            }
            _ => false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } if *status == 503 => true,
            _ => self.is_code(RETRYABLE_CODES),
        }
    }

    /// Auth and transport failures. These never reach the vendor's business logic.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: &str) -> AlicloudError {
        AlicloudError::Api {
            status,
            code: code.to_string(),
            message: "boom".to_string(),
            request_id: Some("req-1".to_string()),
        }
    }

    #[test]
    fn test_auth_error_display() {
        let err = AlicloudError::Auth {
            message: "InvalidAccessKeyId".to_string(),
        };
        assert_eq!(err.to_string(), "authentication failed: InvalidAccessKeyId");
    }

    #[test]
    fn test_api_error_display() {
        let err = api(400, "IncorrectDiskStatus");
        assert_eq!(err.to_string(), "API error (400) IncorrectDiskStatus: boom");
    }

    #[test]
    fn test_not_found_codes() {
        assert!(api(404, "NoSuchBucket").is_not_found());
        assert!(api(400, "InvalidDiskId.NotFound").is_not_found());
        assert!(api(404, "").is_not_found());
        assert!(!api(404, "NoSuchCORSConfiguration").is_not_found());
        assert!(!api(400, "IncorrectDiskStatus").is_not_found());
    }

    #[test]
    fn test_retryable_codes() {
        assert!(api(403, "IncorrectDiskStatus").is_retryable());
        assert!(api(503, "Whatever").is_retryable());
        assert!(!api(400, "InvalidParameter").is_retryable());
    }

    #[test]
    fn test_connectivity_classification() {
        let auth = AlicloudError::Auth {
            message: "no key".to_string(),
        };
        assert!(auth.is_connectivity());
        assert!(!auth.is_not_found());
        assert!(!api(404, "NoSuchBucket").is_connectivity());
    }

    #[test]
    fn test_not_found_constructor() {
        let err = AlicloudError::not_found("InvalidDiskId.NotFound", "disk d-1 not attached");
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some("InvalidDiskId.NotFound"));
    }

    #[test]
    fn test_error_does_not_contain_secret() {
        let secret = "super_secret_access_key_12345";
        let err = AlicloudError::Auth {
            message: "InvalidAccessKeySecret".to_string(),
        };
        assert!(!err.to_string().contains(secret));
    }
}
