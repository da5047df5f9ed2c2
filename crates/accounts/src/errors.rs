use serde::Serialize;

use gatehouse_auth::AuthError;

/// What a transport layer shows to clients for a failed workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Map an error to its client-facing body.
///
/// Internal failures are logged here with their detail and reach the client
/// only as the generic message.
pub fn error_body(err: &AuthError) -> ErrorBody {
    if let AuthError::Internal(detail) = err {
        tracing::error!(%detail, "internal error");
    }
    ErrorBody {
        error: err.error_code(),
        message: err.to_string(),
    }
}

impl From<&AuthError> for ErrorBody {
    fn from(err: &AuthError) -> Self {
        error_body(err)
    }
}
