//! Response types handed back to the transport layer.

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};

/// A status code and a JSON body, ready to be written to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,

    /// JSON body.
    pub body: serde_json::Value,
}

/// Body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short summary of what failed.
    pub message: String,

    /// The underlying error.
    pub details: String,
}

impl From<&ServiceError> for ErrorBody {
    fn from(err: &ServiceError) -> Self {
        Self {
            message: err.message().to_string(),
            details: err.to_string(),
        }
    }
}

impl Response {
    /// A `200` response carrying `value`.
    pub fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::error(&ServiceError::Internal(e.to_string())),
        }
    }

    /// An error response for `err`, with an [`ErrorBody`] as body.
    pub fn error(err: &ServiceError) -> Self {
        let body = ErrorBody::from(err);

        Self {
            status: err.status_code(),
            body: serde_json::to_value(&body).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl<T: Serialize> From<crate::Result<T>> for Response {
    fn from(result: crate::Result<T>) -> Self {
        match result {
            Ok(value) => Response::ok(&value),
            Err(err) => Response::error(&err),
        }
    }
}
