// Error taxonomy shared by the device client, the caches and the routes.
// A cache miss is not an error; it is an `Option` at the call site.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HubError {
    /// Device unreachable, refused or timed out.
    #[error("unreachable: {device}: {cause}")]
    Network { device: String, cause: String },

    /// Device or upstream answered, but the answer could not be used.
    #[error("malformed response: {0}")]
    UpstreamMalformed(String),

    /// Bad caller input (slot key, device index, ...). Never touches cache state.
    #[error("{0}")]
    Validation(String),
}

impl HubError {
    pub fn network(device: impl Into<String>, cause: impl ToString) -> Self {
        HubError::Network {
            device: device.into(),
            cause: cause.to_string(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        HubError::UpstreamMalformed(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        HubError::Validation(msg.into())
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = match self {
            HubError::Validation(_) => StatusCode::BAD_REQUEST,
            HubError::Network { .. } | HubError::UpstreamMalformed(_) => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}
