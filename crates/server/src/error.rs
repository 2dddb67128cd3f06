use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;
use vanish_lifecycle::LifecycleError;

/// Errors that can occur when running the Vanish server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A lifecycle error surfaced through the API.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The path does not name a stored object.
    #[error("object not found")]
    NotFound,

    /// The upload carried no usable `Content-Length`.
    #[error("Content-Length header is required")]
    LengthRequired,

    /// The upload exceeds the configured size limit.
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// The request conflicts with work already in progress.
    #[error("{0}")]
    Conflict(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::LengthRequired => StatusCode::LENGTH_REQUIRED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Config(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Lifecycle(e) => match e {
                LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
                LifecycleError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                LifecycleError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                LifecycleError::ConsistencyViolation { .. }
                | LifecycleError::OrphanCompensationFailed { .. }
                | LifecycleError::CompensationIncomplete { .. }
                | LifecycleError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message safe to hand to a client.
    fn public_message(&self) -> String {
        match self {
            Self::Lifecycle(LifecycleError::NotFound(_)) => "object not found".to_owned(),
            Self::Lifecycle(LifecycleError::StoreUnavailable { store, .. }) => {
                format!("{store} unavailable, retry later")
            }
            Self::Lifecycle(
                LifecycleError::ConsistencyViolation { .. }
                | LifecycleError::OrphanCompensationFailed { .. }
                | LifecycleError::CompensationIncomplete { .. }
                | LifecycleError::Configuration(_),
            )
            | Self::Config(_)
            | Self::Io(_) => "internal storage error".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.public_message() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use vanish_core::ObjectId;
    use vanish_lifecycle::StoreKind;

    use super::*;

    #[test]
    fn lifecycle_errors_map_to_statuses() {
        let id = ObjectId::generate();
        let cases = [
            (LifecycleError::NotFound(id.clone()), StatusCode::NOT_FOUND),
            (
                LifecycleError::InvalidPayload("short".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                LifecycleError::StoreUnavailable {
                    store: StoreKind::Metadata,
                    detail: "pool timed out".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                LifecycleError::ConsistencyViolation {
                    id: id.clone(),
                    detail: "payload missing".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                LifecycleError::OrphanCompensationFailed {
                    id: id.clone(),
                    namespace: "vanish".into(),
                    save_error: "a".into(),
                    delete_error: "b".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                LifecycleError::CompensationIncomplete {
                    id,
                    namespace: "vanish".into(),
                    save_error: "a".into(),
                    cleanup_error: "b".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = ServerError::from(LifecycleError::StoreUnavailable {
            store: StoreKind::Blob,
            detail: "connect to 10.0.0.7:9000 refused".into(),
        });
        let message = err.public_message();
        assert_eq!(message, "blob store unavailable, retry later");
        assert!(!message.contains("10.0.0.7"));

        let err = ServerError::from(LifecycleError::OrphanCompensationFailed {
            id: ObjectId::generate(),
            namespace: "vanish".into(),
            save_error: "relation does not exist".into(),
            delete_error: "access denied".into(),
        });
        assert_eq!(err.public_message(), "internal storage error");
    }

    #[test]
    fn transport_errors() {
        assert_eq!(
            ServerError::LengthRequired.status(),
            StatusCode::LENGTH_REQUIRED
        );
        let err = ServerError::PayloadTooLarge {
            size: 11,
            limit: 10,
        };
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            err.public_message(),
            "upload of 11 bytes exceeds the 10 byte limit"
        );
    }
}
