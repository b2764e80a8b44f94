//! Error types for the janitor service

use thiserror::Error;

/// Main error type for janitor operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// gRPC transport error
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// HTTP transport error talking to GitLab
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// GitLab answered, but not with what we asked for
    #[error("repository error: {0}")]
    Repository(String),

    /// Client asked for an API version this service does not implement
    #[error(
        "unsupported API version: service implements API version '{implemented}', but asked for '{requested}'"
    )]
    UnsupportedApi {
        /// Version implemented by this build
        implemented: String,
        /// Version found in the request
        requested: String,
    },

    /// A group, project, namespace or resource required by the call is absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Downstream read or hashing failure
    #[error("internal error: {0}")]
    Internal(String),

    /// Request is missing a required field
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Startup configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a repository error with the given message
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Create a not-found error with the given message
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid-request error with the given message
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// gRPC status code this error is reported with
    pub fn code(&self) -> tonic::Code {
        match self {
            Error::UnsupportedApi { .. } => tonic::Code::Unimplemented,
            Error::NotFound(_) => tonic::Code::NotFound,
            Error::Internal(_) | Error::Serialization(_) => tonic::Code::Internal,
            Error::InvalidRequest(_) => tonic::Code::InvalidArgument,
            Error::Kube(kube::Error::Api(ae)) if ae.code == 404 => tonic::Code::NotFound,
            Error::Kube(kube::Error::Api(ae)) if ae.code == 409 => tonic::Code::AlreadyExists,
            _ => tonic::Code::Unknown,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> Self {
        tonic::Status::new(e.code(), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16, reason: &str) -> Error {
        Error::Kube(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{reason} from api server"),
            reason: reason.to_string(),
            code,
        }))
    }

    /// Story: an outdated client is told which version the service speaks
    #[test]
    fn story_version_mismatch_names_both_versions() {
        let err = Error::UnsupportedApi {
            implemented: "v1".to_string(),
            requested: "v2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported API version: service implements API version 'v1', but asked for 'v2'"
        );
        assert_eq!(err.code(), tonic::Code::Unimplemented);
    }

    /// Story: absent groups, projects and workloads surface as NotFound
    #[test]
    fn story_missing_things_map_to_not_found() {
        assert_eq!(
            Error::not_found("Gitlab Group for given domain does not exist").code(),
            tonic::Code::NotFound
        );
        assert_eq!(api_error(404, "NotFound").code(), tonic::Code::NotFound);
    }

    /// Story: creating a namespace twice is a conflict, not a success
    #[test]
    fn story_conflicts_map_to_already_exists() {
        assert_eq!(
            api_error(409, "AlreadyExists").code(),
            tonic::Code::AlreadyExists
        );
    }

    /// Story: downstream read failures and unknown API failures are told apart
    #[test]
    fn story_error_categorization_for_grpc_callers() {
        assert_eq!(
            Error::internal("Error while reading file from Gitlab!").code(),
            tonic::Code::Internal
        );
        assert_eq!(
            Error::invalid_request("missing instance").code(),
            tonic::Code::InvalidArgument
        );
        assert_eq!(api_error(500, "InternalError").code(), tonic::Code::Unknown);
        assert_eq!(Error::repository("bad gateway").code(), tonic::Code::Unknown);
    }

    #[test]
    fn status_carries_message() {
        let status: tonic::Status = Error::not_found("Service not found!").into();
        assert_eq!(status.code(), tonic::Code::NotFound);
        assert!(status.message().contains("Service not found!"));
    }
}
