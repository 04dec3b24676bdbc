//! Error types for tfplug

/// Error type for tfplug operations
#[derive(Debug, thiserror::Error)]
pub enum TfplugError {
    #[error("Resource type not found: {0}")]
    ResourceNotFound(String),

    #[error("Data source type not found: {0}")]
    DataSourceNotFound(String),

    #[error("Provider not configured")]
    ProviderNotConfigured,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Attribute path not found: {0}")]
    PathNotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TLS configuration error: {0}")]
    TlsError(String),

    #[error("Address parse error: {0}")]
    AddressParseError(#[from] std::net::AddrParseError),

    #[error("Transport error: {0}")]
    TransportError(#[from] tonic::transport::Error),

    #[error("{0}")]
    Custom(String),
}

/// Result type alias for tfplug operations
pub type Result<T> = std::result::Result<T, TfplugError>;

impl From<String> for TfplugError {
    fn from(s: String) -> Self {
        TfplugError::Custom(s)
    }
}

impl From<&str> for TfplugError {
    fn from(s: &str) -> Self {
        TfplugError::Custom(s.to_string())
    }
}

impl From<TfplugError> for tonic::Status {
    fn from(err: TfplugError) -> Self {
        match err {
            TfplugError::ResourceNotFound(_) | TfplugError::DataSourceNotFound(_) => {
                tonic::Status::not_found(err.to_string())
            }
            TfplugError::DecodingError(_) | TfplugError::TypeMismatch { .. } => {
                tonic::Status::invalid_argument(err.to_string())
            }
            TfplugError::ProviderNotConfigured => {
                tonic::Status::failed_precondition(err.to_string())
            }
            TfplugError::Unsupported(_) => tonic::Status::unimplemented(err.to_string()),
            _ => tonic::Status::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_grpc_not_found() {
        let status: tonic::Status = TfplugError::ResourceNotFound("openai_thing".into()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);
        assert!(status.message().contains("openai_thing"));
    }

    #[test]
    fn decoding_error_is_invalid_argument() {
        let status: tonic::Status = TfplugError::DecodingError("bad msgpack".into()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[test]
    fn type_mismatch_message_names_path() {
        let err = TfplugError::TypeMismatch {
            path: "name".into(),
            expected: "string".into(),
            actual: "number".into(),
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch at name: expected string, got number"
        );
    }
}
