//! Content gateway error types.

use thiserror::Error;

/// Errors reported by a [`ContentGateway`](crate::gateway::ContentGateway).
#[derive(Debug, Error)]
pub enum GatewayError {
    /// the transfer or the backend failed
    #[error("storage error: {0}")]
    Storage(String),

    /// the backend has no bytes for this hash
    #[error("data not found: {algorithm}:{hash}")]
    DataNotFound { hash: String, algorithm: String },

    /// local filesystem failure while staging or materializing data
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// check if this error indicates the data doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::DataNotFound { .. })
    }
}

/// result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_not_found_is_a_storage_failure_subtype() {
        let missing = GatewayError::DataNotFound {
            hash: "abc".into(),
            algorithm: "md5".into(),
        };
        assert!(missing.is_not_found());
        assert_eq!(missing.to_string(), "data not found: md5:abc");
        assert!(!GatewayError::storage("timeout").is_not_found());
    }
}
