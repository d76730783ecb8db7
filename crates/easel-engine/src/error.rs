use easel_core::errors::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("run cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

impl EngineError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Gateway(e) => e.error_kind(),
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the same request might succeed if the user tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(e) if e.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_kind() {
        assert_eq!(EngineError::Cancelled.to_string(), "run cancelled");
        let err: EngineError = GatewayError::ProviderOverloaded.into();
        assert_eq!(err.to_string(), "model error: provider overloaded");
        assert_eq!(err.error_kind(), "provider_overloaded");
        assert!(err.is_retryable());
        assert!(!EngineError::Cancelled.is_retryable());
        assert!(!EngineError::from(GatewayError::AuthenticationFailed("k".into())).is_retryable());
    }
}
