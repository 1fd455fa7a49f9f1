use thiserror::Error;

#[derive(Debug, Error)]
pub enum AmortizaError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Unknown amortization system '{0}' (expected 'sac' or 'price')")]
    UnknownSystem(String),

    #[error("Domain error: {context} left the representable decimal range")]
    DomainError { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl AmortizaError {
    pub(crate) fn domain(context: &str) -> Self {
        AmortizaError::DomainError {
            context: context.into(),
        }
    }
}

impl From<serde_json::Error> for AmortizaError {
    fn from(e: serde_json::Error) -> Self {
        AmortizaError::SerializationError(e.to_string())
    }
}
