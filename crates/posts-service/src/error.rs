use posts_core::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("undefined sort key: {0}")]
    UnknownSortKey(String),

    /// Input rejected before reaching storage (e.g. empty or too long content)
    #[error("validation error: {0}")]
    Validation(String),
}

impl ServiceError {
    /// Errors a client cannot act on. Their details stay in the logs.
    pub fn is_internal(&self) -> bool {
        match self {
            Self::Storage(err) => !err.is_domain(),
            Self::UnknownSortKey(_) | Self::Validation(_) => false,
        }
    }

    /// Message safe to hand back to a client.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            tracing::error!(error = %self, "internal error");
            "internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
