use std::error::Error as StdError;

/// Crate-wide result type for messaging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed messaging errors shared by every transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The platform refused the request (blocked bot, missing rights, ...).
    #[error("messaging request rejected: {message}")]
    Rejected { message: String },

    /// Wrapped source error from an external dependency.
    #[error("messaging operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn rejected(message: impl std::fmt::Display) -> Self {
        Self::Rejected {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
