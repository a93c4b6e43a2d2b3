use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] courier_store::Error),

    #[error(transparent)]
    Messaging(#[from] courier_channels::Error),

    /// The CRM rejected our credentials, or kept rejecting a fresh token.
    #[error("crm authorization failed: {context}")]
    Unauthorized { context: String },

    #[error("crm returned {status} for {context}: {body}")]
    Status {
        status: u16,
        context: String,
        body: String,
    },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

/// Coarse classification used to decide how loudly a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network or API failure; a fallback or a warning annotation handles it.
    Transport,
    /// Credentials rejected even after the single re-login.
    Authorization,
    /// Local persistence failed.
    Storage,
}

impl Error {
    #[must_use]
    pub fn unauthorized(context: impl Into<String>) -> Self {
        Self::Unauthorized {
            context: context.into(),
        }
    }

    #[must_use]
    pub fn status(status: u16, context: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            context: context.into(),
            body: body.into(),
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

    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unauthorized { .. } => ErrorClass::Authorization,
            Self::Store(_) => ErrorClass::Storage,
            Self::Http(_)
            | Self::Messaging(_)
            | Self::Status { .. }
            | Self::External { .. } => ErrorClass::Transport,
        }
    }

    /// The endpoint does not exist on this CRM deployment.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Status { status: 404 | 405 | 501, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
