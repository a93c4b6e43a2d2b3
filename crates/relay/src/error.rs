pub use courier_crm::ErrorClass;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Messaging(#[from] courier_channels::Error),

    #[error(transparent)]
    Store(#[from] courier_store::Error),

    #[error(transparent)]
    Crm(#[from] courier_crm::Error),
}

impl Error {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Store(_) => ErrorClass::Storage,
            Self::Crm(e) => e.class(),
            Self::Messaging(_) => ErrorClass::Transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crm_errors_keep_their_class() {
        let err = Error::from(courier_crm::Error::unauthorized("login"));
        assert_eq!(err.class(), ErrorClass::Authorization);

        let err = Error::from(courier_channels::Error::rejected("blocked"));
        assert_eq!(err.class(), ErrorClass::Transport);
    }
}
