use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("stored value out of range for {table}: {value}")]
    OutOfRange { table: &'static str, value: i64 },
}

impl Error {
    #[must_use]
    pub fn out_of_range(table: &'static str, value: i64) -> Self {
        Self::OutOfRange { table, value }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
