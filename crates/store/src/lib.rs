//! Persistent identity and link mappings for the relay.
//!
//! Five independent keyed tables (conversation links, topic bindings, CRM
//! bindings and the two per-lead watermarks). Every write is an upsert; there
//! are no transactions and no foreign keys.

pub mod error;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;

pub use {
    error::{Error, Result},
    store::{LeadBinding, LeadId, LinkStore},
    store_memory::InMemoryLinkStore,
    store_sqlite::SqliteLinkStore,
};

/// Run database migrations for the link store.
///
/// Creates the five mapping tables. Should be called at application startup
/// when using [`SqliteLinkStore::with_pool`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
