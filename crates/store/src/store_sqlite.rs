//! SQLite-backed link store using sqlx.

use std::time::{SystemTime, UNIX_EPOCH};

use {
    async_trait::async_trait,
    courier_channels::{MessageHandle, TopicHandle, UserId},
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
    tracing::debug,
};

use crate::{
    Error, Result,
    store::{LeadBinding, LeadId, LinkStore},
};

/// SQLite-backed persistence for links, bindings and watermarks.
pub struct SqliteLinkStore {
    pool: SqlitePool,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn to_i32(table: &'static str, value: i64) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::out_of_range(table, value))
}

impl SqliteLinkStore {
    /// Create a new store with its own connection pool and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;
        debug!(database_url, "link store ready");

        Ok(Self { pool })
    }

    /// Create a store using an existing pool (migrations must already be run).
    ///
    /// Call [`crate::run_migrations`] before using this constructor.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get_scalar(&self, sql: &str, key: i64) -> Result<Option<i64>> {
        let value = sqlx::query_scalar::<_, i64>(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn upsert(&self, sql: &str, key: i64, value: i64) -> Result<()> {
        sqlx::query(sql)
            .bind(key)
            .bind(value)
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct LeadRow {
    user_id: i64,
    lead_id: i64,
}

#[async_trait]
impl LinkStore for SqliteLinkStore {
    async fn save_link(&self, message: MessageHandle, user: UserId) -> Result<()> {
        self.upsert(
            r#"INSERT INTO links (message_id, user_id, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(message_id) DO UPDATE SET
                 user_id = excluded.user_id,
                 updated_at = excluded.updated_at"#,
            i64::from(message.0),
            user.0,
        )
        .await
    }

    async fn user_for_link(&self, message: MessageHandle) -> Result<Option<UserId>> {
        let user = self
            .get_scalar(
                "SELECT user_id FROM links WHERE message_id = ?",
                i64::from(message.0),
            )
            .await?;
        Ok(user.map(UserId))
    }

    async fn save_topic(&self, user: UserId, topic: TopicHandle) -> Result<()> {
        self.upsert(
            r#"INSERT INTO topics (user_id, topic_id, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET
                 topic_id = excluded.topic_id,
                 updated_at = excluded.updated_at"#,
            user.0,
            i64::from(topic.0),
        )
        .await
    }

    async fn topic_for_user(&self, user: UserId) -> Result<Option<TopicHandle>> {
        let topic = self
            .get_scalar("SELECT topic_id FROM topics WHERE user_id = ?", user.0)
            .await?;
        topic
            .map(|t| to_i32("topics", t).map(TopicHandle))
            .transpose()
    }

    async fn save_lead(&self, user: UserId, lead: LeadId) -> Result<()> {
        self.upsert(
            r#"INSERT INTO leads (user_id, lead_id, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET
                 lead_id = excluded.lead_id,
                 updated_at = excluded.updated_at"#,
            user.0,
            lead.0,
        )
        .await
    }

    async fn lead_for_user(&self, user: UserId) -> Result<Option<LeadId>> {
        let lead = self
            .get_scalar("SELECT lead_id FROM leads WHERE user_id = ?", user.0)
            .await?;
        Ok(lead.map(LeadId))
    }

    async fn leads(&self) -> Result<Vec<LeadBinding>> {
        let rows =
            sqlx::query_as::<_, LeadRow>("SELECT user_id, lead_id FROM leads ORDER BY lead_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|r| LeadBinding {
                user: UserId(r.user_id),
                lead: LeadId(r.lead_id),
            })
            .collect())
    }

    async fn comment_watermark(&self, lead: LeadId) -> Result<Option<i64>> {
        self.get_scalar(
            "SELECT last_comment_id FROM comment_watermarks WHERE lead_id = ?",
            lead.0,
        )
        .await
    }

    async fn set_comment_watermark(&self, lead: LeadId, comment_id: i64) -> Result<()> {
        self.upsert(
            r#"INSERT INTO comment_watermarks (lead_id, last_comment_id, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(lead_id) DO UPDATE SET
                 last_comment_id = excluded.last_comment_id,
                 updated_at = excluded.updated_at"#,
            lead.0,
            comment_id,
        )
        .await
    }

    async fn chat_watermark(&self, lead: LeadId) -> Result<Option<i64>> {
        self.get_scalar(
            "SELECT last_timestamp_ms FROM chat_watermarks WHERE lead_id = ?",
            lead.0,
        )
        .await
    }

    async fn set_chat_watermark(&self, lead: LeadId, timestamp_ms: i64) -> Result<()> {
        self.upsert(
            r#"INSERT INTO chat_watermarks (lead_id, last_timestamp_ms, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(lead_id) DO UPDATE SET
                 last_timestamp_ms = excluded.last_timestamp_ms,
                 updated_at = excluded.updated_at"#,
            lead.0,
            timestamp_ms,
        )
        .await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    async fn test_store() -> SqliteLinkStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::run_migrations(&pool).await.unwrap();
        SqliteLinkStore::with_pool(pool)
    }

    #[tokio::test]
    async fn link_roundtrip_and_overwrite() {
        let store = test_store().await;

        store.save_link(MessageHandle(42), UserId(7)).await.unwrap();
        assert_eq!(
            store.user_for_link(MessageHandle(42)).await.unwrap(),
            Some(UserId(7))
        );

        store.save_link(MessageHandle(42), UserId(8)).await.unwrap();
        assert_eq!(
            store.user_for_link(MessageHandle(42)).await.unwrap(),
            Some(UserId(8))
        );
    }

    #[tokio::test]
    async fn missing_keys_are_absent() {
        let store = test_store().await;
        assert!(store.user_for_link(MessageHandle(1)).await.unwrap().is_none());
        assert!(store.topic_for_user(UserId(1)).await.unwrap().is_none());
        assert!(store.lead_for_user(UserId(1)).await.unwrap().is_none());
        assert!(store.comment_watermark(LeadId(1)).await.unwrap().is_none());
        assert!(store.chat_watermark(LeadId(1)).await.unwrap().is_none());
        assert!(store.leads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn topic_and_lead_bindings() {
        let store = test_store().await;
        store.save_topic(UserId(5), TopicHandle(77)).await.unwrap();
        store.save_lead(UserId(5), LeadId(900)).await.unwrap();
        store.save_lead(UserId(6), LeadId(100)).await.unwrap();

        assert_eq!(
            store.topic_for_user(UserId(5)).await.unwrap(),
            Some(TopicHandle(77))
        );
        assert_eq!(
            store.lead_for_user(UserId(5)).await.unwrap(),
            Some(LeadId(900))
        );
        let leads = store.leads().await.unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].lead, LeadId(100));
        assert_eq!(leads[1].user, UserId(5));
    }

    #[rstest]
    #[case::comments(true)]
    #[case::chat(false)]
    #[tokio::test]
    async fn watermarks_upsert(#[case] comments: bool) {
        let store = test_store().await;
        let lead = LeadId(3);
        for value in [10, 25] {
            if comments {
                store.set_comment_watermark(lead, value).await.unwrap();
            } else {
                store.set_chat_watermark(lead, value).await.unwrap();
            }
        }
        let stored = if comments {
            store.comment_watermark(lead).await.unwrap()
        } else {
            store.chat_watermark(lead).await.unwrap()
        };
        assert_eq!(stored, Some(25));
    }

    #[tokio::test]
    async fn out_of_range_topic_is_an_error() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::run_migrations(&pool).await.unwrap();
        sqlx::query("INSERT INTO topics (user_id, topic_id, updated_at) VALUES (1, ?, 0)")
            .bind(i64::from(i32::MAX) + 1)
            .execute(&pool)
            .await
            .unwrap();
        let store = SqliteLinkStore::with_pool(pool);
        let err = store.topic_for_user(UserId(1)).await.unwrap_err();
        assert!(matches!(err, Error::OutOfRange { table: "topics", .. }));
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("links.db").display());

        {
            let store = SqliteLinkStore::new(&url).await.unwrap();
            store.save_link(MessageHandle(9), UserId(99)).await.unwrap();
            store.set_comment_watermark(LeadId(1), 40).await.unwrap();
            store.pool.close().await;
        }

        let store = SqliteLinkStore::new(&url).await.unwrap();
        assert_eq!(
            store.user_for_link(MessageHandle(9)).await.unwrap(),
            Some(UserId(99))
        );
        assert_eq!(store.comment_watermark(LeadId(1)).await.unwrap(), Some(40));
    }
}
