/// Config schema types (telegram, crm, storage).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub telegram: TelegramConfig,
    pub crm: CrmConfig,
    pub storage: StorageConfig,
}

/// Telegram bot and operator group.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Chat id of the operator group (negative for supergroups).
    pub group_id: i64,

    /// Open one forum topic per client. Requires a forum-enabled group and
    /// the "manage topics" admin right; when off every client shares the
    /// general area.
    pub use_topics: bool,

    /// Maximum topic name length accepted by Telegram.
    pub topic_name_max_len: usize,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("group_id", &self.group_id)
            .field("use_topics", &self.use_topics)
            .finish_non_exhaustive()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            group_id: 0,
            use_topics: true,
            topic_name_max_len: 128,
        }
    }
}

/// How inbound client messages are written into the CRM.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrmWriteMode {
    /// Try the lead's live chat first, fall back to a comment.
    DualChannel,
    /// Always write a comment.
    #[default]
    CommentOnly,
}

/// CRM mirror and reverse sync.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    pub enabled: bool,

    /// API root, e.g. `https://crm.example.com/api/v1`.
    pub base_url: String,

    pub login: String,

    #[serde(serialize_with = "serialize_secret")]
    pub password: Secret<String>,

    pub write_mode: CrmWriteMode,

    /// Seconds between two reverse-sync cycles.
    pub poll_interval_secs: u64,

    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,

    /// Name of the lead custom field that receives the client's @handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username_field: Option<String>,

    /// Extra comment prefixes treated as written by courier itself, on top
    /// of the built-in templates.
    pub self_authored_prefixes: Vec<String>,
}

impl std::fmt::Debug for CrmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("write_mode", &self.write_mode)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish_non_exhaustive()
    }
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            login: String::new(),
            password: Secret::new(String::new()),
            write_mode: CrmWriteMode::default(),
            poll_interval_secs: 15,
            request_timeout_secs: 30,
            username_field: None,
            self_authored_prefixes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sqlx connection URL; `mode=rwc` creates the file on first start.
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://courier.db?mode=rwc".into(),
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
