//! Startup validation. Errors here are the only fatal errors of the service.

use secrecy::ExposeSecret;

use crate::schema::CourierConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "telegram.group_id"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

impl CourierConfig {
    /// Check the settings the service cannot start without.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        let token = self.telegram.token.expose_secret();
        if token.trim().is_empty() {
            result.push(
                Severity::Error,
                "telegram.token",
                "bot token is not set (config or BOT_TOKEN)",
            );
        } else if token.contains("${") {
            result.push(
                Severity::Error,
                "telegram.token",
                "bot token references an unset environment variable",
            );
        }

        match self.telegram.group_id {
            0 => result.push(
                Severity::Error,
                "telegram.group_id",
                "operator group id is not set (config or GROUP_ID)",
            ),
            id if id > 0 => result.push(
                Severity::Warning,
                "telegram.group_id",
                format!("{id} looks like a private chat id; group ids are negative"),
            ),
            _ => {},
        }

        if self.telegram.use_topics && self.telegram.topic_name_max_len == 0 {
            result.push(
                Severity::Error,
                "telegram.topic_name_max_len",
                "must be greater than zero",
            );
        }

        if self.storage.database_url.trim().is_empty() {
            result.push(Severity::Error, "storage.database_url", "must not be empty");
        }

        let crm = &self.crm;
        if crm.enabled {
            if crm.base_url.trim().is_empty() {
                result.push(Severity::Error, "crm.base_url", "required when crm is enabled");
            } else if !(crm.base_url.starts_with("http://") || crm.base_url.starts_with("https://"))
            {
                result.push(
                    Severity::Error,
                    "crm.base_url",
                    format!("{} is not an http(s) URL", crm.base_url),
                );
            }
            if crm.login.trim().is_empty() {
                result.push(Severity::Error, "crm.login", "required when crm is enabled");
            }
            if crm.poll_interval_secs == 0 {
                result.push(
                    Severity::Error,
                    "crm.poll_interval_secs",
                    "must be greater than zero",
                );
            }
        } else if !crm.base_url.is_empty() {
            result.push(
                Severity::Info,
                "crm.enabled",
                "crm.base_url is set but the CRM mirror is disabled",
            );
        }

        result
    }
}
