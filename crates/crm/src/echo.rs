//! Recognising CRM content that courier wrote itself.

/// Prefix of every comment produced by [`crate::mirror::comment_text`].
pub const MIRROR_COMMENT_PREFIX: &str = "📩 Telegram client";

/// Decides whether a CRM comment is an echo of courier's own write.
pub trait SelfAuthored: Send + Sync {
    fn is_self_authored(&self, text: &str) -> bool;
}

/// Matches comments starting with any of a fixed list of prefixes.
#[derive(Debug, Clone)]
pub struct PrefixSelfAuthored {
    prefixes: Vec<String>,
}

impl PrefixSelfAuthored {
    /// Built-in mirror prefix plus `extra`. Blank entries are dropped.
    pub fn new(extra: impl IntoIterator<Item = String>) -> Self {
        let mut prefixes = vec![MIRROR_COMMENT_PREFIX.to_string()];
        prefixes.extend(
            extra
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        );
        Self { prefixes }
    }
}

impl Default for PrefixSelfAuthored {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SelfAuthored for PrefixSelfAuthored {
    fn is_self_authored(&self, text: &str) -> bool {
        let text = text.trim_start();
        self.prefixes.iter().any(|p| text.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_mirror_comments() {
        let echo = PrefixSelfAuthored::default();
        assert!(echo.is_self_authored("📩 Telegram client · 2024-05-01 10:00:00 UTC\nAnn"));
        assert!(echo.is_self_authored("  \n📩 Telegram client"));
        assert!(!echo.is_self_authored("Hi from CRM"));
    }

    #[test]
    fn extra_prefixes_are_trimmed_and_blank_ones_ignored() {
        let echo = PrefixSelfAuthored::new(vec!["  [bot] ".to_string(), "   ".to_string()]);
        assert!(echo.is_self_authored("[bot] auto-reply"));
        assert!(!echo.is_self_authored("anything"));
    }
}
