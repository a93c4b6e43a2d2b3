//! Operator-facing text: client headers, topic names and warnings.
//!
//! Everything here is Telegram HTML; user-supplied fragments go through
//! [`escape_html`].

use courier_channels::{EndUser, UserId};

/// Escape the characters Telegram's HTML parser treats as markup.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Telegram's per-message text limit, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

const TRUNCATION_MARK: &str = "\n… [truncated]";

/// Escape `s` into at most `budget` characters. Overlong input is cut
/// between escapes and marked.
fn escape_html_capped(s: &str, budget: usize) -> String {
    let escaped = escape_html(s);
    if escaped.chars().count() <= budget {
        return escaped;
    }
    let budget = budget.saturating_sub(TRUNCATION_MARK.chars().count());
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let piece = escape_html(c.encode_utf8(&mut [0; 4]));
        let len = piece.chars().count();
        if used + len > budget {
            break;
        }
        out.push_str(&piece);
        used += len;
    }
    out.push_str(TRUNCATION_MARK);
    out
}

/// Cut `s` to at most `max` characters, never splitting a code point.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Who the client is and how to answer them.
#[must_use]
pub fn client_header(user: &EndUser) -> String {
    let username = user
        .handle()
        .map_or_else(|| "none".to_string(), |h| escape_html(&h));
    format!(
        "👤 <b>Client</b>: {}\n\
         🔗 <b>Username</b>: {username}\n\
         🆔 <b>ID</b>: <code>{}</code>\n\
         ✍️ <i>Reply to this message and the bot will forward your answer to the client.</i>",
        escape_html(user.display_name.trim()),
        user.id,
    )
}

/// Header plus the client's text, sent as one message.
///
/// The result never exceeds [`MAX_MESSAGE_CHARS`], even as plain text, so
/// overlong client text is truncated for the operators.
#[must_use]
pub fn text_message(user: &EndUser, text: &str) -> String {
    let head = format!("{}\n\n💬 <b>Message:</b>\n", client_header(user));
    let budget = MAX_MESSAGE_CHARS.saturating_sub(head.chars().count());
    head + &escape_html_capped(text, budget)
}

/// Follow-up posted after a copied attachment.
#[must_use]
pub fn attachment_note(user: &EndUser) -> String {
    format!(
        "{}\n\n📎 <b>The client sent an attachment.</b>\n\
         ↩️ <b>Reply to the copied attachment</b> and the bot will forward your answer to the client.",
        client_header(user)
    )
}

/// Forum topic name for a client, cut to `max_len` characters.
#[must_use]
pub fn topic_name(user: &EndUser, max_len: usize) -> String {
    let name = match user.handle() {
        Some(handle) => format!("{} ({handle})", user.name_or_fallback()),
        None if user.display_name.trim().is_empty() => user.name_or_fallback(),
        None => format!("{} · {}", user.name_or_fallback(), user.id),
    };
    truncate_chars(&name, max_len).to_string()
}

pub const NOT_A_REPLY_WARNING: &str = "⚠️ Use <b>Reply</b> on a client's message (the one with the client header, \
     or the copied attachment) so the bot knows who should receive your answer.";

pub const UNKNOWN_TARGET_WARNING: &str = "⚠️ The message you replied to is not linked to a client. \
     Reply to a message with the client header, or to the copied attachment.";

#[must_use]
pub fn topic_fallback_warning(user: &EndUser) -> String {
    format!(
        "⚠️ Could not open a topic for {} (id <code>{}</code>); the message below is posted here instead.",
        escape_html(&user.name_or_fallback()),
        user.id
    )
}

#[must_use]
pub fn delivery_failure_warning(user: UserId, error: &impl std::fmt::Display) -> String {
    format!(
        "⚠️ Could not deliver the reply to client <code>{user}</code>: {}",
        escape_html(&error.to_string())
    )
}

#[must_use]
pub fn crm_failure_warning(user: &EndUser, error: &impl std::fmt::Display) -> String {
    format!(
        "⚠️ CRM: the message from {} (id <code>{}</code>) was not recorded: {}",
        escape_html(&user.name_or_fallback()),
        user.id,
        escape_html(&error.to_string())
    )
}
