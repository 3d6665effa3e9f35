//! Lossy cache keys for conversations.
//!
//! A key keeps only a role tag and a short window from the start and end of
//! each message. Conversations that differ only in the middle of a message
//! (e.g. a long failure dump with different timings) map to the same key and
//! therefore reuse the same cached response. Collisions between unrelated
//! conversations are possible and are not detected.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::core::types::{Conversation, Role};

/// Characters taken from each end of a message.
pub const WINDOW_CHARS: usize = 12;

static CAMEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_][A-Za-z]").expect("valid camel regex"));
static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("valid slug regex"));

/// Compute the cache key for `conversation`.
///
/// Format per message: `[r]<start>|<end>`, concatenated in conversation order.
pub fn fingerprint(conversation: &Conversation) -> String {
    let mut key = String::new();
    for message in conversation.messages() {
        key.push_str(role_tag(message.role));
        key.push_str(&keyify(head(&message.content)));
        key.push('|');
        key.push_str(&keyify(tail(&message.content)));
    }
    key
}

fn role_tag(role: Role) -> &'static str {
    match role {
        Role::System => "[s]",
        Role::User => "[u]",
        Role::Assistant => "[a]",
    }
}

fn head(content: &str) -> &str {
    match content.char_indices().nth(WINDOW_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

fn tail(content: &str) -> &str {
    match content.char_indices().rev().nth(WINDOW_CHARS - 1) {
        Some((idx, _)) => &content[idx..],
        None => content,
    }
}

/// Collapse `-x`/`_x` joins, case-fold, turn spaces into `-`, and drop
/// everything outside `[a-z0-9_-]`.
fn keyify(fragment: &str) -> String {
    let camel = CAMEL_RE.replace_all(fragment, |caps: &Captures<'_>| {
        caps[0][1..].to_uppercase()
    });
    let slug = camel.to_lowercase().replace(' ', "-");
    NON_SLUG_RE.replace_all(&slug, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Message;

    fn conversation(system: &str, user: &str) -> Conversation {
        Conversation::new()
            .with(Message::system(system))
            .with(Message::user(user))
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let conv = conversation("You are a software engineer.", "FAIL tests/main.test.js");
        assert_eq!(fingerprint(&conv), fingerprint(&conv.clone()));
    }

    #[test]
    fn fingerprint_tags_roles_and_windows_content() {
        let conv = Conversation::new()
            .with(Message::system("You are a software engineer debugging"))
            .with(Message::assistant("ok"));
        assert_eq!(fingerprint(&conv), "[s]you-are-a-so|er-debugging[a]ok|ok");
    }

    #[test]
    fn fingerprint_ignores_middle_of_long_messages() {
        let first = conversation(
            "system prompt",
            "FAIL tests/main.test.js ... 120ms elapsed ... expected 2 to equal 3",
        );
        let second = conversation(
            "system prompt",
            "FAIL tests/main.test.js ... 987ms elapsed ... expected 2 to equal 3",
        );
        assert_eq!(fingerprint(&first), fingerprint(&second));
    }

    #[test]
    fn fingerprint_distinguishes_roles_and_edges() {
        let a = conversation("system prompt", "FAIL one");
        let b = conversation("system prompt", "FAIL two");
        assert_ne!(fingerprint(&a), fingerprint(&b));

        let user_only = Conversation::new().with(Message::user("same"));
        let system_only = Conversation::new().with(Message::system("same"));
        assert_ne!(fingerprint(&user_only), fingerprint(&system_only));
    }

    #[test]
    fn keyify_collapses_separators_and_strips_symbols() {
        assert_eq!(keyify("get_more-context"), "getmorecontext");
        assert_eq!(keyify("Hello, World!"), "hello-world");
        assert_eq!(keyify("a - b"), "a---b");
    }

    #[test]
    fn windows_respect_char_boundaries() {
        let content = "ééééééééééééééé";
        assert_eq!(head(content).chars().count(), WINDOW_CHARS);
        assert_eq!(tail(content).chars().count(), WINDOW_CHARS);
        assert_eq!(tail("short"), "short");
    }
}
