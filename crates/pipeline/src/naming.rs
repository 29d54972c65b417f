//! First-turn chat naming.
//!
//! On a chat's first turn the model is asked to open its answer with
//! `The name of this chat is <title>`. This module pulls that title out and
//! removes the directive sentence from the text shown to the user.

use std::sync::LazyLock;

use regex_lite::Regex;

/// The directive sentence, with any emphasis markers wrapped around it.
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[*_]*The name of this chat is (.+?)(\.|\n|$)[*_]*")
        .expect("naming pattern is a valid regex")
});

/// Characters stripped from both ends of a captured title.
const TITLE_DECORATIONS: &[char] = &['"', '\'', '`', '*', '_', '“', '”', '‘', '’'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatName {
    pub title: String,
    /// The reply with the naming sentence removed.
    pub stripped: String,
}

/// Find the naming directive in a model reply.
///
/// Returns `None` when there is no directive or its title is blank.
pub fn extract_chat_name(text: &str) -> Option<ChatName> {
    let caps = NAME_PATTERN.captures(text)?;
    let whole = caps.get(0)?;
    let raw_title = caps.get(1)?.as_str();

    let title = raw_title
        .trim()
        .trim_matches(TITLE_DECORATIONS)
        .trim()
        .to_string();
    if title.is_empty() {
        return None;
    }

    let mut remainder = String::with_capacity(text.len());
    remainder.push_str(&text[..whole.start()]);
    remainder.push_str(&text[whole.end()..]);
    let remainder = remainder.trim();

    let stripped = if remainder.is_empty() {
        text.to_string()
    } else {
        remainder.to_string()
    };

    Some(ChatName { title, stripped })
}
