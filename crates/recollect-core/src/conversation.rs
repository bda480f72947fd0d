//! Conversation transcripts
//!
//! A saved conversation is stored verbatim (the JSON message list) but indexed
//! by a short generated summary: the opening user requests, the first and last
//! assistant replies, and any `<bash>` / `<python>` commands that were issued.

use serde::{Deserialize, Serialize};

/// User messages quoted in a summary
const SUMMARY_USER_MESSAGES: usize = 3;
/// Commands listed in a summary
const SUMMARY_COMMANDS: usize = 5;
/// Excerpt length when first and last assistant replies are both shown
const REPLY_EXCERPT: usize = 200;
/// Excerpt length for a single assistant reply
const SINGLE_REPLY_EXCERPT: usize = 300;

const COMMAND_TAGS: &[&str] = &["bash", "python"];

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Plain-text summary of a conversation, used as its embedding text
pub fn summarize(messages: &[ConversationMessage]) -> String {
    let mut sections = Vec::new();

    let user: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == "user")
        .take(SUMMARY_USER_MESSAGES)
        .map(|m| m.content.trim())
        .collect();
    if !user.is_empty() {
        sections.push(format!("User requests:\n- {}", user.join("\n- ")));
    }

    let assistant: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == "assistant")
        .map(|m| m.content.trim())
        .collect();
    match assistant.as_slice() {
        [] => {}
        [only] => sections.push(format!(
            "Assistant reply: {}",
            excerpt(only, SINGLE_REPLY_EXCERPT)
        )),
        [first, .., last] => {
            sections.push(format!(
                "First assistant reply: {}",
                excerpt(first, REPLY_EXCERPT)
            ));
            sections.push(format!(
                "Last assistant reply: {}",
                excerpt(last, REPLY_EXCERPT)
            ));
        }
    }

    let commands: Vec<String> = messages
        .iter()
        .flat_map(|m| extract_commands(&m.content))
        .take(SUMMARY_COMMANDS)
        .collect();
    if !commands.is_empty() {
        sections.push(format!("Commands:\n- {}", commands.join("\n- ")));
    }

    sections.join("\n\n")
}

/// Commands wrapped in `<bash>` or `<python>` tags, in order of appearance.
/// An unclosed tag ends the scan.
pub fn extract_commands(text: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut rest = text;

    loop {
        let next = COMMAND_TAGS
            .iter()
            .filter_map(|tag| rest.find(&format!("<{tag}>")).map(|pos| (pos, *tag)))
            .min_by_key(|(pos, _)| *pos);
        let Some((start, tag)) = next else {
            break;
        };

        let body_start = start + tag.len() + 2;
        let close = format!("</{tag}>");
        let Some(len) = rest[body_start..].find(&close) else {
            break;
        };

        let command = rest[body_start..body_start + len].trim();
        if !command.is_empty() {
            commands.push(format!("{tag}: {command}"));
        }
        rest = &rest[body_start + len + close.len()..];
    }

    commands
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}
