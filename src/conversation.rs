use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Title given to a conversation before its first user message arrives.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Longest title, in characters, derived from a user message.
pub const TITLE_MAX_CHARS: usize = 50;

/// Who authored a message
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Empty assistant message that fragments are appended to while a reply streams in.
    pub fn assistant_draft() -> Self {
        Self::new(Role::Assistant, String::new())
    }

    pub fn push_fragment(&mut self, fragment: &str) {
        self.content.push_str(fragment);
    }
}

/// A titled, ordered list of messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    /// Append a message, refreshing `updated_at`. The first user message renames the conversation.
    pub fn push(&mut self, message: Message) {
        if message.role == Role::User && !self.has_user_message() {
            self.title = derive_title(&message.content);
        }
        self.messages.push(message);
        self.updated_at = Utc::now();
    }
}

/// Title for a conversation whose first user message is `text`.
///
/// The text is trimmed and cut to [`TITLE_MAX_CHARS`] characters, with `...`
/// marking a cut. Blank text keeps [`DEFAULT_TITLE`].
pub fn derive_title(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return DEFAULT_TITLE.to_string();
    }

    if text.chars().count() <= TITLE_MAX_CHARS {
        return text.to_string();
    }

    let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_becomes_title_verbatim() {
        assert_eq!(
            derive_title("Explain recursion in programming"),
            "Explain recursion in programming"
        );
        assert_eq!(derive_title("  padded question \n"), "padded question");
    }

    #[test]
    fn long_text_is_cut_on_a_char_boundary() {
        let text = "é".repeat(60);
        let title = derive_title(&text);
        assert_eq!(title, format!("{}...", "é".repeat(TITLE_MAX_CHARS)));
    }

    #[test]
    fn blank_text_keeps_default_title() {
        assert_eq!(derive_title("   "), DEFAULT_TITLE);
    }

    #[test]
    fn only_first_user_message_renames() {
        let mut conversation = Conversation::new(DEFAULT_TITLE);
        conversation.push(Message::user("What is a closure?"));
        conversation.push(Message::new(Role::Assistant, "A function value..."));
        conversation.push(Message::user("And a thunk?"));

        assert_eq!(conversation.title, "What is a closure?");
        assert_eq!(conversation.messages.len(), 3);
    }

    #[test]
    fn assistant_first_does_not_rename() {
        let mut conversation = Conversation::new(DEFAULT_TITLE);
        conversation.push(Message::new(Role::Assistant, "Hello!"));
        assert_eq!(conversation.title, DEFAULT_TITLE);

        conversation.push(Message::user("Hi"));
        assert_eq!(conversation.title, "Hi");
    }

    #[test]
    fn push_refreshes_updated_at() {
        let mut conversation = Conversation::new(DEFAULT_TITLE);
        let before = conversation.updated_at;
        conversation.push(Message::user("hello"));
        assert!(conversation.updated_at >= before);
        assert_eq!(conversation.created_at, before);
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
