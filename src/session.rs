use anyhow::{Result, anyhow};
use tracing::{debug, info};

use crate::conversation::{Conversation, DEFAULT_TITLE, Message};
use crate::storage::StorageManager;

/// Owns the conversation list and the pointer to the current conversation.
///
/// New conversations go to the front of the list. Appending to a conversation
/// never moves it, so list order is creation order, newest first. Every change
/// to the list rewrites the whole persisted record.
pub struct ConversationStore {
    storage: StorageManager,
    conversations: Vec<Conversation>,
    current_id: Option<String>,
}

impl ConversationStore {
    /// Load the persisted list. The first conversation becomes current.
    pub fn load(storage: StorageManager) -> Result<Self> {
        let conversations = storage.load_conversations()?;
        let current_id = conversations.first().map(|c| c.id.clone());
        info!(count = conversations.len(), "loaded conversations");

        Ok(Self {
            storage,
            conversations,
            current_id,
        })
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    /// Current conversation, if the pointer names one that exists
    pub fn current(&self) -> Option<&Conversation> {
        self.current_id.as_deref().and_then(|id| self.get(id))
    }

    /// Create an empty conversation at the front of the list and make it current
    pub fn create_conversation(&mut self, initial_title: Option<&str>) -> Result<String> {
        let conversation = Conversation::new(initial_title.unwrap_or(DEFAULT_TITLE));
        let id = conversation.id.clone();
        debug!(%id, "created conversation");

        self.conversations.insert(0, conversation);
        let previous_current = self.current_id.replace(id.clone());
        if let Err(err) = self.persist() {
            self.conversations.remove(0);
            self.current_id = previous_current;
            return Err(err);
        }
        Ok(id)
    }

    /// Point at `id`. Unknown ids are accepted; `current()` then returns `None`.
    pub fn select_conversation(&mut self, id: &str) {
        self.current_id = Some(id.to_string());
    }

    /// Remove a conversation. Returns whether anything was removed.
    ///
    /// Deleting the current conversation moves the pointer to the first
    /// remaining one, or clears it.
    pub fn delete_conversation(&mut self, id: &str) -> Result<bool> {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        let removed = self.conversations.len() != before;

        if self.current_id.as_deref() == Some(id) {
            self.current_id = self.conversations.first().map(|c| c.id.clone());
        }

        if removed {
            debug!(%id, "deleted conversation");
            self.persist()?;
        }
        Ok(removed)
    }

    /// Append a user message; the first one also titles the conversation.
    ///
    /// When the list cannot be saved the conversation is left as it was.
    pub fn append_user_message(&mut self, conversation_id: &str, text: &str) -> Result<Message> {
        let message = Message::user(text);
        self.append(conversation_id, message.clone())?;
        Ok(message)
    }

    pub fn append_assistant_message(&mut self, conversation_id: &str, message: Message) -> Result<()> {
        self.append(conversation_id, message)
    }

    fn append(&mut self, conversation_id: &str, message: Message) -> Result<()> {
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == conversation_id)
            .ok_or_else(|| anyhow!("Conversation '{}' not found", conversation_id))?;

        let previous = self.conversations[index].clone();
        self.conversations[index].push(message);
        if let Err(err) = self.persist() {
            self.conversations[index] = previous;
            return Err(err);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        self.storage.save_conversations(&self.conversations)
    }
}
