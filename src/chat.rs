use anyhow::Result;
use futures::StreamExt;
use tracing::{debug, error, info};

use crate::config::ProviderSettings;
use crate::conversation::{Message, derive_title};
use crate::llm::{ChatTurn, LlmClient};
use crate::session::ConversationStore;
use crate::storage::StorageManager;

/// How a turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The reply was stored in the conversation it was asked in
    Completed {
        conversation_id: String,
        message: Message,
    },
    /// Something above the streaming layer failed; the draft was dropped
    Aborted,
}

/// Ties the conversation store to the streaming adapter and the active settings.
pub struct ChatSession {
    store: ConversationStore,
    llm: LlmClient,
    settings: ProviderSettings,
    storage: StorageManager,
    env_fallback: bool,
    busy: bool,
}

impl ChatSession {
    pub fn new(
        store: ConversationStore,
        llm: LlmClient,
        settings: ProviderSettings,
        storage: StorageManager,
    ) -> Self {
        Self {
            store,
            llm,
            settings,
            storage,
            env_fallback: false,
            busy: false,
        }
    }

    /// Load conversations and settings from `storage`. Blank keys fall back to
    /// the provider environment variables when a turn is sent.
    pub fn open(storage: StorageManager, llm: LlmClient) -> Result<Self> {
        let store = ConversationStore::load(storage.clone())?;
        let settings = storage.load_settings()?;
        let mut session = Self::new(store, llm, settings, storage);
        session.env_fallback = true;
        Ok(session)
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConversationStore {
        &mut self.store
    }

    /// Settings as saved
    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Settings a turn sent now would use
    pub fn effective_settings(&self) -> ProviderSettings {
        if self.env_fallback {
            self.settings.clone().with_env_fallback()
        } else {
            self.settings.clone()
        }
    }

    /// Replace the settings used by later turns and persist them
    pub fn save_settings(&mut self, settings: ProviderSettings) -> Result<()> {
        self.storage.save_settings(&settings)?;
        info!(provider = %settings.selected_provider, "saved settings");
        self.settings = settings;
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Send `text` in the current conversation and stream the reply.
    ///
    /// With no current conversation a new one is created, titled from `text`.
    /// `on_update` sees the whole draft reply after every fragment.
    pub async fn send_message<F>(&mut self, text: &str, mut on_update: F) -> TurnOutcome
    where
        F: FnMut(&str),
    {
        self.busy = true;
        let outcome = match self.run_turn(text, &mut on_update).await {
            Ok((conversation_id, message)) => TurnOutcome::Completed {
                conversation_id,
                message,
            },
            Err(err) => {
                error!(error = %err, "turn aborted");
                TurnOutcome::Aborted
            }
        };
        self.busy = false;
        outcome
    }

    async fn run_turn(
        &mut self,
        text: &str,
        on_update: &mut dyn FnMut(&str),
    ) -> Result<(String, Message)> {
        let (conversation_id, history) = self.start_turn(text)?;

        let settings = self.effective_settings();
        let mut fragments = self.llm.stream(history, &settings);
        let mut draft = Message::assistant_draft();
        while let Some(fragment) = fragments.next().await {
            draft.push_fragment(&fragment);
            on_update(&draft.content);
        }
        debug!(chars = draft.content.len(), "reply finished");

        self.finish_turn(&conversation_id, draft.clone())?;
        Ok((conversation_id, draft))
    }

    /// Record the user message and return the target conversation with the
    /// history to send
    fn start_turn(&mut self, text: &str) -> Result<(String, Vec<ChatTurn>)> {
        let current = self.store.current().map(|c| c.id.clone());
        let conversation_id = match current {
            Some(id) => id,
            None => self
                .store
                .create_conversation(Some(derive_title(text).as_str()))?,
        };

        self.store.append_user_message(&conversation_id, text)?;
        let history = self
            .store
            .get(&conversation_id)
            .map(|c| c.messages.iter().map(ChatTurn::from).collect())
            .unwrap_or_default();
        Ok((conversation_id, history))
    }

    /// Store the reply in the conversation the turn started in, which may no
    /// longer be current
    fn finish_turn(&mut self, conversation_id: &str, reply: Message) -> Result<()> {
        self.store.append_assistant_message(conversation_id, reply)
    }
}
