use crate::db::{Conversation, Database, Message, NewMessage, SenderRole};
use crate::summary::SummaryService;
use crate::translation::TranslationService;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Conversation not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ConversationError>;

/// Doctor-patient sessions: storage plus translation and summaries.
///
/// Only storage errors and unknown conversations surface from here;
/// translation and summarization always produce text.
#[derive(Clone)]
pub struct ConversationService {
    db: Database,
    translator: TranslationService,
    summarizer: SummaryService,
}

impl ConversationService {
    pub fn new(db: Database, translator: TranslationService, summarizer: SummaryService) -> Self {
        Self {
            db,
            translator,
            summarizer,
        }
    }

    pub async fn create_conversation(
        &self,
        doctor_language: &str,
        patient_language: &str,
    ) -> Result<Conversation> {
        let conversation = self
            .db
            .create_conversation(doctor_language, patient_language)
            .await?;
        info!(
            "Created conversation {} ({} <-> {})",
            conversation.id, doctor_language, patient_language
        );
        Ok(conversation)
    }

    pub async fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.db
            .get_conversation(id)
            .await?
            .ok_or(ConversationError::NotFound(id))
    }

    /// Store a typed message together with its translation into the other
    /// participant's language.
    pub async fn add_text_message(
        &self,
        conversation_id: Uuid,
        sender_role: SenderRole,
        text: &str,
    ) -> Result<Message> {
        let conversation = self.get_conversation(conversation_id).await?;
        let (source, target) = conversation.languages_for(sender_role);

        let translated = self.translator.translate(text, source, target).await;

        let message = self
            .db
            .insert_message(NewMessage {
                conversation_id,
                sender_role,
                original_text: Some(text),
                translated_text: Some(&translated),
                audio_url: None,
            })
            .await?;
        Ok(message)
    }

    /// Store an audio-only message; recordings are not translated.
    pub async fn add_audio_message(
        &self,
        conversation_id: Uuid,
        sender_role: SenderRole,
        audio_url: &str,
    ) -> Result<Message> {
        self.get_conversation(conversation_id).await?;

        let message = self
            .db
            .insert_message(NewMessage {
                conversation_id,
                sender_role,
                original_text: None,
                translated_text: None,
                audio_url: Some(audio_url),
            })
            .await?;
        Ok(message)
    }

    pub async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        Ok(self.db.get_messages(conversation_id).await?)
    }

    pub async fn search_messages(&self, query: &str) -> Result<Vec<Message>> {
        Ok(self.db.search_messages(query).await?)
    }

    pub async fn get_summary(&self, conversation_id: Uuid) -> Result<String> {
        self.get_conversation(conversation_id).await?;
        let messages = self.get_messages(conversation_id).await?;
        Ok(self.summarizer.summarize(&messages).await)
    }
}
