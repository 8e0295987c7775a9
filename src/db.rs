use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SenderRole {
    Doctor,
    Patient,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Doctor => "DOCTOR",
            SenderRole::Patient => "PATIENT",
        }
    }
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SenderRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DOCTOR" => Ok(SenderRole::Doctor),
            "PATIENT" => Ok(SenderRole::Patient),
            other => bail!("Unknown sender role: '{}'", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub doctor_language: String,
    pub patient_language: String,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// (source, target) languages for an utterance by `role`
    pub fn languages_for(&self, role: SenderRole) -> (&str, &str) {
        match role {
            SenderRole::Doctor => (&self.doctor_language, &self.patient_language),
            SenderRole::Patient => (&self.patient_language, &self.doctor_language),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_role: SenderRole,
    pub original_text: Option<String>,
    pub translated_text: Option<String>,
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when appending a message
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub conversation_id: Uuid,
    pub sender_role: SenderRole,
    pub original_text: Option<&'a str>,
    pub translated_text: Option<&'a str>,
    pub audio_url: Option<&'a str>,
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: String,
    doctor_language: String,
    patient_language: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = anyhow::Error;

    fn try_from(row: ConversationRow) -> Result<Self> {
        Ok(Self {
            id: Uuid::parse_str(&row.id).context("Invalid conversation id in database")?,
            doctor_language: row.doctor_language,
            patient_language: row.patient_language,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    conversation_id: String,
    sender_role: String,
    original_text: Option<String>,
    translated_text: Option<String>,
    audio_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Self {
            id: Uuid::parse_str(&row.id).context("Invalid message id in database")?,
            conversation_id: Uuid::parse_str(&row.conversation_id)
                .context("Invalid conversation id in database")?,
            sender_role: row.sender_role.parse()?,
            original_text: row.original_text,
            translated_text: row.translated_text,
            audio_url: row.audio_url,
            created_at: row.created_at,
        })
    }
}

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_role, original_text, translated_text, audio_url, created_at";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect and create tables
    pub async fn new(database_url: &str) -> Result<Self> {
        // An in-memory database lives only as long as its single connection
        let in_memory = database_url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .min_connections(if in_memory { 1 } else { 0 })
            .idle_timeout(if in_memory { None } else { Some(std::time::Duration::from_secs(600)) })
            .max_lifetime(if in_memory { None } else { Some(std::time::Duration::from_secs(1800)) })
            .connect(database_url)
            .await
            .context(format!("Failed to open database at {}", database_url))?;

        let db = Self { pool };
        db.create_tables().await?;
        Ok(db)
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                doctor_language TEXT NOT NULL,
                patient_language TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create conversations table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                sender_role TEXT NOT NULL,
                original_text TEXT,
                translated_text TEXT,
                audio_url TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create messages table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation
             ON messages (conversation_id)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create messages index")?;

        Ok(())
    }

    pub async fn create_conversation(
        &self,
        doctor_language: &str,
        patient_language: &str,
    ) -> Result<Conversation> {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            doctor_language: doctor_language.to_string(),
            patient_language: patient_language.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO conversations (id, doctor_language, patient_language, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(conversation.id.to_string())
        .bind(&conversation.doctor_language)
        .bind(&conversation.patient_language)
        .bind(conversation.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create conversation")?;

        Ok(conversation)
    }

    pub async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        let row: Option<ConversationRow> = sqlx::query_as(
            "SELECT id, doctor_language, patient_language, created_at
             FROM conversations WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch conversation")?;

        row.map(Conversation::try_from).transpose()
    }

    pub async fn insert_message(&self, new: NewMessage<'_>) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: new.conversation_id,
            sender_role: new.sender_role,
            original_text: new.original_text.map(str::to_string),
            translated_text: new.translated_text.map(str::to_string),
            audio_url: new.audio_url.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(&format!(
            "INSERT INTO messages ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            MESSAGE_COLUMNS
        ))
        .bind(message.id.to_string())
        .bind(message.conversation_id.to_string())
        .bind(message.sender_role.as_str())
        .bind(&message.original_text)
        .bind(&message.translated_text)
        .bind(&message.audio_url)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert message")?;

        Ok(message)
    }

    /// Messages of a conversation, oldest first (insertion order is creation order)
    pub async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY seq ASC",
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch messages")?;

        rows.into_iter().map(Message::try_from).collect()
    }

    /// Case-insensitive substring search over original and translated text
    pub async fn search_messages(&self, query: &str) -> Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM messages
             WHERE instr(lower(coalesce(original_text, '')), lower(?1)) > 0
                OR instr(lower(coalesce(translated_text, '')), lower(?1)) > 0
             ORDER BY seq ASC",
            MESSAGE_COLUMNS
        ))
        .bind(query)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search messages")?;

        rows.into_iter().map(Message::try_from).collect()
    }
}
