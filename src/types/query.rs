//! Conversation, result, and reference models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::engine::QueryEngine;

/// A resolved pointer from a query result back to the chunk of text that
/// grounded part of the answer. Chunk text and document URL are denormalized
/// at creation so the reference stays valid if the chunk is later deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryReference {
    /// Unique reference ID
    pub id: Uuid,
    /// Owning engine
    pub engine_id: Uuid,
    /// Engine name at query time
    pub engine_name: String,
    /// Source document
    pub document_id: Uuid,
    /// Source document URL
    pub document_url: String,
    /// Chunk the text was copied from, if it still exists
    pub chunk_id: Option<Uuid>,
    /// Denormalized chunk text for display
    pub chunk_text: String,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl QueryReference {
    /// Create a reference for a retrieved chunk
    pub fn new(
        engine: &QueryEngine,
        document_id: Uuid,
        document_url: String,
        chunk_id: Option<Uuid>,
        chunk_text: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine_id: engine.id,
            engine_name: engine.name.clone(),
            document_id,
            document_url,
            chunk_id,
            chunk_text,
            created_at: chrono::Utc::now(),
        }
    }

    /// Compact summary stored in conversation history
    pub fn summary(&self) -> ReferenceSummary {
        ReferenceSummary {
            reference_id: self.id,
            document_url: self.document_url.clone(),
            chunk_id: self.chunk_id,
            chunk_text: self.chunk_text.clone(),
        }
    }
}

/// Trimmed reference view embedded in history entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSummary {
    pub reference_id: Uuid,
    pub document_url: String,
    pub chunk_id: Option<Uuid>,
    pub chunk_text: String,
}

/// The generated answer for one retrieval call; immutable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Unique result ID
    pub id: Uuid,
    /// Owning engine
    pub engine_id: Uuid,
    /// Engine name at query time
    pub engine_name: String,
    /// Ordered reference ids that grounded this answer
    pub reference_ids: Vec<Uuid>,
    /// Generated answer text
    pub response: String,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl QueryResult {
    /// Create a result over the given ordered references
    pub fn new(engine: &QueryEngine, references: &[QueryReference], response: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine_id: engine.id,
            engine_name: engine.name.clone(),
            reference_ids: references.iter().map(|r| r.id).collect(),
            response,
            created_at: chrono::Utc::now(),
        }
    }
}

/// One entry in a conversation's append-only history log.
/// Entries alternate human / AI pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// A user turn
    Human {
        content: String,
    },
    /// A model turn, carrying the references used to produce it
    Ai {
        content: String,
        references: Vec<ReferenceSummary>,
    },
}

impl HistoryEntry {
    /// Whether this is a user turn
    pub fn is_human(&self) -> bool {
        matches!(self, Self::Human { .. })
    }

    /// Whether this is a model turn
    pub fn is_ai(&self) -> bool {
        matches!(self, Self::Ai { .. })
    }

    /// Turn text, regardless of role
    pub fn content(&self) -> &str {
        match self {
            Self::Human { content } | Self::Ai { content, .. } => content,
        }
    }
}

/// One conversation thread against one engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserQuery {
    /// Unique query ID
    pub id: Uuid,
    /// Owning user
    pub user_id: String,
    /// Optional display title
    pub title: Option<String>,
    /// Engine this conversation is bound to
    pub engine_id: Uuid,
    /// Initial prompt
    pub prompt: String,
    /// Latest response
    pub response: Option<String>,
    /// Append-only history of alternating human/AI turns
    pub history: Vec<HistoryEntry>,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last modification timestamp
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl UserQuery {
    /// Create a conversation from its first prompt
    pub fn new(user_id: String, engine_id: Uuid, prompt: String) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: None,
            engine_id,
            prompt,
            response: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append one human/AI turn pair to the history.
    /// Earlier entries are never rewritten.
    pub fn append_turn(
        &mut self,
        prompt: &str,
        response: &str,
        references: &[QueryReference],
    ) {
        self.history.push(HistoryEntry::Human {
            content: prompt.to_string(),
        });
        self.history.push(HistoryEntry::Ai {
            content: response.to_string(),
            references: references.iter().map(|r| r.summary()).collect(),
        });
        self.response = Some(response.to_string());
        self.updated_at = chrono::Utc::now();
    }
}
