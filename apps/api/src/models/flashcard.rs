use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Provenance tag of a flashcard.
///
/// Invariant (enforced at the API boundary): `generation_id` must be non-null
/// iff the source is `ai-full`/`ai-edited`, and null iff the source is
/// `manual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlashcardSource {
    AiFull,
    AiEdited,
    Manual,
}

impl FlashcardSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashcardSource::AiFull => "ai-full",
            FlashcardSource::AiEdited => "ai-edited",
            FlashcardSource::Manual => "manual",
        }
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, FlashcardSource::AiFull | FlashcardSource::AiEdited)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FlashcardRow {
    pub id: i64,
    pub user_id: Uuid,
    pub front: String,
    pub back: String,
    pub source: String,
    pub generation_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-facing flashcard shape: the owner id never leaves the server.
/// `created_at == updated_at` signals "unmodified since creation".
#[derive(Debug, Clone, Serialize)]
pub struct FlashcardDto {
    pub id: i64,
    pub front: String,
    pub back: String,
    pub source: String,
    pub generation_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FlashcardRow> for FlashcardDto {
    fn from(row: FlashcardRow) -> Self {
        Self {
            id: row.id,
            front: row.front,
            back: row.back,
            source: row.source,
            generation_id: row.generation_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFlashcardDto {
    pub front: String,
    pub back: String,
    pub source: FlashcardSource,
    pub generation_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFlashcardsRequest {
    pub flashcards: Vec<CreateFlashcardDto>,
}

#[derive(Debug, Serialize)]
pub struct CreateFlashcardsResponse {
    pub flashcards: Vec<FlashcardDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFlashcardDto {
    pub front: Option<String>,
    pub back: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaginationInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct FlashcardListResponse {
    pub flashcards: Vec<FlashcardDto>,
    pub pagination: PaginationInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trips_through_kebab_case() {
        let source: FlashcardSource = serde_json::from_str("\"ai-full\"").unwrap();
        assert_eq!(source, FlashcardSource::AiFull);
        assert_eq!(source.as_str(), "ai-full");
        assert_eq!(serde_json::to_string(&FlashcardSource::Manual).unwrap(), "\"manual\"");
    }
}
