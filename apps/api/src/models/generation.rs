use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::flashcard::FlashcardDto;

/// An AI-generated front/back pair awaiting user review. Never persisted as
/// a flashcard directly; it becomes one only through explicit acceptance.
/// The id is opaque and unique within a generation, not derived from content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardProposal {
    pub id: String,
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Processing,
    Completed,
    Error,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct GenerationRow {
    pub id: i64,
    pub user_id: Uuid,
    pub model: String,
    pub source_text: String,
    pub source_text_length: i32,
    pub source_text_hash: String,
    pub generated_count: i32,
    pub accepted_unedited_count: i32,
    pub accepted_edited_count: i32,
    /// Wall-clock duration of the AI call plus recovery, in milliseconds.
    pub generation_duration: i64,
    pub status: String,
    pub flashcards_proposals: Json<Vec<FlashcardProposal>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GenerationDto {
    pub generation_id: i64,
    pub model: String,
    pub generated_count: i32,
    pub accepted_unedited_count: i32,
    pub accepted_edited_count: i32,
    pub source_text_hash: String,
    pub source_text_length: i32,
    pub generation_duration: i64,
    pub status: String,
    pub flashcards_proposals: Vec<FlashcardProposal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GenerationRow> for GenerationDto {
    fn from(row: GenerationRow) -> Self {
        Self {
            generation_id: row.id,
            model: row.model,
            generated_count: row.generated_count,
            accepted_unedited_count: row.accepted_unedited_count,
            accepted_edited_count: row.accepted_edited_count,
            source_text_hash: row.source_text_hash,
            source_text_length: row.source_text_length,
            generation_duration: row.generation_duration,
            status: row.status,
            flashcards_proposals: row.flashcards_proposals.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// List item; the proposal payload is dropped to keep the listing light.
#[derive(Debug, Serialize)]
pub struct GenerationListItem {
    pub generation_id: i64,
    pub model: String,
    pub generated_count: i32,
    pub accepted_unedited_count: i32,
    pub accepted_edited_count: i32,
    pub source_text_length: i32,
    pub generation_duration: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GenerationRow> for GenerationListItem {
    fn from(row: GenerationRow) -> Self {
        Self {
            generation_id: row.id,
            model: row.model,
            generated_count: row.generated_count,
            accepted_unedited_count: row.accepted_unedited_count,
            accepted_edited_count: row.accepted_edited_count,
            source_text_length: row.source_text_length,
            generation_duration: row.generation_duration,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerationListResponse {
    pub generations: Vec<GenerationListItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateGenerationRequest {
    pub source_text: String,
    pub model_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateGenerationResponse {
    pub generation_id: i64,
    pub flashcards_proposals: Vec<FlashcardProposal>,
    pub generated_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditStatus {
    Edited,
    Unedited,
}

#[derive(Debug, Deserialize)]
pub struct AcceptFlashcardDto {
    pub proposal_id: String,
    pub front: String,
    pub back: String,
    pub edit_status: EditStatus,
}

#[derive(Debug, Deserialize)]
pub struct AcceptFlashcardsRequest {
    pub accepted_flashcards: Vec<AcceptFlashcardDto>,
}

#[derive(Debug, Serialize)]
pub struct AcceptFlashcardsResponse {
    pub generation_id: i64,
    pub accepted_count: usize,
    pub accepted_flashcards: Vec<FlashcardDto>,
    pub accepted_unedited_count: i32,
    pub accepted_edited_count: i32,
}

/// Append-only audit row for failed generations. Never read back by the
/// orchestrator; exposed through the error-log listing endpoint only.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GenerationErrorLogRow {
    pub id: i64,
    pub generation_id: i64,
    pub error_code: String,
    pub error_message: String,
    pub stack_trace: Option<String>,
    pub model: String,
    pub source_text_hash: String,
    pub source_text_length: i32,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GenerationErrorLogsResponse {
    pub total: i64,
    pub logs: Vec<GenerationErrorLogRow>,
}

#[derive(Debug, Serialize)]
pub struct ModelUsageStats {
    pub model: String,
    pub count: i64,
    pub average_duration: i64,
}

#[derive(Debug, Serialize)]
pub struct GenerationStatistics {
    pub total_generations: i64,
    pub total_generated_flashcards: i64,
    pub total_accepted_flashcards: i64,
    pub acceptance_rate: f64,
    pub total_unedited_accepted: i64,
    pub total_edited_accepted: i64,
    pub edit_rate: f64,
    pub models_used: Vec<ModelUsageStats>,
}
