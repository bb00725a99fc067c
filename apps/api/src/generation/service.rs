//! Generation orchestrator: the top-level AI generation use case.
//!
//! Flow: resolve model → hash source text → prompt the gateway (rate-limited,
//! retried) → run the response recovery pipeline → persist the generation
//! record → return proposals. One top-level catch writes a best-effort error
//! log row before re-throwing the original error.

use std::time::Instant;

use sha2::{Digest, Sha256};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::ai_client::catalog::{model_by_id, AiModel};
use crate::ai_client::{flashcards_response_format, ModelParameters, OpenRouterClient};
use crate::errors::AppError;
use crate::generation::prompts::{GENERATION_PROMPT_TEMPLATE, GENERATION_SYSTEM};
use crate::generation::recovery::recover_proposals;
use crate::models::generation::{
    CreateGenerationResponse, FlashcardProposal, GenerationRow, GenerationStatus,
};

/// Creates a generation: calls the AI gateway, recovers proposals and
/// persists the completed record. Any failure along the way is logged to the
/// error-log store before propagating.
pub async fn create_generation(
    pool: &PgPool,
    ai: &OpenRouterClient,
    user_id: Uuid,
    source_text: &str,
    model_id: Option<&str>,
) -> Result<CreateGenerationResponse, AppError> {
    let model = model_by_id(model_id);

    match run_generation(pool, ai, user_id, source_text, model).await {
        Ok(response) => Ok(response),
        Err(e) => {
            log_generation_error(pool, user_id, model, &e).await;
            Err(e)
        }
    }
}

async fn run_generation(
    pool: &PgPool,
    ai: &OpenRouterClient,
    user_id: Uuid,
    source_text: &str,
    model: &AiModel,
) -> Result<CreateGenerationResponse, AppError> {
    // Content-addressing hash, stored for audit only. Never used to
    // short-circuit or deduplicate generations.
    let source_text_hash = hash_source_text(source_text);
    let source_text_length = source_text.chars().count() as i32;

    info!(
        "Starting generation: model={}, source_length={}",
        model.model_path, source_text_length
    );

    let started = Instant::now();

    let prompt = GENERATION_PROMPT_TEMPLATE.replace("{source_text}", source_text);
    let response_format = flashcards_response_format();
    let response = ai
        .send_chat_request(
            model.model_path,
            GENERATION_SYSTEM,
            &prompt,
            &ModelParameters::default(),
            Some(&response_format),
        )
        .await
        .map_err(AppError::Ai)?;

    let proposals = recover_proposals(response.content().map_err(AppError::Ai)?)
        .map_err(AppError::Ai)?;

    let generation_duration = started.elapsed().as_millis() as i64;

    let row = insert_generation(
        pool,
        user_id,
        model,
        source_text,
        source_text_length,
        &source_text_hash,
        &proposals,
        generation_duration,
    )
    .await?;

    info!(
        "Generation {} completed: {} proposals in {}ms",
        row.id,
        proposals.len(),
        generation_duration
    );

    Ok(CreateGenerationResponse {
        generation_id: row.id,
        generated_count: proposals.len() as i32,
        flashcards_proposals: proposals,
    })
}

#[allow(clippy::too_many_arguments)]
async fn insert_generation(
    pool: &PgPool,
    user_id: Uuid,
    model: &AiModel,
    source_text: &str,
    source_text_length: i32,
    source_text_hash: &str,
    proposals: &[FlashcardProposal],
    generation_duration: i64,
) -> Result<GenerationRow, AppError> {
    let row = sqlx::query_as::<_, GenerationRow>(
        r#"
        INSERT INTO generations
            (user_id, model, source_text, source_text_length, source_text_hash,
             generated_count, accepted_unedited_count, accepted_edited_count,
             generation_duration, status, flashcards_proposals)
        VALUES ($1, $2, $3, $4, $5, $6, 0, 0, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(model.model_path)
    .bind(source_text)
    .bind(source_text_length)
    .bind(source_text_hash)
    .bind(proposals.len() as i32)
    .bind(generation_duration)
    .bind(GenerationStatus::Completed.as_str())
    .bind(Json(proposals))
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Best-effort append to the error-log store. Logging failures are only
/// printed; they must never mask the original generation error.
async fn log_generation_error(pool: &PgPool, user_id: Uuid, model: &AiModel, err: &AppError) {
    let error_code = match err {
        AppError::Ai(ai) => ai.code(),
        AppError::Database(_) => "database",
        AppError::Validation(_) => "validation",
        AppError::NotFound(_) => "not_found",
        AppError::Unauthorized => "unauthorized",
        AppError::Internal(_) => "internal",
    };

    let result = sqlx::query(
        r#"
        INSERT INTO generation_error_logs
            (generation_id, error_code, error_message, stack_trace, model,
             source_text_hash, source_text_length, user_id)
        VALUES (0, $1, $2, $3, $4, '', 0, $5)
        "#,
    )
    .bind(error_code)
    .bind(err.to_string())
    .bind(format!("{err:?}"))
    .bind(model.model_path)
    .bind(user_id)
    .execute(pool)
    .await;

    if let Err(log_err) = result {
        error!("Failed to write generation error log: {log_err}");
    }
}

pub fn hash_source_text(source_text: &str) -> String {
    let digest = Sha256::digest(source_text.as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_text_hash_is_hex_sha256() {
        let hash = hash_source_text("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_is_stable_for_identical_input() {
        assert_eq!(hash_source_text("tekst"), hash_source_text("tekst"));
        assert_ne!(hash_source_text("tekst"), hash_source_text("tekst2"));
    }
}
