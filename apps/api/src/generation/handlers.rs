use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::flashcards::service::insert_flashcards;
use crate::generation::service::create_generation;
use crate::models::flashcard::{CreateFlashcardDto, FlashcardDto, FlashcardSource};
use crate::models::generation::{
    AcceptFlashcardsRequest, AcceptFlashcardsResponse, CreateGenerationRequest,
    CreateGenerationResponse, EditStatus, GenerationDto, GenerationErrorLogRow,
    GenerationErrorLogsResponse, GenerationListItem, GenerationListResponse, GenerationRow,
    GenerationStatistics, GenerationStatus, ModelUsageStats,
};
use crate::state::AppState;

const SOURCE_TEXT_MIN_CHARS: usize = 1000;
const SOURCE_TEXT_MAX_CHARS: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// POST /api/generations
///
/// Returns 202: the response carries proposals for review, but nothing is
/// saved as a flashcard until the user accepts.
pub async fn handle_create_generation(
    State(state): State<AppState>,
    Json(req): Json<CreateGenerationRequest>,
) -> Result<(StatusCode, Json<CreateGenerationResponse>), AppError> {
    validate_source_text(&req.source_text)?;

    let response = create_generation(
        &state.db,
        &state.ai,
        state.config.default_user_id,
        &req.source_text,
        req.model_id.as_deref(),
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Source text bounds are inclusive: exactly 1000 characters is accepted.
fn validate_source_text(source_text: &str) -> Result<(), AppError> {
    let length = source_text.chars().count();
    if length < SOURCE_TEXT_MIN_CHARS {
        return Err(AppError::Validation(
            "Tekst źródłowy musi zawierać minimum 1000 znaków".to_string(),
        ));
    }
    if length > SOURCE_TEXT_MAX_CHARS {
        return Err(AppError::Validation(
            "Tekst źródłowy nie może przekraczać 10000 znaków".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/generations?page=&limit=
pub async fn handle_list_generations(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<GenerationListResponse>, AppError> {
    let (page, limit) = validate_pagination(query.page, query.limit)?;
    let offset = (page - 1) * limit;

    let rows = sqlx::query_as::<_, GenerationRow>(
        r#"
        SELECT * FROM generations
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(state.config.default_user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM generations WHERE user_id = $1")
        .bind(state.config.default_user_id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(GenerationListResponse {
        generations: rows.into_iter().map(GenerationListItem::from).collect(),
        total,
        page,
        per_page: limit,
    }))
}

/// GET /api/generations/:id
pub async fn handle_get_generation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<GenerationDto>, AppError> {
    let row = fetch_generation(&state, id).await?;
    Ok(Json(GenerationDto::from(row)))
}

/// DELETE /api/generations/:id
///
/// Deleting a generation cascades to its dependent flashcards.
pub async fn handle_delete_generation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut tx = state.db.begin().await?;

    // Dependent flashcards go first so the generation row can be removed.
    let cascade = sqlx::query("DELETE FROM flashcards WHERE generation_id = $1 AND user_id = $2")
        .bind(id)
        .bind(state.config.default_user_id)
        .execute(&mut *tx)
        .await?;

    let deleted: Option<i64> =
        sqlx::query_scalar("DELETE FROM generations WHERE id = $1 AND user_id = $2 RETURNING id")
            .bind(id)
            .bind(state.config.default_user_id)
            .fetch_optional(&mut *tx)
            .await?;

    if deleted.is_none() {
        // Rolls back the flashcard delete on drop.
        return Err(AppError::NotFound(
            "Generacja nie została znaleziona".to_string(),
        ));
    }

    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "generation_id": id,
        "deleted_flashcards": cascade.rows_affected(),
    })))
}

/// POST /api/generations/:id/accept
pub async fn handle_accept_proposals(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AcceptFlashcardsRequest>,
) -> Result<(StatusCode, Json<AcceptFlashcardsResponse>), AppError> {
    if req.accepted_flashcards.is_empty() {
        return Err(AppError::Validation(
            "Musisz wybrać co najmniej jedną fiszkę do akceptacji".to_string(),
        ));
    }
    for accepted in &req.accepted_flashcards {
        if accepted.front.trim().is_empty() || accepted.back.trim().is_empty() {
            return Err(AppError::Validation(
                "Front i tył fiszki nie mogą być puste".to_string(),
            ));
        }
    }

    let generation = fetch_generation(&state, id).await?;
    if generation.status != GenerationStatus::Completed.as_str() {
        return Err(AppError::Validation(
            "Nie można akceptować fiszek z generacji która nie została ukończona".to_string(),
        ));
    }

    let to_create: Vec<CreateFlashcardDto> = req
        .accepted_flashcards
        .iter()
        .map(|accepted| CreateFlashcardDto {
            front: accepted.front.clone(),
            back: accepted.back.clone(),
            source: match accepted.edit_status {
                EditStatus::Edited => FlashcardSource::AiEdited,
                EditStatus::Unedited => FlashcardSource::AiFull,
            },
            generation_id: Some(id),
        })
        .collect();

    let accepted_unedited = req
        .accepted_flashcards
        .iter()
        .filter(|f| f.edit_status == EditStatus::Unedited)
        .count() as i32;
    let accepted_edited = req.accepted_flashcards.len() as i32 - accepted_unedited;

    let mut tx = state.db.begin().await?;

    let created = insert_flashcards(&mut tx, state.config.default_user_id, &to_create).await?;

    sqlx::query(
        r#"
        UPDATE generations
        SET accepted_unedited_count = accepted_unedited_count + $2,
            accepted_edited_count = accepted_edited_count + $3,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $4
        "#,
    )
    .bind(id)
    .bind(accepted_unedited)
    .bind(accepted_edited)
    .bind(state.config.default_user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(AcceptFlashcardsResponse {
            generation_id: id,
            accepted_count: req.accepted_flashcards.len(),
            accepted_flashcards: created.into_iter().map(FlashcardDto::from).collect(),
            accepted_unedited_count: accepted_unedited,
            accepted_edited_count: accepted_edited,
        }),
    ))
}

/// GET /api/generations/error-logs
pub async fn handle_list_error_logs(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<GenerationErrorLogsResponse>, AppError> {
    let (page, limit) = validate_pagination(query.page, query.limit)?;
    let offset = (page - 1) * limit;

    let logs = sqlx::query_as::<_, GenerationErrorLogRow>(
        r#"
        SELECT * FROM generation_error_logs
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(state.config.default_user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM generation_error_logs WHERE user_id = $1")
            .bind(state.config.default_user_id)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(GenerationErrorLogsResponse { total, logs }))
}

/// GET /api/generations/statistics
pub async fn handle_statistics(
    State(state): State<AppState>,
) -> Result<Json<GenerationStatistics>, AppError> {
    let user_id = state.config.default_user_id;

    let (total_generations, total_generated): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(generated_count), 0)::bigint FROM generations WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(&state.db)
    .await?;

    let (total_accepted, total_unedited, total_edited): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE source = 'ai-full'),
               COUNT(*) FILTER (WHERE source = 'ai-edited')
        FROM flashcards
        WHERE user_id = $1 AND generation_id IS NOT NULL
        "#,
    )
    .bind(user_id)
    .fetch_one(&state.db)
    .await?;

    let models_used: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT model, COUNT(*),
               COALESCE(ROUND(AVG(generation_duration)), 0)::bigint
        FROM generations
        WHERE user_id = $1
        GROUP BY model
        ORDER BY COUNT(*) DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(GenerationStatistics {
        total_generations,
        total_generated_flashcards: total_generated,
        total_accepted_flashcards: total_accepted,
        acceptance_rate: rate(total_accepted, total_generated),
        total_unedited_accepted: total_unedited,
        total_edited_accepted: total_edited,
        edit_rate: rate(total_edited, total_accepted),
        models_used: models_used
            .into_iter()
            .map(|(model, count, average_duration)| ModelUsageStats {
                model,
                count,
                average_duration,
            })
            .collect(),
    }))
}

/// Ratio rounded to 2 decimal places; zero denominator yields 0.0.
fn rate(numerator: i64, denominator: i64) -> f64 {
    if denominator > 0 {
        ((numerator as f64 / denominator as f64) * 100.0).round() / 100.0
    } else {
        0.0
    }
}

async fn fetch_generation(state: &AppState, id: i64) -> Result<GenerationRow, AppError> {
    sqlx::query_as::<_, GenerationRow>("SELECT * FROM generations WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(state.config.default_user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Generacja nie została znaleziona".to_string()))
}

pub(crate) fn validate_pagination(
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<(i64, i64), AppError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(10);
    if page < 1 {
        return Err(AppError::Validation(
            "Numer strony musi być większy od 0".to_string(),
        ));
    }
    if !(1..=100).contains(&limit) {
        return Err(AppError::Validation(
            "Limit musi być między 1 a 100".to_string(),
        ));
    }
    Ok((page, limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_text_bounds_are_inclusive() {
        assert!(validate_source_text(&"a".repeat(1000)).is_ok());
        assert!(validate_source_text(&"a".repeat(10_000)).is_ok());

        let err = validate_source_text(&"a".repeat(999)).unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("minimum 1000 znaków")),
            other => panic!("expected Validation, got {other:?}"),
        }

        assert!(validate_source_text(&"a".repeat(10_001)).is_err());
    }

    #[test]
    fn source_text_length_counts_characters_not_bytes() {
        // 1000 multi-byte characters pass even though the byte length is larger.
        assert!(validate_source_text(&"ż".repeat(1000)).is_ok());
    }

    #[test]
    fn pagination_bounds() {
        assert_eq!(validate_pagination(None, None).unwrap(), (1, 10));
        assert_eq!(validate_pagination(Some(3), Some(100)).unwrap(), (3, 100));
        assert!(validate_pagination(Some(0), None).is_err());
        assert!(validate_pagination(None, Some(101)).is_err());
        assert!(validate_pagination(None, Some(0)).is_err());
    }

    #[test]
    fn rate_rounds_to_two_decimals() {
        assert_eq!(rate(1, 3), 0.33);
        assert_eq!(rate(2, 3), 0.67);
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(rate(5, 0), 0.0);
    }
}
