use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::flashcards::service::{
    delete_flashcard, get_flashcard, insert_flashcards, list_flashcards, update_flashcard,
    ListParams, SortField, SortOrder,
};
use crate::generation::handlers::validate_pagination;
use crate::models::flashcard::{
    CreateFlashcardDto, CreateFlashcardsRequest, CreateFlashcardsResponse, FlashcardDto,
    FlashcardListResponse, PaginationInfo, UpdateFlashcardDto,
};
use crate::state::AppState;

const FRONT_MAX_CHARS: usize = 200;
const BACK_MAX_CHARS: usize = 500;

/// POST /api/flashcards
pub async fn handle_create_flashcards(
    State(state): State<AppState>,
    Json(req): Json<CreateFlashcardsRequest>,
) -> Result<(StatusCode, Json<CreateFlashcardsResponse>), AppError> {
    if req.flashcards.is_empty() {
        return Err(AppError::Validation(
            "Musisz podać co najmniej jedną fiszkę".to_string(),
        ));
    }
    for flashcard in &req.flashcards {
        validate_flashcard(flashcard)?;
    }

    let mut tx = state.db.begin().await?;
    let created = insert_flashcards(&mut tx, state.config.default_user_id, &req.flashcards).await?;
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateFlashcardsResponse {
            flashcards: created.into_iter().map(FlashcardDto::from).collect(),
        }),
    ))
}

fn validate_flashcard(flashcard: &CreateFlashcardDto) -> Result<(), AppError> {
    let front_len = flashcard.front.chars().count();
    let back_len = flashcard.back.chars().count();

    if front_len == 0 {
        return Err(AppError::Validation("Front nie może być pusty".to_string()));
    }
    if front_len > FRONT_MAX_CHARS {
        return Err(AppError::Validation(
            "Front nie może przekraczać 200 znaków".to_string(),
        ));
    }
    if back_len == 0 {
        return Err(AppError::Validation("Back nie może być pusty".to_string()));
    }
    if back_len > BACK_MAX_CHARS {
        return Err(AppError::Validation(
            "Back nie może przekraczać 500 znaków".to_string(),
        ));
    }

    // Cross-field invariant: AI provenance requires a generation, manual
    // provenance forbids one.
    if flashcard.source.is_ai() && flashcard.generation_id.is_none() {
        return Err(AppError::Validation(format!(
            "Pole generation_id jest wymagane dla source: {}",
            flashcard.source.as_str()
        )));
    }
    if !flashcard.source.is_ai() && flashcard.generation_id.is_some() {
        return Err(AppError::Validation(
            "Pole generation_id musi być null dla source: manual".to_string(),
        ));
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct FlashcardListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub source: Option<String>,
    /// The literal string "null" selects manually created cards.
    pub generation_id: Option<String>,
}

/// GET /api/flashcards
pub async fn handle_list_flashcards(
    State(state): State<AppState>,
    Query(query): Query<FlashcardListQuery>,
) -> Result<Json<FlashcardListResponse>, AppError> {
    let params = parse_list_query(&query)?;

    let (rows, total) = list_flashcards(&state.db, state.config.default_user_id, &params).await?;

    Ok(Json(FlashcardListResponse {
        flashcards: rows.into_iter().map(FlashcardDto::from).collect(),
        pagination: PaginationInfo {
            page: params.page,
            limit: params.limit,
            total,
        },
    }))
}

fn parse_list_query(query: &FlashcardListQuery) -> Result<ListParams, AppError> {
    let (page, limit) = validate_pagination(query.page, query.limit)?;

    let sort = match query.sort.as_deref() {
        None => SortField::CreatedAt,
        Some(s) => SortField::parse(s)
            .ok_or_else(|| AppError::Validation("Nieprawidłowy parametr sortowania".to_string()))?,
    };
    let order = match query.order.as_deref() {
        None => SortOrder::Desc,
        Some(s) => SortOrder::parse(s)
            .ok_or_else(|| AppError::Validation("Nieprawidłowy kierunek sortowania".to_string()))?,
    };

    let source = match query.source.as_deref() {
        None => None,
        Some(s) => Some(
            serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|_| {
                AppError::Validation(
                    "Source musi być jednym z: 'ai-full', 'ai-edited', 'manual'".to_string(),
                )
            })?,
        ),
    };

    let generation_id = match query.generation_id.as_deref() {
        None => None,
        Some("null") => Some(None),
        Some(raw) => Some(Some(raw.parse::<i64>().map_err(|_| {
            AppError::Validation("Nieprawidłowy identyfikator generacji".to_string())
        })?)),
    };

    Ok(ListParams {
        page,
        limit,
        sort,
        order,
        source,
        generation_id,
    })
}

/// GET /api/flashcards/:id
pub async fn handle_get_flashcard(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FlashcardDto>, AppError> {
    let row = get_flashcard(&state.db, state.config.default_user_id, id).await?;
    Ok(Json(FlashcardDto::from(row)))
}

/// PUT /api/flashcards/:id
pub async fn handle_update_flashcard(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateFlashcardDto>,
) -> Result<Json<FlashcardDto>, AppError> {
    let front_blank = req.front.as_deref().map_or(true, |s| s.trim().is_empty());
    let back_blank = req.back.as_deref().map_or(true, |s| s.trim().is_empty());
    if front_blank && back_blank {
        return Err(AppError::Validation(
            "Przynajmniej jedno pole (front lub back) musi być wypełnione".to_string(),
        ));
    }
    if let Some(front) = &req.front {
        if front.chars().count() > FRONT_MAX_CHARS {
            return Err(AppError::Validation(
                "Front nie może przekraczać 200 znaków".to_string(),
            ));
        }
    }
    if let Some(back) = &req.back {
        if back.chars().count() > BACK_MAX_CHARS {
            return Err(AppError::Validation(
                "Back nie może przekraczać 500 znaków".to_string(),
            ));
        }
    }

    let row = update_flashcard(&state.db, state.config.default_user_id, id, &req).await?;
    Ok(Json(FlashcardDto::from(row)))
}

/// DELETE /api/flashcards/:id
pub async fn handle_delete_flashcard(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    delete_flashcard(&state.db, state.config.default_user_id, id).await?;
    Ok(Json(serde_json::json!({ "deleted": true, "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::flashcard::FlashcardSource;

    fn card(source: FlashcardSource, generation_id: Option<i64>) -> CreateFlashcardDto {
        CreateFlashcardDto {
            front: "Pytanie?".to_string(),
            back: "Odpowiedź.".to_string(),
            source,
            generation_id,
        }
    }

    #[test]
    fn manual_source_with_generation_id_is_rejected() {
        let err = validate_flashcard(&card(FlashcardSource::Manual, Some(7))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn ai_source_without_generation_id_is_rejected() {
        let err = validate_flashcard(&card(FlashcardSource::AiFull, None)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(validate_flashcard(&card(FlashcardSource::AiEdited, None)).is_err());
    }

    #[test]
    fn valid_combinations_pass() {
        assert!(validate_flashcard(&card(FlashcardSource::Manual, None)).is_ok());
        assert!(validate_flashcard(&card(FlashcardSource::AiFull, Some(1))).is_ok());
        assert!(validate_flashcard(&card(FlashcardSource::AiEdited, Some(1))).is_ok());
    }

    #[test]
    fn field_length_limits_are_enforced() {
        let mut too_long = card(FlashcardSource::Manual, None);
        too_long.front = "a".repeat(201);
        assert!(validate_flashcard(&too_long).is_err());

        let mut max_len = card(FlashcardSource::Manual, None);
        max_len.front = "a".repeat(200);
        max_len.back = "b".repeat(500);
        assert!(validate_flashcard(&max_len).is_ok());

        let mut back_too_long = card(FlashcardSource::Manual, None);
        back_too_long.back = "b".repeat(501);
        assert!(validate_flashcard(&back_too_long).is_err());
    }

    #[test]
    fn list_query_parses_null_generation_filter() {
        let query = FlashcardListQuery {
            page: None,
            limit: None,
            sort: None,
            order: None,
            source: Some("ai-full".to_string()),
            generation_id: Some("null".to_string()),
        };
        let params = parse_list_query(&query).unwrap();
        assert_eq!(params.source, Some(FlashcardSource::AiFull));
        assert_eq!(params.generation_id, Some(None));
        assert_eq!(params.sort, SortField::CreatedAt);
        assert_eq!(params.order, SortOrder::Desc);
    }

    #[test]
    fn list_query_rejects_unknown_sort_and_source() {
        let query = FlashcardListQuery {
            page: None,
            limit: None,
            sort: Some("user_id".to_string()),
            order: None,
            source: None,
            generation_id: None,
        };
        assert!(parse_list_query(&query).is_err());

        let query = FlashcardListQuery {
            page: None,
            limit: None,
            sort: None,
            order: None,
            source: Some("ai".to_string()),
            generation_id: None,
        };
        assert!(parse_list_query(&query).is_err());
    }
}
