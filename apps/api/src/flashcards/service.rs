//! Flashcard persistence operations. All queries are scoped to the owning
//! user; callers never see another user's rows.

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::flashcard::{
    CreateFlashcardDto, FlashcardRow, FlashcardSource, UpdateFlashcardDto,
};

/// Whitelisted sort columns; anything else is rejected at validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Front,
    Back,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(SortField::CreatedAt),
            "updated_at" => Some(SortField::UpdatedAt),
            "front" => Some(SortField::Front),
            "back" => Some(SortField::Back),
            _ => None,
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Front => "front",
            SortField::Back => "back",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug)]
pub struct ListParams {
    pub page: i64,
    pub limit: i64,
    pub sort: SortField,
    pub order: SortOrder,
    pub source: Option<FlashcardSource>,
    /// `Some(None)` filters for manually created cards (generation_id IS NULL).
    pub generation_id: Option<Option<i64>>,
}

/// Inserts a batch of flashcards inside the caller's transaction, returning
/// the created rows in input order.
pub async fn insert_flashcards(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    flashcards: &[CreateFlashcardDto],
) -> Result<Vec<FlashcardRow>, AppError> {
    let mut created = Vec::with_capacity(flashcards.len());
    for flashcard in flashcards {
        let row = sqlx::query_as::<_, FlashcardRow>(
            r#"
            INSERT INTO flashcards (user_id, front, back, source, generation_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(flashcard.front.trim())
        .bind(flashcard.back.trim())
        .bind(flashcard.source.as_str())
        .bind(flashcard.generation_id)
        .fetch_one(&mut **tx)
        .await?;
        created.push(row);
    }
    Ok(created)
}

/// Paginated, filtered listing. Returns the page of rows plus the total
/// count under the same filters.
pub async fn list_flashcards(
    pool: &PgPool,
    user_id: Uuid,
    params: &ListParams,
) -> Result<(Vec<FlashcardRow>, i64), AppError> {
    let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM flashcards");
    push_filters(&mut query, user_id, params);
    query.push(format!(
        " ORDER BY {} {}",
        params.sort.as_sql(),
        params.order.as_sql()
    ));
    query.push(" LIMIT ").push_bind(params.limit);
    query
        .push(" OFFSET ")
        .push_bind((params.page - 1) * params.limit);

    let rows = query
        .build_query_as::<FlashcardRow>()
        .fetch_all(pool)
        .await?;

    let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM flashcards");
    push_filters(&mut count_query, user_id, params);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    Ok((rows, total))
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, params: &ListParams) {
    query.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(source) = params.source {
        query.push(" AND source = ").push_bind(source.as_str());
    }
    match params.generation_id {
        Some(Some(generation_id)) => {
            query.push(" AND generation_id = ").push_bind(generation_id);
        }
        Some(None) => {
            query.push(" AND generation_id IS NULL");
        }
        None => {}
    }
}

pub async fn get_flashcard(
    pool: &PgPool,
    user_id: Uuid,
    id: i64,
) -> Result<FlashcardRow, AppError> {
    sqlx::query_as::<_, FlashcardRow>("SELECT * FROM flashcards WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Fiszka nie została znaleziona".to_string()))
}

/// Partial update of front/back; untouched fields keep their value.
pub async fn update_flashcard(
    pool: &PgPool,
    user_id: Uuid,
    id: i64,
    update: &UpdateFlashcardDto,
) -> Result<FlashcardRow, AppError> {
    let front = update.front.as_deref().map(str::trim);
    let back = update.back.as_deref().map(str::trim);

    sqlx::query_as::<_, FlashcardRow>(
        r#"
        UPDATE flashcards
        SET front = COALESCE($3, front),
            back = COALESCE($4, back),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(front)
    .bind(back)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Fiszka nie została znaleziona".to_string()))
}

pub async fn delete_flashcard(pool: &PgPool, user_id: Uuid, id: i64) -> Result<(), AppError> {
    let deleted: Option<i64> =
        sqlx::query_scalar("DELETE FROM flashcards WHERE id = $1 AND user_id = $2 RETURNING id")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    deleted
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound("Fiszka nie została znaleziona".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_field_whitelist() {
        assert_eq!(SortField::parse("created_at"), Some(SortField::CreatedAt));
        assert_eq!(SortField::parse("front"), Some(SortField::Front));
        assert_eq!(SortField::parse("user_id"), None);
        assert_eq!(SortField::parse("id; DROP TABLE flashcards"), None);
    }

    #[test]
    fn sort_order_parse() {
        assert_eq!(SortOrder::parse("asc"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse("desc"), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse("ASC"), None);
    }
}
