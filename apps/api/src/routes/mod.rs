pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::flashcards::handlers as flashcards;
use crate::generation::handlers as generations;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Generations API
        .route(
            "/api/generations",
            post(generations::handle_create_generation).get(generations::handle_list_generations),
        )
        // Static paths registered before /api/generations/:id; axum
        // prefers the more specific match.
        .route(
            "/api/generations/statistics",
            get(generations::handle_statistics),
        )
        .route(
            "/api/generations/error-logs",
            get(generations::handle_list_error_logs),
        )
        .route(
            "/api/generations/:id",
            get(generations::handle_get_generation).delete(generations::handle_delete_generation),
        )
        .route(
            "/api/generations/:id/accept",
            post(generations::handle_accept_proposals),
        )
        // Flashcards API
        .route(
            "/api/flashcards",
            post(flashcards::handle_create_flashcards).get(flashcards::handle_list_flashcards),
        )
        .route(
            "/api/flashcards/:id",
            get(flashcards::handle_get_flashcard)
                .put(flashcards::handle_update_flashcard)
                .delete(flashcards::handle_delete_flashcard),
        )
        .with_state(state)
}
