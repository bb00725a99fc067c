// Flashcard CRUD: persistence operations and their HTTP handlers.

pub mod handlers;
pub mod service;
