pub mod flashcard;
pub mod generation;
