// AI flashcard generation: orchestration, prompt constants, and the
// response recovery pipeline. All completion calls go through ai_client;
// no direct OpenRouter calls here.

pub mod handlers;
pub mod prompts;
pub mod recovery;
pub mod service;
