//! Static catalog of AI models offered for flashcard generation.
//!
//! Exactly one entry is marked default. Selection by id falls back to the
//! default when the id is unknown or absent: a stale id saved in a client
//! must never fail a generation.

#[derive(Debug, Clone, Copy)]
pub struct AiModel {
    pub id: &'static str,
    pub name: &'static str,
    /// Provider-qualified path sent on the wire.
    pub model_path: &'static str,
    pub context_tokens: u32,
    pub is_default: bool,
}

pub const AI_MODELS: &[AiModel] = &[
    AiModel {
        id: "gemini-2-flash",
        name: "Gemini 2.0 Flash",
        model_path: "google/gemini-2.0-flash-001",
        context_tokens: 1_048_576,
        is_default: true,
    },
    AiModel {
        id: "gemini-2-flash-exp",
        name: "Gemini 2.0 Flash Exp",
        model_path: "google/gemini-2.0-flash-exp:free",
        context_tokens: 1_048_576,
        is_default: false,
    },
    AiModel {
        id: "llama-4-scout",
        name: "Llama 4 Scout",
        model_path: "meta-llama/llama-4-scout:free",
        context_tokens: 200_000,
        is_default: false,
    },
];

pub fn default_model() -> &'static AiModel {
    AI_MODELS
        .iter()
        .find(|m| m.is_default)
        .unwrap_or(&AI_MODELS[0])
}

/// Resolves a model by id, falling back to the default for unknown ids.
pub fn model_by_id(id: Option<&str>) -> &'static AiModel {
    match id {
        Some(id) => AI_MODELS
            .iter()
            .find(|m| m.id == id)
            .unwrap_or_else(default_model),
        None => default_model(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_default_entry() {
        assert_eq!(AI_MODELS.iter().filter(|m| m.is_default).count(), 1);
    }

    #[test]
    fn unknown_id_falls_back_to_default() {
        assert_eq!(model_by_id(Some("no-such-model")).id, default_model().id);
        assert_eq!(model_by_id(None).id, default_model().id);
    }

    #[test]
    fn known_id_resolves() {
        assert_eq!(model_by_id(Some("llama-4-scout")).model_path, "meta-llama/llama-4-scout:free");
    }
}
