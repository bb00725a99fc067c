// All LLM prompt constants for the Generation module.

/// System prompt for flashcard generation. Enforces JSON-only output.
pub const GENERATION_SYSTEM: &str =
    "You are an expert flashcard author for spaced-repetition learning. \
    You create concise, self-contained flashcards in Polish. \
    You MUST respond with valid JSON only, matching the requested schema. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Generation prompt template. Replace `{source_text}` before sending.
pub const GENERATION_PROMPT_TEMPLATE: &str = r#"Create between 5 and 10 study flashcards in Polish from the source text below.

Return a JSON object with this EXACT schema (no extra fields):
{
  "flashcards": [
    {"front": "Co to jest pamięć podręczna?", "back": "Szybki magazyn przechowujący wyniki ostatnich operacji."}
  ]
}

Rules:
- "front" is a single question, at most 200 characters.
- "back" is a complete answer, at most 500 characters.
- Cover the most important facts of the text; do not invent information.
- Both fields must be written in Polish.

Source text:
{source_text}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_carries_the_source_text_placeholder() {
        assert!(GENERATION_PROMPT_TEMPLATE.contains("{source_text}"));
        let filled = GENERATION_PROMPT_TEMPLATE.replace("{source_text}", "przykład");
        assert!(filled.ends_with("przykład"));
    }
}
