// System instruction fragments sent to the chat backend.

use crate::llm_client::schema::example_from_schema;

/// Preamble for replies that must be a single JSON object.
pub const JSON_GENERATOR_SYSTEM: &str = "You are a strict JSON generator.\n\
    Respond with a single JSON object that conforms exactly to the given JSON Schema.\n\
    Do NOT include any surrounding text, explanations, or markdown. Output MUST be valid JSON.\n\
    If you cannot produce a valid object, respond with an empty JSON object {}.\n";

/// Builds the system instruction for a schema-constrained reply: the strict
/// JSON preamble, the schema itself and, when one can be derived, an example.
pub fn system_prompt_for_schema(schema: &str) -> String {
    let mut prompt = String::from(JSON_GENERATOR_SYSTEM);
    prompt.push_str("JSON Schema:\n");
    prompt.push_str(schema);
    if let Some(example) = example_from_schema(schema) {
        prompt.push_str("\nExample output:\n");
        prompt.push_str(&example);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_schema_and_example() {
        let schema = r#"{"type":"object","properties":{"age":{"type":"integer"}}}"#;
        let prompt = system_prompt_for_schema(schema);
        assert!(prompt.starts_with("You are a strict JSON generator.\nRespond with"));
        assert!(prompt.contains(&format!("JSON Schema:\n{schema}")));
        assert!(prompt.ends_with("Example output:\n{\"age\":0}"));
    }

    #[test]
    fn test_prompt_without_properties_has_no_example() {
        let prompt = system_prompt_for_schema(r#"{"type":"string"}"#);
        assert!(prompt.ends_with("JSON Schema:\n{\"type\":\"string\"}"));
        assert!(!prompt.contains("Example output"));
    }
}
