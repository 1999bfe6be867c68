//! Prompt assembly for grounded generation

use crate::types::{HistoryEntry, QueryReference, UserQuery};

/// Render a prior conversation's history into context lines.
/// Returns an empty string for a fresh conversation.
pub fn conversation_context(prior: Option<&UserQuery>) -> String {
    let Some(prior) = prior else {
        return String::new();
    };

    let mut lines = Vec::with_capacity(prior.history.len());
    for entry in &prior.history {
        match entry {
            HistoryEntry::Human { content } => lines.push(format!("User: {}", content)),
            HistoryEntry::Ai { content, .. } => lines.push(format!("Assistant: {}", content)),
        }
    }

    lines.join("\n")
}

/// Text sent to the retrieval backend: prior context, when present, goes
/// ahead of the new prompt so continuations keep their grounding.
pub fn retrieval_query(context: &str, prompt: &str) -> String {
    if context.is_empty() {
        prompt.to_string()
    } else {
        format!("{}\n{}", context, prompt)
    }
}

/// Assemble the grounded generation prompt from retrieved references
pub fn grounded_prompt(prompt: &str, context: &str, references: &[QueryReference]) -> String {
    let mut sources = String::new();
    for (i, reference) in references.iter().enumerate() {
        sources.push_str(&format!(
            "[{}] {}\n{}\n\n",
            i + 1,
            reference.document_url,
            reference.chunk_text
        ));
    }

    let history = if context.is_empty() {
        String::new()
    } else {
        format!("CONVERSATION SO FAR:\n{}\n\n", context)
    };

    format!(
        r#"You are a document-grounded assistant. Answer using ONLY the numbered sources below. If the answer is not in the sources, say that the information is not available in the indexed documents. Cite sources inline as [1], [2], etc.

SOURCES:
{sources}
{history}QUESTION: {prompt}

Answer:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn prior_with_turns() -> UserQuery {
        let mut query = UserQuery::new("user-1".into(), Uuid::new_v4(), "what is X?".into());
        query.history.push(HistoryEntry::Human {
            content: "what is X?".into(),
        });
        query.history.push(HistoryEntry::Ai {
            content: "X is a thing.".into(),
            references: vec![],
        });
        query
    }

    #[test]
    fn fresh_conversation_has_no_context() {
        assert_eq!(conversation_context(None), "");
        assert_eq!(retrieval_query("", "hello"), "hello");
    }

    #[test]
    fn history_renders_in_turn_order() {
        let prior = prior_with_turns();
        let context = conversation_context(Some(&prior));
        assert_eq!(context, "User: what is X?\nAssistant: X is a thing.");
    }

    #[test]
    fn continuation_context_precedes_new_prompt() {
        let prior = prior_with_turns();
        let context = conversation_context(Some(&prior));
        let query = retrieval_query(&context, "and what is Y?");
        assert!(query.starts_with("User: what is X?"));
        assert!(query.ends_with("and what is Y?"));
    }

    #[test]
    fn grounded_prompt_numbers_sources() {
        let engine = crate::types::QueryEngine::new(&crate::types::EngineSpec {
            name: "docs".into(),
            engine_type: crate::types::EngineType::VectorSearch,
            doc_url: None,
            embedding_model: "embed-1".into(),
            llm_model: None,
            vector_store: None,
            description: None,
            is_public: false,
            created_by: String::new(),
            parent_engine_id: None,
            params: Default::default(),
        });
        let reference = QueryReference::new(
            &engine,
            Uuid::new_v4(),
            "gs://corpus/docs/a.txt".into(),
            None,
            "Grounding text.".into(),
        );

        let prompt = grounded_prompt("what is X?", "", std::slice::from_ref(&reference));
        assert!(prompt.contains("[1] gs://corpus/docs/a.txt"));
        assert!(prompt.contains("Grounding text."));
        assert!(prompt.contains("QUESTION: what is X?"));
    }
}
