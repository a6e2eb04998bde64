//! Prompt template for recommendation answers

use crate::retrieval::SearchResult;

/// Separator placed between retrieved chunks in the context block
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join chunk texts in retrieval order
    pub fn build_context(results: &[SearchResult]) -> String {
        results
            .iter()
            .map(|r| r.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    /// Build the recommendation prompt
    pub fn build_recommendation_prompt(context: &str, question: &str) -> String {
        format!(
            r#"You are an expert anime recommender. Your job is to help users find the perfect anime based on their preferences.

Using the following context, provide a detailed and engaging response to the user's question.

For each question, suggest exactly three anime titles, ranked from best match to weakest. For each recommendation, include:
1. The anime title.
2. A concise plot summary (2-3 sentences).
3. A clear explanation of why this anime matches the user's preferences, tied to the context.

Present your recommendations in a numbered list format for easy reading.

If the context does not contain enough information to answer, say that you don't know. Do not fabricate any information.

Context:
{context}

User's question:
{question}

Your well-structured response:"#,
            context = context,
            question = question
        )
    }
}
