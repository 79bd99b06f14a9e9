//! Grounding-context and prompt assembly.

use crate::document::ScoredRecord;

/// Answer returned when retrieval finds nothing to ground a response on.
pub const NO_MATCH_ANSWER: &str = "No documents matching the question.";

/// Join retrieved fragment texts, in the order given, with `separator`.
pub fn build_context(hits: &[ScoredRecord], separator: &str) -> String {
    hits.iter().map(|hit| hit.record.fragment_text.as_str()).collect::<Vec<_>>().join(separator)
}

/// Build the generator prompt for `question` grounded on `context`.
///
/// The model is told to use only the excerpts and to say it does not know
/// when they do not contain the answer.
pub fn build_prompt(question: &str, context: &str) -> String {
    let mut prompt = String::with_capacity(context.len() + question.len() + 256);
    prompt.push_str("Answer the user's question using only the following document excerpts.\n");
    prompt.push_str("If the answer isn't in the documents, say \"I don't know\".\n\n");
    prompt.push_str("Fragments:\n");
    prompt.push_str(context);
    prompt.push_str("\n\nQuestion:\n");
    prompt.push_str(question);
    prompt
}
