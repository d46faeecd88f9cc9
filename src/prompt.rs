//! Prompt assembly.
//!
//! Pure, deterministic formatting of query, retrieved context, and
//! conversation history into the single text blob sent to the model.
//! The instruction header is fixed and pins the response language to
//! Dutch regardless of the query language.

use crate::models::ChatMessage;

/// Format prior turns for inclusion in the prompt, oldest first.
/// Returns an empty string for an empty history.
pub fn format_history(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let mut formatted = String::from("Previous conversation:\n\n");
    for message in messages {
        let role = if message.role == "user" { "User" } else { "Assistant" };
        formatted.push_str(&format!("{}: {}\n\n", role, message.content));
    }

    formatted
}

/// Combine the query, retrieved context, and formatted history into the
/// final prompt. Malformed input is formatted as-is; there is no
/// failure mode.
pub fn build_prompt(query: &str, context: &str, history: &str) -> String {
    format!(
        "Beantwoord de volgende vraag op basis van de verstrekte context.\n\
         Geef een zo volledig en nauwkeurig mogelijk antwoord.\n\
         Let op technische details.\n\
         \n\
         {history}\n\
         **Vraag:** {query}\n\
         \n\
         **Context:** {context}\n\
         \n\
         Antwoord in het Nederlands.\n"
    )
}
