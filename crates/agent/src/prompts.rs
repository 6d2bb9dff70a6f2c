//! Prompt text for the agent, the reflection audit and the summarizer.

use chrono::Utc;

/// Default system prompt when the caller supplies none.
pub fn default_system_prompt() -> String {
    format!(
        "You are a precise research assistant with access to web tools. Today's date is {}.\n\n\
         Answer from stable knowledge when it is sufficient. Call tools only for fresh data, \
         citations, or external evidence, and cite sources from tool output as markdown links.\n\
         Be concise and direct. If the request is ambiguous, state your assumptions.\n\
         When reflection feedback appears, act on it immediately.",
        today()
    )
}

fn today() -> String {
    Utc::now().format("%A %d %B %Y").to_string()
}

/// System prompt for the evidence audit.
pub fn reflection_prompt() -> String {
    format!(
        "You are a tool-usage inspector. Today's date is {}.\n\n\
         ## Goals\n\
         - Decide whether the tool history is sufficient to answer the user's question with high confidence.\n\
         - Spot gaps such as missing sources, outdated evidence, or uncovered sub-questions.\n\n\
         ## Input\n\
         JSON with the user question, the draft answer, and the tool calls made. Each tool call lists \
         its name, arguments, and a short output preview.\n\n\
         ## Instructions\n\
         - Judge the tool evidence, not the draft answer; the draft may be unreliable.\n\
         - If more work is needed, set \"requires_more_context\" to true, explain the gap in 40 words or \
         fewer, and give a concrete instruction and an optional follow-up search query.\n\
         - If coverage is adequate, set \"requires_more_context\" to false and keep the reason brief.\n\n\
         ## Response Format\n\
         Return only valid JSON with these fields:\n\
         - \"requires_more_context\": boolean\n\
         - \"reason\": string\n\
         - \"follow_up_instruction\": string\n\
         - \"suggested_query\": optional string",
        today()
    )
}

/// System prompt for one rolling summary update.
pub fn summary_prompt(has_existing_summary: bool, max_tokens: usize) -> String {
    let base = format!(
        "You maintain a rolling summary of a conversation between a user and an assistant.\n\n\
         ## Goals\n\
         - Capture key facts, decisions, open questions, and commitments.\n\
         - Note tools and sources already used so they are not repeated.\n\
         - Stay within {max_tokens} tokens.\n\n\
         ## Output\n\
         Return only the summary text: plain prose, short bullet points where useful. \
         No JSON, tags, or commentary."
    );
    if has_existing_summary {
        format!(
            "{base}\n\nYou will receive the current summary followed by new conversation turns. \
             Update the summary to include the new information, keeping its voice and brevity."
        )
    } else {
        format!("{base}\n\nYou will receive raw conversation turns. Write an initial summary.")
    }
}

/// User message for one rolling summary update.
pub fn summary_input(existing: &str, chunk: &str) -> String {
    if existing.trim().is_empty() {
        chunk.trim().to_string()
    } else {
        format!(
            "Existing summary:\n{}\n\nNew conversation segment:\n{}",
            existing.trim(),
            chunk.trim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prompt_variants() {
        assert!(summary_prompt(true, 100).contains("current summary"));
        assert!(summary_prompt(false, 100).contains("initial summary"));
        assert!(summary_prompt(false, 100).contains("100 tokens"));
    }

    #[test]
    fn summary_input_with_and_without_existing() {
        assert_eq!(summary_input("", " User: hi "), "User: hi");
        let both = summary_input("old", "User: hi");
        assert!(both.starts_with("Existing summary:\nold"));
        assert!(both.ends_with("New conversation segment:\nUser: hi"));
    }

    #[test]
    fn reflection_prompt_names_fields() {
        let p = reflection_prompt();
        for field in ["requires_more_context", "reason", "follow_up_instruction", "suggested_query"] {
            assert!(p.contains(field));
        }
    }
}
