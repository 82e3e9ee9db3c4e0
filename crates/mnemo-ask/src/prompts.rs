//! Prompt templates and response parsing for the ask pipeline.

use mnemo_core::{Error, Result};

/// Answer when the user's own data has nothing relevant.
pub const NO_MEMORIES_ANSWER: &str = "I couldn't find relevant information in your todos or \
memories to answer that. Try rephrasing the question, or ask in internet or hybrid mode.";

/// Answer when web search is not configured.
pub const WEB_NOT_CONFIGURED_ANSWER: &str = "Web search isn't configured, so I can't look that \
up online. Set WEB_SEARCH_URL to enable internet answers.";

/// Answer when web search returned nothing usable.
pub const NO_WEB_RESULTS_ANSWER: &str = "I couldn't find relevant information on the web to \
answer that. Try rephrasing the question.";

/// Answer when neither personal data nor the web produced context.
pub const NO_CONTEXT_ANSWER: &str = "I couldn't find relevant information in your data or on \
the web to answer that. Try rephrasing the question.";

/// Section tag for personal context in hybrid prompts.
pub const YOUR_DATA_TAG: &str = "YOUR DATA";

/// Section tag for web context in hybrid prompts.
pub const WEB_RESEARCH_TAG: &str = "WEB RESEARCH";

/// Answer from the user's todos and memories.
pub fn memories_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are a personal assistant with access to the user's todos and memories.
Answer the question using only the information below. If it does not contain the answer, say so plainly.

User's data:
{context}

Question: {question}

Answer concisely. Mention which todo or memory the answer comes from when it helps."#
    )
}

/// Answer from scraped web pages.
pub fn internet_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are a research assistant. Answer the question using the web sources below.
Cite sources by their URL. If the sources disagree or do not answer the question, say so.

Web sources:
{context}

Question: {question}

Answer:"#
    )
}

/// Ask the model for focused web queries.
pub fn query_generation_prompt(question: &str, personal_context: &str, max_queries: usize) -> String {
    let context = if personal_context.trim().is_empty() {
        "(no relevant personal data)"
    } else {
        personal_context
    };
    format!(
        r#"You help plan web research for a question. Using the question and what the user already has in their personal data, write up to {max_queries} short, focused web search queries that would find the missing information.

User's data:
{context}

Question: {question}

Respond with only a JSON array of strings, for example: ["query one", "query two"]"#
    )
}

/// Synthesize an answer from tagged personal and web context.
pub fn hybrid_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are a personal research assistant. The context below has two sections:
{YOUR_DATA_TAG} holds the user's own todos and memories, and {WEB_RESEARCH_TAG} holds pages found on the web.
Combine them to answer the question. Prefer the user's data for anything personal, use the web for general facts, and cite web sources by URL.

{context}

Question: {question}

Answer:"#
    )
}

/// Join personal and web context into one tagged block.
pub fn tagged_context(personal: &str, web: &str) -> String {
    let section = |body: &str| {
        if body.trim().is_empty() {
            "(nothing found)".to_string()
        } else {
            body.trim().to_string()
        }
    };
    format!(
        "=== {YOUR_DATA_TAG} ===\n{}\n\n=== {WEB_RESEARCH_TAG} ===\n{}",
        section(personal),
        section(web)
    )
}

/// Parse web queries from a free-form model response.
///
/// Accepts a bare JSON array or one embedded in prose or a code fence.
/// Blank and duplicate queries are dropped; at most `max` are returned.
pub fn parse_search_queries(response: &str, max: usize) -> Result<Vec<String>> {
    let start = response
        .find('[')
        .ok_or_else(|| Error::Parse("no JSON array in query response".to_string()))?;
    let end = response
        .rfind(']')
        .filter(|&end| end > start)
        .ok_or_else(|| Error::Parse("unterminated JSON array in query response".to_string()))?;

    let parsed: Vec<serde_json::Value> = serde_json::from_str(&response[start..=end])
        .map_err(|e| Error::Parse(format!("query response is not a JSON array: {}", e)))?;

    let mut queries: Vec<String> = Vec::new();
    for value in parsed {
        let Some(query) = value.as_str().map(str::trim) else {
            continue;
        };
        if query.is_empty() || queries.iter().any(|q| q.eq_ignore_ascii_case(query)) {
            continue;
        }
        queries.push(query.to_string());
        if queries.len() == max {
            break;
        }
    }

    if queries.is_empty() {
        return Err(Error::Parse("query response has no usable queries".to_string()));
    }
    Ok(queries)
}
