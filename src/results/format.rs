//! Rendering of merged results into a source report

use super::container::ResultContainer;
use super::types::QueryResponse;
use std::fmt::Write;
use tracing::{debug, warn};

/// Characters per token used to turn a token budget into a character budget
pub const CHARS_PER_TOKEN: usize = 4;

/// Marker appended to raw content that was cut to fit the budget
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Deduplicate results from all responses and render them as a single
/// text document.
///
/// Raw content is limited to `max_tokens_per_source * 4` characters. The
/// layout (header, `===` separators, field labels) is consumed literally
/// downstream.
pub fn deduplicate_and_format_sources(
    responses: &[QueryResponse],
    max_tokens_per_source: usize,
    include_raw_content: bool,
) -> String {
    let container = ResultContainer::from_responses(responses);
    format_sources(&container, max_tokens_per_source, include_raw_content)
}

/// Render the results of a container
pub fn format_sources(
    container: &ResultContainer,
    max_tokens_per_source: usize,
    include_raw_content: bool,
) -> String {
    let char_limit = max_tokens_per_source.saturating_mul(CHARS_PER_TOKEN);
    debug!(
        "Formatting {} sources ({} duplicates dropped)",
        container.result_count(),
        container.duplicate_count()
    );
    let mut text = String::from("Sources:\n\n");

    for source in container.results() {
        let _ = write!(text, "Source {}:\n===\n", source.title);
        let _ = write!(text, "URL: {}\n===\n", source.url);
        let _ = write!(
            text,
            "Most relevant content from source: {}\n===\n",
            source.content
        );

        if include_raw_content {
            let raw_content = match source.raw_content.as_deref() {
                Some(raw) => truncate_chars(raw, char_limit),
                None => {
                    warn!("No raw_content found for source {}", source.url);
                    String::new()
                }
            };
            let _ = write!(
                text,
                "Full source content limited to {} tokens: {}\n\n",
                max_tokens_per_source, raw_content
            );
        }
    }

    text.trim_end().to_string()
}

/// Cut `text` to `limit` characters, appending the truncation marker when
/// anything was removed
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => format!("{}{}", &text[..byte_index], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
