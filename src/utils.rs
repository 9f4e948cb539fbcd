// ABOUTME: Shared text helpers for outbound LINE messages
// ABOUTME: Splits long answers into platform-sized chunks without altering their content

/// Maximum characters in a single LINE text message
pub const MAX_CHUNK_SIZE: usize = 5000;

/// Split long text into chunks of at most `max_chars` characters, preferring
/// to break after a newline. Concatenating the chunks yields the input.
pub fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        // Byte offset just past the max_chars-th character
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        let split_at = match rest[..limit].rfind('\n') {
            Some(newline) if newline > 0 => newline + 1,
            _ => limit,
        };

        chunks.push(rest[..split_at].to_string());
        rest = &rest[split_at..];
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }

    chunks
}
