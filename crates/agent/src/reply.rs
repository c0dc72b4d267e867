//! Splitting replies to fit the platform's message size limit.

/// Discord's per-message character limit.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Split `text` into chunks of at most `limit` characters.
///
/// Chunks break on line boundaries. A single line longer than `limit` is
/// hard-split.
pub fn split_reply(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed <= limit {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if line_len <= limit {
            current.push_str(line);
            current_len = line_len;
        } else {
            let chars: Vec<char> = line.chars().collect();
            let mut pieces = chars.chunks(limit).map(|c| c.iter().collect::<String>());
            let last = pieces.next_back().unwrap_or_default();
            chunks.extend(pieces);
            current_len = last.chars().count();
            current = last;
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}
