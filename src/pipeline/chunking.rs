/// Deterministic transcript splitting for chunked summarization.
///
/// Chunks are cut at paragraph breaks when one falls inside the window,
/// otherwise at the last sentence end, otherwise at the last whitespace.
/// A chunk never ends mid-word: a single token longer than `max_chars`
/// extends its chunk to the next whitespace instead of being cut.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    debug_assert!(max_chars > 0);

    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let window_end = match rest.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(rest.to_string());
                break;
            }
        };

        let window = &rest[..window_end];
        let cut = paragraph_break(window)
            .or_else(|| sentence_end(window))
            .or_else(|| last_whitespace(window))
            .unwrap_or_else(|| {
                // one giant token: extend past the window rather than
                // splitting mid-word
                rest[window_end..]
                    .find(char::is_whitespace)
                    .map(|off| window_end + off)
                    .unwrap_or(rest.len())
            });

        chunks.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    chunks
}

fn paragraph_break(window: &str) -> Option<usize> {
    window.rfind("\n\n").filter(|&i| i > 0).map(|i| i + 2)
}

fn sentence_end(window: &str) -> Option<usize> {
    let mut last = None;
    let mut iter = window.char_indices().peekable();
    while let Some((_, c)) = iter.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(j, next)) = iter.peek() {
                if next.is_whitespace() && j > 0 {
                    last = Some(j);
                }
            }
        }
    }
    last
}

fn last_whitespace(window: &str) -> Option<usize> {
    window
        .char_indices()
        .filter(|(i, c)| c.is_whitespace() && *i > 0)
        .last()
        .map(|(i, _)| i)
}
