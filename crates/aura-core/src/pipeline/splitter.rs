//! Thread splitting.
//!
//! Packs text into segments that fit the per-post limit, breaking only at
//! whitespace and numbering the segments ` (i/n)` when there is more than
//! one. Lengths are counted in characters.

/// Split `text` into post-sized segments of at most `max_len` characters.
///
/// A single word longer than the available space is the one case that is
/// cut mid-word, since it cannot be posted otherwise.
pub fn split_into_segments(text: &str, max_len: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    // The suffix width depends on the segment count, so repack until the
    // reserved width matches the digits actually needed.
    let mut digits = 1;
    loop {
        let reserve = suffix_len(digits);
        let capacity = max_len.saturating_sub(reserve).max(1);
        let chunks = pack(text, capacity);
        let total = chunks.len();
        if count_digits(total) <= digits {
            return chunks
                .into_iter()
                .enumerate()
                .map(|(i, chunk)| format!("{chunk} ({}/{total})", i + 1))
                .collect();
        }
        digits = count_digits(total);
    }
}

/// Length of ` (i/n)` when both numbers have at most `digits` digits.
fn suffix_len(digits: usize) -> usize {
    4 + 2 * digits
}

fn count_digits(n: usize) -> usize {
    n.to_string().len()
}

/// Greedy word packing. Whitespace inside a segment is kept as written;
/// the whitespace run at a segment boundary is consumed.
fn pack(text: &str, capacity: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for (separator, word) in words_with_separators(text) {
        let word_len = word.chars().count();
        let sep_len = separator.chars().count();

        if current.is_empty() {
            // fall through to placement below
        } else if current_len + sep_len + word_len <= capacity {
            current.push_str(separator);
            current.push_str(word);
            current_len += sep_len + word_len;
            continue;
        } else {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if word_len <= capacity {
            current.push_str(word);
            current_len = word_len;
        } else {
            let chars: Vec<char> = word.chars().collect();
            let mut pieces = chars.chunks(capacity).peekable();
            while let Some(piece) = pieces.next() {
                let piece: String = piece.iter().collect();
                if pieces.peek().is_some() {
                    chunks.push(piece);
                } else {
                    current_len = piece.chars().count();
                    current = piece;
                }
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Pairs of (whitespace before the word, word).
fn words_with_separators(text: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let word_start = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        let (separator, tail) = rest.split_at(word_start);
        if tail.is_empty() {
            break;
        }
        let word_end = tail.find(char::is_whitespace).unwrap_or(tail.len());
        let (word, remainder) = tail.split_at(word_end);
        out.push((separator, word));
        rest = remainder;
    }
    out
}

/// Strip the ` (i/n)` suffix added by [`split_into_segments`].
pub fn strip_numbering(segment: &str) -> &str {
    let Some(open) = segment.rfind(" (") else {
        return segment;
    };
    let suffix = &segment[open + 2..];
    let is_numbering = suffix
        .strip_suffix(')')
        .and_then(|inner| inner.split_once('/'))
        .is_some_and(|(i, n)| {
            !i.is_empty()
                && !n.is_empty()
                && i.chars().all(|c| c.is_ascii_digit())
                && n.chars().all(|c| c.is_ascii_digit())
        });
    if is_numbering { &segment[..open] } else { segment }
}
