//! Cursor math and token helpers for the line editor
//!
//! All offsets here are **character** offsets, not byte offsets: the
//! terminal moves its cursor one glyph at a time, so the editor reasons
//! in the same unit and converts to byte indices only when slicing.

/// Number of characters in `input`.
pub fn char_len(input: &str) -> usize {
    input.chars().count()
}

/// Byte index of the character at `offset`, or `input.len()` past the end.
pub fn byte_of(input: &str, offset: usize) -> usize {
    input
        .char_indices()
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(input.len())
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Start of the word at or before `offset`, for Alt+Left / Ctrl+Backspace.
pub fn closest_left_boundary(input: &str, offset: usize) -> usize {
    let chars: Vec<char> = input.chars().collect();
    let mut boundary = 0;
    let mut in_word = false;
    for (i, &c) in chars.iter().enumerate().take(offset.min(chars.len())) {
        if is_word_char(c) && !in_word {
            if i < offset {
                boundary = i;
            }
            in_word = true;
        } else if !is_word_char(c) {
            in_word = false;
        }
    }
    if boundary >= offset { 0 } else { boundary }
}

/// End of the word at or after `offset`, for Alt+Right.
pub fn closest_right_boundary(input: &str, offset: usize) -> usize {
    let chars: Vec<char> = input.chars().collect();
    let mut in_word = false;
    for (i, &c) in chars.iter().enumerate() {
        if is_word_char(c) {
            in_word = true;
        } else if in_word {
            if i > offset {
                return i;
            }
            in_word = false;
        }
    }
    if in_word && chars.len() > offset {
        return chars.len();
    }
    chars.len()
}

/// Rows the input occupies on a `cols`-wide terminal.
pub fn count_lines(input: &str, cols: usize) -> usize {
    offset_to_col_row(input, char_len(input), cols).1 + 1
}

/// Map a character offset to an on-screen `(col, row)` position. A column
/// reaching `cols` wraps to the start of the next row; a newline advances
/// the row and resets the column.
pub fn offset_to_col_row(input: &str, offset: usize, cols: usize) -> (usize, usize) {
    let mut col = 0;
    let mut row = 0;
    for c in input.chars().take(offset) {
        if c == '\n' {
            col = 0;
            row += 1;
        } else {
            col += 1;
            if col == cols {
                col = 0;
                row += 1;
            }
        }
    }
    (col, row)
}

/// Whether Enter should continue the line instead of submitting it:
/// an unclosed quote, a trailing line-continuation backslash, or a
/// dangling `&&` / `||` / `|` operator.
pub fn is_incomplete_input(input: &str) -> bool {
    if input.trim().is_empty() {
        return false;
    }
    let mut singles = 0usize;
    let mut doubles = 0usize;
    let mut escaped = false;
    for c in input.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\'' => singles += 1,
            '"' => doubles += 1,
            _ => {}
        }
    }
    if singles % 2 != 0 || doubles % 2 != 0 {
        return true;
    }
    if escaped {
        // Line ended right after an unmatched backslash.
        return true;
    }
    let trimmed = input.trim_end();
    if trimmed.ends_with("&&") || trimmed.ends_with("||") {
        return true;
    }
    if trimmed.ends_with('|') && !trimmed.ends_with("||") {
        return true;
    }
    false
}

/// Whether the input ends with unescaped whitespace, meaning the cursor
/// sits on a fresh (empty) token.
pub fn has_trailing_whitespace(input: &str) -> bool {
    let chars: Vec<char> = input.chars().collect();
    match chars.as_slice() {
        [] => false,
        [c] => *c == ' ' || *c == '\t',
        [.., before, last] => (*last == ' ' || *last == '\t') && *before != '\\',
    }
}

/// Lenient quote-aware tokenization: an unterminated quote swallows the
/// rest of the line instead of failing, which is what completion wants
/// while the user is still typing.
pub fn tokenize_lenient(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\n' => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            '\\' => {
                started = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '\'' | '"' => {
                started = true;
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                    current.push(inner);
                }
            }
            _ => {
                started = true;
                current.push(c);
            }
        }
    }
    if started {
        words.push(current);
    }
    words
}

/// The token the cursor is completing: empty after trailing whitespace,
/// otherwise the last token of the line so far.
pub fn last_token(input: &str) -> String {
    if input.trim().is_empty() || has_trailing_whitespace(input) {
        return String::new();
    }
    tokenize_lenient(input).pop().unwrap_or_default()
}

/// Longest extension of `fragment` shared by every candidate. `None` when
/// some candidate does not start with `fragment` at all.
pub fn shared_fragment(fragment: &str, candidates: &[String]) -> Option<String> {
    let first = candidates.first()?;
    if candidates.iter().any(|c| !c.starts_with(fragment)) {
        return None;
    }
    let mut shared: Vec<char> = first.chars().collect();
    for candidate in &candidates[1..] {
        let mut common = 0;
        for (a, b) in shared.iter().zip(candidate.chars()) {
            if *a != b {
                break;
            }
            common += 1;
        }
        shared.truncate(common);
    }
    let shared: String = shared.into_iter().collect();
    if shared.len() >= fragment.len() {
        Some(shared)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============ Geometry ============

    #[test]
    fn test_offset_wraps_at_column_width() {
        // "abcdef" on 3 columns: d is the second glyph of the second row.
        assert_eq!(offset_to_col_row("abcdef", 4, 3), (1, 1));
        assert_eq!(offset_to_col_row("abcdef", 3, 3), (0, 1));
        assert_eq!(offset_to_col_row("abcdef", 0, 3), (0, 0));
    }

    #[test]
    fn test_newline_advances_row() {
        assert_eq!(offset_to_col_row("ab\ncd", 3, 80), (0, 1));
        assert_eq!(offset_to_col_row("ab\ncd", 5, 80), (2, 1));
    }

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines("", 3), 1);
        assert_eq!(count_lines("ab", 3), 1);
        assert_eq!(count_lines("abc", 3), 2);
        assert_eq!(count_lines("abcdef", 3), 3);
        assert_eq!(count_lines("a\nb", 80), 2);
    }

    // ============ Word boundaries ============

    #[test]
    fn test_left_boundary() {
        assert_eq!(closest_left_boundary("foo bar baz", 9), 8);
        assert_eq!(closest_left_boundary("foo bar baz", 8), 4);
        assert_eq!(closest_left_boundary("foo bar baz", 2), 0);
        assert_eq!(closest_left_boundary("foo", 0), 0);
    }

    #[test]
    fn test_right_boundary() {
        assert_eq!(closest_right_boundary("foo bar baz", 0), 3);
        assert_eq!(closest_right_boundary("foo bar baz", 3), 7);
        assert_eq!(closest_right_boundary("foo bar baz", 8), 11);
        assert_eq!(closest_right_boundary("foo", 3), 3);
    }

    // ============ Continuation detection ============

    #[test]
    fn test_incomplete_input() {
        assert!(is_incomplete_input("echo 'unterminated"));
        assert!(is_incomplete_input("echo \"half"));
        assert!(is_incomplete_input("echo one \\"));
        assert!(is_incomplete_input("true &&"));
        assert!(is_incomplete_input("a ||"));
        assert!(is_incomplete_input("a |"));
        assert!(!is_incomplete_input("echo done"));
        assert!(!is_incomplete_input("echo 'closed'"));
        assert!(!is_incomplete_input("echo a\\\\"));
        assert!(!is_incomplete_input("   "));
    }

    // ============ Tokens ============

    #[test]
    fn test_last_token() {
        assert_eq!(last_token("cat /tmp/fi"), "/tmp/fi");
        assert_eq!(last_token("cat "), "");
        assert_eq!(last_token(""), "");
        assert_eq!(last_token("echo 'two words"), "two words");
    }

    #[test]
    fn test_tokenize_lenient() {
        assert_eq!(tokenize_lenient("a b  c"), ["a", "b", "c"]);
        assert_eq!(tokenize_lenient("say 'hello world'"), ["say", "hello world"]);
        assert_eq!(tokenize_lenient("say \"unclosed rest"), ["say", "unclosed rest"]);
        assert_eq!(tokenize_lenient("path\\ with\\ space"), ["path with space"]);
        assert!(tokenize_lenient("   ").is_empty());
    }

    #[test]
    fn test_shared_fragment() {
        let candidates = vec!["push".to_string(), "pull".to_string()];
        assert_eq!(shared_fragment("p", &candidates), Some("pu".to_string()));
        let disjoint = vec!["push".to_string(), "fetch".to_string()];
        assert_eq!(shared_fragment("p", &disjoint), None);
        let single = vec!["status".to_string()];
        assert_eq!(shared_fragment("st", &single), Some("status".to_string()));
    }
}
