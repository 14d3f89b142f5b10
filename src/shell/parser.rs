//! Command-line parsing
//!
//! Splits a submitted line into words (quote- and escape-aware), then
//! separates flags from positional arguments. Stricter than the lenient
//! tokenizer the line editor uses while the user is still typing: an
//! unterminated quote here is an error, not a swallowed tail.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

/// Parsed flags, `name -> value`. Presence-only flags carry `"true"`.
pub type Flags = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unterminated quoted string
    UnterminatedQuote(char),
    /// Line ended in the middle of a backslash escape
    TrailingEscape,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnterminatedQuote(c) => write!(f, "unterminated {} quote", c),
            Self::TrailingEscape => write!(f, "trailing escape character"),
        }
    }
}

impl std::error::Error for ParseError {}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn next_word(&mut self) -> Result<Option<String>, ParseError> {
        self.skip_whitespace();
        if self.chars.peek().is_none() {
            return Ok(None);
        }

        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                c if c.is_whitespace() => break,
                // Quotes can appear mid-word: foo"bar"baz
                '"' | '\'' => {
                    self.chars.next();
                    word.push_str(&self.read_quoted_content(c)?);
                }
                '\\' => {
                    self.chars.next();
                    match self.chars.next() {
                        Some(escaped) => word.push(escaped),
                        None => return Err(ParseError::TrailingEscape),
                    }
                }
                _ => {
                    word.push(c);
                    self.chars.next();
                }
            }
        }
        Ok(Some(word))
    }

    fn read_quoted_content(&mut self, quote: char) -> Result<String, ParseError> {
        let mut content = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c == quote => break,
                Some('\\') if quote == '"' => {
                    // Escape sequences only inside double quotes
                    match self.chars.next() {
                        Some(escaped) => content.push(escaped),
                        None => return Err(ParseError::UnterminatedQuote(quote)),
                    }
                }
                Some(c) => content.push(c),
                None => return Err(ParseError::UnterminatedQuote(quote)),
            }
        }
        Ok(content)
    }
}

/// Split a line into words. Blank input yields an empty vector.
pub fn split_words(input: &str) -> Result<Vec<String>, ParseError> {
    let mut lexer = Lexer::new(input);
    let mut words = Vec::new();
    while let Some(word) = lexer.next_word()? {
        words.push(word);
    }
    Ok(words)
}

/// Separate flags from positional arguments.
///
/// `--name=value` binds a value, `--name` is presence-only, `-abc` sets
/// the short flags `a`, `b` and `c`, and a bare `--` ends flag parsing.
pub fn split_flags(words: &[String]) -> (Flags, Vec<String>) {
    let mut flags = Flags::new();
    let mut args = Vec::new();
    let mut positional_only = false;

    for word in words {
        if positional_only {
            args.push(word.clone());
        } else if word == "--" {
            positional_only = true;
        } else if let Some(long) = word.strip_prefix("--") {
            match long.split_once('=') {
                Some((name, value)) => {
                    flags.insert(name.to_string(), value.to_string());
                }
                None => {
                    flags.insert(long.to_string(), "true".to_string());
                }
            }
        } else if word.len() > 1 && word.starts_with('-') && !word[1..].starts_with(|c: char| c.is_ascii_digit()) {
            for c in word[1..].chars() {
                flags.insert(c.to_string(), "true".to_string());
            }
        } else {
            args.push(word.clone());
        }
    }
    (flags, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============ Word splitting ============

    #[test]
    fn test_simple_words() {
        let words = split_words("echo hello world").unwrap();
        assert_eq!(words, vec!["echo", "hello", "world"]);
    }

    #[test]
    fn test_blank_line_is_empty() {
        assert!(split_words("").unwrap().is_empty());
        assert!(split_words("   \t ").unwrap().is_empty());
    }

    #[test]
    fn test_single_quoted_string() {
        let words = split_words("echo 'hello world'").unwrap();
        assert_eq!(words, vec!["echo", "hello world"]);
    }

    #[test]
    fn test_concatenated_quotes() {
        let words = split_words(r#"echo foo"bar"baz"#).unwrap();
        assert_eq!(words, vec!["echo", "foobarbaz"]);
    }

    #[test]
    fn test_escaped_quote_in_double_quotes() {
        let words = split_words(r#"echo "say \"hi\"""#).unwrap();
        assert_eq!(words, vec!["echo", "say \"hi\""]);
    }

    #[test]
    fn test_escaped_space() {
        let words = split_words(r"cat one\ file").unwrap();
        assert_eq!(words, vec!["cat", "one file"]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            split_words("echo 'oops"),
            Err(ParseError::UnterminatedQuote('\''))
        );
        assert_eq!(
            split_words(r#"echo "oops"#),
            Err(ParseError::UnterminatedQuote('"'))
        );
    }

    #[test]
    fn test_trailing_escape() {
        assert_eq!(split_words("echo x\\"), Err(ParseError::TrailingEscape));
    }

    #[test]
    fn test_empty_quotes_make_empty_word() {
        let words = split_words("echo ''").unwrap();
        assert_eq!(words, vec!["echo", ""]);
    }

    // ============ Flags ============

    fn flags_of(line: &str) -> (Flags, Vec<String>) {
        let words = split_words(line).unwrap();
        split_flags(&words)
    }

    #[test]
    fn test_long_flag_with_value() {
        let (flags, args) = flags_of("--depth=3 path");
        assert_eq!(flags.get("depth").map(String::as_str), Some("3"));
        assert_eq!(args, vec!["path"]);
    }

    #[test]
    fn test_long_flag_presence() {
        let (flags, args) = flags_of("--force a b");
        assert_eq!(flags.get("force").map(String::as_str), Some("true"));
        assert_eq!(args, vec!["a", "b"]);
    }

    #[test]
    fn test_short_flag_cluster() {
        let (flags, args) = flags_of("-rf target");
        assert_eq!(flags.get("r").map(String::as_str), Some("true"));
        assert_eq!(flags.get("f").map(String::as_str), Some("true"));
        assert_eq!(args, vec!["target"]);
    }

    #[test]
    fn test_double_dash_ends_flags() {
        let (flags, args) = flags_of("-- --not-a-flag");
        assert!(flags.is_empty());
        assert_eq!(args, vec!["--not-a-flag"]);
    }

    #[test]
    fn test_negative_number_is_positional() {
        let (flags, args) = flags_of("-12 x");
        assert!(flags.is_empty());
        assert_eq!(args, vec!["-12", "x"]);
    }
}
