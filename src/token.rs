//! Lexical tokenizer used for approximate snippet matching.
//!
//! Tokens are deliberately dumb: maximal identifier runs, single punctuation
//! characters, no whitespace. That keeps matching insensitive to reformatting
//! while still giving byte offsets back into the document.

/// Canonical form every quote-like character normalizes to.
pub const CANONICAL_QUOTE: &str = "\"";

/// A single lexical token with byte offsets into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// The token text exactly as it appears in the source
    pub text: &'a str,
    /// Stylistic variants collapsed (quote style)
    pub normalized: &'a str,
    /// Starting byte offset (inclusive)
    pub start: usize,
    /// Ending byte offset (exclusive)
    pub end: usize,
}

impl<'a> Token<'a> {
    /// True for identifier/number runs as opposed to punctuation.
    pub fn is_word(&self) -> bool {
        self.text.chars().next().is_some_and(is_ident_char)
    }
}

/// Identifier characters for JavaScript-family sources.
pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_quote(c: char) -> bool {
    matches!(
        c,
        '"' | '\'' | '`' | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}'
    )
}

/// Split `source` into tokens. Whitespace is dropped; every other byte of the
/// source belongs to exactly one token.
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::with_capacity(source.len() / 4);
    let mut chars = source.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        if is_ident_char(c) {
            let mut end = start + c.len_utf8();
            while let Some(&(idx, next)) = chars.peek() {
                if !is_ident_char(next) {
                    break;
                }
                end = idx + next.len_utf8();
                chars.next();
            }
            let text = &source[start..end];
            tokens.push(Token {
                text,
                normalized: text,
                start,
                end,
            });
            continue;
        }

        let end = start + c.len_utf8();
        let text = &source[start..end];
        let normalized = if is_quote(c) { CANONICAL_QUOTE } else { text };
        tokens.push(Token {
            text,
            normalized,
            start,
            end,
        });
    }

    tokens
}

/// Token indices `[first, last)` of tokens lying fully inside `range`.
pub fn token_range_within(tokens: &[Token<'_>], range: std::ops::Range<usize>) -> (usize, usize) {
    let first = tokens.partition_point(|t| t.start < range.start);
    let last = tokens.partition_point(|t| t.end <= range.end);
    (first, last.max(first))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_identifiers_and_punctuation() {
        let tokens = tokenize("const fooBar = baz(1, $x);");
        let texts: Vec<_> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(
            texts,
            vec!["const", "fooBar", "=", "baz", "(", "1", ",", "$x", ")", ";"]
        );
    }

    #[test]
    fn offsets_point_back_into_source() {
        let source = "  let a =\n\t'b';";
        for token in tokenize(source) {
            assert_eq!(&source[token.start..token.end], token.text);
        }
    }

    #[test]
    fn quotes_normalize_to_one_symbol() {
        let single = tokenize("'x'");
        let double = tokenize("\"x\"");
        let backtick = tokenize("`x`");
        let curly = tokenize("\u{201C}x\u{201D}");
        let norm = |ts: &[Token<'static>]| ts.iter().map(|t| t.normalized).collect::<Vec<_>>();
        assert_eq!(norm(&single), norm(&double));
        assert_eq!(norm(&double), norm(&backtick));
        assert_eq!(norm(&backtick), norm(&curly));
        assert_eq!(single[0].text, "'");
    }

    #[test]
    fn unicode_identifiers_stay_whole() {
        let tokens = tokenize("const größe = 1;");
        assert_eq!(tokens[1].text, "größe");
    }

    #[test]
    fn token_range_within_selects_inner_tokens() {
        let source = "a b c d";
        let tokens = tokenize(source);
        assert_eq!(token_range_within(&tokens, 2..5), (1, 3));
        assert_eq!(token_range_within(&tokens, 0..0), (0, 0));
    }

    proptest! {
        #[test]
        fn tokens_cover_every_non_whitespace_byte(source in "[a-zA-Z0-9_ \n\t(){};'\"`.,=<>/*-]{0,200}") {
            let tokens = tokenize(&source);
            let mut covered = 0usize;
            let mut last_end = 0usize;
            for token in &tokens {
                prop_assert!(token.start >= last_end);
                prop_assert!(source[last_end..token.start].chars().all(char::is_whitespace));
                covered += token.end - token.start;
                last_end = token.end;
            }
            prop_assert!(source[last_end..].chars().all(char::is_whitespace));
            let non_ws: usize = source.chars().filter(|c| !c.is_whitespace()).map(char::len_utf8).sum();
            prop_assert_eq!(covered, non_ws);
        }
    }
}
