//! Query normalization.
//!
//! Produces the canonical text used for keyword checks, execution, cache keys
//! and logs. Only the syntax around literals changes: whitespace runs
//! collapse to one space, comments disappear, trailing terminators are
//! dropped and structural keywords are upper-cased. Quoted strings, quoted
//! identifiers and numbers are copied verbatim.

/// Keywords upper-cased during normalization. Must stay sorted.
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CROSS", "DESC", "DISTINCT", "ELSE",
    "END", "EXCEPT", "EXISTS", "FROM", "FULL", "GROUP", "HAVING", "IN", "INNER", "INTERSECT",
    "IS", "JOIN", "LEFT", "LIKE", "LIMIT", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER",
    "OUTER", "RECURSIVE", "RIGHT", "SELECT", "THEN", "UNION", "WHEN", "WHERE", "WITH",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Space,
    Comment,
    Literal { terminated: bool },
    Word,
    Symbol,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind,
    offset: usize,
    text: &'a str,
}

/// Splits query text into whitespace, comments, literals, words and symbols.
struct Tokens<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.src[self.pos..];
        let first = rest.chars().next()?;

        let (kind, len) = if first.is_whitespace() {
            let len = rest
                .find(|c: char| !c.is_whitespace())
                .unwrap_or(rest.len());
            (TokenKind::Space, len)
        } else if rest.starts_with("--") {
            let len = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
            (TokenKind::Comment, len)
        } else if rest.starts_with("/*") {
            let len = rest[2..].find("*/").map(|i| i + 4).unwrap_or(rest.len());
            (TokenKind::Comment, len)
        } else if let Some(close) = closing_quote(first) {
            let (len, terminated) = quoted_len(rest, first, close);
            (TokenKind::Literal { terminated }, len)
        } else if let Some(delimiter) = dollar_delimiter(rest) {
            let body = &rest[delimiter.len()..];
            match body.find(delimiter) {
                Some(i) => (
                    TokenKind::Literal { terminated: true },
                    delimiter.len() * 2 + i,
                ),
                None => (TokenKind::Literal { terminated: false }, rest.len()),
            }
        } else if is_word_char(first) {
            let len = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
            (TokenKind::Word, len)
        } else {
            (TokenKind::Symbol, first.len_utf8())
        };

        let token = Token {
            kind,
            offset: self.pos,
            text: &rest[..len],
        };
        self.pos += len;
        Some(token)
    }
}

fn closing_quote(open: char) -> Option<char> {
    match open {
        '\'' => Some('\''),
        '"' => Some('"'),
        '`' => Some('`'),
        '[' => Some(']'),
        _ => None,
    }
}

/// Length of a quoted literal starting at `rest`, and whether it is closed.
///
/// A doubled closing character inside the literal is an escape.
fn quoted_len(rest: &str, open: char, close: char) -> (usize, bool) {
    let body_start = open.len_utf8();
    let mut chars = rest[body_start..].char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != close {
            continue;
        }
        if chars.peek().map(|&(_, next)| next) == Some(close) {
            chars.next();
            continue;
        }
        return (body_start + i + c.len_utf8(), true);
    }

    (rest.len(), false)
}

/// Recognize a dollar-quote opener such as `$$` or `$body$`.
fn dollar_delimiter(rest: &str) -> Option<&str> {
    let after = rest.strip_prefix('$')?;
    if after.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let tag_len = after
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(after.len());
    if after[tag_len..].starts_with('$') {
        Some(&rest[..tag_len + 2])
    } else {
        None
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn push_word(out: &mut String, word: &str) {
    let upper = word.to_ascii_uppercase();
    if STRUCTURAL_KEYWORDS.binary_search(&upper.as_str()).is_ok() {
        out.push_str(&upper);
    } else {
        out.push_str(word);
    }
}

/// Canonicalize query text.
///
/// Idempotent: `normalize(&normalize(q)) == normalize(q)`. If the text ends
/// inside an unterminated literal, that literal is kept as-is and no
/// terminator is stripped.
pub fn normalize(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut pending_space = false;
    let mut open_literal = false;

    for token in Tokens::new(query) {
        match token.kind {
            TokenKind::Space | TokenKind::Comment => {
                pending_space = true;
                continue;
            }
            TokenKind::Literal { terminated } => open_literal = !terminated,
            TokenKind::Word | TokenKind::Symbol => {}
        }

        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;

        if token.kind == TokenKind::Word {
            push_word(&mut out, token.text);
        } else {
            out.push_str(token.text);
        }
    }

    if !open_literal {
        while out.ends_with(';') || out.ends_with(' ') {
            out.pop();
        }
    }

    out
}

/// Split text into statements on `;` separators outside literals.
///
/// Fragments are trimmed and empty fragments are dropped.
pub fn split_statements(query: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;

    for token in Tokens::new(query) {
        if token.kind == TokenKind::Symbol && token.text == ";" {
            statements.push(query[start..token.offset].trim());
            start = token.offset + 1;
        }
    }
    statements.push(query[start..].trim());

    statements.retain(|s| !s.is_empty());
    statements
}
