//! Glob matching for key scans.
//!
//! Two wildcards are understood: `*` matches any run of characters
//! (including none) and `?` matches exactly one character. A backslash
//! makes the next character literal, so `\*` matches only `*`. A trailing
//! lone backslash matches itself. Everything else matches itself.

use std::borrow::Cow;

const ESCAPE: char = '\\';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(char),
    One,
    Any,
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '*' => Token::Any,
            '?' => Token::One,
            ESCAPE => Token::Literal(chars.next().unwrap_or(ESCAPE)),
            c => Token::Literal(c),
        });
    }
    tokens
}

/// Returns `true` if `key` matches the glob `pattern`.
#[must_use]
pub fn matches(key: &str, pattern: &str) -> bool {
    if !pattern.contains(['*', '?', ESCAPE]) {
        return key == pattern;
    }

    let key: Vec<char> = key.chars().collect();
    let pattern = tokenize(pattern);

    let (mut k, mut p) = (0, 0);
    // Position of the last `*` seen and the key index it is currently
    // standing in for.
    let mut star: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some(Token::Any) => {
                star = Some((p, k));
                p += 1;
            }
            Some(Token::One) => {
                k += 1;
                p += 1;
            }
            Some(Token::Literal(c)) if *c == key[k] => {
                k += 1;
                p += 1;
            }
            _ => match star {
                Some((star_p, star_k)) => {
                    p = star_p + 1;
                    k = star_k + 1;
                    star = Some((star_p, star_k + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|t| *t == Token::Any)
}

/// Returns the literal text of `pattern` before its first wildcard, with
/// escapes resolved.
///
/// Every key matching `pattern` starts with this prefix, so it bounds the
/// range an ordered scan has to visit. For a pattern without wildcards it
/// is the one key the pattern matches.
#[must_use]
pub fn literal_prefix(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains(ESCAPE) {
        return match pattern.find(['*', '?']) {
            Some(idx) => Cow::Borrowed(&pattern[..idx]),
            None => Cow::Borrowed(pattern),
        };
    }

    let prefix: String = tokenize(pattern)
        .into_iter()
        .map_while(|token| match token {
            Token::Literal(c) => Some(c),
            Token::One | Token::Any => None,
        })
        .collect();
    Cow::Owned(prefix)
}

/// Returns `true` if `pattern` contains an unescaped `*` or `?`.
#[must_use]
pub fn has_wildcards(pattern: &str) -> bool {
    if !pattern.contains(ESCAPE) {
        return pattern.contains(['*', '?']);
    }
    tokenize(pattern)
        .iter()
        .any(|token| !matches!(token, Token::Literal(_)))
}

/// Escapes `literal` so that it matches only itself when used in a pattern.
#[must_use]
pub fn escape(literal: &str) -> Cow<'_, str> {
    if !literal.contains(['*', '?', ESCAPE]) {
        return Cow::Borrowed(literal);
    }
    let mut escaped = String::with_capacity(literal.len() + 2);
    for c in literal.chars() {
        if matches!(c, '*' | '?' | ESCAPE) {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}
