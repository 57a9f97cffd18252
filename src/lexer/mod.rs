//! Line-oriented scanner for the Kconfig language.
//!
//! Kconfig is line-based in practice: every statement fits on one logical
//! line (continuation backslashes are joined by the file feeder before the
//! scanner sees them), so tokenization works a line at a time. The first
//! token of a statement line must be a keyword; the scanner leaves the
//! keyword-vs-symbol-vs-string decision for later words to the parser,
//! which knows the context.
//!
//! `$NAME` and `$(NAME)` references are replaced from the process
//! environment in a single lexical (non-recursive) pass over each logical
//! line before scanning; unset variables expand to empty. Help-text lines
//! bypass the scanner entirely and are never expanded.

pub mod token;

#[cfg(test)]
mod tests;

use std::env;

use once_cell::sync::Lazy;
use regex::Regex;

pub use token::{Keyword, Token, KEYWORDS};

use crate::errors::KconfigError;

/// Matches the initial keyword of a statement line. Leading non-word
/// characters are skipped, which is why spellings like `---help---` are
/// accepted. Fails on blank and comment-only lines.
static INITIAL_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\w#]*(\w+)[ \t]*").unwrap());

/// Matches an identifier/keyword, eating trailing whitespace.
static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([\w./-]+)[ \t]*").unwrap());

static ENV_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\(([A-Za-z0-9_]+)\)|\$([A-Za-z0-9_]+)").unwrap());

/// Replaces `$NAME` / `$(NAME)` with the environment variable's value, in
/// one pass. Unset variables expand to the empty string. The result is not
/// rescanned, so expansion cannot recurse.
pub fn expand_env(s: &str) -> String {
    if !s.contains('$') {
        return s.to_owned();
    }
    ENV_REF_RE
        .replace_all(s, |caps: &regex::Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap();
            env::var(name).unwrap_or_default()
        })
        .into_owned()
}

/// Tokenizes one logical line. Returns `Ok(None)` for blank and
/// comment-only lines. The line must start with a keyword; anything else is
/// a tokenization error (`filename`/`linenr` locate the message).
pub fn tokenize_line(
    line: &str,
    filename: &str,
    linenr: usize,
) -> Result<Option<Vec<Token>>, KconfigError> {
    let expanded = expand_env(line);
    let s = expanded.as_str();

    let initial = match INITIAL_TOKEN_RE.captures(s) {
        Some(caps) => caps,
        None => return Ok(None),
    };

    let word = initial.get(1).unwrap().as_str();
    let keyword = match KEYWORDS.get(word) {
        Some(&kw) => kw,
        None => return Err(KconfigError::tokenization(line, filename, linenr)),
    };

    if keyword == Keyword::Help {
        // Don't scan past "help": junk like the trailing dashes of
        // "---help---" must not end up tokenized.
        return Ok(Some(vec![Token::Key(Keyword::Help)]));
    }

    let mut tokens = vec![Token::Key(keyword)];
    scan_tokens(s, initial.get(0).unwrap().end(), line, filename, linenr, &mut tokens)?;
    Ok(Some(tokens))
}

/// Tokenizes a bare expression string (for `eval_string()`). No leading
/// keyword is expected.
pub fn tokenize_expr(s: &str) -> Result<Vec<Token>, KconfigError> {
    let expanded = expand_env(s);
    let mut tokens = Vec::new();
    scan_tokens(&expanded, 0, s, "<expression>", 0, &mut tokens)?;
    Ok(tokens)
}

fn scan_tokens(
    s: &str,
    mut i: usize,
    line: &str,
    filename: &str,
    linenr: usize,
    tokens: &mut Vec<Token>,
) -> Result<(), KconfigError> {
    while i < s.len() {
        // Identifiers and keywords are the common case
        if let Some(caps) = ID_RE.captures(&s[i..]) {
            let word = caps.get(1).unwrap().as_str();
            i += caps.get(0).unwrap().end();
            tokens.push(match KEYWORDS.get(word) {
                Some(&kw) => Token::Key(kw),
                None => Token::Name(word.to_owned()),
            });
            continue;
        }

        let c = s[i..].chars().next().unwrap();
        i += c.len_utf8();

        let token = match c {
            '"' | '\'' => {
                let (value, end) = scan_string(s, i, c)
                    .ok_or_else(|| KconfigError::tokenization(line, filename, linenr))?;
                i = end;
                Token::Literal(value)
            }
            '&' => {
                // Stray single characters are ignored
                if s[i..].starts_with('&') {
                    i += 1;
                    Token::And
                } else {
                    continue;
                }
            }
            '|' => {
                if s[i..].starts_with('|') {
                    i += 1;
                    Token::Or
                } else {
                    continue;
                }
            }
            '!' => {
                if s[i..].starts_with('=') {
                    i += 1;
                    Token::Unequal
                } else {
                    Token::Not
                }
            }
            '=' => Token::Equal,
            '<' => {
                if s[i..].starts_with('=') {
                    i += 1;
                    Token::LessEqual
                } else {
                    Token::Less
                }
            }
            '>' => {
                if s[i..].starts_with('=') {
                    i += 1;
                    Token::GreaterEqual
                } else {
                    Token::Greater
                }
            }
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            '#' => break,
            _ => continue,
        };

        tokens.push(token);
    }

    Ok(())
}

/// Scans a quoted string starting just past the opening quote. A backslash
/// escapes the following character (`\"`, `\\`, `\'`). Returns the value
/// and the index just past the closing quote, or `None` if unterminated.
fn scan_string(s: &str, start: usize, quote: char) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut chars = s[start..].char_indices();

    while let Some((off, c)) = chars.next() {
        if c == quote {
            return Some((value, start + off + c.len_utf8()));
        }
        if c == '\\' {
            let (_, escaped) = chars.next()?;
            value.push(escaped);
        } else {
            value.push(c);
        }
    }

    None
}

/// Length of the line's leading whitespace in columns, with tab stops every
/// 8 characters.
pub(crate) fn indentation(line: &str) -> usize {
    let mut col = 0;
    for c in line.chars() {
        match c {
            ' ' => col += 1,
            '\t' => col = (col / 8 + 1) * 8,
            _ => break,
        }
    }
    col
}

/// Strips `indent` columns of leading whitespace, expanding tabs.
pub(crate) fn deindent(line: &str, indent: usize) -> String {
    let mut expanded = String::with_capacity(line.len());
    let mut col = 0;
    for c in line.chars() {
        if c == '\t' {
            let next_stop = (col / 8 + 1) * 8;
            while col < next_stop {
                expanded.push(' ');
                col += 1;
            }
        } else {
            expanded.push(c);
            col += 1;
        }
    }

    if expanded.chars().count() <= indent {
        expanded
    } else {
        expanded.chars().skip(indent).collect()
    }
}
