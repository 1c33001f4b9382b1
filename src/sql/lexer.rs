//! Minimal SQL tokenizer
//!
//! Not a parser. It only knows enough to keep string literals, comments,
//! dollar-quoted bodies and delimited identifiers from being mistaken for
//! code, which is all the placeholder counter and the dependency scanner
//! need. Input never fails to tokenize; unterminated constructs run to the
//! end of the text.

/// A lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Unquoted identifier or keyword, as written
    Word(String),
    /// Delimited identifier with the quotes removed
    QuotedIdent(String),
    /// String literal or dollar-quoted body (contents dropped)
    StringLit,
    /// Numeric literal
    Number(String),
    /// Positional placeholder: `?`, `?NNN` or `$n`
    Placeholder(Option<usize>),
    /// Embedded-SQL host variable (`:name`)
    HostVar(String),
    /// Any other single character
    Symbol(char),
}

impl Token {
    /// Keyword comparison for unquoted words (ASCII case-insensitive)
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    pub fn is_symbol(&self, c: char) -> bool {
        matches!(self, Token::Symbol(s) if *s == c)
    }

    /// Identifier text and whether it was delimited
    pub fn identifier(&self) -> Option<(&str, bool)> {
        match self {
            Token::Word(w) => Some((w.as_str(), false)),
            Token::QuotedIdent(q) => Some((q.as_str(), true)),
            _ => None,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '#' | '@')
}

/// Split SQL text into tokens, dropping whitespace and comments
pub fn tokenize(sql: &str) -> Vec<Token> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
        } else if c == '-' && next == Some('-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && next == Some('*') {
            // PostgreSQL allows nested block comments
            let mut depth = 0;
            while i < chars.len() {
                if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
                    depth += 1;
                    i += 2;
                } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    depth -= 1;
                    i += 2;
                    if depth == 0 {
                        break;
                    }
                } else {
                    i += 1;
                }
            }
        } else if c == '\'' {
            i = skip_quoted(&chars, i, '\'').0;
            tokens.push(Token::StringLit);
        } else if c == '"' {
            let (end, text) = skip_quoted(&chars, i, '"');
            i = end;
            tokens.push(Token::QuotedIdent(text));
        } else if c == '$' {
            i = lex_dollar(&chars, i, &mut tokens);
        } else if c == '?' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end].is_ascii_digit() {
                end += 1;
            }
            let index = chars[start..end].iter().collect::<String>().parse().ok();
            tokens.push(Token::Placeholder(index));
            i = end;
        } else if c == ':' && next == Some(':') {
            tokens.push(Token::Symbol(':'));
            tokens.push(Token::Symbol(':'));
            i += 2;
        } else if c == ':' && next.is_some_and(is_ident_start) {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && is_ident_continue(chars[end]) {
                end += 1;
            }
            tokens.push(Token::HostVar(chars[start..end].iter().collect()));
            i = end;
        } else if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
        } else {
            tokens.push(Token::Symbol(c));
            i += 1;
        }
    }

    tokens
}

/// Skip a quoted run starting at `start` (doubled quote = escaped quote).
///
/// Returns the index after the closing quote and the unescaped contents.
fn skip_quoted(chars: &[char], start: usize, quote: char) -> (usize, String) {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                text.push(quote);
                i += 2;
                continue;
            }
            return (i + 1, text);
        }
        text.push(chars[i]);
        i += 1;
    }
    (i, text)
}

/// Lex `$n` placeholders and `$tag$ ... $tag$` bodies
fn lex_dollar(chars: &[char], start: usize, tokens: &mut Vec<Token>) -> usize {
    let mut i = start + 1;

    if chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        let index = chars[start + 1..i].iter().collect::<String>().parse().ok();
        tokens.push(Token::Placeholder(index));
        return i;
    }

    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
        i += 1;
    }
    if chars.get(i) != Some(&'$') {
        tokens.push(Token::Symbol('$'));
        return start + 1;
    }

    let tag: Vec<char> = chars[start..=i].to_vec();
    i += 1;
    while i < chars.len() {
        if chars[i..].starts_with(&tag) {
            tokens.push(Token::StringLit);
            return i + tag.len();
        }
        i += 1;
    }
    tokens.push(Token::StringLit);
    i
}

/// Number of parameters a statement expects.
///
/// Bare `?` markers count individually; numbered markers (`?3`, `$3`)
/// count up to the highest index.
pub fn placeholder_count(sql: &str) -> usize {
    let mut bare = 0;
    let mut highest = 0;
    for token in tokenize(sql) {
        match token {
            Token::Placeholder(None) => bare += 1,
            Token::Placeholder(Some(n)) => highest = highest.max(n),
            _ => {}
        }
    }
    bare.max(highest)
}
