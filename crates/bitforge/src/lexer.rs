//! Lexer for the schema mini-language.
//!
//! Tokens carry byte spans so the parser can report positions in
//! [CompileError::Syntax](crate::errors::CompileError::Syntax) messages.

use std::ops::Range;

use logos::Logos;

use crate::errors::CompileError;

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token(":")]
    Colon,

    #[token(";")]
    Semi,

    #[token(",")]
    Comma,

    #[token("=")]
    Equals,

    #[token("_")]
    Underscore,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("*")]
    Star,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[A-Za-z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    /// Double-quoted byte string with backslash escapes.
    #[regex(r#""(?:[^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(Vec<u8>),
}

/// Decodes the escapes inside a quoted literal. Returns `None` on an
/// unsupported escape, which surfaces as a lexer error.
fn unescape(quoted: &str) -> Option<Vec<u8>> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next()? {
            '0' => out.push(0),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            '\\' => out.push(b'\\'),
            '"' => out.push(b'"'),
            _ => return None,
        }
    }
    Some(out)
}

/// Tokenizes `source`, failing on the first unrecognized fragment.
pub fn lex(source: &str) -> Result<Vec<(Token, Range<usize>)>, CompileError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                return Err(CompileError::Syntax {
                    position: lexer.span().start,
                    message: format!("unrecognized token `{}`", lexer.slice()),
                });
            }
        }
    }
    Ok(tokens)
}
