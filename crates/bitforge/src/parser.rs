//! Recursive-descent parser: schema text to parameter and declaration lists.
//!
//! Grammar:
//!
//! ```text
//! schema  := params? stmt (';' stmt)* ';'?
//! params  := '(' param (',' param)* ')'
//! param   := ident ':' type
//! stmt    := type ':' kind ('=' literal)?
//! type    := INT | IDENT | '*' ident '(' (expr (',' expr)*)? ')'
//! kind    := '_' | ident ('[' expr? ']')?
//! literal := INT | '-' INT | STRING
//! expr    := mul (('+'|'-') mul)* ; mul := term (('*'|'/'|'%') term)*
//! term    := INT | ident | '(' expr ')'
//! ```

use std::ops::Range;

use crate::ast::{BinOp, Declaration, Expr, KindSpec, Literal, Param, TypeToken};
use crate::errors::CompileError;
use crate::lexer::{self, Token};

pub fn parse(source: &str) -> Result<(Vec<Param>, Vec<Declaration>), CompileError> {
    let tokens = lexer::lex(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
    };
    let params = parser.params()?;
    let decls = parser.declarations()?;
    Ok((params, decls))
}

struct Parser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.end)
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            position: self.position(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), CompileError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected {}", what))),
        }
    }

    /// Optional parenthesised head: `(name: type, ...)`.
    fn params(&mut self) -> Result<Vec<Param>, CompileError> {
        let mut params = Vec::new();
        if !self.eat(&Token::ParenOpen) {
            return Ok(params);
        }
        loop {
            let name = self.ident("parameter name")?;
            self.expect(&Token::Colon, "`:` after parameter name")?;
            let ty = self.type_token()?;
            params.push(Param { name, ty });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::ParenClose, "`)` closing the parameter list")?;
        Ok(params)
    }

    fn declarations(&mut self) -> Result<Vec<Declaration>, CompileError> {
        let mut decls = Vec::new();
        while self.peek().is_some() {
            decls.push(self.declaration()?);
            if !self.eat(&Token::Semi) {
                break;
            }
        }
        if self.peek().is_some() {
            return Err(self.error("expected `;` between declarations"));
        }
        Ok(decls)
    }

    fn declaration(&mut self) -> Result<Declaration, CompileError> {
        let ty = self.type_token()?;
        self.expect(&Token::Colon, "`:` after the field type")?;
        let kind = self.kind_spec()?;
        let magic = if self.eat(&Token::Equals) {
            Some(self.literal()?)
        } else {
            None
        };
        Ok(Declaration { ty, kind, magic })
    }

    fn type_token(&mut self) -> Result<TypeToken, CompileError> {
        match self.peek() {
            Some(Token::Int(bits)) => {
                let bits = *bits;
                self.pos += 1;
                Ok(TypeToken::Bits(bits))
            }
            Some(Token::Ident(_)) => Ok(TypeToken::Word(self.ident("a field type")?)),
            Some(Token::Star) => {
                self.pos += 1;
                let parser = self.ident("sub-parser name after `*`")?;
                self.expect(&Token::ParenOpen, "`(` opening the argument list")?;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::ParenClose) {
                    loop {
                        args.push(self.expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&Token::ParenClose, "`)` closing the argument list")?;
                Ok(TypeToken::Call { parser, args })
            }
            _ => Err(self.error("expected a field type")),
        }
    }

    fn kind_spec(&mut self) -> Result<KindSpec, CompileError> {
        if self.eat(&Token::Underscore) {
            return Ok(KindSpec::Anonymous);
        }
        let name = self.ident("a field name or `_`")?;
        if !self.eat(&Token::BracketOpen) {
            return Ok(KindSpec::Named(name));
        }
        if self.eat(&Token::BracketClose) {
            return Ok(KindSpec::Open { name });
        }
        let count = self.expr()?;
        self.expect(&Token::BracketClose, "`]` closing the sequence count")?;
        Ok(KindSpec::Counted { name, count })
    }

    fn literal(&mut self) -> Result<Literal, CompileError> {
        match self.peek().cloned() {
            Some(Token::Int(v)) => {
                self.pos += 1;
                Ok(Literal::Int(v))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                match self.next() {
                    Some(Token::Int(v)) => Ok(Literal::Int(-v)),
                    _ => Err(self.error("expected an integer after `-`")),
                }
            }
            Some(Token::Str(bytes)) => {
                self.pos += 1;
                Ok(Literal::Str(bytes))
            }
            _ => Err(self.error("expected a magic literal")),
        }
    }

    fn expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.mul_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, CompileError> {
        match self.peek().cloned() {
            Some(Token::Int(v)) => {
                self.pos += 1;
                Ok(Expr::Int(v))
            }
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(Expr::Ident(name))
            }
            Some(Token::ParenOpen) => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect(&Token::ParenClose, "`)` closing the expression")?;
                Ok(inner)
            }
            _ => Err(self.error("expected an integer, name, or `(` in expression")),
        }
    }
}
