//! Recursive-descent parser for the attribute filter language.
//!
//! Grammar (keywords case-insensitive):
//!
//! ```text
//! expr      := or
//! or        := and ( OR and )*
//! and       := unary ( AND unary )*
//! unary     := NOT unary | primary
//! primary   := '(' expr ')' | operand tail
//! tail      := IS [NOT] NULL
//!            | [NOT] IN '(' literal ( ',' literal )* ')'
//!            | cmp operand
//! operand   := identifier | "quoted identifier" | 'string' | [+-] number
//! ```

use crate::db::filter::{
    FilterError,
    ast::{CompareOp, Expr, Literal, Operand},
};

const KEYWORDS: [&str; 6] = ["AND", "OR", "NOT", "IN", "IS", "NULL"];

pub(super) fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// Parse filter text into an expression tree.
pub fn parse(text: &str) -> Result<Expr, FilterError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: text.len(),
    };

    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(syntax(tok.offset, "unexpected trailing input")),
    }
}

fn syntax(position: usize, message: impl Into<String>) -> FilterError {
    FilterError::Syntax {
        position,
        message: message.into(),
    }
}

///
/// TokenKind
///

#[derive(Clone, Debug, PartialEq)]
enum TokenKind {
    Word(String),
    QuotedIdent(String),
    Str(String),
    Number(Literal),
    Op(CompareOp),
    Plus,
    Minus,
    LParen,
    RParen,
    Comma,
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(text: &str) -> Result<Vec<Token>, FilterError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        let kind = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'(' => {
                i += 1;
                TokenKind::LParen
            }
            b')' => {
                i += 1;
                TokenKind::RParen
            }
            b',' => {
                i += 1;
                TokenKind::Comma
            }
            b'+' => {
                i += 1;
                TokenKind::Plus
            }
            b'-' => {
                i += 1;
                TokenKind::Minus
            }
            b'=' => {
                i += if bytes.get(i + 1) == Some(&b'=') { 2 } else { 1 };
                TokenKind::Op(CompareOp::Eq)
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                TokenKind::Op(CompareOp::Ne)
            }
            b'<' => match bytes.get(i + 1) {
                Some(b'>') => {
                    i += 2;
                    TokenKind::Op(CompareOp::Ne)
                }
                Some(b'=') => {
                    i += 2;
                    TokenKind::Op(CompareOp::Le)
                }
                _ => {
                    i += 1;
                    TokenKind::Op(CompareOp::Lt)
                }
            },
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    TokenKind::Op(CompareOp::Ge)
                } else {
                    i += 1;
                    TokenKind::Op(CompareOp::Gt)
                }
            }
            b'\'' | b'"' => {
                let (body, next) = read_quoted(text, i, c)?;
                i = next;
                if c == b'\'' {
                    TokenKind::Str(body)
                } else {
                    TokenKind::QuotedIdent(body)
                }
            }
            b'0'..=b'9' | b'.' => {
                let (literal, next) = read_number(text, i)?;
                i = next;
                TokenKind::Number(literal)
            }
            c if is_word_start(c) => {
                while i < bytes.len() && (is_word_start(bytes[i]) || bytes[i].is_ascii_digit()) {
                    i += 1;
                }
                TokenKind::Word(text[start..i].to_string())
            }
            _ => return Err(syntax(i, format!("unexpected character '{}'", c as char))),
        };

        tokens.push(Token {
            kind,
            offset: start,
        });
    }

    Ok(tokens)
}

const fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || !b.is_ascii()
}

// A doubled quote inside the body stands for one quote character.
fn read_quoted(text: &str, start: usize, quote: u8) -> Result<(String, usize), FilterError> {
    let bytes = text.as_bytes();
    let mut body = Vec::new();
    let mut i = start + 1;

    loop {
        match bytes.get(i) {
            None => return Err(syntax(start, "unterminated quoted text")),
            Some(&b) if b == quote => {
                if bytes.get(i + 1) == Some(&quote) {
                    body.push(quote);
                    i += 2;
                } else {
                    i += 1;
                    break;
                }
            }
            Some(&b) => {
                body.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(body)
        .map(|s| (s, i))
        .map_err(|_| syntax(start, "quoted text is not valid UTF-8"))
}

fn read_number(text: &str, start: usize) -> Result<(Literal, usize), FilterError> {
    let bytes = text.as_bytes();
    let mut i = start;
    let mut real = false;

    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if bytes.get(i) == Some(&b'.') {
        real = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        if bytes.get(j).is_some_and(u8::is_ascii_digit) {
            real = true;
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let lexeme = &text[start..i];
    if !real && let Ok(v) = lexeme.parse::<i64>() {
        return Ok((Literal::Integer(v), i));
    }

    lexeme
        .parse::<f64>()
        .map(|v| (Literal::Real(v), i))
        .map_err(|_| syntax(start, format!("malformed number '{lexeme}'")))
}

///
/// Parser
///

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |t| t.offset)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(
            self.peek(),
            Some(Token { kind: TokenKind::Word(w), .. }) if w.eq_ignore_ascii_case(keyword)
        )
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let hit = self.peek_keyword(keyword);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), FilterError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(syntax(self.offset(), format!("expected {keyword}")))
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), FilterError> {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            Ok(())
        } else {
            Err(syntax(self.offset(), format!("expected {what}")))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let mut children = vec![self.parse_and()?];
        while self.eat_keyword("OR") {
            children.push(self.parse_and()?);
        }

        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            Expr::Or(children)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let mut children = vec![self.parse_unary()?];
        while self.eat_keyword("AND") {
            children.push(self.parse_unary()?);
        }

        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            Expr::And(children)
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, FilterError> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, FilterError> {
        if self.peek().is_some_and(|t| t.kind == TokenKind::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(inner);
        }

        let left_at = self.offset();
        let left = self.parse_operand()?;

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            let field = field_operand(left, left_at, "IS NULL")?;
            return Ok(Expr::IsNull { field, negated });
        }

        let negated_in = self.peek_keyword("NOT");
        if negated_in {
            self.pos += 1;
            if !self.peek_keyword("IN") {
                return Err(syntax(self.offset(), "expected IN after NOT"));
            }
        }
        if self.eat_keyword("IN") {
            let field = field_operand(left, left_at, "IN")?;
            let values = self.parse_value_list()?;
            return Ok(Expr::In {
                field,
                values,
                negated: negated_in,
            });
        }

        match self.next() {
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) => {
                let right = self.parse_operand()?;
                Ok(Expr::Compare { left, op, right })
            }
            Some(tok) => Err(syntax(tok.offset, "expected comparison operator")),
            None => Err(syntax(self.end, "unexpected end of filter")),
        }
    }

    fn parse_value_list(&mut self) -> Result<Vec<Literal>, FilterError> {
        self.expect(&TokenKind::LParen, "'(' after IN")?;

        let mut values = Vec::new();
        loop {
            let at = self.offset();
            match self.parse_operand()? {
                Operand::Literal(lit) => values.push(lit),
                Operand::Field(_) => return Err(syntax(at, "IN list accepts literals only")),
            }
            if self.peek().is_some_and(|t| t.kind == TokenKind::Comma) {
                self.pos += 1;
                continue;
            }
            self.expect(&TokenKind::RParen, "')' closing IN list")?;
            break;
        }

        Ok(values)
    }

    fn parse_operand(&mut self) -> Result<Operand, FilterError> {
        let Some(tok) = self.next() else {
            return Err(syntax(self.end, "unexpected end of filter"));
        };

        match tok.kind {
            TokenKind::Word(w) if is_keyword(&w) => {
                Err(syntax(tok.offset, format!("unexpected keyword {w}")))
            }
            TokenKind::Word(w) | TokenKind::QuotedIdent(w) => Ok(Operand::Field(w)),
            TokenKind::Str(s) => Ok(Operand::Literal(Literal::Text(s))),
            TokenKind::Number(n) => Ok(Operand::Literal(n)),
            TokenKind::Plus | TokenKind::Minus => {
                let negative = tok.kind == TokenKind::Minus;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::Number(n),
                        ..
                    }) => Ok(Operand::Literal(if negative { negate(n) } else { n })),
                    _ => Err(syntax(tok.offset, "sign must precede a number")),
                }
            }
            _ => Err(syntax(tok.offset, "expected field name or literal")),
        }
    }
}

fn field_operand(operand: Operand, at: usize, construct: &str) -> Result<String, FilterError> {
    match operand {
        Operand::Field(name) => Ok(name),
        Operand::Literal(_) => Err(syntax(at, format!("{construct} requires a field name"))),
    }
}

#[expect(clippy::cast_precision_loss)]
fn negate(literal: Literal) -> Literal {
    match literal {
        Literal::Integer(v) => v
            .checked_neg()
            .map_or(Literal::Real(-(v as f64)), Literal::Integer),
        Literal::Real(v) => Literal::Real(-v),
        text @ Literal::Text(_) => text,
    }
}
