//! Infix expression scanner.
//!
//! The parser is a single left-to-right pass. A `leading` flag records
//! whether the next token starts an operand (expression start, after an
//! operator, `(` or `,`); it separates prefix from binary uses of a symbol
//! and rejects tokens that are invalid at that position. The first
//! structural problem aborts the parse; there is no recovery.

use std::sync::Arc;

use crate::mapper::TokenMapper;
use crate::operator::{Operator, OperatorKind};
use crate::stack::{EquationStack, Form};
use crate::token::{OperatorToken, Token};
use crate::types::{ParseError, ParserStatusCode as Code, ReferenceResolver};

/// Characters that group into operator symbols.
pub fn is_symbol_char(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '^' | '%' | '=' | '!' | '<' | '>' | '&' | '|' | '~' | '@' | '#'
            | '$' | '?' | ':'
    )
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub struct InfixParser<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    mapper: &'a TokenMapper,
    resolver: &'a dyn ReferenceResolver,
    tokens: Vec<Token>,
    leading: bool,
    depth: usize,
    /// Set after a call-style operator; only `(` may follow.
    expect_call_paren: Option<usize>,
}

impl<'a> InfixParser<'a> {
    pub fn new(src: &'a str, mapper: &'a TokenMapper, resolver: &'a dyn ReferenceResolver) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            pos: 0,
            mapper,
            resolver,
            tokens: Vec::new(),
            leading: true,
            depth: 0,
            expect_call_paren: None,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|&(_, c)| c)
    }

    /// Byte offset of the current character.
    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(i, _)| i)
            .unwrap_or(self.src.len())
    }

    fn offset_of(&self, idx: usize) -> usize {
        self.chars.get(idx).map(|&(i, _)| i).unwrap_or(self.src.len())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Next non-whitespace character without consuming anything.
    fn next_significant(&self) -> Option<char> {
        self.chars[self.pos..]
            .iter()
            .map(|&(_, c)| c)
            .find(|c| !c.is_whitespace())
    }

    fn err<S: Into<String>>(&self, code: Code, at: usize, msg: S) -> ParseError {
        ParseError::new(code, at, msg)
    }

    pub fn parse(mut self) -> Result<EquationStack, ParseError> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else { break };
            let at = self.offset();

            if let Some(fn_at) = self.expect_call_paren
                && c != '('
            {
                return Err(self.err(
                    Code::InvalidExpression,
                    fn_at,
                    "function call requires '('",
                ));
            }

            match c {
                '(' => self.left_paren(at)?,
                ')' => self.right_paren(at)?,
                ',' => self.comma(at)?,
                '"' | '\'' => self.quoted(c, at)?,
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.number(at)?,
                d if d.is_ascii_digit() => self.number(at)?,
                a if is_ident_start(a) => self.identifier(at)?,
                s if is_symbol_char(s) => self.symbol(at)?,
                other => {
                    return Err(self.err(
                        Code::InvalidExpression,
                        at,
                        format!("unexpected character '{other}'"),
                    ));
                }
            }
        }
        self.finish()
    }

    fn finish(self) -> Result<EquationStack, ParseError> {
        let end = self.src.len();
        if self.tokens.is_empty() {
            return Err(self.err(Code::EmptyExpression, 0, "expression is empty"));
        }
        if let Some(fn_at) = self.expect_call_paren {
            return Err(self.err(Code::InvalidExpression, fn_at, "function call requires '('"));
        }
        if self.depth != 0 {
            return Err(self.err(Code::ParenMismatch, end, "missing ')'"));
        }
        if self.leading {
            return Err(self.err(
                Code::InvalidExpression,
                end,
                "expression ends with an operator",
            ));
        }
        Ok(EquationStack::from_tokens(Form::Infix, self.tokens))
    }

    /* ─────────────── operands ─────────────── */

    fn push_operand(&mut self, t: Token, at: usize) -> Result<(), ParseError> {
        if !self.leading {
            return Err(self.err(
                Code::InvalidOperandLocation,
                at,
                format!("operand '{t}' must follow an operator"),
            ));
        }
        self.tokens.push(t);
        self.leading = false;
        Ok(())
    }

    fn number(&mut self, at: usize) -> Result<(), ParseError> {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == '.' {
                if seen_dot {
                    return Err(self.err(
                        Code::InvalidNumericExpression,
                        self.offset(),
                        "more than one decimal point",
                    ));
                }
                seen_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let marker = self.offset();
            self.pos += 1;
            if matches!(self.peek(), Some('+' | '-')) {
                self.pos += 1;
            }
            let digits = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            if self.pos == digits {
                return Err(self.err(
                    Code::InvalidNumericExpression,
                    marker,
                    "exponent has no digits",
                ));
            }
            if self.peek() == Some('.') {
                return Err(self.err(
                    Code::InvalidNumericExpression,
                    self.offset(),
                    "decimal point in exponent",
                ));
            }
        }
        if self.peek().is_some_and(is_ident_char) {
            return Err(self.err(
                Code::InvalidNumericExpression,
                self.offset(),
                "invalid character in number",
            ));
        }
        let text = &self.src[self.offset_of(start)..self.offset()];
        let n: f64 = text.parse().map_err(|_| {
            self.err(
                Code::InvalidNumericExpression,
                at,
                format!("'{text}' is not a number"),
            )
        })?;
        self.push_operand(Token::number(n), at)
    }

    fn quoted(&mut self, quote: char, at: usize) -> Result<(), ParseError> {
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(self.err(Code::SingletonQuote, at, "unterminated string"));
                }
                Some(c) if c == quote => {
                    if self.peek_at(1) == Some(quote) {
                        s.push(quote);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        break;
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }
        self.push_operand(Token::text(s), at)
    }

    fn read_ident(&mut self) -> &'a str {
        let src = self.src;
        let start = self.offset();
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        &src[start..self.offset()]
    }

    fn identifier(&mut self, at: usize) -> Result<(), ParseError> {
        let label = self.read_ident();

        if self.peek() == Some(':') && self.peek_at(1) == Some(':') {
            self.pos += 2;
            return self.qualified(label, at);
        }

        if let Some(t) = self.mapper.lookup(label) {
            return match t {
                Token::Operator(op) => self.operator(op, at),
                other => self.push_operand(other, at),
            };
        }

        if let Some(element) = self.resolver.resolve(label) {
            return self.push_operand(Token::reference(element, label), at);
        }

        if self.next_significant() == Some('(') {
            Err(self.err(
                Code::NoSuchOperator,
                at,
                format!("no operator named '{label}'"),
            ))
        } else {
            Err(self.err(
                Code::InvalidOperand,
                at,
                format!("'{label}' is not an operator, constant or reference"),
            ))
        }
    }

    fn qualified(&mut self, table: &str, at: usize) -> Result<(), ParseError> {
        if !self.peek().is_some_and(is_ident_start) {
            return Err(self.err(
                Code::InvalidColumnReference,
                self.offset(),
                format!("expected a label after '{table}::'"),
            ));
        }
        let label = self.read_ident();
        match self.resolver.resolve_qualified(table, label) {
            Some(element) => {
                let full = format!("{table}::{label}");
                self.push_operand(Token::reference(element, full), at)
            }
            None => Err(self.err(
                Code::InvalidOperand,
                at,
                format!("cannot resolve '{table}::{label}'"),
            )),
        }
    }

    /* ─────────────── operators ─────────────── */

    fn operator(&mut self, t: OperatorToken, at: usize) -> Result<(), ParseError> {
        let kind = t.kind();
        match kind {
            OperatorKind::Binary => {
                if self.leading {
                    return Err(self.err(
                        Code::InvalidOperatorLocation,
                        at,
                        format!("'{}' needs a left operand", t.label()),
                    ));
                }
                self.tokens.push(Token::Operator(t));
                self.leading = true;
            }
            OperatorKind::Unary => {
                if !self.leading {
                    return Err(self.err(
                        Code::InvalidOperatorLocation,
                        at,
                        format!("'{}' cannot follow an operand", t.label()),
                    ));
                }
                self.tokens.push(Token::Operator(t));
            }
            OperatorKind::BuiltIn(_) => {
                if !self.leading {
                    return Err(self.err(
                        Code::InvalidOperandLocation,
                        at,
                        format!("'{}' must follow an operator", t.label()),
                    ));
                }
                self.skip_whitespace();
                if self.peek() == Some('(') {
                    self.pos += 1;
                    self.skip_whitespace();
                    if self.peek() != Some(')') {
                        return Err(self.err(
                            Code::InvalidExpression,
                            self.offset(),
                            format!("'{}' takes no arguments", t.label()),
                        ));
                    }
                    self.pos += 1;
                }
                self.tokens.push(Token::Operator(t));
                self.leading = false;
            }
            _ => {
                if !self.leading {
                    return Err(self.err(
                        Code::InvalidOperatorLocation,
                        at,
                        format!("'{}' must follow an operator", t.label()),
                    ));
                }
                self.tokens.push(Token::Operator(t));
                self.expect_call_paren = Some(at);
            }
        }
        Ok(())
    }

    fn known_symbol(&self, s: &str) -> bool {
        self.mapper.lookup_prefix(s).is_some()
            || matches!(self.mapper.lookup(s), Some(Token::Operator(_)))
    }

    fn symbol(&mut self, at: usize) -> Result<(), ParseError> {
        let src = self.src;
        let start = self.pos;
        let mut end = start;
        while self
            .chars
            .get(end)
            .is_some_and(|&(_, c)| is_symbol_char(c))
        {
            end += 1;
        }
        // Longest known prefix of the run.
        let mut matched = None;
        for len in (1..=end - start).rev() {
            let s = &src[self.offset_of(start)..self.offset_of(start + len)];
            if self.known_symbol(s) {
                matched = Some((s, len));
                break;
            }
        }
        let Some((sym, len)) = matched else {
            let run = &src[self.offset_of(start)..self.offset_of(end)];
            return Err(self.err(
                Code::NoSuchOperator,
                at,
                format!("no operator '{run}'"),
            ));
        };
        self.pos += len;

        if self.leading
            && let Some(prefix) = self.mapper.lookup_prefix(sym)
        {
            return self.operator(OperatorToken::new(prefix), at);
        }
        match self.mapper.lookup(sym) {
            Some(Token::Operator(t)) => self.operator(t, at),
            _ => Err(self.err(
                Code::InvalidOperatorLocation,
                at,
                format!("'{sym}' cannot appear here"),
            )),
        }
    }

    /* ─────────────── punctuation ─────────────── */

    fn left_paren(&mut self, at: usize) -> Result<(), ParseError> {
        if !self.leading {
            return Err(self.err(
                Code::InvalidExpression,
                at,
                "'(' must follow an operator or function",
            ));
        }
        self.expect_call_paren = None;
        self.pos += 1;
        self.depth += 1;
        self.tokens.push(Token::LeftParen);
        self.leading = true;
        Ok(())
    }

    /// Walk back from the end of the token list to the unmatched `(`,
    /// returning its index and the number of top-level commas passed.
    fn enclosing_paren(&self) -> Option<(usize, usize)> {
        let mut depth = 0usize;
        let mut commas = 0usize;
        for (i, t) in self.tokens.iter().enumerate().rev() {
            match t {
                Token::RightParen => depth += 1,
                Token::LeftParen if depth == 0 => return Some((i, commas)),
                Token::LeftParen => depth -= 1,
                Token::Comma if depth == 0 => commas += 1,
                _ => {}
            }
        }
        None
    }

    /// The call-style operator owning the `(` at `paren`, if any.
    fn call_before(&self, paren: usize) -> Option<&Arc<Operator>> {
        let prev = paren.checked_sub(1).and_then(|i| self.tokens.get(i))?;
        match prev {
            Token::Operator(t) if t.kind().is_call() => Some(&t.op),
            _ => None,
        }
    }

    fn right_paren(&mut self, at: usize) -> Result<(), ParseError> {
        if self.depth == 0 {
            return Err(self.err(Code::ParenMismatch, at, "')' without matching '('"));
        }
        let Some((paren, commas)) = self.enclosing_paren() else {
            return Err(self.err(Code::ParenMismatch, at, "')' without matching '('"));
        };
        let empty = paren + 1 == self.tokens.len();
        match self.call_before(paren) {
            Some(op) => {
                if self.leading && !empty {
                    return Err(self.err(Code::InvalidExpression, at, "missing argument"));
                }
                let argc = if empty { 0 } else { commas + 1 };
                if !op.arity().admits(argc) {
                    return Err(self.err(
                        Code::InvalidExpression,
                        at,
                        format!(
                            "'{}' expects {} argument(s), got {argc}",
                            op.label(),
                            op.arity().describe()
                        ),
                    ));
                }
            }
            None => {
                if self.leading {
                    return Err(self.err(
                        Code::InvalidExpression,
                        at,
                        "expected an operand before ')'",
                    ));
                }
            }
        }
        self.pos += 1;
        self.depth -= 1;
        self.tokens.push(Token::RightParen);
        self.leading = false;
        Ok(())
    }

    fn comma(&mut self, at: usize) -> Result<(), ParseError> {
        if self.leading {
            return Err(self.err(Code::InvalidCommaLocation, at, "missing argument before ','"));
        }
        let valid = self.enclosing_paren().is_some_and(|(paren, commas)| {
            self.call_before(paren)
                .is_some_and(|op| op.arity().has_room_after(commas + 1))
        });
        if !valid {
            return Err(self.err(
                Code::InvalidCommaLocation,
                at,
                "',' outside a function argument list",
            ));
        }
        self.pos += 1;
        self.tokens.push(Token::Comma);
        self.leading = true;
        Ok(())
    }
}

/// Parse `text` into an infix stack.
pub fn parse(
    text: &str,
    mapper: &TokenMapper,
    resolver: &dyn ReferenceResolver,
) -> Result<EquationStack, ParseError> {
    InfixParser::new(text, mapper, resolver).parse()
}
