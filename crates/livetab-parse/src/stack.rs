use std::collections::VecDeque;
use std::fmt;

use livetab_common::Element;

use crate::operator::{Associativity, MAX_PRECEDENCE, OperatorKind};
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Form {
    Infix,
    Postfix,
}

/// How a compiled expression reads one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceUse {
    pub element: Element,
    /// Read as a whole by an aggregate operator, rather than coerced to
    /// the cell at the evaluation position.
    pub aggregate: bool,
}

/// An ordered token sequence tagged with its form.
///
/// Postfix stacks are stored in evaluation order: the front token is
/// consumed first.
#[derive(Debug, Clone, PartialEq)]
pub struct EquationStack {
    tokens: VecDeque<Token>,
    form: Form,
}

impl EquationStack {
    pub fn new(form: Form) -> Self {
        Self {
            tokens: VecDeque::new(),
            form,
        }
    }

    pub fn from_tokens<I: IntoIterator<Item = Token>>(form: Form, tokens: I) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
            form,
        }
    }

    pub fn form(&self) -> Form {
        self.form
    }

    pub fn push_back(&mut self, t: Token) {
        self.tokens.push_back(t);
    }

    pub fn push_front(&mut self, t: Token) {
        self.tokens.push_front(t);
    }

    pub fn pop_back(&mut self) -> Option<Token> {
        self.tokens.pop_back()
    }

    pub fn pop_front(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    pub fn front(&self) -> Option<&Token> {
        self.tokens.front()
    }

    pub fn back(&self) -> Option<&Token> {
        self.tokens.back()
    }

    pub fn get(&self, i: usize) -> Option<&Token> {
        self.tokens.get(i)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Token> + ExactSizeIterator {
        self.tokens.iter()
    }

    /// Every element referenced, in order of appearance, without duplicates.
    pub fn references(&self) -> Vec<Element> {
        let mut out = Vec::new();
        for t in &self.tokens {
            if let Some(e) = t.as_element()
                && !out.contains(&e)
            {
                out.push(e);
            }
        }
        out
    }

    /// Classify each referenced element as read per-cell or as an aggregate
    /// by replaying a postfix stack's operand flow. An element read both
    /// ways is reported twice.
    pub fn reference_uses(&self) -> Vec<ReferenceUse> {
        let mut uses: Vec<ReferenceUse> = Vec::new();
        let mut record = |element: Element, aggregate: bool| {
            let u = ReferenceUse { element, aggregate };
            if !uses.contains(&u) {
                uses.push(u);
            }
        };
        if self.form == Form::Infix {
            for e in self.references() {
                record(e, false);
            }
            return uses;
        }

        // Each slot holds the element when the operand is a bare reference.
        let mut slots: Vec<Option<Element>> = Vec::new();
        for t in &self.tokens {
            match t {
                Token::Reference { element, .. } => slots.push(Some(*element)),
                Token::Operator(op) => {
                    let kind = op.kind();
                    let n = op.argc.min(slots.len());
                    let aggregate = match kind {
                        OperatorKind::Stat(_) => op.argc == 1,
                        OperatorKind::Stat2(_) | OperatorKind::Transform(_) => true,
                        _ => false,
                    };
                    for e in slots.drain(slots.len() - n..).flatten() {
                        record(e, aggregate);
                        // Transforms also read the cell at the evaluation position.
                        if matches!(kind, OperatorKind::Transform(_)) {
                            record(e, false);
                        }
                    }
                    slots.push(None);
                }
                _ => slots.push(None),
            }
        }
        for e in slots.into_iter().flatten() {
            record(e, false);
        }
        uses
    }

    /// Render the stack as text in the requested form.
    pub fn to_expression(&self, form: Form) -> String {
        match (self.form, form) {
            (Form::Infix, Form::Infix) => print_infix(self.tokens.iter()),
            (Form::Postfix, Form::Postfix) => join_tokens(self.tokens.iter()),
            (Form::Postfix, Form::Infix) => {
                replay_postfix(self).unwrap_or_else(|| join_tokens(self.tokens.iter()))
            }
            (Form::Infix, Form::Postfix) => match crate::postfix::to_postfix(self) {
                Ok(p) => join_tokens(p.tokens.iter()),
                Err(_) => join_tokens(self.tokens.iter()),
            },
        }
    }
}

impl fmt::Display for EquationStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_expression(Form::Infix))
    }
}

impl<'a> IntoIterator for &'a EquationStack {
    type Item = &'a Token;
    type IntoIter = std::collections::vec_deque::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

fn join_tokens<'a, I: Iterator<Item = &'a Token>>(tokens: I) -> String {
    tokens.map(|t| t.to_string()).collect::<Vec<_>>().join(" ")
}

fn starts_with_symbol(s: &str) -> bool {
    s.chars().next().is_some_and(crate::parser::is_symbol_char)
}

/// Print infix tokens with conventional spacing.
fn print_infix<'a, I: Iterator<Item = &'a Token>>(tokens: I) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for t in tokens {
        let text = t.to_string();
        let glue = match (prev, t) {
            (None, _) => "",
            (_, Token::RightParen | Token::Comma) => "",
            (Some(Token::LeftParen), _) => "",
            (Some(Token::Operator(p)), Token::LeftParen) if p.kind() != OperatorKind::Binary => "",
            (Some(Token::Operator(p)), _) if p.kind() == OperatorKind::Unary => {
                if p.op.is_word() || starts_with_symbol(&text) {
                    " "
                } else {
                    ""
                }
            }
            _ => " ",
        };
        out.push_str(glue);
        out.push_str(&text);
        prev = Some(t);
    }
    out
}

const ATOM: u8 = MAX_PRECEDENCE + 1;

fn wrap(s: String, needed: bool) -> String {
    if needed { format!("({s})") } else { s }
}

/// Rebuild infix text from a postfix stack using an auxiliary stack of
/// `(text, precedence)`; parentheses are emitted only where needed to
/// reproduce the same postfix order. `None` when the stack is malformed.
fn replay_postfix(stack: &EquationStack) -> Option<String> {
    let mut aux: Vec<(String, u8)> = Vec::new();
    for t in &stack.tokens {
        let Token::Operator(op) = t else {
            aux.push((t.to_string(), ATOM));
            continue;
        };
        let label = op.label();
        match op.kind() {
            OperatorKind::BuiltIn(_) => aux.push((format!("{label}()"), ATOM)),
            OperatorKind::Unary => {
                let (x, xp) = aux.pop()?;
                let text = if op.op.is_word() {
                    format!("{label}({x})")
                } else {
                    let x = wrap(x, xp < MAX_PRECEDENCE);
                    if starts_with_symbol(&x) {
                        format!("{label} {x}")
                    } else {
                        format!("{label}{x}")
                    }
                };
                aux.push((text, MAX_PRECEDENCE));
            }
            OperatorKind::Binary => {
                let (y, yp) = aux.pop()?;
                let (x, xp) = aux.pop()?;
                let p = op.op.precedence();
                let right_assoc =
                    op.op.is_max_precedence() || op.op.associativity_of() == Associativity::Right;
                let (wx, wy) = if right_assoc {
                    (xp <= p, yp < p)
                } else {
                    (xp < p, yp <= p)
                };
                aux.push((format!("{} {label} {}", wrap(x, wx), wrap(y, wy)), p));
            }
            _ => {
                if aux.len() < op.argc {
                    return None;
                }
                let args: Vec<String> = aux.drain(aux.len() - op.argc..).map(|(s, _)| s).collect();
                aux.push((format!("{label}({})", args.join(", ")), ATOM));
            }
        }
    }
    match aux.len() {
        1 => aux.pop().map(|(s, _)| s),
        _ => None,
    }
}
