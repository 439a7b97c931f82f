//! Shunting-yard conversion from infix to postfix.

use smallvec::SmallVec;

use crate::operator::{Associativity, OperatorKind};
use crate::stack::{EquationStack, Form};
use crate::token::{OperatorToken, Token};
use crate::types::{ParseError, ParserStatusCode};

enum Held {
    Op(OperatorToken),
    /// `call` marks the parenthesis that opens a function argument list;
    /// `argc` counts the arguments seen so far.
    Paren { call: bool, argc: usize },
}

/// Whether `top` must be emitted before `incoming` is pushed.
fn pops(top: &OperatorToken, incoming: &OperatorToken) -> bool {
    let (tp, ip) = (top.op.precedence(), incoming.op.precedence());
    if top.op.is_max_precedence() && incoming.op.is_max_precedence() {
        return false;
    }
    tp > ip || (tp == ip && incoming.op.associativity_of() == Associativity::Left)
}

fn internal(msg: &str) -> ParseError {
    ParseError::new(ParserStatusCode::ParenMismatch, 0, msg)
}

/// Convert a validated infix stack into postfix evaluation order.
///
/// Arguments separated by commas stay in positional order; each call token
/// records how many arguments it was written with.
pub fn to_postfix(infix: &EquationStack) -> Result<EquationStack, ParseError> {
    if infix.form() == Form::Postfix {
        return Ok(infix.clone());
    }
    let tokens: Vec<&Token> = infix.iter().collect();
    let mut out = EquationStack::new(Form::Postfix);
    let mut held: SmallVec<[Held; 16]> = SmallVec::new();

    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::Operator(t) => match t.kind() {
                OperatorKind::BuiltIn(_) => out.push_back(Token::Operator(t.clone())),
                kind if kind.is_call() || kind == OperatorKind::Unary => {
                    held.push(Held::Op(t.clone()));
                }
                _ => {
                    while let Some(Held::Op(top)) = held.last() {
                        if !pops(top, t) {
                            break;
                        }
                        if let Some(Held::Op(top)) = held.pop() {
                            out.push_back(Token::Operator(top));
                        }
                    }
                    held.push(Held::Op(t.clone()));
                }
            },
            Token::LeftParen => {
                let call = matches!(
                    i.checked_sub(1).map(|p| tokens[p]),
                    Some(Token::Operator(op)) if op.kind().is_call()
                );
                let argc = match tokens.get(i + 1) {
                    Some(Token::RightParen) => 0,
                    _ => 1,
                };
                held.push(Held::Paren { call, argc });
            }
            Token::Comma => {
                loop {
                    match held.last_mut() {
                        Some(Held::Paren { argc, .. }) => {
                            *argc += 1;
                            break;
                        }
                        Some(Held::Op(_)) => {
                            if let Some(Held::Op(op)) = held.pop() {
                                out.push_back(Token::Operator(op));
                            }
                        }
                        None => return Err(internal("',' outside parentheses")),
                    }
                }
            }
            Token::RightParen => {
                let (call, argc) = loop {
                    match held.pop() {
                        Some(Held::Op(op)) => out.push_back(Token::Operator(op)),
                        Some(Held::Paren { call, argc }) => break (call, argc),
                        None => return Err(internal("unbalanced ')'")),
                    }
                };
                if call {
                    match held.pop() {
                        Some(Held::Op(mut op)) => {
                            op.argc = argc;
                            out.push_back(Token::Operator(op));
                        }
                        _ => return Err(internal("call parenthesis without its operator")),
                    }
                }
            }
            other => out.push_back((*other).clone()),
        }
    }

    while let Some(h) = held.pop() {
        match h {
            Held::Op(op) => out.push_back(Token::Operator(op)),
            Held::Paren { .. } => return Err(internal("unbalanced '('")),
        }
    }
    Ok(out)
}
