//! Per-context label registry.
//!
//! A [`TokenMapper`] layers a context-owned user catalog over the shared,
//! read-only built-in catalog. Lookups consult the user catalog first, so a
//! registered operator may shadow a built-in when explicitly allowed.

use std::collections::BTreeSet;
use std::sync::Arc;

use livetab_common::{DataType, Scalar};

use crate::catalog::{OperatorCatalog, is_valid_label};
use crate::operator::{Operator, OperatorKind};
use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("'{0}' is not a valid operator label")]
    InvalidLabel(String),
    #[error("invalid arity for {label}: max_args ({max}) < min_args ({min})")]
    InvalidArity { label: String, min: usize, max: usize },
    #[error("operator {0} is already registered")]
    Duplicate(String),
    #[error("{0} conflicts with a built-in; set allow_override to override")]
    ConflictsWithBuiltin(String),
    #[error("no operator named {0}")]
    Unknown(String),
    #[error("overloads apply to binary operators only; {0} is not binary")]
    NotBinary(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Allow shadowing a built-in label.
    pub allow_override: bool,
}

#[derive(Debug, Clone)]
pub struct TokenMapper {
    builtins: Arc<OperatorCatalog>,
    user: OperatorCatalog,
}

impl TokenMapper {
    pub fn new(builtins: Arc<OperatorCatalog>) -> Self {
        Self {
            builtins,
            user: OperatorCatalog::new(),
        }
    }

    /// A mapper over the bare syntax symbols. Suitable for parsing, not
    /// for evaluation.
    pub fn syntax_only() -> Self {
        Self::new(Arc::new(OperatorCatalog::with_core_symbols()))
    }

    pub fn builtins(&self) -> &Arc<OperatorCatalog> {
        &self.builtins
    }

    pub fn user_catalog(&self) -> &OperatorCatalog {
        &self.user
    }

    pub fn lookup(&self, label: &str) -> Option<Token> {
        self.user
            .lookup(label)
            .or_else(|| self.builtins.lookup(label))
            .cloned()
    }

    pub fn lookup_prefix(&self, label: &str) -> Option<Arc<Operator>> {
        self.user
            .lookup_prefix(label)
            .or_else(|| self.builtins.lookup_prefix(label))
            .cloned()
    }

    pub fn overload(&self, symbol: &str, lhs: DataType, rhs: DataType) -> Option<Arc<Operator>> {
        self.user
            .overload(symbol, lhs, rhs)
            .or_else(|| self.builtins.overload(symbol, lhs, rhs))
            .cloned()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.user.contains(label) || self.builtins.contains(label)
    }

    fn validate(&self, op: &Operator, options: RegisterOptions) -> Result<(), RegistrationError> {
        let label = op.label();
        if !is_valid_label(label) {
            return Err(RegistrationError::InvalidLabel(label.to_string()));
        }
        let arity = op.arity();
        if let Some(max) = arity.max
            && max < arity.min
        {
            return Err(RegistrationError::InvalidArity {
                label: label.to_string(),
                min: arity.min,
                max,
            });
        }
        if self.user.contains(label) {
            return Err(RegistrationError::Duplicate(label.to_string()));
        }
        if !options.allow_override && self.builtins.contains(label) {
            return Err(RegistrationError::ConflictsWithBuiltin(label.to_string()));
        }
        Ok(())
    }

    pub fn register_operator(&mut self, op: Operator) -> Result<Arc<Operator>, RegistrationError> {
        self.register_operator_with(op, RegisterOptions::default())
    }

    pub fn register_operator_with(
        &mut self,
        op: Operator,
        options: RegisterOptions,
    ) -> Result<Arc<Operator>, RegistrationError> {
        self.validate(&op, options)?;
        Ok(self.user.insert(op))
    }

    /// Register the leading-position form of a symbol that is also binary.
    pub fn register_prefix_operator(
        &mut self,
        op: Operator,
    ) -> Result<Arc<Operator>, RegistrationError> {
        if op.kind() != OperatorKind::Unary {
            return Err(RegistrationError::InvalidLabel(op.label().to_string()));
        }
        if self.user.lookup_prefix(op.label()).is_some() {
            return Err(RegistrationError::Duplicate(op.label().to_string()));
        }
        Ok(self.user.insert_prefix(op))
    }

    /// Remove a user-registered operator or constant. Built-ins cannot be
    /// removed.
    pub fn unregister_operator(&mut self, label: &str) -> Result<Token, RegistrationError> {
        self.user
            .remove(label)
            .ok_or_else(|| RegistrationError::Unknown(label.to_string()))
    }

    /// Overload the binary `symbol` for a pair of argument types.
    pub fn register_overload(
        &mut self,
        symbol: &str,
        types: (DataType, DataType),
        op: Operator,
    ) -> Result<Arc<Operator>, RegistrationError> {
        match self.lookup(symbol) {
            Some(Token::Operator(t)) if t.kind() == OperatorKind::Binary => {}
            Some(_) => return Err(RegistrationError::NotBinary(symbol.to_string())),
            None => return Err(RegistrationError::Unknown(symbol.to_string())),
        }
        if op.kind() != OperatorKind::Binary {
            return Err(RegistrationError::NotBinary(op.label().to_string()));
        }
        Ok(self.user.insert_overload(symbol, types, op))
    }

    pub fn register_constant(&mut self, label: &str, value: Scalar) -> Result<(), RegistrationError> {
        if !is_valid_label(label) || !label.starts_with(|c: char| c.is_alphabetic() || c == '_') {
            return Err(RegistrationError::InvalidLabel(label.to_string()));
        }
        if self.user.contains(label) {
            return Err(RegistrationError::Duplicate(label.to_string()));
        }
        if self.builtins.contains(label) {
            return Err(RegistrationError::ConflictsWithBuiltin(label.to_string()));
        }
        self.user.insert_constant(label, value);
        Ok(())
    }

    /// Every category known to this context, built-in and user, sorted.
    pub fn categories(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.builtins.categories().chain(self.user.categories()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Operators in `category`, user entries shadowing built-ins of the
    /// same label.
    pub fn operators_in(&self, category: &str) -> Vec<Arc<Operator>> {
        let mut out = self.user.operators_in(category);
        for op in self.builtins.operators_in(category) {
            let shadowed = out.iter().any(|u| {
                u.label().eq_ignore_ascii_case(op.label()) && u.kind() == op.kind()
            });
            if !shadowed {
                out.push(op);
            }
        }
        out.sort_by(|a, b| a.label().to_lowercase().cmp(&b.label().to_lowercase()));
        out
    }

    /// Copy the user registry of another context into this one.
    pub fn clone_from(&mut self, other: &TokenMapper) {
        self.user.extend_from(&other.user);
    }
}
