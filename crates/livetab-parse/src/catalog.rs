//! Label-indexed operator catalog.
//!
//! A catalog maps case-insensitive labels to tokens (operators and
//! constants), keeps the prefix forms of symbols that are also binary
//! (`-`, `+`), holds the overload table keyed by `(symbol, lhs, rhs)` and a
//! category index used for discovery.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use livetab_common::{DataType, Scalar};

use crate::operator::Operator;
use crate::token::{OperatorToken, Token};

type OverloadKey = (String, DataType, DataType);

#[derive(Debug, Clone, Default)]
pub struct OperatorCatalog {
    labels: FxHashMap<String, Token>,
    prefix: FxHashMap<String, Arc<Operator>>,
    overloads: FxHashMap<OverloadKey, Arc<Operator>>,
    categories: BTreeMap<String, BTreeSet<String>>,
}

#[inline]
fn key(label: &str) -> String {
    label.to_lowercase()
}

impl OperatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The syntax operators and literal constants, without evaluators.
    pub fn with_core_symbols() -> Self {
        let mut cat = Self::new();
        for op in core_symbols() {
            cat.insert(op);
        }
        for op in core_prefix_symbols() {
            cat.insert_prefix(op);
        }
        cat.insert_constant("true", Scalar::Boolean(true));
        cat.insert_constant("false", Scalar::Boolean(false));
        cat.labels.insert("null".into(), Token::Null);
        cat
    }

    /// Add or replace an operator.
    pub fn insert(&mut self, op: Operator) -> Arc<Operator> {
        let op = Arc::new(op);
        self.insert_arc(op.clone());
        op
    }

    pub fn insert_arc(&mut self, op: Arc<Operator>) {
        let k = key(op.label());
        self.labels.remove(&k);
        self.prune_categories();
        self.index_categories(&op);
        self.labels.insert(k, Token::Operator(OperatorToken::new(op)));
    }

    /// Add the prefix form of a symbol, used only in leading position.
    pub fn insert_prefix(&mut self, op: Operator) -> Arc<Operator> {
        let op = Arc::new(op);
        self.index_categories(&op);
        self.prefix.insert(key(op.label()), op.clone());
        op
    }

    pub fn insert_constant(&mut self, label: &str, value: Scalar) {
        let k = key(label);
        self.labels.remove(&k);
        self.prune_categories();
        self.labels.insert(
            k,
            Token::Constant {
                label: Arc::from(label),
                value,
            },
        );
    }

    pub fn insert_overload(
        &mut self,
        symbol: &str,
        types: (DataType, DataType),
        op: Operator,
    ) -> Arc<Operator> {
        let op = Arc::new(op);
        self.overloads
            .insert((key(symbol), types.0, types.1), op.clone());
        op
    }

    /// Remove a label (operator, constant or prefix form) and its overloads.
    pub fn remove(&mut self, label: &str) -> Option<Token> {
        let k = key(label);
        let removed = self.labels.remove(&k);
        let prefix = self.prefix.remove(&k);
        self.overloads.retain(|(s, _, _), _| *s != k);
        if removed.is_some() || prefix.is_some() {
            self.prune_categories();
        }
        removed.or_else(|| prefix.map(Token::operator))
    }

    /// Drop category memberships whose label no longer names an operator.
    fn prune_categories(&mut self) {
        let labels = &self.labels;
        let prefix = &self.prefix;
        for members in self.categories.values_mut() {
            members.retain(|m| {
                prefix.contains_key(m) || matches!(labels.get(m), Some(Token::Operator(_)))
            });
        }
        self.categories.retain(|_, m| !m.is_empty());
    }

    fn index_categories(&mut self, op: &Operator) {
        for c in op.categories() {
            self.categories
                .entry(c.clone())
                .or_default()
                .insert(key(op.label()));
        }
    }

    pub fn lookup(&self, label: &str) -> Option<&Token> {
        self.labels.get(&key(label))
    }

    pub fn lookup_prefix(&self, label: &str) -> Option<&Arc<Operator>> {
        self.prefix.get(&key(label))
    }

    pub fn contains(&self, label: &str) -> bool {
        let k = key(label);
        self.labels.contains_key(&k) || self.prefix.contains_key(&k)
    }

    /// Overload for `symbol` applied to `(lhs, rhs)`. Exact types win over
    /// `Any` wildcards.
    pub fn overload(&self, symbol: &str, lhs: DataType, rhs: DataType) -> Option<&Arc<Operator>> {
        if self.overloads.is_empty() {
            return None;
        }
        let k = key(symbol);
        [
            (lhs, rhs),
            (lhs, DataType::Any),
            (DataType::Any, rhs),
            (DataType::Any, DataType::Any),
        ]
        .into_iter()
        .find_map(|(a, b)| self.overloads.get(&(k.clone(), a, b)))
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Operators tagged with `category` (case-insensitive), sorted by label.
    pub fn operators_in(&self, category: &str) -> Vec<Arc<Operator>> {
        let mut out = Vec::new();
        for (name, members) in &self.categories {
            if !name.eq_ignore_ascii_case(category) {
                continue;
            }
            for m in members {
                if let Some(Token::Operator(t)) = self.labels.get(m) {
                    out.push(t.op.clone());
                } else if let Some(op) = self.prefix.get(m) {
                    out.push(op.clone());
                }
            }
        }
        out
    }

    pub fn operators(&self) -> impl Iterator<Item = &Arc<Operator>> {
        self.labels
            .values()
            .filter_map(|t| t.as_operator().map(|o| &o.op))
            .chain(self.prefix.values())
    }

    pub fn len(&self) -> usize {
        self.labels.len() + self.prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.prefix.is_empty()
    }

    /// Copy every entry of `other` into this catalog, replacing clashes.
    pub fn extend_from(&mut self, other: &OperatorCatalog) {
        for (k, t) in &other.labels {
            if let Token::Operator(op) = t {
                self.index_categories(&op.op);
            }
            self.labels.insert(k.clone(), t.clone());
        }
        for (k, op) in &other.prefix {
            self.index_categories(op);
            self.prefix.insert(k.clone(), op.clone());
        }
        for (k, op) in &other.overloads {
            self.overloads.insert(k.clone(), op.clone());
        }
    }
}

/// Binary and unary syntax operators, without evaluators.
pub fn core_symbols() -> Vec<Operator> {
    let bin = |label: &str, prec: u8, category: &str| Operator::binary(label, prec).category(category);
    vec![
        bin("||", 0, "Logical").returns(DataType::Boolean),
        bin("or", 0, "Logical").returns(DataType::Boolean),
        bin("&&", 1, "Logical").returns(DataType::Boolean),
        bin("and", 1, "Logical").returns(DataType::Boolean),
        bin("=", 2, "Comparison").returns(DataType::Boolean),
        bin("==", 2, "Comparison").returns(DataType::Boolean),
        bin("!=", 2, "Comparison").returns(DataType::Boolean),
        bin("<>", 2, "Comparison").returns(DataType::Boolean),
        bin("<", 2, "Comparison").returns(DataType::Boolean),
        bin("<=", 2, "Comparison").returns(DataType::Boolean),
        bin(">", 2, "Comparison").returns(DataType::Boolean),
        bin(">=", 2, "Comparison").returns(DataType::Boolean),
        bin("+", 3, "Arithmetic"),
        bin("-", 3, "Arithmetic").returns(DataType::Number),
        bin("*", 4, "Arithmetic").returns(DataType::Number),
        bin("/", 4, "Arithmetic").returns(DataType::Number),
        bin("%", 4, "Arithmetic").returns(DataType::Number),
        bin("^", 5, "Arithmetic").returns(DataType::Number),
        Operator::unary("!").category("Logical").returns(DataType::Boolean),
        Operator::unary("not").category("Logical").returns(DataType::Boolean),
    ]
}

/// Prefix forms of symbols that are binary elsewhere.
pub fn core_prefix_symbols() -> Vec<Operator> {
    vec![
        Operator::unary("-")
            .category("Arithmetic")
            .returns(DataType::Number)
            .arg_types([DataType::Number]),
        Operator::unary("+")
            .category("Arithmetic")
            .returns(DataType::Number)
            .arg_types([DataType::Number]),
    ]
}

/// Whether `label` looks like a valid operator label: a word, or a run of
/// symbol characters the scanner groups together.
pub fn is_valid_label(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        Some(_) => label.chars().all(crate::parser::is_symbol_char),
        None => false,
    }
}
