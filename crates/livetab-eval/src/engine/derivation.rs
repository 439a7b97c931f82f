use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use livetab_common::{Derivable, Element};
use livetab_parse::{
    EquationStack, Form, ReferenceResolver, ReferenceUse, TokenMapper, compile,
};

use crate::error::DerivationError;

static NEXT_DERIVATION: AtomicU64 = AtomicU64::new(1);

/// Identity of one installed derivation. Replacing the expression on a
/// target yields a new id, so stale pending states can tell they are stale.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DerivationId(u64);

impl DerivationId {
    fn next() -> Self {
        Self(NEXT_DERIVATION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DerivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deriv#{}", self.0)
    }
}

/// A compiled expression bound to a row, column or cell.
#[derive(Debug, Clone)]
pub struct Derivation {
    id: DerivationId,
    target: Derivable,
    text: String,
    infix: EquationStack,
    postfix: EquationStack,
    uses: Vec<ReferenceUse>,
    precision: Option<u32>,
}

impl Derivation {
    /// Parse and convert `text`. References are resolved through `resolver`
    /// and recorded as the elements this derivation is affected by.
    pub fn compile(
        target: Derivable,
        text: &str,
        mapper: &TokenMapper,
        resolver: &dyn ReferenceResolver,
        precision: Option<u32>,
    ) -> Result<Self, DerivationError> {
        let (infix, postfix) = compile(text, mapper, resolver)?;
        let uses = postfix.reference_uses();
        Ok(Self {
            id: DerivationId::next(),
            target,
            text: text.to_string(),
            infix,
            postfix,
            uses,
            precision,
        })
    }

    pub fn id(&self) -> DerivationId {
        self.id
    }

    pub fn target(&self) -> Derivable {
        self.target
    }

    /// The expression exactly as entered.
    pub fn as_entered(&self) -> &str {
        &self.text
    }

    /// Canonical infix text rebuilt from the compiled form.
    pub fn expression(&self) -> String {
        self.postfix.to_expression(Form::Infix)
    }

    pub fn infix(&self) -> &EquationStack {
        &self.infix
    }

    pub fn postfix(&self) -> &EquationStack {
        &self.postfix
    }

    pub fn precision(&self) -> Option<u32> {
        self.precision
    }

    pub fn uses(&self) -> &[ReferenceUse] {
        &self.uses
    }

    /// Distinct elements this derivation reads.
    pub fn affected_by(&self) -> Vec<Element> {
        let mut out: Vec<Element> = Vec::with_capacity(self.uses.len());
        for u in &self.uses {
            if !out.contains(&u.element) {
                out.push(u.element);
            }
        }
        out
    }

    /// Whether `element` is read as a whole by an aggregate operator.
    pub fn aggregates(&self, element: Element) -> bool {
        self.uses.iter().any(|u| u.aggregate && u.element == element)
    }
}

impl fmt::Display for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.target, self.text)
    }
}
