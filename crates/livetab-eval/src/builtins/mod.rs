use std::sync::Arc;

use once_cell::sync::Lazy;

use livetab_parse::{Operator, OperatorCatalog, core_symbols};

pub mod arithmetic;
pub mod logical;
pub mod math;
pub mod reference_fns;
pub mod stats;
pub mod text;
pub(crate) mod utils;

static BUILTINS: Lazy<Arc<OperatorCatalog>> = Lazy::new(|| {
    let mut cat = OperatorCatalog::with_core_symbols();
    load_builtins(&mut cat);
    Arc::new(cat)
});

/// The process-wide built-in catalog, built on first use and read-only
/// afterwards.
pub fn builtin_catalog() -> Arc<OperatorCatalog> {
    BUILTINS.clone()
}

pub fn load_builtins(cat: &mut OperatorCatalog) {
    arithmetic::register_builtins(cat);
    logical::register_builtins(cat);
    math::register_builtins(cat);
    text::register_builtins(cat);
    stats::register_builtins(cat);
    reference_fns::register_builtins(cat);
}

/// Fresh copy of a syntax operator so an evaluator can be attached.
fn core_symbol(label: &str) -> Option<Operator> {
    core_symbols().into_iter().find(|op| op.label() == label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use livetab_parse::{OperatorKind, Token};

    #[test]
    fn every_core_symbol_evaluates() {
        let cat = builtin_catalog();
        for op in core_symbols() {
            let Some(Token::Operator(t)) = cat.lookup(op.label()) else {
                panic!("missing {}", op.label());
            };
            assert!(t.op.has_eval(), "{} has no evaluator", op.label());
        }
        assert!(cat.lookup_prefix("-").is_some_and(|o| o.has_eval()));
    }

    #[test]
    fn categories_are_indexed() {
        let cat = builtin_catalog();
        let stats = cat.operators_in("statistical");
        assert!(stats.iter().any(|o| o.label() == "median"));
        assert!(stats.iter().any(|o| matches!(o.kind(), OperatorKind::Stat2(_))));
        assert!(cat.categories().any(|c| c == "Text"));
        assert!(matches!(cat.lookup("PI"), Some(Token::Constant { .. })));
    }
}
