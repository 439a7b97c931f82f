use livetab_parse::{BuiltIn, Operator, OperatorCatalog};

/// Position built-ins. Their values are manufactured by the evaluator from
/// the evaluation position, so they carry no callback.
pub fn register_builtins(cat: &mut OperatorCatalog) {
    for (label, b) in [
        ("ridx", BuiltIn::RowIndex),
        ("rowindex", BuiltIn::RowIndex),
        ("cidx", BuiltIn::ColumnIndex),
        ("colindex", BuiltIn::ColumnIndex),
    ] {
        cat.insert(Operator::built_in(label, b));
    }
}
