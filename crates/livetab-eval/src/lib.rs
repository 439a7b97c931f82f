pub mod error;
pub mod evaluator;
pub mod stats;
pub mod traits;

pub mod builtins;
pub mod engine;

pub mod test_table;

#[cfg(test)]
mod tests;

pub use builtins::{builtin_catalog, load_builtins};
pub use engine::{
    CorrelationId, Derivation, DerivationId, EvalConfig, LiveTable, PendingState, new_live_table,
    post_result,
};
pub use error::{DerivationError, TableError};
pub use evaluator::{Evaluator, Position, Suspension};
pub use test_table::TestTable;
pub use traits::{SubsetMembers, TableStore};
