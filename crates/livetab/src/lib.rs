//! Meta crate that re-exports the livetab building blocks. Depend on this
//! crate and pick layers through feature flags; the underlying crates stay
//! reachable for deeper integration.

#[cfg(feature = "common")]
pub use livetab_common as common;

#[cfg(feature = "parse")]
pub use livetab_parse as parse;

#[cfg(feature = "eval")]
pub use livetab_eval as eval;

#[cfg(feature = "common")]
pub use livetab_common::{
    CellKey, ColumnId, DataType, Derivable, Element, ErrorKind, EvalError, RowId, Scalar,
    SubsetId, Value,
};

#[cfg(feature = "parse")]
pub use livetab_parse::{
    Arity, Awaiting, Operator, ParseError, ParserStatusCode, RegisterOptions, Token, TokenMapper,
};

#[cfg(feature = "eval")]
pub use livetab_eval::{
    CorrelationId, DerivationError, EvalConfig, LiveTable, TableError, TableStore, TestTable,
    new_live_table, post_result,
};
