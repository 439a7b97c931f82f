use livetab_common::{Derivable, Element};
use livetab_parse::{ParseError, ParserStatusCode};
use thiserror::Error;

/// Failure to install, replace or recalculate a derivation. Nothing is
/// installed and no cell is touched when one of these is returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DerivationError {
    #[error("invalid expression: {0}")]
    Parse(#[from] ParseError),

    #[error("circular reference: deriving {target} would read its own output")]
    CircularReference { target: Derivable },

    #[error("element {0} does not exist")]
    InvalidElement(Element),

    #[error("{0} has no derivation")]
    NoDerivation(Derivable),
}

impl DerivationError {
    /// Parser-style status for the failure, when one applies.
    pub fn status_code(&self) -> Option<ParserStatusCode> {
        match self {
            DerivationError::Parse(e) => Some(e.code),
            DerivationError::CircularReference { .. } => Some(ParserStatusCode::CircularReference),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("element {0} does not exist")]
    InvalidElement(Element),
}
