use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("unequal number of ordering expressions and direction flags: {exprs} and {flags}")]
    MismatchedOrderingLists { exprs: usize, flags: usize },

    #[error("ORDER BY position {position} is not in select list (expected 1..={len})")]
    OrdinalOutOfRange { position: usize, len: usize },

    #[error("column alias \"{0}\" does not exist in select list")]
    UnknownAlias(SmolStr),

    #[error("ORDER BY alias \"{0}\" is ambiguous")]
    AmbiguousAlias(SmolStr),

    #[error("substitution map contains duplicate source expression {0}")]
    DuplicateSource(String),

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl Error {
    pub fn invalid_options(err: impl std::fmt::Display) -> Self {
        Self::InvalidOptions(err.to_string())
    }
}
