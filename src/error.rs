//! Error types for drsfix.
//!
//! Per-record defects never surface here: they are repaired or replaced by a
//! fallback and counted in a [`RepairLog`](crate::repairs::RepairLog). These
//! errors cover everything that stops a run before records are processed.

use thiserror::Error;

/// Result type for drsfix operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  /// Signature or sense table could not be decoded.
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid configuration: {0}")]
  Config(String),

  /// A clause-format input line that does not form a clause.
  #[error("line {line}: {source}")]
  Clause {
    line: usize,
    #[source]
    source: ClauseError,
  },
}

/// Why a token list cannot be turned into a [`Clause`](crate::clause::Clause).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClauseError {
  #[error("wrong arity: expected 3 or 4 tokens, got {0}")]
  WrongArity(usize),

  #[error("concept {0} needs a quoted sense")]
  MissingSense(String),

  #[error("{relation} cannot take {arity} tokens")]
  BadShape { relation: String, arity: usize },
}
