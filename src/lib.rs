//! Restores DRS clause sets from the one-line output of a sequence-to-sequence
//! semantic parser, and repairs them until they are well-formed.
//!
//! ```
//! use drsfix::{Config, Pipeline};
//!
//! let pipeline = Pipeline::new(Config::default()).unwrap();
//! let output = pipeline.process(&["$NEW ||| REF *** $0 ||| male ||| \"n.02\" ||| @0"]);
//! let clauses = output.records[0].iter().map(|c| c.to_string()).collect::<Vec<_>>();
//! assert_eq!(clauses, vec!["b1 REF x1", "b1 male \"n.02\" x1"]);
//! assert_eq!(output.log.total_fallbacks(), 0);
//! ```

#[macro_use]
extern crate lazy_static;

pub mod clause;
pub mod encode;
pub mod error;
pub mod fallback;
pub mod frequency;
pub mod io;
pub mod pipeline;
pub mod referee;
pub mod referents;
pub mod repair;
pub mod repairs;
pub mod restore;
pub mod senses;
pub mod tokenize;
pub mod utils;

pub use crate::clause::Clause;
pub use crate::error::{ClauseError, Error, Result};
pub use crate::fallback::FallbackKind;
pub use crate::pipeline::{Config, Output, Pipeline};
pub use crate::referee::{Failure, Referee, Signature, ValidationError, Validator};
pub use crate::repairs::{Repair, RepairLog};
pub use crate::restore::VariableMode;
pub use crate::utils::Err;

#[test]
fn test_absolute_line() {
  let pipeline = Pipeline::new(Config::default().with_variable_mode(VariableMode::Absolute)).unwrap();
  let output = pipeline.process(&[
    "$0 ||| REF ||| @0 *** $0 ||| male ||| \"n.02\" ||| @0 *** $1 ||| REF ||| @1 *** \
     $1 ||| Agent ||| @1 ||| @0 *** $1 ||| smile ||| \"v.01\" ||| @1",
  ]);
  let clauses = output.records[0].iter().map(|c| c.to_string()).collect::<Vec<_>>();
  assert_eq!(
    clauses,
    vec![
      "b0 REF x0",
      "b0 male \"n.02\" x0",
      "b1 REF x1",
      "b1 Agent x1 x0",
      "b1 smile \"v.01\" x1",
    ]
  );
  assert!(output.log.is_empty());
}

#[test]
fn test_summary_counts_records() {
  let pipeline = Pipeline::new(Config::default()).unwrap();
  let output = pipeline.process(&["$NEW ||| REF *** $0 ||| male ||| \"n.02\" ||| @0", "<unk>"]);
  assert_eq!(output.records.len(), 2);
  assert_eq!(output.log.records(Repair::Unknown), &[2]);
  assert!(
    output
      .summary()
      .ends_with("1 out of 2 DRSs replaced by a fallback and 1 repairs were needed")
  );
}
