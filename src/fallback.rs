//! The well-formed DRSs put in place of records that cannot be repaired.

use std::fmt;
use std::str::FromStr;

use crate::clause::Clause;

const DUMMY: &[&str] = &["b1 REF x1", "b1 alwayswrongconcept \"n.01\" x1"];

/// "A male is." The most frequent structure, scores better than the dummy.
const BASELINE: &[&str] = &[
  "b1 REF x1",
  "b1 male \"n.02\" x1",
  "b2 REF e1",
  "b2 REF t1",
  "b2 Agent e1 x1",
  "b2 TPR t1 \"now\"",
  "b2 Time e1 t1",
  "b2 time \"n.08\" t1",
  "b2 be \"v.01\" e1",
];

/// The well-formed DRS used in place of a record that cannot be repaired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackKind {
  #[default]
  Dummy,
  Baseline,
}

impl FallbackKind {
  pub fn clauses(&self) -> Vec<Clause> {
    let lines = match self {
      Self::Dummy => DUMMY,
      Self::Baseline => BASELINE,
    };
    lines.iter().filter_map(|l| l.parse().ok()).collect()
  }
}

impl FromStr for FallbackKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "dummy" => Ok(Self::Dummy),
      "baseline" => Ok(Self::Baseline),
      _ => Err(format!("unknown fallback {} (expected dummy or baseline)", s)),
    }
  }
}

impl fmt::Display for FallbackKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Dummy => write!(f, "dummy"),
      Self::Baseline => write!(f, "baseline"),
    }
  }
}
