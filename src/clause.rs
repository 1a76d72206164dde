use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ClauseError;
use crate::utils::{all_upper, between_quotes, is_role, strip_comment};

/// Operators whose arguments are boxes rather than discourse referents.
/// `PRP` is special: its first argument is a referent, its second a box.
pub const BOX_OPERATORS: &[&str] = &[
  "NOT",
  "POS",
  "NEC",
  "IMP",
  "DIS",
  "PRP",
  "DRS",
  "ANSWER",
  "PARALLEL",
  "CONTINUATION",
  "CONTRAST",
  "RESULT",
  "EXPLANATION",
  "DUP",
];

/// Sense given to concepts the parser produced without one
pub const DEFAULT_SENSE: &str = "\"n.01\"";

/// What a clause's relation token says about the shape of the clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
  /// `REF`, the only place a referent is introduced
  Ref,
  /// `PRP`: referent + box
  Proposition,
  /// `NOT`, `IMP`, `CONTINUATION`, ...
  BoxOperator,
  /// Other all-uppercase relations over referents (`EQU`, `TPR`)
  Operator,
  /// `Agent`, `Name`, ...
  Role,
  /// Anything else is a sense-bearing concept
  Concept,
}

impl RelationKind {
  pub fn of(relation: &str) -> Self {
    if relation == "REF" {
      Self::Ref
    } else if relation == "PRP" {
      Self::Proposition
    } else if BOX_OPERATORS.contains(&relation) {
      Self::BoxOperator
    } else if all_upper(relation) {
      Self::Operator
    } else if is_role(relation) {
      Self::Role
    } else {
      Self::Concept
    }
  }

  /// True for relations whose non-quoted arguments are boxes
  pub fn takes_boxes(&self) -> bool {
    matches!(self, Self::BoxOperator | Self::Proposition)
  }
}

/// An argument in a referent position: a variable or a quoted constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
  Var(String),
  Const(String),
}

impl Term {
  pub fn new(token: &str) -> Self {
    if between_quotes(token) {
      Self::Const(token.to_string())
    } else {
      Self::Var(token.to_string())
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Var(s) | Self::Const(s) => s,
    }
  }

  pub fn var(&self) -> Option<&str> {
    match self {
      Self::Var(s) => Some(s),
      Self::Const(_) => None,
    }
  }
}

impl fmt::Display for Term {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// A single DRS clause, classified once by the shape of its relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Clause {
  /// `b1 REF x1`
  Ref { box_id: String, referent: String },
  /// `b1 NOT b2`
  BoxRelation {
    box_id: String,
    op: String,
    sub: String,
  },
  /// Any other three-token clause: `b1 Speaker x1`
  Condition {
    box_id: String,
    relation: String,
    arg: Term,
  },
  /// `b1 work "v.01" e1`
  Concept {
    box_id: String,
    concept: String,
    sense: String,
    arg: Term,
  },
  /// `b1 Agent e1 x1`, `b1 Name x1 "tom"`
  Role {
    box_id: String,
    role: String,
    arg1: Term,
    arg2: Term,
  },
  /// `b1 EQU x1 x2`, `b1 TPR t1 "now"`
  Operator {
    box_id: String,
    op: String,
    arg1: Term,
    arg2: Term,
  },
  /// `b0 IMP b1 b2`
  BoxOperator {
    box_id: String,
    op: String,
    left: String,
    right: String,
  },
  /// `b1 PRP x1 b2`
  Proposition {
    box_id: String,
    referent: String,
    sub: String,
  },
}

impl Clause {
  pub fn new_ref(box_id: &str, referent: &str) -> Self {
    Self::Ref {
      box_id: box_id.to_string(),
      referent: referent.to_string(),
    }
  }

  /// Classifies a concrete (already restored) token list.
  pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ClauseError> {
    let tokens = tokens.iter().map(AsRef::as_ref).collect::<Vec<&str>>();
    let (box_id, relation) = match tokens.as_slice() {
      [b, r, _] | [b, r, _, _] => (b.to_string(), r.to_string()),
      _ => return Err(ClauseError::WrongArity(tokens.len())),
    };
    let kind = RelationKind::of(&relation);

    let clause = match (kind, &tokens[2..]) {
      (RelationKind::Ref, [referent]) => Self::Ref {
        box_id,
        referent: referent.to_string(),
      },
      (RelationKind::BoxOperator | RelationKind::Proposition, [sub]) => Self::BoxRelation {
        box_id,
        op: relation,
        sub: sub.to_string(),
      },
      (RelationKind::Operator | RelationKind::Role, [arg]) => Self::Condition {
        box_id,
        relation,
        arg: Term::new(arg),
      },
      (RelationKind::Concept, [_]) => return Err(ClauseError::MissingSense(relation)),
      (RelationKind::Concept, [sense, arg]) => {
        if !between_quotes(sense) {
          return Err(ClauseError::MissingSense(relation));
        }
        Self::Concept {
          box_id,
          concept: relation,
          sense: sense.to_string(),
          arg: Term::new(arg),
        }
      }
      (RelationKind::Role, [arg1, arg2]) => Self::Role {
        box_id,
        role: relation,
        arg1: Term::new(arg1),
        arg2: Term::new(arg2),
      },
      (RelationKind::Operator, [arg1, arg2]) => Self::Operator {
        box_id,
        op: relation,
        arg1: Term::new(arg1),
        arg2: Term::new(arg2),
      },
      (RelationKind::BoxOperator, [left, right]) => Self::BoxOperator {
        box_id,
        op: relation,
        left: left.to_string(),
        right: right.to_string(),
      },
      (RelationKind::Proposition, [referent, sub]) => Self::Proposition {
        box_id,
        referent: referent.to_string(),
        sub: sub.to_string(),
      },
      _ => {
        return Err(ClauseError::BadShape {
          relation,
          arity: tokens.len(),
        });
      }
    };
    Ok(clause)
  }

  pub fn box_id(&self) -> &str {
    match self {
      Self::Ref { box_id, .. }
      | Self::BoxRelation { box_id, .. }
      | Self::Condition { box_id, .. }
      | Self::Concept { box_id, .. }
      | Self::Role { box_id, .. }
      | Self::Operator { box_id, .. }
      | Self::BoxOperator { box_id, .. }
      | Self::Proposition { box_id, .. } => box_id,
    }
  }

  pub fn relation(&self) -> &str {
    match self {
      Self::Ref { .. } => "REF",
      Self::Proposition { .. } => "PRP",
      Self::BoxRelation { op, .. } | Self::Operator { op, .. } | Self::BoxOperator { op, .. } => op,
      Self::Condition { relation, .. } => relation,
      Self::Concept { concept, .. } => concept,
      Self::Role { role, .. } => role,
    }
  }

  pub fn kind(&self) -> RelationKind {
    RelationKind::of(self.relation())
  }

  pub fn is_ref(&self) -> bool {
    matches!(self, Self::Ref { .. })
  }

  /// The referent a `REF` clause introduces
  pub fn declared(&self) -> Option<&str> {
    match self {
      Self::Ref { referent, .. } => Some(referent),
      _ => None,
    }
  }

  /// Discourse referents used (not introduced) by this clause, in argument order.
  pub fn referents(&self) -> Vec<&str> {
    match self {
      Self::Ref { .. } | Self::BoxRelation { .. } | Self::BoxOperator { .. } => Vec::new(),
      Self::Condition { arg, .. } | Self::Concept { arg, .. } => arg.var().into_iter().collect(),
      Self::Role { arg1, arg2, .. } | Self::Operator { arg1, arg2, .. } => {
        arg1.var().into_iter().chain(arg2.var()).collect()
      }
      Self::Proposition { referent, .. } => vec![referent.as_str()],
    }
  }

  /// Boxes embedded under this clause's box
  pub fn sub_boxes(&self) -> Vec<&str> {
    match self {
      Self::BoxRelation { sub, .. } | Self::Proposition { sub, .. } => vec![sub.as_str()],
      Self::BoxOperator { left, right, .. } => vec![left.as_str(), right.as_str()],
      _ => Vec::new(),
    }
  }

  /// Every box the clause mentions, its own box first
  pub fn boxes(&self) -> Vec<&str> {
    let mut boxes = vec![self.box_id()];
    boxes.extend(self.sub_boxes());
    boxes
  }

  /// Copy of the clause with every box position equal to `from` renamed to `to`.
  pub fn rename_box(&self, from: &str, to: &str) -> Self {
    let swap = |b: &String| if b == from { to.to_string() } else { b.clone() };
    let mut clause = self.with_box(&swap(&self.box_id().to_string()));
    match &mut clause {
      Self::BoxRelation { sub, .. } | Self::Proposition { sub, .. } => *sub = swap(sub),
      Self::BoxOperator { left, right, .. } => {
        *left = swap(left);
        *right = swap(right);
      }
      _ => {}
    }
    clause
  }

  /// Copy of the clause moved to box `to`; other arguments are untouched.
  pub fn with_box(&self, to: &str) -> Self {
    let mut clause = self.clone();
    match &mut clause {
      Self::Ref { box_id, .. }
      | Self::BoxRelation { box_id, .. }
      | Self::Condition { box_id, .. }
      | Self::Concept { box_id, .. }
      | Self::Role { box_id, .. }
      | Self::Operator { box_id, .. }
      | Self::BoxOperator { box_id, .. }
      | Self::Proposition { box_id, .. } => *box_id = to.to_string(),
    }
    clause
  }

  pub fn tokens(&self) -> Vec<&str> {
    let mut tokens = vec![self.box_id(), self.relation()];
    match self {
      Self::Ref { referent, .. } => tokens.push(referent),
      Self::BoxRelation { sub, .. } => tokens.push(sub),
      Self::Condition { arg, .. } => tokens.push(arg.as_str()),
      Self::Concept { sense, arg, .. } => tokens.extend([sense.as_str(), arg.as_str()]),
      Self::Role { arg1, arg2, .. } | Self::Operator { arg1, arg2, .. } => {
        tokens.extend([arg1.as_str(), arg2.as_str()])
      }
      Self::BoxOperator { left, right, .. } => tokens.extend([left.as_str(), right.as_str()]),
      Self::Proposition { referent, sub, .. } => tokens.extend([referent.as_str(), sub.as_str()]),
    }
    tokens
  }
}

impl fmt::Display for Clause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.tokens().join(" "))
  }
}

/// Parses one clause-format line, ignoring a trailing `% comment`.
impl FromStr for Clause {
  type Err = ClauseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let tokens = s.split_whitespace().collect::<Vec<_>>();
    Self::from_tokens(strip_comment(&tokens))
  }
}

/// Every box mentioned in `clauses`, in order of first occurrence.
pub fn boxes_in_order(clauses: &[Clause]) -> Vec<String> {
  let mut seen = HashSet::new();
  clauses
    .iter()
    .flat_map(Clause::boxes)
    .filter(|b| seen.insert(*b))
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn clause(s: &str) -> Clause {
    s.parse().unwrap()
  }

  #[test]
  fn test_classification() {
    assert_eq!(
      clause("b1 REF x1"),
      Clause::Ref {
        box_id: "b1".into(),
        referent: "x1".into()
      }
    );
    assert!(matches!(clause("b1 NOT b2"), Clause::BoxRelation { .. }));
    assert!(matches!(clause("b1 work \"v.01\" e1"), Clause::Concept { .. }));
    assert!(matches!(clause("b1 Agent e1 x1"), Clause::Role { .. }));
    assert!(matches!(clause("b1 EQU x1 x2"), Clause::Operator { .. }));
    assert!(matches!(clause("b0 IMP b1 b2"), Clause::BoxOperator { .. }));
    assert!(matches!(clause("b1 PRP x1 b2"), Clause::Proposition { .. }));
    assert!(matches!(clause("b1 Speaker x1"), Clause::Condition { .. }));
  }

  #[test]
  fn test_rejects_malformed() {
    assert_eq!("b1 REF".parse::<Clause>(), Err(ClauseError::WrongArity(2)));
    assert_eq!(
      "b1 work x1".parse::<Clause>(),
      Err(ClauseError::MissingSense("work".into()))
    );
    assert_eq!(
      "b1 work n.01 x1".parse::<Clause>(),
      Err(ClauseError::MissingSense("work".into()))
    );
    assert!(matches!(
      "b1 REF x1 x2".parse::<Clause>(),
      Err(ClauseError::BadShape { .. })
    ));
  }

  #[test]
  fn test_referent_positions() {
    assert_eq!(clause("b1 Name x1 \"tom\"").referents(), vec!["x1"]);
    assert_eq!(clause("b1 Agent e1 x1").referents(), vec!["e1", "x1"]);
    assert_eq!(clause("b1 PRP x1 b2").referents(), vec!["x1"]);
    assert!(clause("b0 IMP b1 b2").referents().is_empty());
    assert!(clause("b1 REF x1").referents().is_empty());
  }

  #[test]
  fn test_rename_and_display() {
    let c = clause("b1 IMP b2 b1 % comment");
    assert_eq!(c.to_string(), "b1 IMP b2 b1");
    assert_eq!(c.rename_box("b1", "b3").to_string(), "b3 IMP b2 b3");
    assert_eq!(clause("b2 REF x1").with_box("b1").to_string(), "b1 REF x1");
  }

  #[test]
  fn test_boxes_in_order() {
    let clauses = vec![clause("b3 REF x1"), clause("b1 NOT b3"), clause("b1 PRP x1 b2")];
    assert_eq!(boxes_in_order(&clauses), vec!["b3", "b1", "b2"]);
  }
}
