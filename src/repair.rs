//! Targeted fixes for the two validator failures that can be repaired:
//! cycles in the subordination relation and disconnected boxes.

use std::collections::HashSet;

use tracing::debug;

use crate::clause::{Clause, boxes_in_order};
use crate::referee::{Failure, Validator};
use crate::referents::repair_referents;
use crate::repairs::RepairLog;

/// Renames box `from` to `into` everywhere and drops the clauses that became
/// identical.
pub fn merge_boxes(clauses: &[Clause], from: &str, into: &str) -> Vec<Clause> {
  let mut seen = HashSet::with_capacity(clauses.len());
  clauses
    .iter()
    .map(|c| c.rename_box(from, into))
    .filter(|c| seen.insert(c.clone()))
    .collect()
}

/// Tries to break a subordination cycle at box `offending`.
///
/// First every other box is tried as a merge target for `offending`, in order
/// of first occurrence. If no merge validates, the clauses of `offending` are
/// dropped, the referents are fixed up and the result is validated again; a
/// new cycle continues the search from its box. Gives up when a round changes
/// nothing, empties the record or hits a different failure.
pub fn resolve_loop(clauses: &[Clause], offending: &str, validator: &dyn Validator) -> Option<Vec<Clause>> {
  let mut current = clauses.to_vec();
  let mut offending = offending.to_string();

  for round in 0..clauses.len().max(1) {
    for other in boxes_in_order(&current).iter().filter(|b| **b != offending) {
      let merged = merge_boxes(&current, &offending, other);
      if validator.validate(&merged).is_ok() {
        debug!(round, from = %offending, into = %other, "loop resolved by merging boxes");
        return Some(merged);
      }
    }

    let remaining = current
      .iter()
      .filter(|c| c.box_id() != offending)
      .cloned()
      .collect::<Vec<_>>();
    let remaining = repair_referents(0, remaining, &mut RepairLog::new());
    if remaining.is_empty() || remaining == current {
      debug!(round, box_id = %offending, "loop resolution made no progress");
      return None;
    }

    match validator.validate(&remaining) {
      Ok(()) => {
        debug!(round, box_id = %offending, "loop resolved by removing box");
        return Some(remaining);
      }
      Err(e) => match e.classify() {
        Failure::SubordinationLoop(next) => {
          current = remaining;
          offending = next;
        }
        _ => {
          debug!(round, error = %e, "loop resolution ran into another error");
          return None;
        }
      },
    }
  }
  None
}

/// Tries to connect box groups `a` and `b` by moving a single `REF` clause of
/// one group into a box of the other, trying `a` towards `b` first.
pub fn resolve_disconnected<S: AsRef<str>>(
  clauses: &[Clause],
  a: &[S],
  b: &[S],
  validator: &dyn Validator,
) -> Option<Vec<Clause>> {
  retarget_refs(clauses, a, b, validator).or_else(|| retarget_refs(clauses, b, a, validator))
}

fn retarget_refs<S: AsRef<str>>(
  clauses: &[Clause],
  from: &[S],
  to: &[S],
  validator: &dyn Validator,
) -> Option<Vec<Clause>> {
  let in_group = |group: &[S], b: &str| group.iter().any(|g| g.as_ref() == b);

  for (idx, clause) in clauses.iter().enumerate() {
    if !clause.is_ref() || !in_group(from, clause.box_id()) {
      continue;
    }
    for target in to.iter().map(AsRef::as_ref) {
      let mut candidate = clauses.to_vec();
      candidate[idx] = clause.with_box(target);
      if validator.validate(&candidate).is_ok() {
        debug!(clause = %clause, target, "boxes connected by moving REF");
        return Some(candidate);
      }
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use crate::referee::{Referee, ValidationError};

  fn parse(lines: &[&str]) -> Vec<Clause> {
    lines.iter().map(|l| l.parse().unwrap()).collect()
  }

  fn lines(clauses: &[Clause]) -> Vec<String> {
    clauses.iter().map(|c| c.to_string()).collect()
  }

  #[test]
  fn test_merge_boxes() {
    let clauses = parse(&["b1 REF x1", "b2 REF x1", "b1 NOT b2"]);
    assert_eq!(lines(&merge_boxes(&clauses, "b2", "b1")), vec!["b1 REF x1", "b1 NOT b1"]);
  }

  #[test]
  fn test_loop_resolved_by_merge() {
    let clauses = parse(&[
      "b1 REF x1",
      "b1 male \"n.02\" x1",
      "b1 NOT b2",
      "b2 NOT b1",
      "b2 smile \"v.01\" x1",
    ]);
    // accept anything without b2
    let validator = |c: &[Clause]| -> Result<(), ValidationError> {
      if c.iter().any(|c| c.boxes().contains(&"b2")) {
        Err(ValidationError::subordination_loop(&["b2", "b1", "b2"]))
      } else {
        Ok(())
      }
    };
    let fixed = resolve_loop(&clauses, "b2", &validator).unwrap();
    assert_eq!(
      lines(&fixed),
      vec!["b1 REF x1", "b1 male \"n.02\" x1", "b1 NOT b1", "b1 smile \"v.01\" x1"]
    );
  }

  #[test]
  fn test_loop_resolved_by_removal() {
    let clauses = parse(&[
      "b1 REF x1",
      "b1 male \"n.02\" x1",
      "b1 NOT b2",
      "b2 NOT b3",
      "b3 NOT b2",
      "b3 REF x2",
      "b3 female \"n.02\" x2",
    ]);
    let referee = Referee::default();
    let err = referee.validate(&clauses).unwrap_err();
    assert_eq!(err.classify(), Failure::SubordinationLoop("b2".into()));

    // every merge leaves a box under itself, so b2 has to go
    let fixed = resolve_loop(&clauses, "b2", &referee).unwrap();
    assert!(referee.validate(&fixed).is_ok());
    assert!(fixed.iter().all(|c| c.box_id() != "b2"));
  }

  #[test]
  fn test_loop_gives_up() {
    let clauses = parse(&["b1 REF x1", "b1 NOT b1", "b1 male \"n.02\" x1"]);
    let stuck = |_: &[Clause]| -> Result<(), ValidationError> {
      Err(ValidationError::subordination_loop(&["b1", "b1"]))
    };
    assert_eq!(resolve_loop(&clauses, "b1", &stuck), None);

    let other = |_: &[Clause]| -> Result<(), ValidationError> {
      Err(ValidationError::new("Unknown role Foo"))
    };
    let clauses = parse(&[
      "b1 REF x1",
      "b1 NOT b2",
      "b2 NOT b1",
      "b2 REF x2",
      "b2 male \"n.02\" x2",
      "b1 male \"n.02\" x1",
    ]);
    assert_eq!(resolve_loop(&clauses, "b2", &other), None);
  }

  #[test]
  fn test_loop_moves_on_to_next_box() {
    let clauses = parse(&[
      "b1 REF x1",
      "b1 male \"n.02\" x1",
      "b2 NOT b3",
      "b3 REF x2",
      "b3 male \"n.02\" x2",
    ]);
    // b2 is in a loop, and once it is gone b3 is
    let validator = |c: &[Clause]| -> Result<(), ValidationError> {
      let has = |b: &str| c.iter().any(|c| c.boxes().contains(&b));
      if has("b2") {
        Err(ValidationError::subordination_loop(&["b2", "b3", "b2"]))
      } else if has("b3") {
        Err(ValidationError::subordination_loop(&["b3", "b1", "b3"]))
      } else {
        Ok(())
      }
    };
    let fixed = resolve_loop(&clauses, "b2", &validator).unwrap();
    assert_eq!(
      lines(&fixed),
      vec!["b1 REF x1", "b1 male \"n.02\" x1", "b1 REF x2", "b1 male \"n.02\" x2"]
    );
  }

  #[test]
  fn test_loop_stops_without_progress() {
    // b2 owns no clauses, so removing it changes nothing
    let clauses = parse(&["b1 REF x1", "b1 male \"n.02\" x1", "b1 NOT b2"]);
    let calls = AtomicUsize::new(0);
    let stuck = |_: &[Clause]| -> Result<(), ValidationError> {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(ValidationError::subordination_loop(&["b2", "b1", "b2"]))
    };
    assert_eq!(resolve_loop(&clauses, "b2", &stuck), None);
    // only the merge into b1 was tried
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_disconnected_second_group_moves() {
    let clauses = parse(&["b1 REF x1", "b1 male \"n.02\" x1", "b2 REF t1", "b2 time \"n.08\" t1"]);
    let validator = |c: &[Clause]| -> Result<(), ValidationError> {
      if c.iter().any(|c| c.to_string() == "b1 REF t1") {
        Ok(())
      } else {
        Err(ValidationError::disconnected(&["b1"], &["b2"]))
      }
    };
    let fixed = resolve_disconnected(&clauses, &["b1"], &["b2"], &validator).unwrap();
    assert_eq!(
      lines(&fixed),
      vec!["b1 REF x1", "b1 male \"n.02\" x1", "b1 REF t1", "b2 time \"n.08\" t1"]
    );
  }

  #[test]
  fn test_disconnected() {
    let clauses = parse(&[
      "b1 REF x1",
      "b1 male \"n.02\" x1",
      "b2 REF e1",
      "b2 smile \"v.01\" e1",
      "b3 Agent e1 x1",
    ]);
    let referee = Referee::default();
    assert!(referee.validate(&clauses).is_ok());

    let clauses = parse(&["b1 REF x1", "b1 male \"n.02\" x1", "b2 REF t1", "b2 time \"n.08\" t1"]);
    let err = referee.validate(&clauses).unwrap_err();
    let Failure::Disconnected(a, b) = err.classify() else {
      panic!("expected disconnected boxes, got {}", err);
    };
    assert_eq!(a, vec!["b1"]);
    assert_eq!(b, vec!["b2"]);

    let fixed = resolve_disconnected(&clauses, &a, &b, &referee).unwrap();
    assert_eq!(
      lines(&fixed),
      vec!["b2 REF x1", "b1 male \"n.02\" x1", "b2 REF t1", "b2 time \"n.08\" t1"]
    );
  }
}
