use std::collections::HashSet;

use tracing::debug;

use crate::clause::Clause;
use crate::fallback::FallbackKind;
use crate::repairs::{Repair, RepairLog};

/// Makes every used referent declared exactly once and drops duplicate
/// clauses. The result may be empty; see [`fix_referents`] for the variant
/// that falls back to the dummy structure.
pub fn repair_referents(record: usize, clauses: Vec<Clause>, log: &mut RepairLog) -> Vec<Clause> {
  let clauses = remove_doubles(record, clauses, log);

  // referents in order of first use, with the box they are first used in
  let mut uses: Vec<(&str, &str)> = Vec::new();
  for clause in clauses.iter().filter(|c| !c.is_ref()) {
    for referent in clause.referents() {
      if !uses.iter().any(|(r, _)| *r == referent) {
        uses.push((referent, clause.box_id()));
      }
    }
  }

  let declared = clauses.iter().filter_map(Clause::declared).collect::<HashSet<_>>();
  let mut missing = Vec::new();
  for (referent, box_id) in uses.iter() {
    if !declared.contains(referent) {
      debug!(record, referent, box_id, "REF missing, adding it");
      log.record(Repair::NoRef, record);
      missing.push(Clause::new_ref(box_id, referent));
    }
  }

  let used = uses.iter().map(|(r, _)| *r).collect::<HashSet<_>>();
  let mut seen = HashSet::new();
  let mut fixed = Vec::with_capacity(clauses.len() + missing.len());
  for clause in clauses.iter() {
    if let Some(referent) = clause.declared() {
      if !used.contains(referent) {
        debug!(record, clause = %clause, "referent introduced but never used, removing it");
        log.record(Repair::SpuriousRef, record);
        continue;
      }
      if !seen.insert(referent) {
        debug!(record, clause = %clause, "referent introduced twice, removing the second REF");
        log.record(Repair::SpuriousRef, record);
        continue;
      }
    }
    fixed.push(clause.clone());
  }
  fixed.extend(missing);
  fixed
}

/// Drops every clause identical to an earlier one, keeping order.
pub fn remove_doubles(record: usize, clauses: Vec<Clause>, log: &mut RepairLog) -> Vec<Clause> {
  let mut seen = HashSet::with_capacity(clauses.len());
  let mut kept = Vec::with_capacity(clauses.len());
  for clause in clauses {
    if seen.insert(clause.clone()) {
      kept.push(clause);
    } else {
      debug!(record, clause = %clause, "double clause, removing it");
      log.record(Repair::Double, record);
    }
  }
  kept
}

/// Idempotent referent fix without bookkeeping. An empty result is replaced by
/// the dummy structure.
///
/// ```
/// use drsfix::clause::Clause;
/// use drsfix::referents::fix_referents;
///
/// let clauses = ["b1 REF x1", "b1 REF x2", "b1 Agent e1 x1"]
///   .iter()
///   .map(|c| c.parse::<Clause>().unwrap())
///   .collect::<Vec<_>>();
/// let fixed = fix_referents(&clauses);
/// let lines = fixed.iter().map(|c| c.to_string()).collect::<Vec<_>>();
/// assert_eq!(lines, vec!["b1 REF x1", "b1 Agent e1 x1", "b1 REF e1"]);
/// assert_eq!(fix_referents(&fixed), fixed);
/// ```
pub fn fix_referents(clauses: &[Clause]) -> Vec<Clause> {
  let fixed = repair_referents(0, clauses.to_vec(), &mut RepairLog::new());
  if fixed.is_empty() {
    FallbackKind::Dummy.clauses()
  } else {
    fixed
  }
}
