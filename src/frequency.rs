use std::collections::HashMap;

use tracing::debug;

use crate::repairs::{Repair, RepairLog};
use crate::utils::all_lower;

/// Drops clauses whose concept, name or role/operator keeps repeating, which
/// is what a decoder stuck in a loop produces on long inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrequencyFilter {
  concept_limit: usize,
  role_op_limit: usize,
}

impl FrequencyFilter {
  /// A limit of 0 disables that filter.
  pub fn new(concept_limit: usize, role_op_limit: usize) -> Self {
    Self {
      concept_limit,
      role_op_limit,
    }
  }

  pub fn is_active(&self) -> bool {
    self.concept_limit > 0 || self.role_op_limit > 0
  }

  /// Keeps the first `limit` occurrences of each token and drops the rest.
  /// Counters advance for dropped clauses too.
  pub fn apply(&self, record: usize, clauses: Vec<Vec<String>>, log: &mut RepairLog) -> Vec<Vec<String>> {
    if !self.is_active() {
      return clauses;
    }

    let mut concepts: HashMap<String, usize> = HashMap::new();
    let mut names: HashMap<String, usize> = HashMap::new();
    let mut roles_ops: HashMap<String, usize> = HashMap::new();
    let mut kept = Vec::with_capacity(clauses.len());

    for clause in clauses {
      let Some(relation) = clause.get(1) else {
        kept.push(clause);
        continue;
      };

      let mut removed = None;
      if all_lower(relation) {
        if over_limit(&mut concepts, relation, self.concept_limit) {
          removed = Some(Repair::FrequencyConcept);
        }
      } else if relation.starts_with(char::is_uppercase) && relation != "REF" {
        if relation == "Name" && clause.len() == 4 && over_limit(&mut names, &clause[3], self.concept_limit) {
          removed = Some(Repair::FrequencyName);
        }
        if over_limit(&mut roles_ops, relation, self.role_op_limit) {
          removed = removed.or(Some(Repair::FrequencyRole));
        }
      }

      match removed {
        Some(repair) => {
          debug!(record, clause = %clause.join(" "), %repair, "removing repeated clause");
          log.record(repair, record);
        }
        None => kept.push(clause),
      }
    }
    kept
  }
}

/// Bumps the counter for `key`, returning whether it had already reached `limit`.
fn over_limit(counts: &mut HashMap<String, usize>, key: &str, limit: usize) -> bool {
  let count = counts.entry(key.to_string()).or_default();
  let over = limit > 0 && *count >= limit;
  *count += 1;
  over
}

/// Stateless convenience over [`FrequencyFilter`] that discards the repair log.
pub fn filter_by_frequency(clauses: Vec<Vec<String>>, concept_limit: usize, role_op_limit: usize) -> Vec<Vec<String>> {
  FrequencyFilter::new(concept_limit, role_op_limit).apply(0, clauses, &mut RepairLog::new())
}
