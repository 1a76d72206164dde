use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::clause::Clause;
use crate::error::Error;
use crate::repairs::{Repair, RepairLog};

/// Known senses per concept, used to replace senses the model made up.
///
/// The JSON form maps a concept to its senses, most frequent first:
/// `{"work": ["v.01", "n.01"], "time": ["n.08"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SenseTable {
  senses: HashMap<String, Vec<String>>,
}

impl SenseTable {
  pub fn from_json(json: &str) -> Result<Self, Error> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
    Self::from_json(&fs::read_to_string(path)?)
  }

  pub fn len(&self) -> usize {
    self.senses.len()
  }

  pub fn is_empty(&self) -> bool {
    self.senses.is_empty()
  }

  /// The sense `concept` should have instead of the quoted `sense`, or None if
  /// the sense is fine or the concept is unknown. A replacement keeps the
  /// part of speech when the table has a sense with the same one.
  ///
  /// ```
  /// use drsfix::senses::SenseTable;
  ///
  /// let table = SenseTable::from_json(r#"{"work": ["n.01", "v.02"]}"#).unwrap();
  /// assert_eq!(table.correct("work", "\"v.07\""), Some("\"v.02\"".to_string()));
  /// assert_eq!(table.correct("work", "\"a.01\""), Some("\"n.01\"".to_string()));
  /// assert_eq!(table.correct("work", "\"v.02\""), None);
  /// assert_eq!(table.correct("play", "\"v.07\""), None);
  /// ```
  pub fn correct(&self, concept: &str, sense: &str) -> Option<String> {
    let known = self.senses.get(concept)?;
    let bare = sense.trim_matches(|c| c == '"' || c == '\'');
    if known.iter().any(|s| s == bare) {
      return None;
    }
    let pos = bare.chars().next();
    let best = known
      .iter()
      .find(|s| s.chars().next() == pos)
      .or_else(|| known.first())?;
    Some(format!("\"{}\"", best))
  }

  /// Corrects the sense of every concept clause in the record.
  pub fn apply(&self, record: usize, clauses: Vec<Clause>, log: &mut RepairLog) -> Vec<Clause> {
    clauses
      .into_iter()
      .map(|clause| match clause {
        Clause::Concept {
          box_id,
          concept,
          sense,
          arg,
        } => {
          let sense = match self.correct(&concept, &sense) {
            Some(better) => {
              debug!(record, concept = %concept, from = %sense, to = %better, "replacing unknown sense");
              log.record(Repair::Sense, record);
              better
            }
            None => sense,
          };
          Clause::Concept {
            box_id,
            concept,
            sense,
            arg,
          }
        }
        other => other,
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_apply() {
    let table = SenseTable::from_json(r#"{"male": ["n.02"], "work": ["v.01"], "none": []}"#).unwrap();
    assert_eq!(table.len(), 3);

    let clauses = ["b1 REF x1", "b1 male \"n.01\" x1", "b1 work \"v.01\" x1", "b1 none \"n.01\" x1"]
      .iter()
      .map(|c| c.parse().unwrap())
      .collect::<Vec<Clause>>();
    let mut log = RepairLog::new();
    let fixed = table.apply(4, clauses, &mut log);

    assert_eq!(fixed[1].to_string(), "b1 male \"n.02\" x1");
    assert_eq!(fixed[2].to_string(), "b1 work \"v.01\" x1");
    // a concept without known senses is left alone
    assert_eq!(fixed[3].to_string(), "b1 none \"n.01\" x1");
    assert_eq!(log.records(Repair::Sense), &[4]);
  }

  #[test]
  fn test_bad_json() {
    assert!(matches!(SenseTable::from_json("{\"male\": \"n.02\"}"), Err(Error::Json(_))));
  }
}
