//! Validation of restored clause sets.
//!
//! The pipeline only talks to a [`Validator`]; what it needs from a failure is
//! its message, which [`ValidationError::classify`] sorts into the two kinds of
//! failure the repair strategies know how to handle. [`Referee`] is a built-in
//! structural checker that produces messages in the same shape.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::clause::{Clause, RelationKind};
use crate::error::Error;
use crate::utils::regex_static;

pub const LOOP_MESSAGE: &str = "Subordinate relation has a loop";
pub const DISCONNECTED_MESSAGE: &str = "Boxes are not connected";

/// A clause set the validator rejected, with the validator's message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
  pub message: String,
}

/// What went wrong, as far as the repair strategies are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
  /// The box the cycle was found at
  SubordinationLoop(String),
  /// The first two groups of boxes that are not connected to each other
  Disconnected(Vec<String>, Vec<String>),
  Other(String),
}

impl ValidationError {
  pub fn new<S: Into<String>>(message: S) -> Self {
    Self {
      message: message.into(),
    }
  }

  /// `Subordinate relation has a loop || b2 > b3 > b2`
  pub fn subordination_loop(path: &[&str]) -> Self {
    Self::new(format!("{} || {}", LOOP_MESSAGE, path.join(" > ")))
  }

  /// `Boxes are not connected: {b1, b2} {b3}`
  pub fn disconnected<S: AsRef<str>>(a: &[S], b: &[S]) -> Self {
    let group = |g: &[S]| g.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ");
    Self::new(format!("{}: {{{}}} {{{}}}", DISCONNECTED_MESSAGE, group(a), group(b)))
  }

  /// Sorts the message into a [`Failure`] by its fixed prefix.
  ///
  /// ```
  /// use drsfix::referee::{Failure, ValidationError};
  ///
  /// let err = ValidationError::new("Subordinate relation has a loop || b2 > b1 > b2");
  /// assert_eq!(err.classify(), Failure::SubordinationLoop("b2".to_string()));
  ///
  /// let err = ValidationError::new("Boxes are not connected: {'b1', 'b2'} {'b3'}");
  /// assert_eq!(
  ///   err.classify(),
  ///   Failure::Disconnected(vec!["b1".into(), "b2".into()], vec!["b3".into()])
  /// );
  /// ```
  pub fn classify(&self) -> Failure {
    regex_static!(LOOP, r"^Subordinate relation has a loop\s*\|\|\s*([^\s>]+)");
    regex_static!(
      DISCONNECTED,
      r"^Boxes are not connected:?\s*\{([^}]*)\}\s*\{([^}]*)\}"
    );

    if let Some(caps) = LOOP.captures(&self.message) {
      return Failure::SubordinationLoop(caps[1].to_string());
    }
    if let Some(caps) = DISCONNECTED.captures(&self.message) {
      let a = box_group(&caps[1]);
      let b = box_group(&caps[2]);
      if !a.is_empty() && !b.is_empty() {
        return Failure::Disconnected(a, b);
      }
    }
    Failure::Other(self.message.clone())
  }
}

/// `b1, 'b2'` -> `[b1, b2]`
fn box_group(group: &str) -> Vec<String> {
  group
    .split(',')
    .map(|b| b.trim().trim_matches(|c| c == '\'' || c == '"'))
    .filter(|b| !b.is_empty())
    .map(String::from)
    .collect()
}

/// Anything that can accept or reject a restored clause set.
pub trait Validator: Send + Sync {
  fn validate(&self, clauses: &[Clause]) -> Result<(), ValidationError>;
}

impl<F> Validator for F
where
  F: Fn(&[Clause]) -> Result<(), ValidationError> + Send + Sync,
{
  fn validate(&self, clauses: &[Clause]) -> Result<(), ValidationError> {
    self(clauses)
  }
}

/// Roles and operators the referee accepts. An empty set accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Signature {
  #[serde(default)]
  pub roles: BTreeSet<String>,
  #[serde(default)]
  pub operators: BTreeSet<String>,
}

impl Signature {
  /// `{"roles": ["Agent", ...], "operators": ["EQU", ...]}`
  pub fn from_json(json: &str) -> Result<Self, Error> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
    Self::from_json(&fs::read_to_string(path)?)
  }

  pub fn allows_role(&self, role: &str) -> bool {
    self.roles.is_empty() || self.roles.contains(role)
  }

  pub fn allows_operator(&self, op: &str) -> bool {
    self.operators.is_empty() || self.operators.contains(op)
  }
}

/// Structural well-formedness checker.
///
/// Checks, in order: unknown roles and operators, undeclared referents,
/// referents declared twice, cycles in the subordination relation, and boxes
/// that are not connected to the rest of the structure.
#[derive(Debug, Clone, Default)]
pub struct Referee {
  signature: Signature,
}

impl Referee {
  pub fn new(signature: Signature) -> Self {
    Self { signature }
  }

  pub fn signature(&self) -> &Signature {
    &self.signature
  }

  fn check_signature(&self, clauses: &[Clause]) -> Result<(), ValidationError> {
    for clause in clauses {
      let relation = clause.relation();
      match clause.kind() {
        RelationKind::Role if !self.signature.allows_role(relation) => {
          return Err(ValidationError::new(format!("Unknown role {}", relation)));
        }
        RelationKind::Operator if !self.signature.allows_operator(relation) => {
          return Err(ValidationError::new(format!("Unknown operator {}", relation)));
        }
        _ => {}
      }
    }
    Ok(())
  }

  fn check_referents(&self, clauses: &[Clause]) -> Result<(), ValidationError> {
    let declared = clauses.iter().filter_map(Clause::declared).collect::<HashSet<_>>();
    for clause in clauses {
      if let Some(referent) = clause.referents().into_iter().find(|r| !declared.contains(r)) {
        return Err(ValidationError::new(format!(
          "Undeclared referent {} in clause {}",
          referent, clause
        )));
      }
    }

    let mut seen = HashSet::new();
    for referent in clauses.iter().filter_map(Clause::declared) {
      if !seen.insert(referent) {
        return Err(ValidationError::new(format!("Referent {} declared twice", referent)));
      }
    }
    Ok(())
  }
}

impl Validator for Referee {
  fn validate(&self, clauses: &[Clause]) -> Result<(), ValidationError> {
    if clauses.is_empty() {
      return Err(ValidationError::new("Empty DRS"));
    }
    self.check_signature(clauses)?;
    self.check_referents(clauses)?;

    let mut seen = HashSet::new();
    let boxes = clauses
      .iter()
      .flat_map(Clause::boxes)
      .filter(|b| seen.insert(*b))
      .collect::<Vec<_>>();

    let edges = subordination(clauses);
    let mut below: HashMap<&str, Vec<&str>> = HashMap::new();
    for &(upper, lower) in edges.iter() {
      below.entry(upper).or_default().push(lower);
    }
    if let Some(cycle) = find_loop(&boxes, &below) {
      return Err(ValidationError::subordination_loop(&cycle));
    }

    let mut links = edges;
    links.extend(referent_links(clauses));
    let groups = components(&boxes, &links);
    if groups.len() > 1 {
      return Err(ValidationError::disconnected(&groups[0], &groups[1]));
    }
    Ok(())
  }
}

/// `(upper, lower)` pairs: `lower` is subordinate to `upper`. In `b0 IMP b1 b2`
/// the consequent is subordinate to the antecedent, which is subordinate to
/// `b0`; other binary box operators put both arguments directly under `b0`.
fn subordination(clauses: &[Clause]) -> Vec<(&str, &str)> {
  let mut edges = Vec::new();
  for clause in clauses {
    match clause {
      Clause::BoxRelation { box_id, sub, .. } | Clause::Proposition { box_id, sub, .. } => {
        edges.push((box_id.as_str(), sub.as_str()))
      }
      Clause::BoxOperator {
        box_id,
        op,
        left,
        right,
      } => {
        edges.push((box_id.as_str(), left.as_str()));
        if op == "IMP" || op == "DUP" {
          edges.push((left.as_str(), right.as_str()));
        } else {
          edges.push((box_id.as_str(), right.as_str()));
        }
      }
      _ => {}
    }
  }
  edges
}

/// Links the box a referent is used in to the box that declares it.
fn referent_links(clauses: &[Clause]) -> Vec<(&str, &str)> {
  let mut declared_in: HashMap<&str, &str> = HashMap::new();
  for clause in clauses {
    if let Some(referent) = clause.declared() {
      declared_in.entry(referent).or_insert(clause.box_id());
    }
  }
  clauses
    .iter()
    .flat_map(|c| {
      let declared_in = &declared_in;
      c.referents()
        .into_iter()
        .filter_map(move |r| declared_in.get(r).map(|d| (c.box_id(), *d)))
    })
    .collect()
}

/// Depth-first search for a cycle, returned as a path that starts and ends at
/// the same box. Frames are `(box, next child index)`; box chains can be as long
/// as the record.
fn find_loop<'a>(boxes: &[&'a str], below: &HashMap<&'a str, Vec<&'a str>>) -> Option<Vec<&'a str>> {
  let mut done: HashSet<&str> = HashSet::new();
  for &start in boxes {
    if done.contains(start) {
      continue;
    }
    let mut on_path: HashMap<&str, usize> = HashMap::from([(start, 0)]);
    let mut frames: Vec<(&'a str, usize)> = vec![(start, 0)];

    while let Some(frame) = frames.last_mut() {
      let node = frame.0;
      let children = below.get(node).map(Vec::as_slice).unwrap_or(&[]);
      let Some(&next) = children.get(frame.1) else {
        frames.pop();
        on_path.remove(node);
        done.insert(node);
        continue;
      };
      frame.1 += 1;

      if let Some(&pos) = on_path.get(next) {
        let mut cycle = frames[pos..].iter().map(|(b, _)| *b).collect::<Vec<_>>();
        cycle.push(next);
        return Some(cycle);
      }
      if !done.contains(next) {
        on_path.insert(next, frames.len());
        frames.push((next, 0));
      }
    }
  }
  None
}

/// Connected components of the undirected box graph, each in first-occurrence
/// order, ordered by their first box.
fn components<'a>(boxes: &[&'a str], links: &[(&'a str, &'a str)]) -> Vec<Vec<&'a str>> {
  let mut adjacent: HashMap<&str, Vec<&str>> = HashMap::new();
  for &(a, b) in links {
    adjacent.entry(a).or_default().push(b);
    adjacent.entry(b).or_default().push(a);
  }

  let order = boxes.iter().enumerate().map(|(i, b)| (*b, i)).collect::<HashMap<_, _>>();
  let position = |b: &str| order.get(b).copied().unwrap_or(usize::MAX);
  let mut seen = HashSet::new();
  let mut groups = Vec::new();
  for &start in boxes {
    if !seen.insert(start) {
      continue;
    }
    let mut group = vec![start];
    let mut stack = vec![start];
    while let Some(b) = stack.pop() {
      for &next in adjacent.get(b).into_iter().flatten() {
        if seen.insert(next) {
          group.push(next);
          stack.push(next);
        }
      }
    }
    group.sort_by_key(|b| position(b));
    groups.push(group);
  }
  groups
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(lines: &[&str]) -> Vec<Clause> {
    lines.iter().map(|l| l.parse().unwrap()).collect()
  }

  fn clause(s: &str) -> Clause {
    s.parse().unwrap()
  }

  fn check(lines: &[&str]) -> Result<(), ValidationError> {
    Referee::default().validate(&parse(lines))
  }

  #[test]
  fn test_valid() {
    check(&[
      "b1 REF x1",
      "b1 male \"n.02\" x1",
      "b2 REF e1",
      "b2 Agent e1 x1",
      "b2 be \"v.01\" e1",
    ])
    .unwrap();
    check(&[
      "b0 IMP b1 b2",
      "b1 REF x1",
      "b1 farmer \"n.01\" x1",
      "b2 REF e1",
      "b2 Agent e1 x1",
      "b2 smile \"v.01\" e1",
    ])
    .unwrap();
  }

  #[test]
  fn test_undeclared_and_declared_twice() {
    let err = check(&["b1 REF x1", "b1 Agent e1 x1"]).unwrap_err();
    assert_eq!(err.message, "Undeclared referent e1 in clause b1 Agent e1 x1");
    assert!(matches!(err.classify(), Failure::Other(_)));

    let err = check(&["b1 REF x1", "b2 REF x1", "b1 male \"n.02\" x1"]).unwrap_err();
    assert_eq!(err.message, "Referent x1 declared twice");
  }

  #[test]
  fn test_loop() {
    let err = check(&[
      "b1 REF x1",
      "b1 male \"n.02\" x1",
      "b1 NOT b2",
      "b2 NOT b3",
      "b3 NOT b2",
      "b2 time \"n.08\" x1",
    ])
    .unwrap_err();
    assert_eq!(err.message, "Subordinate relation has a loop || b2 > b3 > b2");
    assert_eq!(err.classify(), Failure::SubordinationLoop("b2".into()));

    let err = check(&["b1 REF x1", "b1 male \"n.02\" x1", "b1 NOT b1"]).unwrap_err();
    assert_eq!(err.classify(), Failure::SubordinationLoop("b1".into()));
  }

  #[test]
  fn test_long_box_chain() {
    let mut clauses = parse(&["b1 REF x1", "b1 male \"n.02\" x1"]);
    clauses.extend((1..=50_000).map(|i| clause(&format!("b{} NOT b{}", i, i + 1))));
    assert!(Referee::default().validate(&clauses).is_ok());

    clauses.push(clause("b50001 NOT b1"));
    let err = Referee::default().validate(&clauses).unwrap_err();
    assert_eq!(err.classify(), Failure::SubordinationLoop("b1".into()));
    assert!(err.message.ends_with("b50000 > b50001 > b1"));
  }

  #[test]
  fn test_disconnected() {
    let err = check(&[
      "b1 REF x1",
      "b1 male \"n.02\" x1",
      "b2 REF x2",
      "b2 female \"n.02\" x2",
    ])
    .unwrap_err();
    assert_eq!(err.message, "Boxes are not connected: {b1} {b2}");
    assert_eq!(
      err.classify(),
      Failure::Disconnected(vec!["b1".into()], vec!["b2".into()])
    );
  }

  #[test]
  fn test_signature() {
    let signature = Signature::from_json(r#"{"roles": ["Agent"], "operators": ["TPR"]}"#).unwrap();
    let referee = Referee::new(signature);
    let clauses = parse(&["b1 REF e1", "b1 REF x1", "b1 Patient e1 x1"]);
    assert_eq!(
      referee.validate(&clauses).unwrap_err().message,
      "Unknown role Patient"
    );
    let clauses = parse(&["b1 REF x1", "b1 REF x2", "b1 EQU x1 x2"]);
    assert_eq!(
      referee.validate(&clauses).unwrap_err().message,
      "Unknown operator EQU"
    );

    // missing keys mean anything goes
    assert_eq!(Signature::from_json("{}").unwrap(), Signature::default());
    assert!(Signature::from_json("[1, 2]").is_err());
  }

  #[test]
  fn test_closure_validator() {
    let reject_all = |_: &[Clause]| -> Result<(), ValidationError> { Err(ValidationError::new("no")) };
    assert_eq!(reject_all.validate(&[]).unwrap_err().classify(), Failure::Other("no".into()));
  }

  #[test]
  fn test_classify_malformed_messages() {
    let err = ValidationError::new("Boxes are not connected: {} {b1}");
    assert!(matches!(err.classify(), Failure::Other(_)));
    let err = ValidationError::disconnected(&["b1", "b2"], &["b3"]);
    assert_eq!(err.message, "Boxes are not connected: {b1, b2} {b3}");
  }
}
