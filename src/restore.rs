//! Restores concrete box and referent names from the placeholder encodings
//! the model is trained on.
//!
//! In the relative encoding `$NEW` introduces the next box and `$-1` points to
//! the box introduced one before the most recent one; referents are introduced
//! by `REF` clauses and referenced the same way with `@`. References that point
//! before the first or past the last variable are clamped to the nearest end.
//! This hides real model errors as "successful" repairs, so every clamp is
//! counted under `variables`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::clause::{Clause, DEFAULT_SENSE, RelationKind};
use crate::repairs::{Repair, RepairLog};
use crate::utils::{Err, between_quotes, strip_comment};

const BOX_IDENT: char = '$';
const VAR_IDENT: char = '@';

/// How variables are written in the model output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VariableMode {
  /// `$NEW`, `$-1`, `@0`, ...
  #[default]
  Relative,
  /// Arbitrary repeated tokens, one per variable
  Absolute,
  /// Variables are already concrete
  None,
}

impl FromStr for VariableMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "rel" => Ok(Self::Relative),
      "abs" => Ok(Self::Absolute),
      "none" => Ok(Self::None),
      _ => Err(format!("unknown variable mode {} (expected rel, abs or none)", s)),
    }
  }
}

impl fmt::Display for VariableMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Relative => write!(f, "rel"),
      Self::Absolute => write!(f, "abs"),
      Self::None => write!(f, "none"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
  Box,
  Referent,
}

impl fmt::Display for Slot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Box => write!(f, "box"),
      Self::Referent => write!(f, "referent"),
    }
  }
}

/// Per-record restoration state. Placeholders are resolved relative to how
/// many variables have been introduced so far, so one restorer handles exactly
/// one record, front to back.
#[derive(Debug)]
pub struct Restorer {
  mode: VariableMode,
  record: usize,
  cur_var: usize,
  cur_box: usize,
  var_order: Vec<String>,
  box_order: Vec<String>,
  abs_referents: HashMap<String, String>,
  abs_boxes: HashMap<String, String>,
}

impl Restorer {
  /// Prepares the restorer for `clauses`, which it scans once to number the
  /// referents (one per `REF` clause) and boxes (one per `$NEW`).
  pub fn new<S: AsRef<str>>(mode: VariableMode, record: usize, clauses: &[Vec<S>]) -> Self {
    let num_refs = clauses
      .iter()
      .filter(|c| c.len() > 1 && c[1].as_ref() == "REF")
      .count();
    let box_new = format!("{}NEW", BOX_IDENT);
    let num_boxes = clauses
      .iter()
      .flatten()
      .filter(|t| t.as_ref() == box_new)
      .count();

    Self {
      mode,
      record,
      cur_var: 0,
      cur_box: 0,
      var_order: (1..=num_refs).map(|i| format!("x{}", i)).collect(),
      box_order: (1..=num_boxes).map(|i| format!("b{}", i)).collect(),
      abs_referents: HashMap::new(),
      abs_boxes: HashMap::new(),
    }
  }

  /// Restores every clause of the record. Clauses that cannot be restored are
  /// dropped and counted; an empty record is an error.
  pub fn restore<S: AsRef<str>>(&mut self, clauses: &[Vec<S>], log: &mut RepairLog) -> Result<Vec<Clause>, Err> {
    if clauses.is_empty() {
      return Err(format!("record {} has no clauses", self.record).into());
    }

    let mut restored = Vec::with_capacity(clauses.len());
    for clause in clauses {
      let tokens = strip_comment(clause)
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>();
      let joined = tokens.join(" ");

      let concrete = match self.restore_tokens(&tokens, log) {
        Ok(Some(concrete)) => concrete,
        Ok(None) => {
          debug!(record = self.record, clause = %joined, "ignoring clause because of wrong arity");
          log.record(Repair::WrongArity, self.record);
          continue;
        }
        Err(e) => {
          debug!(record = self.record, clause = %joined, error = %e, "error when restoring clause, ignoring it");
          log.record(Repair::Variables, self.record);
          continue;
        }
      };

      match Clause::from_tokens(&concrete) {
        Ok(c) => restored.push(c),
        Err(e) => {
          debug!(record = self.record, clause = %joined, error = %e, "restored clause is malformed, ignoring it");
          log.record(Repair::Variables, self.record);
        }
      }
    }
    Ok(restored)
  }

  /// Returns the concrete tokens, or None if the clause has the wrong arity.
  fn restore_tokens(&mut self, tokens: &[&str], log: &mut RepairLog) -> Result<Option<Vec<String>>, Err> {
    if !matches!(tokens.len(), 2..=4) {
      return Ok(None);
    }
    let relation = tokens[1];
    let kind = RelationKind::of(relation);

    if self.mode == VariableMode::None {
      return Ok(self.check_concrete(tokens, kind, log));
    }

    let box_id = self.resolve(tokens[0], Slot::Box, log)?;
    let mut out = vec![box_id, relation.to_string()];

    match (tokens.len(), kind) {
      (2, RelationKind::Ref) if self.mode == VariableMode::Relative => out.push(self.next_referent()?),
      (2, _) => return Ok(None),
      (3, RelationKind::Ref) => {
        let referent = match self.mode {
          VariableMode::Relative => self.next_referent()?,
          _ => self.resolve(tokens[2], Slot::Referent, log)?,
        };
        out.push(referent);
      }
      (3, RelationKind::BoxOperator | RelationKind::Proposition) => {
        out.push(self.resolve(tokens[2], Slot::Box, log)?)
      }
      // a concept needs a sense and a referent
      (3, RelationKind::Concept) => return Ok(None),
      (3, _) => out.push(self.resolve_arg(tokens[2], Slot::Referent, log)?),
      (4, RelationKind::Ref) => return Ok(None),
      (4, RelationKind::Concept) => {
        let arg = self.resolve_arg(tokens[3], Slot::Referent, log)?;
        out.push(self.sense(relation, tokens[2], log));
        out.push(arg);
      }
      (4, RelationKind::Proposition) => {
        out.push(self.resolve_arg(tokens[2], Slot::Referent, log)?);
        out.push(self.resolve_arg(tokens[3], Slot::Box, log)?);
      }
      (4, RelationKind::BoxOperator) => {
        out.push(self.resolve_arg(tokens[2], Slot::Box, log)?);
        out.push(self.resolve_arg(tokens[3], Slot::Box, log)?);
      }
      (4, _) => {
        out.push(self.resolve_arg(tokens[2], Slot::Referent, log)?);
        out.push(self.resolve_arg(tokens[3], Slot::Referent, log)?);
      }
      _ => return Ok(None),
    }
    Ok(Some(out))
  }

  /// Mode `none`: only the arity and the concept sense are checked.
  fn check_concrete(&self, tokens: &[&str], kind: RelationKind, log: &mut RepairLog) -> Option<Vec<String>> {
    match (tokens.len(), kind) {
      (3, RelationKind::Concept) => None,
      (4, RelationKind::Concept) => Some(vec![
        tokens[0].to_string(),
        tokens[1].to_string(),
        self.sense(tokens[1], tokens[2], log),
        tokens[3].to_string(),
      ]),
      (3 | 4, _) => Some(tokens.iter().map(|t| t.to_string()).collect()),
      _ => None,
    }
  }

  fn sense(&self, concept: &str, sense: &str, log: &mut RepairLog) -> String {
    if between_quotes(sense) {
      sense.to_string()
    } else {
      debug!(record = self.record, concept, "no sense was added for concept, using the default sense");
      log.record(Repair::NoSense, self.record);
      DEFAULT_SENSE.to_string()
    }
  }

  /// `REF` always introduces a fresh referent in relative mode
  fn next_referent(&mut self) -> Result<String, Err> {
    let referent = self
      .var_order
      .get(self.cur_var)
      .cloned()
      .ok_or("more referents introduced than REF clauses counted")?;
    self.cur_var += 1;
    Ok(referent)
  }

  /// Like `resolve`, but quoted constants are kept as they are
  fn resolve_arg(&mut self, token: &str, slot: Slot, log: &mut RepairLog) -> Result<String, Err> {
    if between_quotes(token) {
      Ok(token.to_string())
    } else {
      self.resolve(token, slot, log)
    }
  }

  fn resolve(&mut self, token: &str, slot: Slot, log: &mut RepairLog) -> Result<String, Err> {
    match self.mode {
      VariableMode::Relative => self.resolve_relative(token, slot, log),
      VariableMode::Absolute => Ok(self.resolve_absolute(token, slot)),
      VariableMode::None => Ok(token.to_string()),
    }
  }

  fn resolve_relative(&mut self, token: &str, slot: Slot, log: &mut RepairLog) -> Result<String, Err> {
    let record = self.record;
    let (ident, order, cur) = match slot {
      Slot::Box => (BOX_IDENT, &self.box_order, &mut self.cur_box),
      Slot::Referent => (VAR_IDENT, &self.var_order, &mut self.cur_var),
    };

    if token.strip_prefix(ident) == Some("NEW") {
      let name = order
        .get(*cur)
        .cloned()
        .ok_or_else(|| format!("no {} left to introduce for {}", slot, token))?;
      *cur += 1;
      return Ok(name);
    }

    // the first character is dropped whatever it is, so `@-1` in a box slot still counts back one box
    let mut digits = token.chars();
    digits.next();
    let offset = match digits.as_str().parse::<i64>().ok() {
      Some(offset) => offset,
      None => {
        debug!(record, token, "could not find variable number, using default 0");
        log.record(Repair::Variables, record);
        0
      }
    };

    if order.is_empty() {
      return Err(format!("no {} introduced before {}", slot, token).into());
    }

    let idx = (*cur as i64).saturating_add(offset).saturating_sub(1);
    let idx = if idx < 0 {
      debug!(record, token, "impossible negative reference, using the first {}", slot);
      log.record(Repair::Variables, record);
      0
    } else if idx as usize >= order.len() {
      debug!(record, token, "reference past the last {}, using the last one", slot);
      log.record(Repair::Variables, record);
      order.len() - 1
    } else {
      idx as usize
    };
    Ok(order[idx].clone())
  }

  fn resolve_absolute(&mut self, token: &str, slot: Slot) -> String {
    let (prefix, map) = match slot {
      Slot::Box => ("b", &mut self.abs_boxes),
      Slot::Referent => ("x", &mut self.abs_referents),
    };
    let next = map.len();
    map
      .entry(token.to_string())
      .or_insert_with(|| format!("{}{}", prefix, next))
      .clone()
  }
}

/// Restores one record in the given mode with a fresh [`Restorer`].
pub fn restore_variables<S: AsRef<str>>(
  mode: VariableMode,
  record: usize,
  clauses: &[Vec<S>],
  log: &mut RepairLog,
) -> Result<Vec<Clause>, Err> {
  Restorer::new(mode, record, clauses).restore(clauses, log)
}
