//! The inverse of restoration: turns a concrete clause set into the one-line
//! placeholder encoding the model is trained on.

use std::collections::HashMap;

use crate::clause::{Clause, Term};
use crate::restore::VariableMode;
use crate::tokenize::CLAUSE_MARKER;
use crate::utils::{Err, between_quotes};

/// Encodes `clauses` with the variables written the way `mode` expects them.
pub fn encode(mode: VariableMode, clauses: &[Clause]) -> Result<Vec<Vec<String>>, Err> {
  match mode {
    VariableMode::Relative => encode_relative(clauses),
    VariableMode::Absolute => Ok(encode_absolute(clauses)),
    VariableMode::None => Ok(encode_none(clauses)),
  }
}

/// Relative encoding: a box is `$NEW` the first time it is seen and `$k`
/// afterwards, counted back from the most recent box. Referents are numbered by
/// their `REF` clause and referenced as `@k` relative to the number of `REF`s
/// seen so far. `REF` clauses lose their referent.
///
/// ```
/// use drsfix::clause::Clause;
/// use drsfix::encode::encode_relative;
///
/// let clauses = ["b1 REF x1", "b1 male \"n.02\" x1", "b1 NOT b2", "b2 REF e1", "b2 Agent e1 x1"]
///   .iter()
///   .map(|c| c.parse::<Clause>().unwrap())
///   .collect::<Vec<_>>();
/// let encoded = encode_relative(&clauses).unwrap();
/// let encoded = encoded.iter().map(|c| c.join(" ")).collect::<Vec<_>>();
/// assert_eq!(encoded, vec![
///   "$NEW REF",
///   "$0 male \"n.02\" @0",
///   "$0 NOT $NEW",
///   "$0 REF",
///   "$0 Agent @0 @-1",
/// ]);
/// ```
pub fn encode_relative(clauses: &[Clause]) -> Result<Vec<Vec<String>>, Err> {
  let var_order = clauses.iter().filter_map(Clause::declared).collect::<Vec<_>>();
  let mut boxes_seen: Vec<String> = Vec::new();
  let mut cur_var = 0;

  let mut box_var = |b: &str| -> String {
    match boxes_seen.iter().position(|seen| *seen == b) {
      Some(idx) => format!("${}", idx as i64 - boxes_seen.len() as i64 + 1),
      None => {
        boxes_seen.push(b.to_string());
        "$NEW".to_string()
      }
    }
  };

  let mut encoded = Vec::with_capacity(clauses.len());
  for clause in clauses {
    // resolves one argument against the REFs seen before this clause
    let var = |term: &str| -> Result<String, Err> {
      let idx = var_order
        .iter()
        .position(|r| *r == term)
        .ok_or_else(|| format!("referent {} is never introduced", term))?;
      Ok(format!("@{}", idx as i64 - cur_var as i64 + 1))
    };
    let arg = |term: &Term| -> Result<String, Err> {
      match term.var() {
        Some(v) => var(v),
        None => Ok(term.as_str().to_string()),
      }
    };

    let out = match clause {
      Clause::Ref { box_id, .. } => vec![box_var(box_id), "REF".to_string()],
      Clause::BoxRelation { box_id, op, sub } => vec![box_var(box_id), op.clone(), box_var(sub)],
      Clause::Condition { box_id, relation, arg: a } => {
        let b = box_var(box_id);
        vec![b, relation.clone(), arg(a)?]
      }
      Clause::Concept {
        box_id,
        concept,
        sense,
        arg: a,
      } => {
        let b = box_var(box_id);
        vec![b, concept.clone(), sense.clone(), arg(a)?]
      }
      Clause::Role {
        box_id,
        role: rel,
        arg1,
        arg2,
      }
      | Clause::Operator {
        box_id,
        op: rel,
        arg1,
        arg2,
      } => {
        let b = box_var(box_id);
        vec![b, rel.clone(), arg(arg1)?, arg(arg2)?]
      }
      Clause::BoxOperator {
        box_id,
        op,
        left,
        right,
      } => {
        let b = box_var(box_id);
        let l = box_var(left);
        vec![b, op.clone(), l, box_var(right)]
      }
      Clause::Proposition { box_id, referent, sub } => {
        let b = box_var(box_id);
        let r = var(referent)?;
        vec![b, "PRP".to_string(), r, box_var(sub)]
      }
    };
    if clause.is_ref() {
      cur_var += 1;
    }
    encoded.push(out);
  }
  Ok(encoded)
}

/// Absolute encoding: every distinct box becomes `$0`, `$1`, ... and every
/// distinct referent `@0`, `@1`, ... in order of first occurrence.
pub fn encode_absolute(clauses: &[Clause]) -> Vec<Vec<String>> {
  let mut boxes: HashMap<String, String> = HashMap::new();
  let mut referents: HashMap<String, String> = HashMap::new();

  let lookup = |map: &mut HashMap<String, String>, ident: char, key: &str| -> String {
    let next = map.len();
    map
      .entry(key.to_string())
      .or_insert_with(|| format!("{}{}", ident, next))
      .clone()
  };

  clauses
    .iter()
    .map(|clause| {
      let tokens = clause.tokens();
      let mut out = vec![lookup(&mut boxes, '$', tokens[0]), tokens[1].to_string()];
      for (idx, &token) in tokens.iter().enumerate().skip(2) {
        let is_box = match clause {
          Clause::BoxRelation { .. } | Clause::BoxOperator { .. } => true,
          Clause::Proposition { .. } => idx == 3,
          _ => false,
        };
        let is_literal = between_quotes(token)
          || matches!(clause, Clause::Concept { .. } if idx == 2);
        let encoded = if is_literal {
          token.to_string()
        } else if is_box {
          lookup(&mut boxes, '$', token)
        } else {
          lookup(&mut referents, '@', token)
        };
        out.push(encoded);
      }
      out
    })
    .collect()
}

/// No renaming at all; the clauses are written out as they are.
pub fn encode_none(clauses: &[Clause]) -> Vec<Vec<String>> {
  clauses
    .iter()
    .map(|c| c.tokens().into_iter().map(String::from).collect())
    .collect()
}

/// Joins encoded clauses into a word-level model line, `separator` between the
/// tokens of a clause and `***` between clauses.
pub fn to_line(encoded: &[Vec<String>], separator: &str) -> String {
  encoded
    .iter()
    .map(|clause| clause.join(&format!(" {} ", separator)))
    .collect::<Vec<_>>()
    .join(&format!(" {} ", CLAUSE_MARKER))
}
