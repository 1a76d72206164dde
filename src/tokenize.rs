//! Splits the one-line model output back into clauses.
//!
//! A line looks like `b 1 ||| R E F *** b 1 ||| m a l e ||| " n . 0 2 " ||| x 1`:
//! whitespace separates characters (or sub-word pieces) of a single token, the
//! separator piece stands for the space between two tokens of a clause, and
//! `***` separates clauses. Word-level output is the same format with one piece
//! per token.

use tracing::debug;

use crate::repairs::{Repair, RepairLog};

pub const DEFAULT_SEPARATOR: &str = "|||";
pub const CLAUSE_MARKER: &str = "***";
pub const UNKNOWN_MARKER: &str = "<unk>";

/// Token put in the slot of a token the model dropped entirely
const FILLER: &str = "male";
/// Word-boundary marker left behind by sentencepiece vocabularies
const SPM_MARKER: char = '\u{2581}';

#[derive(Debug, Clone, PartialEq)]
enum Piece {
  Sep,
  Boundary,
  Token(String),
}

/// Tokenizes a raw line into flat clause token lists, repairing the two known
/// separator artifacts on the way.
///
/// ```
/// use drsfix::tokenize::tokenize;
///
/// let clauses = tokenize("b 1 ||| R E F ||| x 1 *** b 1 ||| w o r k ||| \" v . 0 1 \" ||| x 1", "|||");
/// assert_eq!(clauses, vec![
///   vec!["b1", "REF", "x1"],
///   vec!["b1", "work", "\"v.01\"", "x1"],
/// ]);
/// ```
pub fn tokenize(raw_line: &str, separator: &str) -> Vec<Vec<String>> {
  let pieces = group_pieces(raw_line, separator);
  let pieces = fill_dropped_tokens(pieces);
  let pieces = repeat_previous_token(pieces);
  split_clauses(pieces)
}

/// Turns whitespace-separated pieces into separators, clause boundaries and
/// whole tokens. A separator between two matching quotes is a literal.
fn group_pieces(raw_line: &str, separator: &str) -> Vec<Piece> {
  let raw = raw_line
    .split_whitespace()
    .map(|p| p.replace(SPM_MARKER, ""))
    .filter(|p| !p.is_empty())
    .collect::<Vec<_>>();

  let mut pieces = Vec::with_capacity(raw.len());
  let mut idx = 0;
  while idx < raw.len() {
    let piece = raw[idx].as_str();
    let opens_token = !matches!(pieces.last(), Some(Piece::Token(_)));
    if opens_token
      && is_quote(piece)
      && raw.get(idx + 1).map(String::as_str) == Some(separator)
      && raw.get(idx + 2).map(String::as_str) == Some(piece)
    {
      push_text(&mut pieces, &format!("{}{}{}", piece, separator, piece));
      idx += 3;
      continue;
    }

    if piece == separator {
      pieces.push(Piece::Sep);
    } else if piece == CLAUSE_MARKER {
      pieces.push(Piece::Boundary);
    } else {
      push_text(&mut pieces, piece);
    }
    idx += 1;
  }
  pieces
}

fn is_quote(piece: &str) -> bool {
  piece == "\"" || piece == "'"
}

/// Characters of one token are glued together
fn push_text(pieces: &mut Vec<Piece>, text: &str) {
  if let Some(Piece::Token(token)) = pieces.last_mut() {
    token.push_str(text);
  } else {
    pieces.push(Piece::Token(text.to_string()));
  }
}

/// Three separators in a row mean a whole token went missing: put a filler in
/// its place.
fn fill_dropped_tokens(pieces: Vec<Piece>) -> Vec<Piece> {
  let mut out = Vec::with_capacity(pieces.len());
  let mut idx = 0;
  while idx < pieces.len() {
    if pieces[idx..].starts_with(&[Piece::Sep, Piece::Sep, Piece::Sep]) {
      out.extend([Piece::Sep, Piece::Token(FILLER.to_string()), Piece::Sep]);
      idx += 3;
    } else {
      out.push(pieces[idx].clone());
      idx += 1;
    }
  }
  out
}

/// Two separators in a row mean the model skipped a token: repeat the last
/// token seen. The clause will never match the gold standard, but it stays
/// well-formed.
fn repeat_previous_token(pieces: Vec<Piece>) -> Vec<Piece> {
  let mut out: Vec<Piece> = Vec::with_capacity(pieces.len());
  let mut last_token: Option<String> = None;
  for piece in pieces {
    match &piece {
      Piece::Sep if out.is_empty() => continue,
      Piece::Sep if out.last() == Some(&Piece::Sep) => {
        if let Some(token) = &last_token {
          out.push(Piece::Token(token.clone()));
        }
      }
      Piece::Token(token) => last_token = Some(token.clone()),
      _ => {}
    }
    out.push(piece);
  }
  out
}

fn split_clauses(pieces: Vec<Piece>) -> Vec<Vec<String>> {
  let mut clauses = Vec::new();
  let mut current = Vec::new();
  for piece in pieces {
    match piece {
      Piece::Token(token) => current.push(token),
      Piece::Boundary => {
        if !current.is_empty() {
          clauses.push(std::mem::take(&mut current));
        }
      }
      Piece::Sep => {}
    }
  }
  if !current.is_empty() {
    clauses.push(current);
  }
  clauses
}

/// Record-level tokenizer: [`tokenize`] plus unknown-token removal and the
/// optional clause cap.
#[derive(Debug, Clone)]
pub struct Tokenizer {
  separator: String,
  max_clauses: usize,
}

impl Default for Tokenizer {
  fn default() -> Self {
    Self::new(DEFAULT_SEPARATOR)
  }
}

impl Tokenizer {
  pub fn new(separator: &str) -> Self {
    Self {
      separator: separator.to_string(),
      max_clauses: 0,
    }
  }

  /// Keep at most `max_clauses` clauses per record; 0 keeps everything.
  pub fn with_max_clauses(mut self, max_clauses: usize) -> Self {
    self.max_clauses = max_clauses;
    self
  }

  pub fn separator(&self) -> &str {
    &self.separator
  }

  pub fn tokenize(&self, record: usize, raw_line: &str, log: &mut RepairLog) -> Vec<Vec<String>> {
    let mut clauses = Vec::new();
    for clause in tokenize(raw_line, &self.separator) {
      if clause.iter().any(|t| t.contains(UNKNOWN_MARKER)) {
        debug!(record, clause = %clause.join(" "), "dropping clause with unknown token");
        log.record(Repair::Unknown, record);
      } else {
        clauses.push(clause);
      }
    }

    if self.max_clauses > 0 && clauses.len() > self.max_clauses {
      debug!(
        record,
        total = clauses.len(),
        max = self.max_clauses,
        "removing clauses after the maximum"
      );
      log.record(Repair::Remove, record);
      clauses.truncate(self.max_clauses);
    }
    clauses
  }
}
