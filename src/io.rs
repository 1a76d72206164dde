//! Reading and writing clause files: one clause per line, DRSs separated by a
//! blank line, `%` starts a comment.

use std::fs;
use std::path::Path;

use crate::clause::Clause;
use crate::error::{Error, Result};

/// Parses clause-format text into one clause list per DRS.
///
/// ```
/// use drsfix::io::parse_records;
///
/// let text = "% a man\nb1 REF x1 % a\nb1 man \"n.01\" x1\n\n\nb1 REF x1\n";
/// let records = parse_records(text).unwrap();
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0][1].to_string(), "b1 man \"n.01\" x1");
/// ```
pub fn parse_records(text: &str) -> Result<Vec<Vec<Clause>>> {
  let mut records = Vec::new();
  let mut current = Vec::new();

  for (idx, line) in text.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      if !current.is_empty() {
        records.push(std::mem::take(&mut current));
      }
      continue;
    }
    if line.starts_with('%') {
      continue;
    }
    let clause = line.parse::<Clause>().map_err(|source| Error::Clause {
      line: idx + 1,
      source,
    })?;
    current.push(clause);
  }
  if !current.is_empty() {
    records.push(current);
  }
  Ok(records)
}

pub fn read_clause_file<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<Clause>>> {
  parse_records(&fs::read_to_string(path)?)
}

/// Raw model output, one record per line. Trailing empty lines are not records.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
  let text = fs::read_to_string(path)?;
  let mut lines = text.lines().map(String::from).collect::<Vec<_>>();
  while lines.last().is_some_and(|l| l.trim().is_empty()) {
    lines.pop();
  }
  Ok(lines)
}

pub fn format_records(records: &[Vec<Clause>]) -> String {
  let mut out = String::new();
  for record in records {
    for clause in record {
      out.push_str(&clause.to_string());
      out.push('\n');
    }
    out.push('\n');
  }
  out
}

pub fn write_records<P: AsRef<Path>>(path: P, records: &[Vec<Clause>]) -> Result<()> {
  Ok(fs::write(path, format_records(records))?)
}

pub fn write_lines<P: AsRef<Path>, S: AsRef<str>>(path: P, lines: &[S]) -> Result<()> {
  let mut out = String::new();
  for line in lines {
    out.push_str(line.as_ref());
    out.push('\n');
  }
  Ok(fs::write(path, out)?)
}
