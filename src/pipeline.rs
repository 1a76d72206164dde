//! The batch driver: runs every record through tokenization, filtering,
//! variable restoration, referent fixing, sense correction and validation, and
//! puts a fallback DRS in place of anything that cannot be repaired.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::clause::Clause;
use crate::error::Error;
use crate::fallback::FallbackKind;
use crate::frequency::FrequencyFilter;
use crate::referee::{Failure, Referee, Signature, Validator};
use crate::referents::repair_referents;
use crate::repair::{resolve_disconnected, resolve_loop};
use crate::repairs::{Repair, RepairLog};
use crate::restore::{VariableMode, restore_variables};
use crate::senses::SenseTable;
use crate::tokenize::{CLAUSE_MARKER, DEFAULT_SEPARATOR, Tokenizer};

/// Pipeline settings. Limits of 0 switch the corresponding filter off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub variable_mode: VariableMode,
  pub separator: String,
  pub remove_clauses_after: usize,
  pub remove_concepts_over: usize,
  pub remove_roles_ops_over: usize,
  pub use_referee: bool,
  pub attempt_fix_loop: bool,
  pub attempt_fix_disconnected: bool,
  pub fallback_kind: FallbackKind,
  pub sense_fix_table: Option<PathBuf>,
  /// Roles and operators the built-in referee accepts; everything if unset
  pub signature_file: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      variable_mode: VariableMode::Relative,
      separator: DEFAULT_SEPARATOR.to_string(),
      remove_clauses_after: 0,
      remove_concepts_over: 0,
      remove_roles_ops_over: 0,
      use_referee: true,
      attempt_fix_loop: true,
      attempt_fix_disconnected: true,
      fallback_kind: FallbackKind::Dummy,
      sense_fix_table: None,
      signature_file: None,
    }
  }
}

impl Config {
  pub fn with_variable_mode(mut self, mode: VariableMode) -> Self {
    self.variable_mode = mode;
    self
  }

  pub fn with_separator(mut self, separator: &str) -> Self {
    self.separator = separator.to_string();
    self
  }

  pub fn with_remove_clauses_after(mut self, max: usize) -> Self {
    self.remove_clauses_after = max;
    self
  }

  pub fn with_remove_concepts_over(mut self, max: usize) -> Self {
    self.remove_concepts_over = max;
    self
  }

  pub fn with_remove_roles_ops_over(mut self, max: usize) -> Self {
    self.remove_roles_ops_over = max;
    self
  }

  pub fn with_referee(mut self, use_referee: bool) -> Self {
    self.use_referee = use_referee;
    self
  }

  pub fn with_fix_loop(mut self, attempt: bool) -> Self {
    self.attempt_fix_loop = attempt;
    self
  }

  pub fn with_fix_disconnected(mut self, attempt: bool) -> Self {
    self.attempt_fix_disconnected = attempt;
    self
  }

  pub fn with_fallback(mut self, kind: FallbackKind) -> Self {
    self.fallback_kind = kind;
    self
  }

  pub fn with_sense_fix_table<P: Into<PathBuf>>(mut self, path: P) -> Self {
    self.sense_fix_table = Some(path.into());
    self
  }

  pub fn with_signature_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
    self.signature_file = Some(path.into());
    self
  }
}

/// Restored records in input order, plus what it took to restore them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
  pub records: Vec<Vec<Clause>>,
  pub log: RepairLog,
}

impl Output {
  pub fn summary(&self) -> String {
    self.log.summary(self.records.len())
  }
}

pub struct Pipeline {
  config: Config,
  tokenizer: Tokenizer,
  frequency: FrequencyFilter,
  senses: Option<SenseTable>,
  validator: Box<dyn Validator>,
}

impl fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pipeline")
      .field("config", &self.config)
      .field("senses", &self.senses.as_ref().map(SenseTable::len))
      .finish()
  }
}

impl Pipeline {
  /// Checks the configuration and loads the sense table and signature it
  /// points to.
  pub fn new(config: Config) -> Result<Self, Error> {
    if config.separator.trim().is_empty() || config.separator.contains(char::is_whitespace) {
      return Err(Error::Config(format!(
        "separator {:?} must be a single non-empty piece",
        config.separator
      )));
    }
    if config.separator == CLAUSE_MARKER {
      return Err(Error::Config(format!(
        "separator cannot be the clause marker {}",
        CLAUSE_MARKER
      )));
    }

    let senses = match &config.sense_fix_table {
      Some(path) => Some(SenseTable::read_from_file(path)?),
      None => None,
    };
    let signature = match &config.signature_file {
      Some(path) => Signature::read_from_file(path)?,
      None => Signature::default(),
    };
    debug!(?config, "pipeline configured");

    Ok(Self {
      tokenizer: Tokenizer::new(&config.separator).with_max_clauses(config.remove_clauses_after),
      frequency: FrequencyFilter::new(config.remove_concepts_over, config.remove_roles_ops_over),
      senses,
      validator: Box::new(Referee::new(signature)),
      config,
    })
  }

  /// Replaces the built-in referee. Only consulted when `use_referee` is set.
  pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
    self.validator = Box::new(validator);
    self
  }

  pub fn with_sense_table(mut self, table: SenseTable) -> Self {
    self.senses = Some(table);
    self
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  fn fallback(&self) -> Vec<Clause> {
    self.config.fallback_kind.clauses()
  }

  /// Restores a single record. `record` is its 1-based number, used for the
  /// log only.
  pub fn process_line(&self, record: usize, raw_line: &str, log: &mut RepairLog) -> Vec<Clause> {
    let tokens = self.tokenizer.tokenize(record, raw_line, log);
    let tokens = self.frequency.apply(record, tokens, log);

    let clauses = match restore_variables(self.config.variable_mode, record, &tokens, log) {
      Ok(clauses) => clauses,
      Err(e) => {
        warn!(record, error = %e, "could not restore variables, using fallback");
        log.record(Repair::DummiesPp, record);
        return self.fallback();
      }
    };

    let clauses = repair_referents(record, clauses, log);
    if clauses.is_empty() {
      warn!(record, "no clauses left after fixing referents, using fallback");
      log.record(Repair::DummiesPp, record);
      return self.fallback();
    }

    let clauses = match &self.senses {
      Some(table) => table.apply(record, clauses, log),
      None => clauses,
    };

    if self.config.use_referee {
      self.check(record, clauses, log)
    } else {
      clauses
    }
  }

  /// Validates the record, repairing loops and disconnected boxes when
  /// allowed. Anything else invalid becomes the fallback.
  fn check(&self, record: usize, clauses: Vec<Clause>, log: &mut RepairLog) -> Vec<Clause> {
    let validator = self.validator.as_ref();
    let err = match validator.validate(&clauses) {
      Ok(()) => return clauses,
      Err(err) => err,
    };

    let repaired = match err.classify() {
      Failure::SubordinationLoop(offending) if self.config.attempt_fix_loop => {
        resolve_loop(&clauses, &offending, validator).map(|c| (Repair::SubLoop, c))
      }
      Failure::Disconnected(a, b) if self.config.attempt_fix_disconnected => {
        resolve_disconnected(&clauses, &a, &b, validator).map(|c| (Repair::BoxesDisconnected, c))
      }
      _ => None,
    };

    match repaired {
      Some((repair, fixed)) => {
        debug!(record, %repair, error = %err, "repaired invalid DRS");
        log.record(repair, record);
        fixed
      }
      None => {
        warn!(record, error = %err, "invalid DRS, using fallback");
        log.record_error(&err.message);
        log.record(Repair::DummiesRef, record);
        self.fallback()
      }
    }
  }

  /// Runs one record with its own log. A panic anywhere in the record only
  /// costs that record.
  fn process_record(&self, record: usize, raw_line: &str) -> (Vec<Clause>, RepairLog) {
    let mut log = RepairLog::new();
    match panic::catch_unwind(AssertUnwindSafe(|| self.process_line(record, raw_line, &mut log))) {
      Ok(clauses) => (clauses, log),
      Err(_) => {
        warn!(record, "panic while processing record, using fallback");
        let mut log = RepairLog::new();
        log.record(Repair::DummiesPp, record);
        (self.fallback(), log)
      }
    }
  }

  /// Restores every line, in order. With the `parallel` feature records are
  /// processed on the rayon thread pool; the result is the same either way.
  pub fn process<S: AsRef<str> + Sync>(&self, lines: &[S]) -> Output {
    let run = |(idx, line): (usize, &S)| self.process_record(idx + 1, line.as_ref());

    #[cfg(feature = "parallel")]
    let results: Vec<(Vec<Clause>, RepairLog)> = {
      use rayon::prelude::*;
      lines.par_iter().enumerate().map(run).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let results: Vec<(Vec<Clause>, RepairLog)> = lines.iter().enumerate().map(run).collect();

    let mut output = Output {
      records: Vec::with_capacity(results.len()),
      log: RepairLog::new(),
    };
    for (clauses, log) in results {
      output.records.push(clauses);
      output.log.merge(log);
    }
    info!(
      records = output.records.len(),
      repairs = output.log.total_repairs(),
      fallbacks = output.log.total_fallbacks(),
      "restored batch"
    );
    output
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::referee::ValidationError;

  fn lines(clauses: &[Clause]) -> Vec<String> {
    clauses.iter().map(|c| c.to_string()).collect()
  }

  #[test]
  fn test_bad_config() {
    assert!(matches!(
      Pipeline::new(Config::default().with_separator("***")),
      Err(Error::Config(_))
    ));
    assert!(matches!(
      Pipeline::new(Config::default().with_separator(" ")),
      Err(Error::Config(_))
    ));
    assert!(matches!(
      Pipeline::new(Config::default().with_sense_fix_table("/nonexistent/senses.json")),
      Err(Error::Io(_))
    ));
  }

  #[test]
  fn test_relative_line() {
    let pipeline = Pipeline::new(Config::default()).unwrap();
    let mut log = RepairLog::new();
    let out = pipeline.process_line(
      1,
      "$ N E W ||| R E F *** $ 0 ||| m a l e ||| \" n . 0 2 \" ||| @ 0 *** $ 0 ||| R E F",
      &mut log,
    );
    assert_eq!(lines(&out), vec!["b1 REF x1", "b1 male \"n.02\" x1"]);
    assert_eq!(log.records(Repair::SpuriousRef), &[1]);
  }

  #[test]
  fn test_empty_line_falls_back() {
    let pipeline = Pipeline::new(Config::default().with_fallback(FallbackKind::Baseline)).unwrap();
    let out = pipeline.process(&["", "b1 ||| REF ||| x1"]);
    assert_eq!(out.records[0], FallbackKind::Baseline.clauses());
    // concrete variables do not resolve in relative mode, so nothing is left
    assert_eq!(out.records[1], FallbackKind::Baseline.clauses());
    assert_eq!(out.log.records(Repair::DummiesPp), &[1, 2]);
  }

  #[test]
  fn test_disabled_repairs() {
    let pipeline = Pipeline::new(Config::default().with_variable_mode(VariableMode::None).with_fix_loop(false))
      .unwrap()
      .with_validator(|_: &[Clause]| -> Result<(), ValidationError> {
        Err(ValidationError::subordination_loop(&["b1", "b1"]))
      });
    let out = pipeline.process(&["b1 ||| REF ||| x1 *** b1 ||| male ||| \"n.02\" ||| x1"]);
    assert_eq!(out.records[0], FallbackKind::Dummy.clauses());
    assert_eq!(out.log.count(Repair::DummiesRef), 1);
    assert_eq!(out.log.count(Repair::SubLoop), 0);
  }

  #[test]
  fn test_panicking_validator_is_contained() {
    let pipeline = Pipeline::new(Config::default().with_variable_mode(VariableMode::None))
      .unwrap()
      .with_validator(|c: &[Clause]| -> Result<(), ValidationError> {
        if c.iter().any(|c| c.relation() == "boom") {
          panic!("validator crashed");
        }
        Ok(())
      });
    let out = pipeline.process(&[
      "b1 ||| REF ||| x1 *** b1 ||| boom ||| \"n.01\" ||| x1",
      "b1 ||| REF ||| x1 *** b1 ||| male ||| \"n.02\" ||| x1",
    ]);
    assert_eq!(out.records[0], FallbackKind::Dummy.clauses());
    assert_eq!(lines(&out.records[1]), vec!["b1 REF x1", "b1 male \"n.02\" x1"]);
    assert_eq!(out.log.records(Repair::DummiesPp), &[1]);
  }
}
