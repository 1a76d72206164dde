use std::collections::BTreeMap;
use std::fmt;

/// The kinds of repair the pipeline can apply to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Repair {
  /// Clause contained the unknown-token marker and was dropped
  Unknown,
  /// Record was truncated to the maximum clause count
  Remove,
  FrequencyConcept,
  FrequencyName,
  FrequencyRole,
  /// A placeholder could not be resolved as written
  Variables,
  WrongArity,
  NoSense,
  Double,
  NoRef,
  SpuriousRef,
  Sense,
  SubLoop,
  BoxesDisconnected,
  /// Record replaced by a fallback during restoration or referent fixing
  DummiesPp,
  /// Record replaced by a fallback after failing validation
  DummiesRef,
}

impl Repair {
  pub const ALL: [Repair; 16] = [
    Repair::Unknown,
    Repair::Remove,
    Repair::FrequencyConcept,
    Repair::FrequencyName,
    Repair::FrequencyRole,
    Repair::Variables,
    Repair::WrongArity,
    Repair::NoSense,
    Repair::Double,
    Repair::NoRef,
    Repair::SpuriousRef,
    Repair::Sense,
    Repair::SubLoop,
    Repair::BoxesDisconnected,
    Repair::DummiesPp,
    Repair::DummiesRef,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      Self::Unknown => "unknown",
      Self::Remove => "remove",
      Self::FrequencyConcept => "frequency-conc",
      Self::FrequencyName => "frequency-name",
      Self::FrequencyRole => "frequency-role",
      Self::Variables => "variables",
      Self::WrongArity => "wrong arity",
      Self::NoSense => "no-sense",
      Self::Double => "double",
      Self::NoRef => "no-ref",
      Self::SpuriousRef => "spurious-ref",
      Self::Sense => "sense",
      Self::SubLoop => "sub loop",
      Self::BoxesDisconnected => "boxes disconnected",
      Self::DummiesPp => "dummies-pp",
      Self::DummiesRef => "dummies-ref",
    }
  }

  /// True for the categories that replace a whole record
  pub fn is_fallback(&self) -> bool {
    matches!(self, Self::DummiesPp | Self::DummiesRef)
  }
}

impl fmt::Display for Repair {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// Accumulates which records needed which repairs. Record numbers are 1-based,
/// like the line numbers of the input file.
///
/// One log is usually kept per record and merged into the batch total, so a
/// record that panics half-way leaves no partial entries behind.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairLog {
  entries: BTreeMap<Repair, Vec<usize>>,
  /// Validator messages of records that ended up as a fallback
  errors: BTreeMap<String, usize>,
}

impl RepairLog {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn record(&mut self, repair: Repair, record: usize) {
    self.entries.entry(repair).or_default().push(record);
  }

  pub fn record_error(&mut self, message: &str) {
    *self.errors.entry(message.to_string()).or_default() += 1;
  }

  /// Number of times `repair` was applied
  pub fn count(&self, repair: Repair) -> usize {
    self.entries.get(&repair).map_or(0, Vec::len)
  }

  /// Record numbers `repair` was applied to, one entry per application
  pub fn records(&self, repair: Repair) -> &[usize] {
    self.entries.get(&repair).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Number of distinct records `repair` was applied to
  pub fn distinct_records(&self, repair: Repair) -> usize {
    let mut records = self.records(repair).to_vec();
    records.sort_unstable();
    records.dedup();
    records.len()
  }

  /// Total repairs, not counting fallbacks
  pub fn total_repairs(&self) -> usize {
    self
      .entries
      .iter()
      .filter(|(repair, _)| !repair.is_fallback())
      .map(|(_, records)| records.len())
      .sum()
  }

  pub fn total_fallbacks(&self) -> usize {
    self.count(Repair::DummiesPp) + self.count(Repair::DummiesRef)
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn errors(&self) -> impl Iterator<Item = (&str, usize)> {
    self.errors.iter().map(|(msg, c)| (msg.as_str(), *c))
  }

  pub fn iter(&self) -> impl Iterator<Item = (Repair, usize)> + '_ {
    Repair::ALL
      .iter()
      .map(|r| (*r, self.count(*r)))
      .filter(|(_, c)| *c > 0)
  }

  /// Appends everything in `other`. Merging per-record logs in input order
  /// yields the same log as a sequential run.
  pub fn merge(&mut self, other: RepairLog) {
    for (repair, records) in other.entries {
      self.entries.entry(repair).or_default().extend(records);
    }
    for (msg, c) in other.errors {
      *self.errors.entry(msg).or_default() += c;
    }
  }

  /// Human-readable report; `num_records` is the size of the batch.
  pub fn summary(&self, num_records: usize) -> String {
    let mut out = String::new();
    for (repair, count) in self.iter() {
      out.push_str(&format!(
        "{:>6} {} ({} DRSs)\n",
        count,
        repair,
        self.distinct_records(repair)
      ));
    }

    let wrong = self.count(Repair::DummiesRef);
    let pct = if num_records == 0 {
      0.0
    } else {
      wrong as f64 * 100.0 / num_records as f64
    };
    out.push_str(&format!("#wrong = {} ({:.2}%)", wrong, pct));
    let mut errors = self.errors().collect::<Vec<_>>();
    errors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    for (msg, c) in errors {
      out.push_str(&format!("\n  {} {}", c, msg));
    }

    out.push_str(&format!(
      "\nTotal: {} out of {} DRSs replaced by a fallback and {} repairs were needed",
      self.total_fallbacks(),
      num_records,
      self.total_repairs()
    ));
    out
  }
}

impl fmt::Display for RepairLog {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (repair, count) in self.iter() {
      writeln!(f, "{}: {}", repair, count)?;
    }
    Ok(())
  }
}
