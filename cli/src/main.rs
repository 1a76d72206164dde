use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use drsfix::encode::{encode, to_line};
use drsfix::io::{read_clause_file, read_lines, write_lines, write_records};
use drsfix::tokenize::DEFAULT_SEPARATOR;
use drsfix::{Config, Err, FallbackKind, Pipeline, VariableMode};

/// Restores DRS clause files from seq2seq parser output, and encodes clause
/// files into parser input.
#[derive(Parser)]
#[command(name = "drsfix", version)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Turn parser output (one DRS per line) into a valid clause file
  Restore {
    /// Parser output, one DRS per line
    #[arg(short, long)]
    input_file: PathBuf,
    /// Where to write the restored clause file
    #[arg(short, long)]
    output_file: PathBuf,
    /// How variables are encoded: rel, abs or none
    #[arg(short, long, default_value = "rel")]
    variables: VariableMode,
    /// Piece that separates the tokens of a clause
    #[arg(long, default_value = DEFAULT_SEPARATOR)]
    sep: String,
    /// Keep at most this many clauses per DRS (0 keeps all)
    #[arg(long, default_value_t = 0)]
    remove_clauses: usize,
    /// Drop concepts and names occurring more than this often (0 keeps all)
    #[arg(long, default_value_t = 0)]
    remove_concepts: usize,
    /// Drop roles and operators occurring more than this often (0 keeps all)
    #[arg(long, default_value_t = 0)]
    remove_roles_ops: usize,
    /// Skip the referee check
    #[arg(long)]
    no_referee: bool,
    /// Replace DRSs with a subordination loop instead of repairing them
    #[arg(long)]
    no_fix_loop: bool,
    /// Replace DRSs with disconnected boxes instead of repairing them
    #[arg(long)]
    no_fix_disconnected: bool,
    /// DRS put in place of invalid output: dummy or baseline
    #[arg(long, default_value = "dummy")]
    fallback: FallbackKind,
    /// JSON table of known senses per concept
    #[arg(long)]
    sense_table: Option<PathBuf>,
    /// JSON signature with the roles and operators the referee accepts
    #[arg(long)]
    sig_file: Option<PathBuf>,
  },

  /// Turn a clause file into parser input, one DRS per line
  Encode {
    /// Clause file, DRSs separated by blank lines
    #[arg(short, long)]
    input_file: PathBuf,
    /// Where to write the encoded lines
    #[arg(short, long)]
    output_file: PathBuf,
    /// How to encode variables: rel, abs or none
    #[arg(short, long, default_value = "rel")]
    variables: VariableMode,
    /// Piece that separates the tokens of a clause
    #[arg(long, default_value = DEFAULT_SEPARATOR)]
    sep: String,
    /// Skip DRSs that cannot be encoded instead of stopping
    #[arg(long)]
    no_error: bool,
  },
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  match Cli::parse().command {
    Commands::Restore {
      input_file,
      output_file,
      variables,
      sep,
      remove_clauses,
      remove_concepts,
      remove_roles_ops,
      no_referee,
      no_fix_loop,
      no_fix_disconnected,
      fallback,
      sense_table,
      sig_file,
    } => {
      let mut config = Config::default()
        .with_variable_mode(variables)
        .with_separator(&sep)
        .with_remove_clauses_after(remove_clauses)
        .with_remove_concepts_over(remove_concepts)
        .with_remove_roles_ops_over(remove_roles_ops)
        .with_referee(!no_referee)
        .with_fix_loop(!no_fix_loop)
        .with_fix_disconnected(!no_fix_disconnected)
        .with_fallback(fallback);
      if let Some(path) = sense_table {
        config = config.with_sense_fix_table(path);
      }
      if let Some(path) = sig_file {
        config = config.with_signature_file(path);
      }

      let pipeline = Pipeline::new(config)?;
      let lines = read_lines(&input_file)?;
      info!(records = lines.len(), input = %input_file.display(), "restoring");

      let output = pipeline.process(&lines);
      write_records(&output_file, &output.records)?;
      println!("{}", output.summary());
    }

    Commands::Encode {
      input_file,
      output_file,
      variables,
      sep,
      no_error,
    } => {
      let records = read_clause_file(&input_file)?;
      let mut lines = Vec::with_capacity(records.len());
      let mut skipped = 0;
      for (idx, record) in records.iter().enumerate() {
        match encode(variables, record) {
          Ok(encoded) => lines.push(to_line(&encoded, &sep)),
          Err(e) if no_error => {
            warn!(record = idx + 1, error = %e, "could not encode DRS, skipping it");
            skipped += 1;
          }
          Err(e) => return Err(format!("DRS {}: {}", idx + 1, e).into()),
        }
      }
      write_lines(&output_file, &lines)?;
      info!(written = lines.len(), skipped, "encoded");
    }
  }
  Ok(())
}
