use criterion::{Criterion, black_box, criterion_group, criterion_main};

use drsfix::encode::{encode_relative, to_line};
use drsfix::{Clause, Config, Pipeline};

const DRS: &[&str] = &[
  "b1 REF x1",
  "b1 Name x1 \"tom\"",
  "b1 male \"n.02\" x1",
  "b2 REF e1",
  "b2 REF t1",
  "b2 Agent e1 x1",
  "b2 TPR t1 \"now\"",
  "b2 Time e1 t1",
  "b2 time \"n.08\" t1",
  "b2 smile \"v.01\" e1",
  "b0 NOT b2",
  "b2 REF x2",
  "b2 Theme e1 x2",
  "b2 PRP x2 b3",
  "b3 REF s1",
  "b3 happy \"a.01\" s1",
  "b3 Experiencer s1 x1",
];

fn relative_line() -> String {
  let clauses = DRS.iter().map(|c| c.parse::<Clause>().unwrap()).collect::<Vec<_>>();
  to_line(&encode_relative(&clauses).unwrap(), "|||")
}

fn char_level(line: &str) -> String {
  line
    .split(' ')
    .map(|piece| {
      if piece.starts_with('$') || piece.starts_with('@') || piece == "|||" || piece == "***" {
        piece.to_string()
      } else {
        piece.chars().map(String::from).collect::<Vec<_>>().join(" ")
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}

fn criterion_benchmark(c: &mut Criterion) {
  let pipeline = Pipeline::new(Config::default()).unwrap();
  let word_lines = vec![relative_line(); 100];
  let char_lines = vec![char_level(&relative_line()); 100];

  c.bench_function("restore 100 word-level DRSs", |b| {
    b.iter(|| pipeline.process(black_box(&word_lines)))
  });

  c.bench_function("restore 100 character-level DRSs", |b| {
    b.iter(|| pipeline.process(black_box(&char_lines)))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
