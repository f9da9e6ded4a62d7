//! Benchmarks for question classification.
//!
//! Classification runs on every incoming question before any I/O, so it
//! must stay well under a millisecond even for long, keyword-dense input.

use std::time::Duration;

use clinker_agent::{infer_time_range, IntentClassifier, RuleTable};
use criterion::{criterion_group, criterion_main, Criterion};

const QUESTIONS: &[&str] = &[
    "What are the main sources of CO2 emissions?",
    "How many facilities do I have?",
    "What is the current state of my facility?",
    "How do we compare against peers on emission intensity?",
    "Which alternative fuels should we consider to raise our thermal substitution rate?",
    "Show me our monthly cement production and capacity utilization",
    "Are we on track for our 2030 reduction target?",
    "Explain the clinker manufacturing process",
    "hello there",
];

/// A long question touching most categories.
fn dense_question() -> String {
    "Give me a comprehensive view of my facility: current status, scope 1 emissions, \
     carbon footprint over time, clinker output and capacity utilization, our net zero \
     2050 targets and baseline, how we compare to the industry average, biomass and RDF \
     fuel mix, kiln and mill energy consumption, and list of facilities in our organization."
        .repeat(4)
}

fn bench_classify(c: &mut Criterion) {
    let classifier = IntentClassifier::default();
    let dense = dense_question();

    let mut group = c.benchmark_group("classifier");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("typical_questions", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let q = QUESTIONS[idx % QUESTIONS.len()];
            idx += 1;
            classifier.classify(q, idx % 2 == 0)
        });
    });

    group.bench_function("dense_question", |b| {
        b.iter(|| classifier.classify(&dense, true));
    });

    group.bench_function("time_range_only", |b| {
        b.iter(|| infer_time_range("emission trends over the last year"));
    });

    group.finish();
}

fn bench_rule_compilation(c: &mut Criterion) {
    c.bench_function("rule_table_standard", |b| b.iter(RuleTable::standard));
}

criterion_group!(benches, bench_classify, bench_rule_compilation);
criterion_main!(benches);
