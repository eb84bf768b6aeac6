use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use zsub::{matches, Pattern, Subject};

fn random_subject(
    rng: &mut SmallRng,
    depth: usize,
) -> String {
    (0..depth)
        .map(|_| format!("t{}", rng.gen_range(0..16)))
        .collect::<Vec<_>>()
        .join(".")
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("subject_parse", |b| {
        b.iter(|| Subject::parse(black_box("orders.eu.west.created")).unwrap())
    });
    c.bench_function("pattern_parse", |b| {
        b.iter(|| Pattern::parse(black_box("orders.*.west.>")).unwrap())
    });
}

fn bench_match(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(42);
    let subjects: Vec<Subject> = (0..256)
        .map(|_| Subject::parse(&random_subject(&mut rng, 5)).unwrap())
        .collect();
    let patterns = [
        Pattern::parse("t1.t2.t3.t4.t5").unwrap(),
        Pattern::parse("t1.*.t3.*.t5").unwrap(),
        Pattern::parse("t1.>").unwrap(),
        Pattern::parse("*.*.*.*.*").unwrap(),
    ];

    c.bench_function("match_256_subjects_4_patterns", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for s in &subjects {
                for p in &patterns {
                    if matches(s, p) {
                        hits += 1;
                    }
                }
            }
            black_box(hits)
        })
    });
}

criterion_group!(benches, bench_parse, bench_match);
criterion_main!(benches);
