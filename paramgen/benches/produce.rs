// Benchmarks for generator construction and per-step production.
//
// Run with: cargo bench -p paramgen --bench produce

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use paramgen::{Context, Factory};

const GENERATORS: &[(&str, &str)] = &[
    ("random_uniform", "ru, 0, (bg, oc, (1, 2, 3))"),
    ("markov", "mv, a{1}b{2}c{3}:{a=1|b=1|c=1}a:{b=3|c=1}b:{a=1}, (ru, 0, 1)"),
    ("quantize", "q, (c, 0), (bg, oc, (0.25, 0.5)), 2, (ru, 0.5, 1), (ru, -3, 3)"),
    ("iterate_hold", "ih, (ru, 0, 1), (bg, rc, (3, 5)), (bg, oc, (4, 9)), rp"),
    ("logistic", "lm, 0.3, (ru, 3.5, 4), 0, 1"),
];

fn bench_produce(c: &mut Criterion) {
    let mut group = c.benchmark_group("produce_1000");
    let ctx = Context::new();
    for (name, text) in GENERATORS {
        group.bench_with_input(BenchmarkId::from_parameter(name), text, |b, text| {
            let mut factory = Factory::new(1);
            let mut pmtr = factory.build(text).unwrap();
            b.iter(|| {
                for t in 0..1000 {
                    black_box(pmtr.produce(t, &ctx));
                }
            });
        });
    }
    group.finish();
}

fn bench_construct(c: &mut Criterion) {
    let mut group = c.benchmark_group("construct");
    let cases = [
        ("automaton", "cv, f{s}x{91}y{135}, (c, 110), (c, 0), sr, 0, 1, oc"),
        ("sieve", "vs, 3@0|4@1&-5@2|7@3, 2000, 0, 1, oc"),
        ("primes", "lp, 1000, 2000, int, oc"),
        ("lorenz", "lb, 1, 1, 1, 28, 10, 2.66666, 5000, xyz, 0, 1, oc"),
    ];
    for (name, text) in cases {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut factory = Factory::new(1);
                black_box(factory.build(text).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_produce, bench_construct);
criterion_main!(benches);
