use criterion::{black_box, criterion_group, criterion_main, Criterion};

use jack::compiler::{compile, tokens_xml};

fn criterion_benchmark(c: &mut Criterion) {
    let source = include_str!("../tests/Counter.jack");

    c.bench_function("compile counter", |b| {
        b.iter(|| black_box(compile(black_box(source))))
    });

    c.bench_function("tokenize counter", |b| {
        b.iter(|| black_box(tokens_xml(black_box(source))))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
