use criterion::{criterion_group, criterion_main, Criterion};
use engine::boolean::{intersect, intersect_linear};
use engine::postings::{attach_skips, Posting};
use engine::tokenizer::tokenize;

fn bench_tokenize(c: &mut Criterion) {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(200);
    c.bench_function("tokenize_9k_chars", |b| b.iter(|| tokenize(&text)));
}

fn bench_intersect(c: &mut Criterion) {
    let mut a: Vec<Posting> = (0..20_000u32).map(|i| Posting::bare(i * 2)).collect();
    let mut b: Vec<Posting> = (0..20_000u32).map(|i| Posting::bare(i * 7)).collect();
    attach_skips(&mut a);
    attach_skips(&mut b);

    c.bench_function("intersect_skip", |x| x.iter(|| intersect(&a, &b)));
    c.bench_function("intersect_linear", |x| x.iter(|| intersect_linear(&a, &b)));
}

criterion_group!(benches, bench_tokenize, bench_intersect);
criterion_main!(benches);
