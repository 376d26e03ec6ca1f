use corpus_crawler::dedup::{fingerprint, DedupIndex, TokenCounts};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn page_tokens(page: usize, words: usize) -> TokenCounts {
    (0..words)
        .map(|w| (format!("word{}_{}", page % 7, w), (w % 5 + 1) as u64))
        .chain(std::iter::once((format!("page{}", page), 1)))
        .collect()
}

// SimHash cost grows with the number of distinct tokens on a page
fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for words in [50, 500, 5000] {
        let tokens = page_tokens(0, words);
        group.bench_with_input(BenchmarkId::new("bits_64", words), &tokens, |b, tokens| {
            b.iter(|| black_box(fingerprint(tokens, 64)));
        });
    }

    group.finish();
}

// Near-duplicate lookup is a linear scan over every stored fingerprint
fn bench_index_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_check");

    for pages in [100, 1000, 10000] {
        let mut index = DedupIndex::new(3, 64);
        for page in 0..pages {
            index.check(&page_tokens(page, 20));
        }
        let probe = page_tokens(pages + 1, 20);

        group.bench_with_input(BenchmarkId::new("linear_scan", pages), &pages, |b, _| {
            b.iter_batched(
                || index.clone(),
                |mut index| black_box(index.check(&probe)),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fingerprint, bench_index_check);
criterion_main!(benches);
