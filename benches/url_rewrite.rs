//! URL rewriting benchmark suite.
//!
//! Measures the per-link cost paid by every generated application URL:
//! - Rewriting to the proxy origin, with and without an existing query
//! - Restoring the original URL from a token
//! - Links for foreign hosts, which must pass through untouched
//!
//! Run with: cargo bench --bench url_rewrite
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use proxied_webdriver::rewrite::{rewrite, unrewrite};
use url::Url;

// ============================================================================
// Inputs
// ============================================================================

const APP_HOST: &str = "app.test";

const LINKS: &[(&str, &str)] = &[
    ("bare", "http://app.test/"),
    ("path", "https://app.test:8443/posts/42/comments"),
    ("query", "https://app.test/search?q=rust+proxy&page=3&sort=desc"),
    ("foreign", "https://cdn.example.com/js/app.js?v=12"),
];

fn proxy() -> Url {
    Url::parse("http://127.0.0.1:41234/").expect("proxy url")
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_rewrite(c: &mut Criterion) {
    let proxy = proxy();
    let mut group = c.benchmark_group("rewrite");

    for &(name, link) in LINKS {
        group.bench_with_input(BenchmarkId::from_parameter(name), link, |b, link| {
            b.iter(|| rewrite(black_box(link), APP_HOST, &proxy));
        });
    }

    group.finish();
}

fn bench_unrewrite(c: &mut Criterion) {
    let proxy = proxy();
    let mut group = c.benchmark_group("unrewrite");

    for &(name, link) in LINKS {
        let proxied = rewrite(link, APP_HOST, &proxy);
        group.bench_with_input(BenchmarkId::from_parameter(name), &proxied, |b, proxied| {
            b.iter(|| unrewrite(black_box(proxied)).expect("unrewrite"));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rewrite, bench_unrewrite);
criterion_main!(benches);
