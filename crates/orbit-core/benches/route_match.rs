//! Route resolution benchmarks for orbit-core.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use orbit_core::{MemoryHistory, RoutePattern, Router};

fn bench_pattern_match(c: &mut Criterion) {
    let pattern = RoutePattern::parse("/profiles/:name/posts/:id");

    let mut group = c.benchmark_group("pattern");
    group.bench_function("literal_miss", |b| {
        b.iter(|| pattern.matches(black_box("/posts/42/comments/7")))
    });
    group.bench_function("param_hit", |b| {
        b.iter(|| pattern.matches(black_box("/profiles/J%C3%B8rgen/posts/42")))
    });
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let routes = ["/", "/posts/:id", "/profiles", "/profiles/:name", "/me", "/login", "/register"];
    let mut router = Router::new(MemoryHistory::new("/register"), |_| {});
    router.register(routes.iter().map(|p| orbit_core::Route::new(p, |_| {})));

    c.bench_function("resolve_last_of_7", |b| b.iter(|| router.resolve()));
}

criterion_group!(benches, bench_pattern_match, bench_resolve);
criterion_main!(benches);
