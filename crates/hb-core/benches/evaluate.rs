use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hb_core::{FrameContext, NoopStripper, PolicyEngine, RequestType, RuleStore, SuffixList};

fn bench_evaluate(c: &mut Criterion) {
    let store = RuleStore::new().with_preloads((0..200).map(|i| format!("cdn{}.preload.net", i)));
    for i in 0..10_000 {
        store.block_base_domain(&format!("tracker{}.com", i));
    }
    let engine = PolicyEngine::new(
        Arc::new(store),
        Arc::new(SuffixList::fallback()),
        Arc::new(NoopStripper),
    );
    let ctx = FrameContext::new(1, "https://news.example.org/article", RequestType::SCRIPT);

    c.bench_function("evaluate_blocked", |b| {
        b.iter(|| engine.evaluate(black_box("https://pixel.tracker42.com/p.gif"), &ctx))
    });
    c.bench_function("evaluate_first_party", |b| {
        b.iter(|| engine.evaluate(black_box("https://static.example.org/app.js"), &ctx))
    });
    c.bench_function("should_cookieblock_preload", |b| {
        b.iter(|| engine.should_cookieblock(black_box("https://cdn7.preload.net/lib.js"), &ctx))
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
