//! Throughput of a bounded three-cell chain at varying worker counts.

use cellflow_core::{FnCell, Graph, RespawnPolicy, Scheduler};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

fn build_chain() -> Graph {
    let counter = Arc::new(AtomicI64::new(0));
    let mut graph = Graph::new();
    let src = graph.add_cell(Arc::new(FnCell::new("src", move |_inputs| {
        Ok(vec![json!(counter.fetch_add(1, Ordering::Relaxed))])
    })));
    let mid = graph.add_cell(Arc::new(FnCell::new("mid", |inputs: Vec<Value>| {
        let n = inputs[0].as_i64().unwrap_or(0);
        Ok(vec![json!(n * 2)])
    })));
    let dst = graph.add_cell(Arc::new(FnCell::new("dst", |_inputs| Ok(vec![]))));
    graph.connect(src, mid).expect("wiring src -> mid");
    graph.connect(mid, dst).expect("wiring mid -> dst");
    graph
}

fn chain_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_chain_64");
    for threads in [1usize, 2, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let scheduler = Scheduler::new(build_chain());
                    scheduler
                        .execute(threads, RespawnPolicy::Bounded { max_calls: 64 })
                        .expect("bounded run");
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, chain_throughput);
criterion_main!(benches);
