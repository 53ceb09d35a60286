//! Three-cell pipeline with a strand-serialized middle stage.
//!
//! Run with: `cargo run --example pipeline`

use cellflow_core::{FnCell, Graph, RespawnPolicy, Scheduler, Strand};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

fn main() -> cellflow_core::Result<()> {
    let strand = Strand::new();

    let counter = Arc::new(AtomicI64::new(0));
    let source = FnCell::new("source", move |_inputs| {
        Ok(vec![json!(counter.fetch_add(1, Ordering::SeqCst))])
    });

    // Two squaring stages sharing one strand: they never run at the same
    // time even with four workers.
    let square = |name: &str| {
        FnCell::new(name, |inputs: Vec<Value>| {
            let n = inputs[0].as_i64().unwrap_or(0);
            Ok(vec![json!(n * n)])
        })
        .with_strand(strand)
    };

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_handle = Arc::clone(&seen);
    let sink = FnCell::new("sink", move |inputs: Vec<Value>| {
        seen_handle
            .lock()
            .unwrap()
            .push(inputs[0].as_i64().unwrap_or(0));
        Ok(vec![])
    });

    let mut graph = Graph::new();
    let src = graph.add_cell(Arc::new(source));
    let sq1 = graph.add_cell(Arc::new(square("square-1")));
    let sq2 = graph.add_cell(Arc::new(square("square-2")));
    let dst = graph.add_cell(Arc::new(sink));
    graph.connect(src, sq1)?;
    graph.connect(sq1, sq2)?;
    graph.connect(sq2, dst)?;

    Scheduler::new(graph).execute(4, RespawnPolicy::Bounded { max_calls: 8 })?;

    println!("sink received: {:?}", seen.lock().unwrap());
    Ok(())
}
