//! Store Access Benchmarks
//!
//! Cached accessor lookups, getter reads (cached and after invalidation),
//! and a full build/dispose cycle.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use trellis_core::{create_registry, define_store, App, OptionsStore, StoreDefinition};

fn counter() -> StoreDefinition {
    define_store(
        "counter",
        OptionsStore::new()
            .state(|| json!({ "count": 0 }))
            .getter("double", |s| json!(s.get_as::<i64>("count").unwrap_or(0) * 2))
            .action("inc", |s, _| {
                s.update("count", |v| *v = json!(v.as_i64().unwrap_or(0) + 1))?;
                Ok(Value::Null)
            }),
    )
    .expect("valid definition")
}

fn bench_accessor(c: &mut Criterion) {
    let app = App::new();
    app.with(&create_registry());
    let definition = counter();
    definition.use_store(&app).expect("first build");

    c.bench_function("use_store_cached", |b| {
        b.iter(|| black_box(definition.use_store(&app).expect("cached store")))
    });
}

fn bench_getters(c: &mut Criterion) {
    let registry = create_registry();
    let store = counter().use_in(&registry).expect("build");

    c.bench_function("getter_cached", |b| b.iter(|| black_box(store.get("double"))));

    c.bench_function("getter_after_write", |b| {
        b.iter(|| {
            store.call("inc", &[]).expect("inc");
            black_box(store.get("double"))
        })
    });
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_dispose");
    for fields in [1usize, 16, 128] {
        let state: serde_json::Map<String, Value> =
            (0..fields).map(|i| (format!("f{i}"), json!(i))).collect();
        let definition = define_store(
            "wide",
            OptionsStore::new().state(move || Value::Object(state.clone())),
        )
        .expect("valid definition");
        let registry = create_registry();

        group.bench_with_input(BenchmarkId::from_parameter(fields), &fields, |b, _| {
            b.iter(|| {
                let store = definition.use_in(&registry).expect("build");
                store.dispose();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_accessor, bench_getters, bench_lifecycle);
criterion_main!(benches);
