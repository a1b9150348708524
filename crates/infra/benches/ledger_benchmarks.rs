use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tokio::runtime::Runtime;

use stockledger_infra::engine::{EngineSettings, LedgerEngine};
use stockledger_infra::store::InMemoryLedgerStore;
use stockledger_inventory::{HistoryQuery, MovementKind, NewProduct, Product};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("tokio runtime")
}

fn engine_with_product(rt: &Runtime) -> (LedgerEngine<InMemoryLedgerStore>, Product) {
    let engine = LedgerEngine::new(InMemoryLedgerStore::new(), EngineSettings::default());
    let product = rt
        .block_on(engine.create_product(
            NewProduct::parse("SKU-BENCH", "1234567890123", "Bench", 0).unwrap(),
        ))
        .unwrap();
    (engine, product)
}

fn engine_with_ledger(
    rt: &Runtime,
    movements: usize,
) -> (LedgerEngine<InMemoryLedgerStore>, Product) {
    let (engine, product) = engine_with_product(rt);
    rt.block_on(async {
        for i in 0..movements {
            let delta = if i % 3 == 0 { -1 } else { 2 };
            engine
                .apply_delta(product.id_typed(), delta, None, MovementKind::for_delta(delta))
                .await
                .unwrap();
        }
    });
    (engine, product)
}

/// Latency of one transactional ledger write.
fn bench_apply_delta(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("apply_delta");
    group.throughput(Throughput::Elements(1));

    group.bench_function("in_memory", |b| {
        let (engine, product) = engine_with_product(&rt);
        b.iter(|| {
            rt.block_on(engine.apply_delta(
                black_box(product.id_typed()),
                black_box(1),
                None,
                MovementKind::In,
            ))
            .unwrap()
        });
    });

    group.bench_function("set_absolute_in_memory", |b| {
        let (engine, product) = engine_with_product(&rt);
        let mut target = 0i64;
        b.iter(|| {
            target = (target + 7) % 100;
            rt.block_on(engine.set_absolute(product.id_typed(), black_box(target), None))
                .unwrap()
        });
    });

    group.finish();
}

/// History listing and audit cost as the ledger grows.
fn bench_reads_by_ledger_size(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("ledger_reads");

    for size in [100usize, 1_000, 5_000] {
        let (engine, product) = engine_with_ledger(&rt, size);

        group.bench_with_input(BenchmarkId::new("list_history_100", size), &size, |b, _| {
            b.iter(|| {
                rt.block_on(engine.list_history(HistoryQuery::for_product(product.id_typed())))
                    .unwrap()
            });
        });

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("verify_ledger", size), &size, |b, _| {
            b.iter(|| rt.block_on(engine.verify_ledger(product.id_typed())).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_apply_delta, bench_reads_by_ledger_size);
criterion_main!(benches);
