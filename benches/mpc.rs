use std::time::{Duration, Instant};

use bgw::{
    config::Config,
    fixtures::{self, Fixture},
    protocol::simulate,
};
use criterion::{BenchmarkId, Criterion};
use tokio::runtime::Runtime;

pub fn mpc_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut g = c.benchmark_group("mpc");
    for levels in [3, 4, 5] {
        let fixture = fixtures::factorial_tree(levels, 2, 1_000_000_007).unwrap();
        let parties = fixture.circuit.parties();
        // every party multiplies, so the number of MUL gates is parties - 1
        g.throughput(criterion::Throughput::Elements(parties as u64 - 1));
        bench_fixture(&mut g, &rt, BenchmarkId::new("factorial tree", parties), fixture);
    }
    for n in [10, 50] {
        let fixture = fixtures::sum_to(n, 2, 1_000_000_007).unwrap();
        g.throughput(criterion::Throughput::Elements(n as u64 - 1));
        bench_fixture(&mut g, &rt, BenchmarkId::new("sum chain", n), fixture);
    }
}

fn bench_fixture(
    g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    rt: &Runtime,
    bench_id: BenchmarkId,
    fixture: Fixture,
) {
    let config = Config {
        seed: Some(42),
        max_time: Duration::from_secs(60),
    };
    g.bench_function(bench_id, |b| {
        b.to_async(rt).iter_custom(|iters| {
            let fixture = fixture.clone();
            let config = config.clone();
            async move {
                let mut elapsed = Duration::default();
                for _ in 0..iters {
                    let now = Instant::now();
                    let outcomes = simulate(&fixture.circuit, &fixture.private_values, &config)
                        .await
                        .expect("simulation failed");
                    elapsed += now.elapsed();
                    assert!(outcomes.iter().all(|o| o.is_success()));
                }
                elapsed
            }
        })
    });
}
