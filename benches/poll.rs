use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion};
use secpoll::{
    backend::PlainBackend,
    channel::SimpleChannel,
    config::SessionConfig,
    poll::{Algorithm, run_poll},
    repr::Role,
    session::Session,
    table::generate_tables,
};
use tokio::runtime::Runtime;

pub fn poll_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = SessionConfig::default();
    let (rows, columns) = (50, 20);

    let mut g = c.benchmark_group("poll");
    g.throughput(criterion::Throughput::Elements((rows * columns) as u64));
    for algorithm in Algorithm::ALL {
        let tables = generate_tables(rows, columns, algorithm.encoding(), config.max_weight, 7)
            .expect("valid dimensions");
        let id = BenchmarkId::new(algorithm.to_string(), format!("{rows}x{columns}"));
        g.bench_function(id, |b| {
            b.to_async(&rt).iter_custom(|iters| {
                let tables = tables.clone();
                let config = config.clone();
                async move {
                    let mut elapsed = Duration::default();
                    for _ in 0..iters {
                        let (ch1, ch2) = SimpleChannel::pair();
                        let mut server = Session::new(PlainBackend::new(Role::Server, &config, ch1));
                        let mut client = Session::new(PlainBackend::new(Role::Client, &config, ch2));
                        let now = Instant::now();
                        let result = tokio::try_join!(
                            run_poll(&mut server, &tables.server, algorithm, &config),
                            run_poll(&mut client, &tables.client, algorithm, &config),
                        );
                        elapsed += now.elapsed();
                        if let Err(err) = result {
                            panic!("{algorithm} failed with {err:?}");
                        }
                    }
                    elapsed
                }
            })
        });
    }
    g.finish();
}
