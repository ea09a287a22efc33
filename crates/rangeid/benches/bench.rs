use core::{hint::black_box, num::NonZeroU32};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use rangeid::{FileStore, GeneratorConfig, IdGenerator, MemoryStore, OptimisticStore};
use std::{thread::scope, time::Instant};

// Number of IDs generated per benchmark iteration (per-thread for
// multi-threaded).
const TOTAL_IDS: usize = 4096;

fn config(range_size: u32) -> GeneratorConfig {
    GeneratorConfig::default().with_range_size(NonZeroU32::new(range_size).unwrap())
}

/// Benchmarks a single thread pulling IDs from one scope.
fn bench_generator<S>(
    c: &mut Criterion,
    group_name: &str,
    generator_factory: impl Fn() -> IdGenerator<S>,
) where
    S: OptimisticStore,
{
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let mut elapsed = core::time::Duration::ZERO;
            for _ in 0..iters {
                let generator = generator_factory();
                let start = Instant::now();
                for _ in 0..TOTAL_IDS {
                    black_box(generator.next_id("bench").ok());
                }
                elapsed += start.elapsed();
            }
            elapsed
        });
    });

    group.finish();
}

/// Benchmarks several threads sharing one generator, either on the same scope
/// or each on its own.
fn bench_generator_threaded<S>(
    c: &mut Criterion,
    group_name: &str,
    generator_factory: impl Fn() -> IdGenerator<S>,
    shared_scope: bool,
) where
    S: OptimisticStore + Sync,
{
    let threads = num_cpus::get();
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements((TOTAL_IDS * threads) as u64));

    group.bench_function(format!("threads/{threads}/elems/{TOTAL_IDS}"), |b| {
        b.iter_custom(|iters| {
            let mut elapsed = core::time::Duration::ZERO;
            for _ in 0..iters {
                let generator = generator_factory();
                let start = Instant::now();
                scope(|s| {
                    for t in 0..threads {
                        let generator = &generator;
                        s.spawn(move || {
                            let name = if shared_scope {
                                String::from("bench")
                            } else {
                                format!("bench-{t}")
                            };
                            for _ in 0..TOTAL_IDS {
                                black_box(generator.next_id(&name).ok());
                            }
                        });
                    }
                });
                elapsed += start.elapsed();
            }
            elapsed
        });
    });

    group.finish();
}

fn benchmarks(c: &mut Criterion) {
    for range in [100, 4096] {
        bench_generator(c, &format!("memory/range/{range}"), || {
            IdGenerator::with_config(MemoryStore::new(), config(range))
        });
        bench_generator_threaded(
            c,
            &format!("memory/shared_scope/range/{range}"),
            || IdGenerator::with_config(MemoryStore::new(), config(range)),
            true,
        );
        bench_generator_threaded(
            c,
            &format!("memory/scope_per_thread/range/{range}"),
            || IdGenerator::with_config(MemoryStore::new(), config(range)),
            false,
        );
    }

    let dir = tempfile::tempdir().unwrap();
    for range in [100, 4096] {
        bench_generator(c, &format!("file/range/{range}"), || {
            let store = FileStore::open(dir.path()).unwrap();
            IdGenerator::with_config(store, config(range))
        });
    }
}

criterion_group!(benches, benchmarks);
criterion_main!(benches);
