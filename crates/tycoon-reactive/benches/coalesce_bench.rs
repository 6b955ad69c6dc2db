//! Benchmarks for burst coalescing and topic fan-out.
//!
//! Run with: cargo bench -p tycoon-reactive --bench coalesce_bench

use std::hint::black_box;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tycoon_reactive::{Observer, ObserverError, Reactive, Revision, Scheduler, Topic};

struct Sink;

impl Observer<Revision> for Sink {
    fn update(&self, payload: &Revision) -> Result<(), ObserverError> {
        black_box(payload);
        Ok(())
    }
}

fn bench_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive/burst");
    for burst in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(burst), &burst, |b, &burst| {
            let sched = Scheduler::new();
            let container = Reactive::new(&sched, 0u64);
            b.iter(|| {
                for _ in 0..burst {
                    container.request_update(|v| *v += 1);
                }
                sched.run_microtasks().unwrap();
            });
        });
    }
    group.finish();
}

fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive/fanout");
    for observers in [1usize, 32, 512] {
        group.bench_with_input(
            BenchmarkId::from_parameter(observers),
            &observers,
            |b, &observers| {
                let topic = Topic::new("bench", Revision::INITIAL);
                let sinks: Vec<Rc<Sink>> = (0..observers).map(|_| Rc::new(Sink)).collect();
                for sink in &sinks {
                    topic.subscribe(sink);
                }
                b.iter(|| black_box(topic.notify_all()));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_burst, bench_fanout);
criterion_main!(benches);
