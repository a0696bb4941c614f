//! Bouncer throughput benchmarks

use bounce_core::{Bounce, Bouncer, ManualTimer};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn counting_bouncer(timer: &Arc<ManualTimer>, hook: bool) -> (Bouncer<u64>, Arc<AtomicUsize>) {
    let bounces = Arc::new(AtomicUsize::new(0));
    let counter = bounces.clone();
    let mut builder = Bouncer::builder(Duration::from_millis(50), move |bounce: Bounce<u64>| {
        counter.fetch_add(bounce.call_count().min(1), Ordering::Relaxed);
    })
    .max_delay(Duration::from_millis(500))
    .timer(timer.clone());
    if hook {
        builder = builder.control(|ctx, split| {
            if ctx.call_count() >= 64 {
                split.request(true);
            }
        });
    }
    (builder.build().expect("valid bench config"), bounces)
}

fn bench_fire(c: &mut Criterion) {
    c.bench_function("fire_burst_1k", |b| {
        b.iter_batched(
            || {
                let timer = Arc::new(ManualTimer::new());
                let (bouncer, bounces) = counting_bouncer(&timer, false);
                (timer, bouncer, bounces)
            },
            |(timer, bouncer, bounces)| {
                for i in 0..1000u64 {
                    bouncer.fire_one(black_box(i));
                    timer.advance(Duration::from_millis(1));
                }
                timer.advance(Duration::from_millis(100));
                black_box(bounces.load(Ordering::Relaxed))
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("fire_burst_1k_with_split_hook", |b| {
        b.iter_batched(
            || {
                let timer = Arc::new(ManualTimer::new());
                let (bouncer, bounces) = counting_bouncer(&timer, true);
                (timer, bouncer, bounces)
            },
            |(timer, bouncer, bounces)| {
                for i in 0..1000u64 {
                    bouncer.fire_one(black_box(i));
                }
                timer.advance(Duration::from_millis(100));
                black_box(bounces.load(Ordering::Relaxed))
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_sparse_events(c: &mut Criterion) {
    c.bench_function("fire_sparse_100", |b| {
        b.iter_batched(
            || {
                let timer = Arc::new(ManualTimer::new());
                let (bouncer, bounces) = counting_bouncer(&timer, false);
                (timer, bouncer, bounces)
            },
            |(timer, bouncer, bounces)| {
                // Every event lands after the window closed: one bounce each
                for i in 0..100u64 {
                    bouncer.fire_one(black_box(i));
                    timer.advance(Duration::from_millis(60));
                }
                black_box(bounces.load(Ordering::Relaxed))
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_fire, bench_sparse_events);
criterion_main!(benches);
