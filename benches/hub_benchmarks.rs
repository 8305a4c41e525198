use std::hint::black_box;

use chanhub::{Hub, HubConfig, Mailbox, Subscriber};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("tokio runtime")
}

fn start(rt: &Runtime) -> Hub<u64> {
    rt.block_on(async { Hub::start(HubConfig::default()) })
        .expect("hub must start")
}

fn subscribe_many(
    rt: &Runtime,
    hub: &Hub<u64>,
    channel: &str,
    n: usize,
) -> Vec<(Subscriber<u64>, Mailbox<u64>)> {
    (0..n)
        .map(|_| {
            let (sub, mb) = hub.mailbox();
            rt.block_on(hub.subscribe(&sub, Some(channel)))
                .expect("subscribe");
            (sub, mb)
        })
        .collect()
}

fn bench_subscribe_ack(c: &mut Criterion) {
    let rt = runtime();
    let hub = start(&rt);
    let (sub, _mb) = hub.mailbox();

    // Узлы уже созданы: измеряется только путь подписки и подтверждение.
    rt.block_on(hub.subscribe(&sub, Some("a/b/c"))).unwrap();

    c.bench_function("subscribe_ack_depth_3", |b| {
        b.iter(|| black_box(rt.block_on(hub.subscribe(&sub, Some("a/b/c"))).unwrap()))
    });
}

/// Публикация в канал с `n` подписчиками до получения всеми.
fn bench_publish_fan_out(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("publish_fan_out");

    for n in [1usize, 10, 100] {
        let hub = start(&rt);
        let mut subs = subscribe_many(&rt, &hub, "chan", n);

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    hub.publish(black_box(1), Some("chan")).unwrap();
                    for (_, mb) in subs.iter_mut() {
                        black_box(mb.recv().await.unwrap());
                    }
                })
            })
        });
    }
    group.finish();
}

/// Доставка через цепочку узлов глубины `depth`.
fn bench_publish_depth(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("publish_depth");

    for depth in [1usize, 4, 8] {
        let hub = start(&rt);
        let channel = vec!["seg"; depth].join("/");
        let mut subs = subscribe_many(&rt, &hub, &channel, 1);

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    hub.publish(black_box(1), Some(&channel)).unwrap();
                    black_box(subs[0].1.recv().await.unwrap());
                })
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_subscribe_ack,
    bench_publish_fan_out,
    bench_publish_depth
);
criterion_main!(benches);
