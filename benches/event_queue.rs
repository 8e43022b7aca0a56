use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use autoreply::domain::models::{Event, EventType, IncomingMessage};
use autoreply::services::EventQueue;

fn message_event(i: usize) -> Event {
    Event::message(&IncomingMessage {
        channel_id: format!("C{}", i % 64),
        ts: format!("1700000000.{i:06}"),
        thread_ts: Some(format!("1600000000.{:06}", i % 16)),
        user_id: "U1".to_string(),
        user_name: None,
        text: "benchmark".to_string(),
    })
    .expect("serializable message")
}

fn enqueue_dequeue(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("event_queue");

    for size in [100usize, 1_000, 10_000] {
        let events: Vec<Event> = (0..size).map(message_event).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("enqueue_drain", size), &events, |b, events| {
            b.to_async(&rt).iter(|| async {
                let queue = EventQueue::new();
                for event in events.iter().cloned() {
                    queue.enqueue(event).await;
                }
                while let Some(mut entry) = queue.try_dequeue().await {
                    queue.mark_processing(&mut entry).await;
                    queue.mark_done(&mut entry).await;
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, enqueue_dequeue);
criterion_main!(benches);
