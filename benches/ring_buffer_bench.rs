use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Instant;
use wood_inspect_core::frame::Frame;
use wood_inspect_core::ring_buffer::RingBuffer;

fn bench_push(c: &mut Criterion) {
    let rb = RingBuffer::new(300);
    c.bench_function("ring_buffer push at capacity", |b| {
        b.iter(|| {
            let frame = Frame::new(vec![0u8; 640 * 480 * 3], 640, 480, Instant::now());
            rb.push(black_box(frame));
        })
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let rb = RingBuffer::new(300);
    for _ in 0..300 {
        rb.push(Frame::new(vec![0u8; 64], 8, 8, Instant::now()));
    }
    c.bench_function("ring_buffer snapshot at capacity", |b| {
        b.iter(|| black_box(rb.snapshot()))
    });
}

criterion_group!(benches, bench_push, bench_snapshot);
criterion_main!(benches);
