use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_mjpeg_http::pipeline::{FramePipeline, RingBuffer};

fn create_test_jpeg(size: usize) -> Vec<u8> {
    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0]; // SOI + APP0
    jpeg.extend((0..size).map(|i| (i % 256) as u8));
    jpeg.extend(&[0xFF, 0xD9]); // EOI
    jpeg
}

fn benchmark_ring_cycle(c: &mut Criterion) {
    let mut ring = RingBuffer::new(3);
    for slot in 0..3usize {
        ring.push(slot);
    }

    c.bench_function("ring_pop_push_peek", |b| {
        b.iter(|| {
            if let Some(slot) = ring.pop() {
                ring.push(black_box(slot));
            }
            black_box(ring.peek_front().copied())
        });
    });

    let mut overflowing = RingBuffer::new(8);
    c.bench_function("ring_push_overwrite", |b| {
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            black_box(overflowing.push(n))
        });
    });
}

fn benchmark_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_publish");

    // Typical compressed frame sizes, 160x120 up to 1280x720
    for size in [5_000, 20_000, 50_000, 100_000].iter() {
        let jpeg = create_test_jpeg(*size);
        let pipeline = FramePipeline::new(3, *size + 16);

        group.bench_with_input(BenchmarkId::new("jpeg_size", size), &jpeg, |b, jpeg| {
            b.iter(|| pipeline.publish(black_box(jpeg)));
        });
    }

    group.finish();
}

fn benchmark_current_frame(c: &mut Criterion) {
    let pipeline = FramePipeline::new(3, 64 * 1024);
    let jpeg = create_test_jpeg(50_000);
    for _ in 0..3 {
        pipeline.publish(&jpeg);
    }

    c.bench_function("pipeline_copy_front_50k", |b| {
        b.iter(|| black_box(pipeline.current_frame()));
    });
}

criterion_group!(
    benches,
    benchmark_ring_cycle,
    benchmark_publish,
    benchmark_current_frame
);
criterion_main!(benches);
