//! Benchmarks for the frame buffer and the batch pipeline.
//!
//! Run with: cargo bench
//!
//! These use payload-free frames, so they measure synchronization and
//! windowing overhead only. The FFmpeg benchmark needs
//! `tests/fixtures/sample_video.mp4` and is skipped without it.

use std::{path::Path, thread, time::Duration};

use clipcut::{
    CancellationToken, Entry, FfmpegLogLevel, Frame, FrameBuffer, FrameSource, VideoDecoder,
    produce,
};
use criterion::{BenchmarkId, Criterion};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn benchmark_windowed_reads(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("windowed reads");

    for frames in [1_000i64, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(frames), &frames, |bencher, &frames| {
            bencher.iter(|| {
                let buffer = FrameBuffer::new(u64::MAX);
                buffer.set_time_base(0.04).unwrap();
                for pts in 0..frames {
                    buffer.push(Entry::Data(Frame::new(pts, (), 1)));
                }

                let mut total = 0;
                for second in 0..(frames / 25) {
                    let start = second as f64;
                    total += buffer.get_sequence(start, start + 0.5).unwrap().len();
                }
                total
            });
        });
    }

    group.finish();
}

fn benchmark_producer_consumer(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("producer consumer");
    group.measurement_time(Duration::from_secs(10));

    for capacity in [16u64, 256] {
        group.bench_with_input(
            BenchmarkId::new("capacity", capacity),
            &capacity,
            |bencher, &capacity| {
                bencher.iter(|| {
                    let buffer = FrameBuffer::new(capacity);
                    buffer.set_time_base(1.0).unwrap();

                    thread::scope(|scope| {
                        scope.spawn(|| {
                            for pts in 0..5_000 {
                                buffer.push(Entry::Data(Frame::new(pts, (), 1)));
                            }
                            buffer.push(Entry::EndOfStream);
                        });

                        for start in (0..5_000).step_by(8) {
                            let start = start as f64;
                            buffer.get_sequence(start, start + 3.0).unwrap();
                        }
                    });
                });
            },
        );
    }

    group.finish();
}

fn benchmark_decode(criterion: &mut Criterion) {
    FfmpegLogLevel::Error.apply();

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let mut group = criterion.benchmark_group("decode");
    group.sample_size(10);

    for filter in ["null", "scale=320:-2"] {
        group.bench_with_input(BenchmarkId::from_parameter(filter), &filter, |bencher, &filter| {
            bencher.iter(|| {
                let mut decoder = VideoDecoder::open(SAMPLE_VIDEO, filter).unwrap();
                let buffer = FrameBuffer::default();
                buffer.set_time_base(decoder.time_base()).unwrap();
                produce(&mut decoder, &buffer, &CancellationToken::new()).unwrap()
            });
        });
    }

    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_windowed_reads,
    benchmark_producer_consumer,
    benchmark_decode,
);
criterion::criterion_main!(benches);
