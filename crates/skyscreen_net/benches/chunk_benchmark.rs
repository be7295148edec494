//! Benchmark for the chunk codec.
//!
//! TARGET: cut and reassemble a full display frame well inside one frame period
//!
//! Run with: cargo bench --package skyscreen_net --bench chunk_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::Rng;
use skyscreen_core::Geometry;
use skyscreen_net::{ChunkLayout, ChunkSerializer, FrameReassembler};

fn random_frame(geometry: Geometry) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..geometry.frame_byte_size()).map(|_| rng.gen()).collect()
}

fn benchmark_serialize_frame(c: &mut Criterion) {
    let geometry = Geometry::SKYSCREEN;
    let layout = ChunkLayout::new(geometry.frame_byte_size(), 1200).unwrap();
    let mut serializer = ChunkSerializer::new(layout);
    let frame = random_frame(geometry);

    let mut group = c.benchmark_group("chunk_codec");
    group.throughput(Throughput::Bytes(geometry.frame_byte_size() as u64));
    group.bench_function("serialize_full_frame", |b| {
        let mut frame_id = 0u32;
        b.iter(|| {
            frame_id = frame_id.wrapping_add(1);
            for index in 0..layout.chunk_count() {
                black_box(serializer.serialize(&frame, frame_id, index));
            }
        });
    });
    group.finish();
}

fn benchmark_reassemble_frame(c: &mut Criterion) {
    let geometry = Geometry::SKYSCREEN;
    let layout = ChunkLayout::new(geometry.frame_byte_size(), 1200).unwrap();
    let mut serializer = ChunkSerializer::new(layout);
    let mut reassembler = FrameReassembler::new(geometry, layout).unwrap();
    let frame = random_frame(geometry);

    let mut group = c.benchmark_group("chunk_codec");
    group.throughput(Throughput::Bytes(geometry.frame_byte_size() as u64));
    group.bench_function("reassemble_full_frame", |b| {
        let mut frame_id = 0u32;
        b.iter(|| {
            frame_id = frame_id.wrapping_add(1);
            for index in 0..layout.chunk_count() {
                let _ = reassembler.push(serializer.serialize(&frame, frame_id, index));
            }
            black_box(reassembler.latest_frame_id())
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_serialize_frame, benchmark_reassemble_frame);
criterion_main!(benches);
