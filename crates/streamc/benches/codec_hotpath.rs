use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use streamc::{Decoder, Encoder, GaloisField, Parameters};

const SYMBOL_SIZE: usize = 1200;

fn params(buffer_size: usize) -> Parameters {
    Parameters::default()
        .with_symbol_size(SYMBOL_SIZE)
        .with_buffer_size(buffer_size)
        .with_repair_ratio(4.0)
}

/// Region multiply-add, the inner loop of both encoder and decoder.
fn bench_field_region(c: &mut Criterion) {
    let mut group = c.benchmark_group("field");
    group.throughput(Throughput::Bytes(SYMBOL_SIZE as u64));
    let src = vec![0x5Au8; SYMBOL_SIZE];

    for m in [4u8, 8] {
        let gf = GaloisField::get(m).unwrap();
        group.bench_with_input(BenchmarkId::new("mul_add_region", m), &m, |b, _| {
            let mut dst = vec![0u8; SYMBOL_SIZE];
            b.iter(|| gf.mul_add_region(black_box(&mut dst), black_box(&src), 7));
        });
    }
    group.finish();
}

/// Repair generation cost grows with the window width.
fn bench_repair_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoder");
    group.throughput(Throughput::Elements(1));

    for width in [8usize, 32, 128] {
        let mut enc = Encoder::new(params(width)).unwrap();
        let payload = vec![0xABu8; SYMBOL_SIZE];
        for _ in 0..width {
            enc.push(&payload).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("repair", width), &width, |b, _| {
            b.iter(|| black_box(enc.output_repair_packet()));
        });
    }
    group.finish();
}

/// Lossless stream through serialize, deserialize and decode, acking as it goes.
fn bench_stream_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("roundtrip");
    group.throughput(Throughput::Elements(1));
    let payload = vec![0xCDu8; SYMBOL_SIZE];

    group.bench_function("push_send_decode", |b| {
        let mut enc = Encoder::new(params(64)).unwrap();
        let mut dec = Decoder::new(params(64)).unwrap();
        b.iter(|| {
            if enc.buffer().is_full() {
                if let Some(ack) = dec.inorder() {
                    enc.flush_acked(ack);
                }
            }
            enc.push(black_box(&payload)).unwrap();
            while enc.unsent() > 0 {
                let Some(packet) = enc.next_packet() else { break };
                let wire = enc.serialize(&packet).unwrap();
                let parsed = dec.deserialize(&wire).unwrap();
                black_box(dec.ingest(parsed).unwrap());
            }
            dec.drain_delivered().for_each(drop);
        });
    });

    group.bench_function("recover_one_loss_in_32", |b| {
        b.iter(|| {
            let mut enc = Encoder::new(params(32)).unwrap();
            let mut dec = Decoder::new(params(32)).unwrap();
            for _ in 0..32 {
                enc.push(&payload).unwrap();
            }
            for _ in 0..32 {
                let packet = enc.output_source_packet().unwrap();
                if packet.low_id() != 0 {
                    dec.ingest(packet).unwrap();
                }
            }
            let repair = enc.output_repair_packet().unwrap();
            black_box(dec.ingest(repair).unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_field_region,
    bench_repair_generation,
    bench_stream_roundtrip
);
criterion_main!(benches);
