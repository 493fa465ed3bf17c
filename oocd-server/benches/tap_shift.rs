use std::{hint::black_box, io::Cursor};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oocd_protocol::{BIT_SEQUENCES_LIMIT, PinMode, ShiftRequest};
use oocd_server::{
    Background, Inline, Link, ShiftStream, Strategy, TapEngine, handlers::configure_pins,
    sim::SimulatedLines,
};

fn shift<S: Strategy>(engine: &mut TapEngine<SimulatedLines>, request: &ShiftRequest, payload: &[u8]) {
    let mut link = Link::new(Cursor::new(payload), Vec::with_capacity(request.sample_len()), 115_200);
    S::transfer(&mut link, request.payload_len(), &mut |stream: &mut dyn ShiftStream| {
        engine.shift(request, stream)
    })
    .expect("In-memory shift shouldn't fail");
    black_box(link.into_parts().1);
}

fn bench_strategy<S: Strategy>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("tap_shift_{}", S::NAME));
    for bits in [16u16, 1024, BIT_SEQUENCES_LIMIT] {
        let request = ShiftRequest::clamped(bits, BIT_SEQUENCES_LIMIT);
        let tdi: Vec<u8> = (0..request.byte_count()).map(|i| i as u8).collect();
        let payload = request.encode_payload(&tdi, &[]);

        let mut engine = TapEngine::with_lines(SimulatedLines::new(1));
        engine.set_half_cycle_delay(0);
        configure_pins(engine.lines_mut(), PinMode::Jtag);

        group.throughput(Throughput::Elements(u64::from(bits)));
        group.bench_with_input(BenchmarkId::from_parameter(bits), &payload, |b, payload| {
            b.iter(|| {
                engine.lines().clear_traces();
                shift::<S>(&mut engine, &request, payload)
            })
        });
    }
    group.finish();
}

fn bench_inline(c: &mut Criterion) {
    bench_strategy::<Inline>(c);
}

fn bench_background(c: &mut Criterion) {
    bench_strategy::<Background>(c);
}

criterion_group!(benches, bench_inline, bench_background);
criterion_main!(benches);
