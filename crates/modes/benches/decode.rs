use criterion::{criterion_group, criterion_main, Criterion};
use deku::DekuContainerRead;
use modes::decode::Message;

/// A handful of real frames spanning the DF/TC variety exercised in the
/// decoder tests: identification, airborne position (even/odd) and velocity.
const FRAMES: &[&str] = &[
    "8D4840D6202CC371C32CE0576098",
    "8D40621D58C382D690C8AC2863A7",
    "8D40621D58C386435CC412692AD6",
    "8D485020994409940838175B284F",
    "5D4CA1D15C0E11",
    "A0001838201584F23468207CDFA5",
];

fn decode_frames() {
    for frame in FRAMES {
        let bytes = hex::decode(frame).unwrap();
        let _ = Message::from_bytes((&bytes, 0));
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("decode_frames", |b| b.iter(decode_frames));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
