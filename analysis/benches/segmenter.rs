use std::f32::consts::PI;

use auscult_analysis::{PcgSignal, SAMPLE_RATE, analyze, segment};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn heart_train(bpm: f32, seconds: f32, sr: u32) -> Vec<f32> {
    let n = (seconds * sr as f32) as usize;
    let cycle = (60. / bpm * sr as f32) as usize;
    let sys = cycle / 3;
    let mut y = vec![0f32; n];
    let mut burst = |at: usize, freq: f32, width: usize, amp: f32, y: &mut Vec<f32>| {
        for i in at..(at + width).min(n) {
            let t = (i - at) as f32 / sr as f32;
            let fade = 0.5 - 0.5 * f32::cos(2. * PI * (i - at) as f32 / width as f32);
            y[i] += amp * fade * f32::sin(2. * PI * freq * t);
        }
    };
    let mut at = 0usize;
    while at + cycle <= n {
        burst(at, 60., (0.04 * sr as f32) as usize, 1.0, &mut y);
        burst(at + sys, 80., (0.03 * sr as f32) as usize, 0.5, &mut y);
        at += cycle;
    }
    y
}

fn bench_segment(c: &mut Criterion) {
    let signal = PcgSignal::new(heart_train(75., 10., SAMPLE_RATE), SAMPLE_RATE);
    c.bench_function("segment 10s", |b| {
        b.iter(|| segment(black_box(&signal)).unwrap());
    });
}

fn bench_analyze(c: &mut Criterion) {
    let signal = PcgSignal::new(heart_train(75., 10., SAMPLE_RATE), SAMPLE_RATE);
    c.bench_function("analyze 10s hsmm", |b| {
        b.iter(|| analyze(black_box(&signal), true).unwrap());
    });
    c.bench_function("analyze 10s heuristic", |b| {
        b.iter(|| analyze(black_box(&signal), false).unwrap());
    });
}

criterion_group!(benches, bench_segment, bench_analyze);
criterion_main!(benches);
