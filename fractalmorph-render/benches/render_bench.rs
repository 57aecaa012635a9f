use criterion::{criterion_group, criterion_main, Criterion};

use fractalmorph_core::FractalParameters;
use fractalmorph_render::{FractalCanvas, NullObserver};

fn bench_full_frame_render(c: &mut Criterion) {
    let params = FractalParameters::new(640, 480).unwrap();

    c.bench_function("full_frame_640x480_simd", |b| {
        b.iter(|| {
            let mut canvas = FractalCanvas::new(params.clone(), true).unwrap();
            canvas.enqueue_render(&NullObserver).unwrap()
        });
    });

    c.bench_function("full_frame_640x480_scalar", |b| {
        b.iter(|| {
            let mut canvas = FractalCanvas::new(params.clone(), false).unwrap();
            canvas.enqueue_render(&NullObserver).unwrap()
        });
    });
}

fn bench_deep_zoom_iteration_throughput(c: &mut Criterion) {
    let mut params = FractalParameters::new(256, 256).unwrap();
    params.max_iters = 1000;
    params.set_center_and_zoom(fractalmorph_core::Complex::new(-0.5, 0.0), 8.0);

    c.bench_function("render_256x256_deep_zoom_1000iter", |b| {
        b.iter(|| {
            let mut canvas = FractalCanvas::new(params.clone(), true).unwrap();
            canvas.enqueue_render(&NullObserver).unwrap()
        });
    });
}

fn bench_colorize(c: &mut Criterion) {
    let params = FractalParameters::new(640, 480).unwrap();
    let mut canvas = FractalCanvas::new(params, true).unwrap();
    canvas.enqueue_render(&NullObserver).unwrap();

    c.bench_function("colorize_640x480", |b| {
        b.iter(|| canvas.enqueue_bitmap_render(true, false, &NullObserver));
    });
}

criterion_group!(benches, bench_full_frame_render, bench_deep_zoom_iteration_throughput, bench_colorize);
criterion_main!(benches);
