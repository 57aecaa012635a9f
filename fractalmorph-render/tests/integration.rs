use fractalmorph_core::{Complex, FractalParameters};
use fractalmorph_render::{FractalCanvas, NullObserver};

#[test]
fn end_to_end_mandelbrot_render() {
    let params = FractalParameters::new(200, 150).unwrap();
    let mut canvas = FractalCanvas::new(params, true).unwrap();

    let result = canvas.enqueue_render(&NullObserver).unwrap();
    assert!(!result.cancelled);
    assert!(result.calculated_pixel_count > 0);

    canvas.enqueue_bitmap_render(false, false, &NullObserver);
    let has_non_black = (0..150).any(|y| (0..200).any(|x| canvas.bitmap().get_pixel(x, y) != [0, 0, 0, 255]));
    assert!(has_non_black, "rendered image should contain non-black pixels");
}

#[test]
fn end_to_end_julia_render() {
    let mut params = FractalParameters::new(100, 100).unwrap();
    params.julia = true;
    params.julia_seed = Complex::new(-0.4, 0.6);
    let mut canvas = FractalCanvas::new(params, false).unwrap();

    let result = canvas.enqueue_render(&NullObserver).unwrap();
    assert!(!result.cancelled);
}

#[test]
fn render_determinism() {
    let params = FractalParameters::new(128, 96).unwrap();
    let mut canvas_a = FractalCanvas::new(params.clone(), true).unwrap();
    let mut canvas_b = FractalCanvas::new(params, true).unwrap();

    canvas_a.enqueue_render(&NullObserver).unwrap();
    canvas_b.enqueue_render(&NullObserver).unwrap();

    for y in 0..96 {
        for x in 0..128 {
            assert_eq!(
                canvas_a.get_iteration_count(x, y),
                canvas_b.get_iteration_count(x, y),
                "renders must be deterministic at ({x}, {y})"
            );
        }
    }
}

#[test]
fn simd_and_scalar_renders_agree() {
    let params = FractalParameters::new(96, 64).unwrap();
    let mut canvas_simd = FractalCanvas::new(params.clone(), true).unwrap();
    let mut canvas_scalar = FractalCanvas::new(params, false).unwrap();

    canvas_simd.enqueue_render(&NullObserver).unwrap();
    canvas_scalar.enqueue_render(&NullObserver).unwrap();

    for y in 0..64 {
        for x in 0..96 {
            assert_eq!(canvas_simd.get_iteration_count(x, y), canvas_scalar.get_iteration_count(x, y));
        }
    }
}

#[test]
fn cardioid_view_renders_many_interior_samples() {
    let mut params = FractalParameters::new(64, 64).unwrap();
    params.max_iters = 500;
    let mut canvas = FractalCanvas::new(params, false).unwrap();
    canvas.enqueue_render(&NullObserver).unwrap();

    let interior_count = (0..64)
        .flat_map(|y| (0..64).map(move |x| (x, y)))
        .filter(|&(x, y)| canvas.get_iter_data(x, y).in_minibrot)
        .count();
    assert!(interior_count > 0, "a default-centered Mandelbrot view should have interior samples");
}

#[test]
fn resize_reallocates_buffers_without_losing_parameters() {
    let params = FractalParameters::new(32, 32).unwrap();
    let mut canvas = FractalCanvas::new(params, false).unwrap();
    canvas.enqueue_render(&NullObserver).unwrap();
    canvas.resize(1, 64, 48, &NullObserver).unwrap();

    assert_eq!(canvas.params().target_width, 64);
    assert_eq!(canvas.params().target_height, 48);
    let result = canvas.enqueue_render(&NullObserver).unwrap();
    assert!(!result.cancelled);
}
