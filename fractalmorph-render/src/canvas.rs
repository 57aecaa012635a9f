//! Owns the iteration/bitmap buffers and drives the render lifecycle.
//!
//! There is no live-refresh thread here: this crate has no interactive UI
//! to keep responsive, so `enqueue_render`/`enqueue_bitmap_render` run the
//! (internally parallel) render on the calling thread and return once it
//! finishes or is cancelled, notifying the observer around the call.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use fractalmorph_core::FractalParameters;

use crate::bitmap::Bitmap;
use crate::colorizer::{colorize_rect, GradientConfig};
use crate::engine::{self, RenderCancel, RenderResult};
use crate::error::RenderError;
use crate::iter_buffer::{IterBuffer, IterData};
use crate::observer::{Observer, ParameterChangeSource, RenderSnapshot, ResizeFailure};

/// `target_width * target_height` above this many samples is rejected, per
/// the `W·H > 2^31` bound on addressable bitmap pixel indices.
const MAX_PIXEL_COUNT: u64 = 1 << 31;

#[derive(Debug)]
pub struct FractalCanvas {
    params: FractalParameters,
    iter_buf: IterBuffer,
    bitmap: Bitmap,
    gradient: GradientConfig,
    render_cancel: Arc<RenderCancel>,
    last_bitmap_render_id: AtomicU64,
    active_renders: AtomicUsize,
    active_bitmap_renders: AtomicUsize,
    use_simd: bool,
}

impl FractalCanvas {
    pub fn new(params: FractalParameters, use_simd: bool) -> Result<Self, RenderError> {
        Self::check_pixel_count(params.target_width, params.target_height, params.oversampling)?;
        let iter_buf = Self::alloc_iter_buf(params.target_width, params.target_height, params.oversampling, params.max_iters)?;
        let bitmap = Self::alloc_bitmap(params.target_width, params.target_height)?;
        let gradient = Self::gradient_config(&params, false);
        Ok(Self {
            params,
            iter_buf,
            bitmap,
            gradient,
            render_cancel: Arc::new(RenderCancel::new()),
            last_bitmap_render_id: AtomicU64::new(0),
            active_renders: AtomicUsize::new(0),
            active_bitmap_renders: AtomicUsize::new(0),
            use_simd,
        })
    }

    /// `target_width · target_height` above [`MAX_PIXEL_COUNT`] is rejected
    /// outright, per the bitmap's `W·H > 2^31` addressing bound. This bound
    /// is independent of `oversampling`, which instead drives the sample
    /// buffer's size and is checked separately by the fallible allocators
    /// below (`target_width · target_height · oversampling²` is the real
    /// memory cost, and isn't bounded by this check alone).
    fn check_pixel_count(width: u32, height: u32, oversampling: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        if (width as u64) * (height as u64) > MAX_PIXEL_COUNT {
            return Err(RenderError::BitmapTooLarge { width, height, oversampling });
        }
        Ok(())
    }

    fn alloc_iter_buf(width: u32, height: u32, oversampling: u32, max_iters: u32) -> Result<IterBuffer, RenderError> {
        IterBuffer::try_new(width, height, oversampling, max_iters)
            .map_err(|e| RenderError::OutOfMemory(e.to_string()))
    }

    fn alloc_bitmap(width: u32, height: u32) -> Result<Bitmap, RenderError> {
        Bitmap::try_new(width, height).map_err(|e| RenderError::OutOfMemory(e.to_string()))
    }

    fn gradient_config(params: &FractalParameters, highlight_guessed: bool) -> GradientConfig {
        GradientConfig {
            colors: params.gradient_colors.clone(),
            factors: params.gradient_factors(),
            highlight_guessed,
        }
    }

    pub fn params(&self) -> &FractalParameters {
        &self.params
    }

    /// Replaces the current parameters. Dimensions are applied first; new
    /// buffers are allocated into locals before anything in `self` is
    /// touched, so on an `OutOfMemory` `Err` the canvas's old buffers and
    /// parameters are left exactly as they were (no partial state to roll
    /// back).
    pub fn change_parameters(
        &mut self,
        new_params: FractalParameters,
        source: ParameterChangeSource,
        observer: &dyn Observer,
    ) -> Result<(), RenderError> {
        Self::check_pixel_count(new_params.target_width, new_params.target_height, new_params.oversampling)?;

        let dims_changed =
            new_params.target_width != self.params.target_width || new_params.target_height != self.params.target_height;
        let oversampling_changed = new_params.oversampling != self.params.oversampling;

        let new_buffers = if dims_changed || oversampling_changed {
            Some((
                Self::alloc_iter_buf(new_params.target_width, new_params.target_height, new_params.oversampling, new_params.max_iters)?,
                Self::alloc_bitmap(new_params.target_width, new_params.target_height)?,
            ))
        } else {
            None
        };

        self.cancel_render();
        self.wait_for_idle();

        if let Some((iter_buf, bitmap)) = new_buffers {
            self.iter_buf = iter_buf;
            self.bitmap = bitmap;
        }

        let highlight = self.gradient.highlight_guessed;
        self.gradient = Self::gradient_config(&new_params, highlight);
        self.params = new_params;
        observer.parameters_changed(source);
        if dims_changed {
            observer.canvas_size_changed(self.params.target_width, self.params.target_height);
        }
        Ok(())
    }

    /// Reallocates for new screen dimensions or oversampling. A no-op if
    /// neither changed. As with [`Self::change_parameters`], the new
    /// buffers are allocated before any of the canvas's existing state is
    /// touched, so a failed resize leaves the canvas fully usable at its
    /// old dimensions.
    pub fn resize(&mut self, oversampling: u32, screen_width: u32, screen_height: u32, observer: &dyn Observer) -> Result<(), RenderError> {
        if oversampling == self.params.oversampling
            && screen_width == self.params.target_width
            && screen_height == self.params.target_height
        {
            return Ok(());
        }
        if let Err(e) = Self::check_pixel_count(screen_width, screen_height, oversampling) {
            observer.canvas_resize_failed(ResizeFailure {
                requested_width: screen_width,
                requested_height: screen_height,
                reason: e.to_string(),
            });
            return Err(e);
        }

        let mut new_params = self.params.clone();
        new_params.resize(screen_width, screen_height)?;
        new_params.set_oversampling(oversampling)?;

        let iter_buf = Self::alloc_iter_buf(screen_width, screen_height, oversampling, new_params.max_iters)?;
        let bitmap = Self::alloc_bitmap(screen_width, screen_height)?;

        self.cancel_render();
        self.wait_for_idle();

        self.iter_buf = iter_buf;
        self.bitmap = bitmap;
        self.params = new_params;
        observer.canvas_size_changed(screen_width, screen_height);
        Ok(())
    }

    /// Bumps the shared render id; any worker still running under the
    /// previous id observes the mismatch at its next poll point and
    /// unwinds without writing further results. Never blocks.
    pub fn cancel_render(&self) {
        self.render_cancel.cancel();
    }

    fn wait_for_idle(&self) {
        while self.active_renders.load(Ordering::SeqCst) > 0 || self.active_bitmap_renders.load(Ordering::SeqCst) > 0 {
            std::thread::yield_now();
        }
    }

    /// The only entry point that launches a full iteration + colorize
    /// render. Runs on the calling thread, internally parallel via the
    /// Mariani-Silver engine's own thread pool.
    pub fn enqueue_render(&mut self, observer: &dyn Observer) -> Result<RenderResult, RenderError> {
        let render_id = self.render_cancel.begin_render();
        self.active_renders.fetch_add(1, Ordering::SeqCst);

        let started = RenderSnapshot { render_id, guessed: 0, calculated: 0, elapsed: std::time::Duration::ZERO, cancelled: false };
        observer.render_started(started);

        let start = Instant::now();
        let result = engine::render(
            &self.params,
            &mut self.iter_buf,
            &mut self.bitmap,
            self.gradient.clone(),
            &self.render_cancel,
            render_id,
            self.use_simd,
        );
        self.active_renders.fetch_sub(1, Ordering::SeqCst);

        match &result {
            Ok(r) => {
                let snapshot = RenderSnapshot {
                    render_id,
                    guessed: r.guessed_pixel_count,
                    calculated: r.calculated_pixel_count,
                    elapsed: start.elapsed(),
                    cancelled: r.cancelled,
                };
                observer.show_progress(snapshot);
                observer.render_finished(snapshot);
                observer.draw_bitmap();
            }
            Err(_) => {}
        }
        result
    }

    /// Runs only the colorizer over the whole canvas, using the samples
    /// already present in the iteration buffer. `multithreaded` splits the
    /// bitmap into row bands processed by `rayon`; otherwise it runs as one
    /// sequential pass.
    pub fn enqueue_bitmap_render(&mut self, multithreaded: bool, highlight_guessed: bool, observer: &dyn Observer) {
        let bitmap_render_id = self.last_bitmap_render_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.active_bitmap_renders.fetch_add(1, Ordering::SeqCst);
        observer.bitmap_render_started(bitmap_render_id);

        self.gradient.highlight_guessed = highlight_guessed;
        let width = self.params.target_width;
        let height = self.params.target_height;

        if multithreaded {
            use rayon::prelude::*;
            let band_count = rayon::current_num_threads().max(1) as u32;
            let band_height = (height + band_count - 1) / band_count;
            let iter_buf = &self.iter_buf;
            let gradient = &self.gradient;
            let bands: Vec<Bitmap> = (0..band_count)
                .into_par_iter()
                .map(|band| {
                    let y_min = (band * band_height).min(height);
                    let y_max = ((band + 1) * band_height).min(height);
                    let mut band_bitmap = Bitmap::new(width, (y_max - y_min).max(1));
                    if y_max > y_min {
                        colorize_band(iter_buf, &mut band_bitmap, 0, width, y_min, y_max, y_min, gradient);
                    }
                    band_bitmap
                })
                .collect();
            for (band_idx, band_bitmap) in bands.into_iter().enumerate() {
                let y_min = (band_idx as u32 * band_height).min(height);
                let y_max = ((band_idx as u32 + 1) * band_height).min(height);
                for py in y_min..y_max {
                    for px in 0..width {
                        self.bitmap.set_pixel(px, py, band_bitmap.get_pixel(px, py - y_min));
                    }
                }
            }
        } else {
            colorize_rect(&self.iter_buf, &mut self.bitmap, 0, width, 0, height, &self.gradient);
        }

        self.active_bitmap_renders.fetch_sub(1, Ordering::SeqCst);
        observer.bitmap_render_finished(bitmap_render_id);
        observer.draw_bitmap();
    }

    pub fn get_iter_data(&self, x: u32, y: u32) -> IterData {
        self.iter_buf.get(x, y)
    }

    pub fn get_iteration_count(&self, x: u32, y: u32) -> u32 {
        self.iter_buf.get(x, y).iteration_count
    }

    pub fn map(&self, x: f64, y: f64) -> fractalmorph_core::Complex {
        self.params.map_with_transformations(x, y)
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    pub fn iter_buffer(&self) -> &IterBuffer {
        &self.iter_buf
    }
}

/// Colorizes `[px_min,px_max) × [py_min,py_max)` of `iter_buf`/the source
/// canvas into `dest`, offsetting rows by `dest_y_offset` so a `rayon`-band
/// worker can write into a small standalone bitmap instead of the shared
/// one.
fn colorize_band(
    iter_buf: &IterBuffer,
    dest: &mut Bitmap,
    px_min: u32,
    px_max: u32,
    py_min: u32,
    py_max: u32,
    dest_y_offset: u32,
    cfg: &GradientConfig,
) {
    for py in py_min..py_max {
        for px in px_min..px_max {
            let samples = iter_buf.pixel_samples(px, py);
            let rgba = crate::colorizer::average_pixel(samples, cfg);
            dest.set_pixel(px, py - dest_y_offset, rgba);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;

    #[test]
    fn new_canvas_has_black_bitmap() {
        let params = FractalParameters::new(16, 16).unwrap();
        let canvas = FractalCanvas::new(params, false).unwrap();
        assert_eq!(canvas.bitmap().get_pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn enqueue_render_populates_iteration_buffer() {
        let params = FractalParameters::new(16, 16).unwrap();
        let mut canvas = FractalCanvas::new(params, false).unwrap();
        let result = canvas.enqueue_render(&NullObserver).unwrap();
        assert!(!result.cancelled);
    }

    #[test]
    fn enqueue_bitmap_render_colorizes_from_existing_samples() {
        let params = FractalParameters::new(8, 8).unwrap();
        let mut canvas = FractalCanvas::new(params, false).unwrap();
        canvas.enqueue_render(&NullObserver).unwrap();
        canvas.enqueue_bitmap_render(false, false, &NullObserver);
        // Pixels should no longer all be the initial black-opaque fill,
        // since a Mandelbrot-2 view at zoom 0 has escaping exterior points.
        let all_black = (0..8).all(|y| (0..8).all(|x| canvas.bitmap().get_pixel(x, y) == [0, 0, 0, 255]));
        assert!(!all_black);
    }

    #[test]
    fn resize_updates_dimensions() {
        let params = FractalParameters::new(16, 16).unwrap();
        let mut canvas = FractalCanvas::new(params, false).unwrap();
        canvas.resize(1, 32, 24, &NullObserver).unwrap();
        assert_eq!(canvas.bitmap().width, 32);
        assert_eq!(canvas.bitmap().height, 24);
    }

    #[test]
    fn resize_rejects_zero_dimension() {
        let params = FractalParameters::new(16, 16).unwrap();
        let mut canvas = FractalCanvas::new(params, false).unwrap();
        assert!(canvas.resize(1, 0, 24, &NullObserver).is_err());
    }

    #[test]
    fn get_iteration_count_matches_iter_buffer() {
        let params = FractalParameters::new(8, 8).unwrap();
        let mut canvas = FractalCanvas::new(params, false).unwrap();
        canvas.enqueue_render(&NullObserver).unwrap();
        assert_eq!(canvas.get_iteration_count(0, 0), canvas.get_iter_data(0, 0).iteration_count);
    }

    #[test]
    fn bitmap_too_large_reports_requested_oversampling() {
        let mut params = FractalParameters::new(16, 16).unwrap();
        params.set_oversampling(4).unwrap();
        let width = 1 << 16;
        let height = 1 << 16; // width*height just over 2^31
        params.resize(width, height).unwrap();
        let err = FractalCanvas::new(params, false).unwrap_err();
        match err {
            RenderError::BitmapTooLarge { oversampling, .. } => assert_eq!(oversampling, 4),
            other => panic!("expected BitmapTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn change_parameters_rejecting_dimensions_leaves_canvas_unchanged() {
        let params = FractalParameters::new(16, 16).unwrap();
        let mut canvas = FractalCanvas::new(params, false).unwrap();
        canvas.enqueue_render(&NullObserver).unwrap();
        let before = canvas.get_iter_data(0, 0);

        // Zero width is caught by `check_pixel_count` before any buffer is
        // touched, so the canvas's old state must survive untouched.
        let mut rejected = canvas.params().clone();
        rejected.target_width = 0;
        let err = canvas.change_parameters(rejected, "test", &NullObserver);

        assert!(err.is_err());
        assert_eq!(canvas.params().target_width, 16);
        assert_eq!(canvas.get_iter_data(0, 0), before);
    }
}
