//! The recursive multithreaded Mariani-Silver tile engine.
//!
//! Given a boxed sample region whose four border rows/columns are already
//! computed, the engine either fills a monochromatic interior by guessing,
//! computes a small interior directly, or splits along the longer axis and
//! recurses. Splits above [`NEW_TILE_THREAD_MIN_PIXELS`] pixels may spawn a
//! worker for the half nearer the canvas center; below it, tiles run
//! sequentially and the call retains bitmap-colorizing responsibility for
//! its whole region instead of delegating to children.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;
use wide::{f64x4, CmpLe};

use fractalmorph_core::{formula, Complex, FractalParameters};

use crate::bitmap::Bitmap;
use crate::colorizer::{colorize_rect, GradientConfig};
use crate::error::RenderError;
use crate::iter_buffer::IterBuffer;

/// Interior samples at or below this size are computed directly instead of
/// being subdivided further.
pub const MAXIMUM_TILE_SIZE: u32 = 50;

/// Below this many bitmap pixels on either axis, a tile retains its own
/// bitmap-colorizing responsibility and stops spawning new worker threads,
/// since a sub-pixel-sized split could make two tiles race on one pixel.
pub const NEW_TILE_THREAD_MIN_PIXELS: u32 = 8;

/// A forbidden representative value for the guess shortcut: tiles whose
/// border iterates to 0 or 1 are too close to the escape boundary to trust
/// a uniform fill.
const GUESS_FORBIDDEN: [u32; 2] = [0, 1];

pub fn default_thread_budget() -> usize {
    std::thread::available_parallelism().map(|n| n.get() + 4).unwrap_or(12)
}

/// Tracks the render generation for cooperative cancellation, plus the
/// guessed/calculated sample counters surfaced to the Observer.
#[derive(Debug)]
pub struct RenderCancel {
    generation: AtomicU64,
    guessed: AtomicUsize,
    calculated: AtomicUsize,
}

impl RenderCancel {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            guessed: AtomicUsize::new(0),
            calculated: AtomicUsize::new(0),
        }
    }

    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Bumps the shared render id and returns the new value, both starting
    /// a new render generation and implicitly invalidating any render
    /// still in flight under the previous id.
    pub fn begin_render(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn reset_counters(&self) {
        self.guessed.store(0, Ordering::Relaxed);
        self.calculated.store(0, Ordering::Relaxed);
    }

    fn add_guessed(&self, n: usize) {
        self.guessed.fetch_add(n, Ordering::Relaxed);
    }

    fn add_calculated(&self, n: usize) {
        self.calculated.fetch_add(n, Ordering::Relaxed);
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.guessed.load(Ordering::Relaxed), self.calculated.load(Ordering::Relaxed))
    }
}

impl Default for RenderCancel {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RenderResult {
    pub elapsed: std::time::Duration,
    pub cancelled: bool,
    pub guessed_pixel_count: usize,
    pub calculated_pixel_count: usize,
}

// ---------------------------------------------------------------------------
// Region / borders
// ---------------------------------------------------------------------------

/// An inclusive sample-space rectangle whose border rows/columns (`i_min`,
/// `i_max`, `j_min`, `j_max`) are already written into the iteration buffer.
#[derive(Clone, Copy, Debug)]
struct Region {
    i_min: u32,
    i_max: u32,
    j_min: u32,
    j_max: u32,
}

impl Region {
    fn interior_width(&self) -> u32 {
        self.i_max.saturating_sub(self.i_min).saturating_sub(1)
    }

    fn interior_height(&self) -> u32 {
        self.j_max.saturating_sub(self.j_min).saturating_sub(1)
    }

    fn pixel_dims(&self, oversampling: u32) -> (u32, u32) {
        (
            (self.i_max - self.i_min + 1) / oversampling.max(1),
            (self.j_max - self.j_min + 1) / oversampling.max(1),
        )
    }

    fn center(&self) -> (f64, f64) {
        (
            (self.i_min as f64 + self.i_max as f64) / 2.0,
            (self.j_min as f64 + self.j_max as f64) / 2.0,
        )
    }
}

#[derive(Clone, Copy, Debug)]
struct Borders {
    same_top: bool,
    val_top: u32,
    same_bottom: bool,
    val_bottom: u32,
    same_left: bool,
    val_left: u32,
    same_right: bool,
    val_right: u32,
}

/// `true`, and the shared representative value, when every entry in `range`
/// (read via `get`) is identical and not in [`GUESS_FORBIDDEN`].
fn scan_uniform(mut get: impl FnMut(u32) -> u32, range: std::ops::RangeInclusive<u32>) -> (bool, u32) {
    let mut iter = range.into_iter();
    let first = match iter.next() {
        Some(i) => get(i),
        None => return (false, 0),
    };
    if GUESS_FORBIDDEN.contains(&first) {
        return (false, first);
    }
    for i in iter {
        if get(i) != first {
            return (false, first);
        }
    }
    (true, first)
}

// ---------------------------------------------------------------------------
// Shared unsynchronized writers
// ---------------------------------------------------------------------------

/// Raw-pointer handle allowing multiple worker threads to write disjoint
/// regions of the same buffer with no locking. Correctness depends entirely
/// on the caller's invariant that tile splits never let two workers target
/// the same sample or pixel (§5 of the design).
struct SharedIterBuffer(*mut IterBuffer);
unsafe impl Send for SharedIterBuffer {}
unsafe impl Sync for SharedIterBuffer {}

impl SharedIterBuffer {
    unsafe fn get(&self) -> &mut IterBuffer {
        &mut *self.0
    }
}

struct SharedBitmap(*mut Bitmap);
unsafe impl Send for SharedBitmap {}
unsafe impl Sync for SharedBitmap {}

impl SharedBitmap {
    unsafe fn get(&self) -> &mut Bitmap {
        &mut *self.0
    }
}

// ---------------------------------------------------------------------------
// SIMD kernel (power-2 Mandelbrot only)
// ---------------------------------------------------------------------------

const SIMD_LANES: usize = 4;

struct SimdPipeline {
    cr: [f64; 4],
    ci: [f64; 4],
    zr: [f64; 4],
    zi: [f64; 4],
    iters: [u32; 4],
    lane_sample: [Option<usize>; 4],
}

impl SimdPipeline {
    fn new() -> Self {
        Self {
            cr: [0.0; 4],
            ci: [0.0; 4],
            zr: [0.0; 4],
            zi: [0.0; 4],
            iters: [0; 4],
            lane_sample: [None; 4],
        }
    }

    fn fill(&mut self, lane: usize, idx: usize, c: Complex) {
        self.cr[lane] = c.re;
        self.ci[lane] = c.im;
        self.zr[lane] = 0.0;
        self.zi[lane] = 0.0;
        self.iters[lane] = 0;
        self.lane_sample[lane] = Some(idx);
    }

    fn active_lanes(&self) -> usize {
        self.lane_sample.iter().filter(|s| s.is_some()).count()
    }
}

/// 4-wide SIMD inner loop for the power-2 Mandelbrot kernel.
///
/// Cardioid/bulb-interior samples are committed directly at `max_iters`
/// without entering the vector pipeline. Escaped lanes are refilled from
/// the pending queue so the pipeline never idles a lane while work remains;
/// the residual (fewer than 4 live samples) finishes by itself as lanes
/// drain with nothing left to refill them.
pub fn calc_pixel_vector(cs: &[Complex], max_iters: u32, radius_sq: f64) -> Vec<u32> {
    let n = cs.len();
    let mut out = vec![0u32; n];
    let mut pending: Vec<usize> = Vec::with_capacity(n);
    for (idx, &c) in cs.iter().enumerate() {
        if formula::in_cardioid(c.re, c.im) || formula::in_period2_bulb(c.re, c.im) {
            out[idx] = max_iters;
        } else {
            pending.push(idx);
        }
    }

    let mut pipeline = SimdPipeline::new();
    let mut cursor = 0usize;
    for lane in 0..SIMD_LANES {
        if cursor < pending.len() {
            let idx = pending[cursor];
            pipeline.fill(lane, idx, cs[idx]);
            cursor += 1;
        }
    }

    while pipeline.active_lanes() > 0 {
        let zr = f64x4::from(pipeline.zr);
        let zi = f64x4::from(pipeline.zi);
        let cr = f64x4::from(pipeline.cr);
        let ci = f64x4::from(pipeline.ci);

        let new_zi = zr * zi * f64x4::splat(2.0) + ci;
        let new_zr = zr * zr - zi * zi + cr;
        let norm_sq = new_zr * new_zr + new_zi * new_zi;

        // NaN-as-escaped: negate the bounded-magnitude predicate.
        let bounded = norm_sq.cmp_le(f64x4::splat(radius_sq));
        let escaped_mask = !bounded;
        let escaped_bits = escaped_mask.move_mask();

        pipeline.zr = new_zr.to_array();
        pipeline.zi = new_zi.to_array();

        for lane in 0..SIMD_LANES {
            let Some(idx) = pipeline.lane_sample[lane] else {
                continue;
            };
            pipeline.iters[lane] += 1;
            let lane_escaped = (escaped_bits & (1 << lane)) != 0;
            if lane_escaped || pipeline.iters[lane] >= max_iters {
                out[idx] = if lane_escaped { pipeline.iters[lane] - 1 } else { max_iters };
                if cursor < pending.len() {
                    let next_idx = pending[cursor];
                    pipeline.fill(lane, next_idx, cs[next_idx]);
                    cursor += 1;
                } else {
                    pipeline.lane_sample[lane] = None;
                }
            }
        }
    }

    out
}

/// Iterates a batch of plane coordinates, using the SIMD kernel when the
/// formula is power-2 Mandelbrot in non-Julia mode (the only case the
/// kernel above implements), falling back to the scalar kernel otherwise.
fn iterate_batch(cs: &[Complex], params: &FractalParameters, meta: &formula::FormulaMeta, use_simd: bool) -> Vec<u32> {
    if use_simd && meta.id == formula::procedure_id::MANDELBROT_2 && !params.julia && cs.len() >= SIMD_LANES {
        return calc_pixel_vector(cs, params.max_iters, meta.escape_radius_sq());
    }
    cs.iter()
        .map(|&sample| {
            let (c, z0) = if params.julia {
                (params.julia_seed, sample)
            } else {
                (sample, Complex::ZERO)
            };
            formula::iterate_point(meta, c, z0, params.max_iters)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Render context
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct RenderCtx {
    params: Arc<FractalParameters>,
    meta: formula::FormulaMeta,
    iter_buf: Arc<SharedIterBuffer>,
    bitmap: Arc<SharedBitmap>,
    gradient: Arc<GradientConfig>,
    cancel: Arc<RenderCancel>,
    render_id: u64,
    thread_count: Arc<AtomicUsize>,
    max_threads: usize,
    use_simd: bool,
    canvas_center: (f64, f64),
    sample_width: u32,
    sample_height: u32,
}

impl RenderCtx {
    fn cancelled(&self) -> bool {
        self.cancel.generation() != self.render_id
    }

    fn sample_at(&self, i: u32, j: u32) -> Complex {
        self.params.map_with_transformations(i as f64, j as f64)
    }

    unsafe fn write_sample(&self, i: u32, j: u32, iterations: u32, guessed: bool) {
        self.iter_buf.get().set(i, j, iterations, guessed);
    }

    unsafe fn read_iterations(&self, i: u32, j: u32) -> u32 {
        self.iter_buf.get().get(i, j).iteration_count
    }

    fn compute_line(&self, coords: &[(u32, u32)]) -> Vec<u32> {
        let samples: Vec<Complex> = coords.iter().map(|&(i, j)| self.sample_at(i, j)).collect();
        iterate_batch(&samples, &self.params, &self.meta, self.use_simd)
    }

    /// Colorizes the pixels wholly owned by `region`.
    ///
    /// Every interior region boundary is snapped to a multiple of
    /// `oversampling` (by the initial tile raster and by the recursive
    /// split points alike), so the pixel containing an interior boundary
    /// sample is given to exactly one side: the region whose edge is *not*
    /// the true canvas edge excludes the pixel at that edge, leaving it to
    /// its neighbor. Only the true outer edge (`i_max == sample_width-1` or
    /// `j_max == sample_height-1`) includes its boundary pixel.
    fn colorize(&self, region: Region) {
        let s = self.params.oversampling.max(1);
        let px_min = region.i_min / s;
        let px_max = if region.i_max + 1 >= self.sample_width {
            (region.i_max + 1) / s
        } else {
            region.i_max / s
        };
        let py_min = region.j_min / s;
        let py_max = if region.j_max + 1 >= self.sample_height {
            (region.j_max + 1) / s
        } else {
            region.j_max / s
        };
        unsafe {
            colorize_rect(self.iter_buf.get(), self.bitmap.get(), px_min, px_max, py_min, py_max, &self.gradient);
        }
    }
}

// ---------------------------------------------------------------------------
// Recursive engine
// ---------------------------------------------------------------------------

fn subdivide_and_render<'scope>(scope: &rayon::Scope<'scope>, ctx: RenderCtx, region: Region, borders: Borders, owns_bitmap: bool)
where
    RenderCtx: 'scope,
{
    if ctx.cancelled() {
        return;
    }

    // Guess shortcut: uniform, non-forbidden border fills the interior
    // without iterating it.
    if ctx.meta.is_guessable
        && borders.same_top
        && borders.same_bottom
        && borders.same_left
        && borders.same_right
        && borders.val_top == borders.val_bottom
        && borders.val_bottom == borders.val_left
        && borders.val_left == borders.val_right
        && !GUESS_FORBIDDEN.contains(&borders.val_top)
    {
        let value = borders.val_top;
        let interior_count = region.interior_width() as usize * region.interior_height() as usize;
        for j in (region.j_min + 1)..region.j_max {
            for i in (region.i_min + 1)..region.i_max {
                unsafe { ctx.write_sample(i, j, value, true) };
            }
        }
        ctx.cancel.add_guessed(interior_count);
        if owns_bitmap {
            ctx.colorize(region);
        }
        return;
    }

    // Base case: compute the interior directly.
    if region.interior_width() <= MAXIMUM_TILE_SIZE && region.interior_height() <= MAXIMUM_TILE_SIZE {
        let mut coords = Vec::with_capacity((region.interior_width() * region.interior_height()) as usize);
        for j in (region.j_min + 1)..region.j_max {
            for i in (region.i_min + 1)..region.i_max {
                coords.push((i, j));
            }
        }
        if !coords.is_empty() {
            let values = ctx.compute_line(&coords);
            for (&(i, j), v) in coords.iter().zip(values.iter()) {
                unsafe { ctx.write_sample(i, j, *v, false) };
            }
            ctx.cancel.add_calculated(coords.len());
        }
        if owns_bitmap {
            ctx.colorize(region);
        }
        return;
    }

    // Subdivide along the longer axis, snapped to a whole bitmap pixel.
    let split_i = region.i_max - region.i_min >= region.j_max - region.j_min;
    let oversampling = ctx.params.oversampling;

    let (below_threshold, left_region, right_region, left_borders, right_borders) = if split_i {
        let raw_mid = region.i_min + (region.i_max - region.i_min) / 2;
        let mid = (raw_mid - raw_mid % oversampling).clamp(region.i_min + 1, region.i_max - 1);

        let coords: Vec<(u32, u32)> = (region.j_min..=region.j_max).map(|j| (mid, j)).collect();
        let values = ctx.compute_line(&coords);
        for (&(i, j), v) in coords.iter().zip(values.iter()) {
            unsafe { ctx.write_sample(i, j, *v, false) };
        }
        ctx.cancel.add_calculated(coords.len());
        let (line_uniform, line_val) = scan_uniform(
            |k| values[(k - region.j_min) as usize],
            region.j_min..=region.j_max,
        );

        let (top_left_uniform, top_left_val) =
            scan_uniform(|i| unsafe { ctx.read_iterations(i, region.j_min) }, region.i_min..=mid);
        let (top_right_uniform, top_right_val) =
            scan_uniform(|i| unsafe { ctx.read_iterations(i, region.j_min) }, mid..=region.i_max);
        let (bottom_left_uniform, bottom_left_val) =
            scan_uniform(|i| unsafe { ctx.read_iterations(i, region.j_max) }, region.i_min..=mid);
        let (bottom_right_uniform, bottom_right_val) =
            scan_uniform(|i| unsafe { ctx.read_iterations(i, region.j_max) }, mid..=region.i_max);

        let left = Region { i_min: region.i_min, i_max: mid, j_min: region.j_min, j_max: region.j_max };
        let right = Region { i_min: mid, i_max: region.i_max, j_min: region.j_min, j_max: region.j_max };
        let left_b = Borders {
            same_top: top_left_uniform && borders.same_top,
            val_top: top_left_val,
            same_bottom: bottom_left_uniform && borders.same_bottom,
            val_bottom: bottom_left_val,
            same_left: borders.same_left,
            val_left: borders.val_left,
            same_right: line_uniform,
            val_right: line_val,
        };
        let right_b = Borders {
            same_top: top_right_uniform && borders.same_top,
            val_top: top_right_val,
            same_bottom: bottom_right_uniform && borders.same_bottom,
            val_bottom: bottom_right_val,
            same_left: line_uniform,
            val_left: line_val,
            same_right: borders.same_right,
            val_right: borders.val_right,
        };
        let (lw, lh) = left.pixel_dims(oversampling);
        let (rw, rh) = right.pixel_dims(oversampling);
        let below = lw.min(lh).min(rw).min(rh) < NEW_TILE_THREAD_MIN_PIXELS;
        (below, left, right, left_b, right_b)
    } else {
        let raw_mid = region.j_min + (region.j_max - region.j_min) / 2;
        let mid = (raw_mid - raw_mid % oversampling).clamp(region.j_min + 1, region.j_max - 1);

        let coords: Vec<(u32, u32)> = (region.i_min..=region.i_max).map(|i| (i, mid)).collect();
        let values = ctx.compute_line(&coords);
        for (&(i, j), v) in coords.iter().zip(values.iter()) {
            unsafe { ctx.write_sample(i, j, *v, false) };
        }
        ctx.cancel.add_calculated(coords.len());
        let (line_uniform, line_val) = scan_uniform(
            |k| values[(k - region.i_min) as usize],
            region.i_min..=region.i_max,
        );

        let (left_top_uniform, left_top_val) =
            scan_uniform(|j| unsafe { ctx.read_iterations(region.i_min, j) }, region.j_min..=mid);
        let (left_bottom_uniform, left_bottom_val) =
            scan_uniform(|j| unsafe { ctx.read_iterations(region.i_min, j) }, mid..=region.j_max);
        let (right_top_uniform, right_top_val) =
            scan_uniform(|j| unsafe { ctx.read_iterations(region.i_max, j) }, region.j_min..=mid);
        let (right_bottom_uniform, right_bottom_val) =
            scan_uniform(|j| unsafe { ctx.read_iterations(region.i_max, j) }, mid..=region.j_max);

        let top = Region { i_min: region.i_min, i_max: region.i_max, j_min: region.j_min, j_max: mid };
        let bottom = Region { i_min: region.i_min, i_max: region.i_max, j_min: mid, j_max: region.j_max };
        let top_b = Borders {
            same_top: borders.same_top,
            val_top: borders.val_top,
            same_bottom: line_uniform,
            val_bottom: line_val,
            same_left: left_top_uniform && borders.same_left,
            val_left: left_top_val,
            same_right: right_top_uniform && borders.same_right,
            val_right: right_top_val,
        };
        let bottom_b = Borders {
            same_top: line_uniform,
            val_top: line_val,
            same_bottom: borders.same_bottom,
            val_bottom: borders.val_bottom,
            same_left: left_bottom_uniform && borders.same_left,
            val_left: left_bottom_val,
            same_right: right_bottom_uniform && borders.same_right,
            val_right: right_bottom_val,
        };
        let (tw, th) = top.pixel_dims(oversampling);
        let (bw, bh) = bottom.pixel_dims(oversampling);
        let below = tw.min(th).min(bw).min(bh) < NEW_TILE_THREAD_MIN_PIXELS;
        (below, top, bottom, top_b, bottom_b)
    };

    let (child_owns_bitmap, retains) = if below_threshold { (false, owns_bitmap) } else { (owns_bitmap, false) };

    let (near, near_b, far, far_b) = order_by_distance(ctx.canvas_center, left_region, left_borders, right_region, right_borders);

    let can_spawn = !below_threshold && ctx.thread_count.load(Ordering::Relaxed) < ctx.max_threads;
    if can_spawn {
        ctx.thread_count.fetch_add(1, Ordering::Relaxed);
        let spawn_ctx = ctx.clone();
        let thread_count = ctx.thread_count.clone();
        scope.spawn(move |s| {
            subdivide_and_render(s, spawn_ctx, near, near_b, child_owns_bitmap);
            thread_count.fetch_sub(1, Ordering::Relaxed);
        });
        subdivide_and_render(scope, ctx.clone(), far, far_b, child_owns_bitmap);
    } else {
        subdivide_and_render(scope, ctx.clone(), near, near_b, child_owns_bitmap);
        subdivide_and_render(scope, ctx.clone(), far, far_b, child_owns_bitmap);
    }

    if retains && !ctx.cancelled() {
        ctx.colorize(region);
    }
}

fn order_by_distance(
    center: (f64, f64),
    a: Region,
    a_b: Borders,
    b: Region,
    b_b: Borders,
) -> (Region, Borders, Region, Borders) {
    let dist = |r: Region| {
        let (ci, cj) = r.center();
        (ci - center.0).powi(2) + (cj - center.1).powi(2)
    };
    if dist(a) <= dist(b) {
        (a, a_b, b, b_b)
    } else {
        (b, b_b, a, a_b)
    }
}

/// Builds up to `tile_count + 1` initial tile boundaries spanning
/// `[0, total_samples - 1]`, with every interior entry snapped down to a
/// multiple of `oversampling` (as the recursive split points already are),
/// so every initial tile's borders line up on whole-pixel boundaries. Tiles
/// that would otherwise be narrower than one pixel are dropped, which can
/// yield fewer than `tile_count` tiles on a small or heavily oversampled
/// canvas.
fn snapped_boundaries(total_samples: u32, tile_count: u32, oversampling: u32) -> Vec<u32> {
    let s = oversampling.max(1);
    let last = total_samples - 1;
    let mut boundaries = vec![0u32];
    for k in 1..tile_count {
        let raw = (k * last) / tile_count;
        let snapped = raw - raw % s;
        let prev = *boundaries.last().unwrap();
        if snapped < prev + s || snapped >= last {
            continue;
        }
        boundaries.push(snapped);
    }
    boundaries.push(last);
    boundaries
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Renders a full frame with the Mariani-Silver engine.
///
/// `iter_buf` and `bitmap` are reallocated by the caller (the canvas) to
/// match `params` before this is called. `render_id` must be the value the
/// caller obtained from [`RenderCancel::begin_render`] for this dispatch;
/// the canvas is responsible for assigning it so that `active_renders`
/// bookkeeping and the render id stay in the same critical section.
/// Returns once every worker has either finished or observed cancellation.
pub fn render(
    params: &FractalParameters,
    iter_buf: &mut IterBuffer,
    bitmap: &mut Bitmap,
    gradient: GradientConfig,
    cancel: &Arc<RenderCancel>,
    render_id: u64,
    use_simd: bool,
) -> Result<RenderResult, RenderError> {
    let start = Instant::now();
    let meta = params.formula_meta()?;
    cancel.reset_counters();

    let sample_width = iter_buf.sample_width();
    let sample_height = iter_buf.sample_height();
    debug!(sample_width, sample_height, formula = meta.name, "starting render");

    let thread_budget = default_thread_budget();
    let t = (thread_budget as f64).sqrt().floor().max(1.0) as u32;

    let boundary_x = snapped_boundaries(sample_width, t, params.oversampling);
    let boundary_y = snapped_boundaries(sample_height, t, params.oversampling);

    let ctx = RenderCtx {
        params: Arc::new(params.clone()),
        meta,
        iter_buf: Arc::new(SharedIterBuffer(iter_buf as *mut IterBuffer)),
        bitmap: Arc::new(SharedBitmap(bitmap as *mut Bitmap)),
        gradient: Arc::new(gradient),
        cancel: cancel.clone(),
        render_id,
        thread_count: Arc::new(AtomicUsize::new(0)),
        max_threads: thread_budget,
        use_simd,
        canvas_center: (sample_width as f64 / 2.0, sample_height as f64 / 2.0),
        sample_width,
        sample_height,
    };

    // Compute the full boundary raster: every row/column at a tile edge.
    let rows: Vec<Vec<u32>> = boundary_y
        .par_iter()
        .map(|&y| {
            let coords: Vec<(u32, u32)> = (0..sample_width).map(|x| (x, y)).collect();
            ctx.compute_line(&coords)
        })
        .collect();
    let cols: Vec<Vec<u32>> = boundary_x
        .par_iter()
        .map(|&x| {
            let coords: Vec<(u32, u32)> = (0..sample_height).map(|y| (x, y)).collect();
            ctx.compute_line(&coords)
        })
        .collect();

    for (ry, &y) in boundary_y.iter().enumerate() {
        for x in 0..sample_width {
            unsafe { ctx.write_sample(x, y, rows[ry][x as usize], false) };
        }
    }
    for (rx, &x) in boundary_x.iter().enumerate() {
        for y in 0..sample_height {
            unsafe { ctx.write_sample(x, y, cols[rx][y as usize], false) };
        }
    }
    let boundary_samples = rows.iter().map(|r| r.len()).sum::<usize>() + cols.iter().map(|c| c.len()).sum::<usize>();
    cancel.add_calculated(boundary_samples);

    rayon::scope(|scope| {
        for ty in 0..boundary_y.len() - 1 {
            for tx in 0..boundary_x.len() - 1 {
                if ctx.cancelled() {
                    continue;
                }
                let region = Region {
                    i_min: boundary_x[tx],
                    i_max: boundary_x[tx + 1],
                    j_min: boundary_y[ty],
                    j_max: boundary_y[ty + 1],
                };
                let (top_uniform, top_val) =
                    scan_uniform(|i| rows[ty][i as usize], region.i_min..=region.i_max);
                let (bottom_uniform, bottom_val) =
                    scan_uniform(|i| rows[ty + 1][i as usize], region.i_min..=region.i_max);
                let (left_uniform, left_val) =
                    scan_uniform(|j| cols[tx][j as usize], region.j_min..=region.j_max);
                let (right_uniform, right_val) =
                    scan_uniform(|j| cols[tx + 1][j as usize], region.j_min..=region.j_max);
                let borders = Borders {
                    same_top: top_uniform,
                    val_top: top_val,
                    same_bottom: bottom_uniform,
                    val_bottom: bottom_val,
                    same_left: left_uniform,
                    val_left: left_val,
                    same_right: right_uniform,
                    val_right: right_val,
                };
                let tile_ctx = ctx.clone();
                scope.spawn(move |s| {
                    subdivide_and_render(s, tile_ctx, region, borders, true);
                });
            }
        }
    });

    let cancelled = ctx.cancelled();
    let (guessed_pixel_count, calculated_pixel_count) = cancel.counts();
    let elapsed = start.elapsed();
    tracing::info!(
        elapsed_ms = elapsed.as_millis(),
        guessed_pixel_count,
        calculated_pixel_count,
        cancelled,
        "render complete"
    );

    Ok(RenderResult { elapsed, cancelled, guessed_pixel_count, calculated_pixel_count })
}
