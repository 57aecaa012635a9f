//! Renders an inflection-unfolding animation: pan to each inflection
//! point, zoom into it, morph the partial-inflection power from 1 to the
//! formula's own inflection power, then push the inflection and repeat.

use std::path::Path;

use fractalmorph_core::params::transformation;
use fractalmorph_core::{Complex, FractalParameters};
use fractalmorph_render::{export_png, ExportMetadata, FractalCanvas, Observer};
use tracing::info;

use crate::error::AppError;

pub struct AnimationConfig {
    pub fps: u32,
    pub seconds_per_inflection: f64,
    pub seconds_per_zoom: f64,
    pub use_simd: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            seconds_per_inflection: 3.0,
            seconds_per_zoom: 0.666_666_666_666_6,
            use_simd: true,
        }
    }
}

pub fn run_animation(
    mut params: FractalParameters,
    config: &AnimationConfig,
    output_dir: &Path,
    observer: &dyn Observer,
) -> Result<(), AppError> {
    std::fs::create_dir_all(output_dir)
        .map_err(|source| AppError::CreateOutputDir { path: output_dir.to_path_buf(), source })?;

    let targets = std::mem::take(&mut params.inflections);
    let inflection_zoom_level = params.inflection_zoom_level;
    let inflection_power = params.formula_meta()?.inflection_power as f64;

    params.pre_transformation_type = transformation::PARTIAL_INFLECTION;
    params.set_center_and_zoom(Complex::ZERO, 0.0);

    let mut canvas = FractalCanvas::new(params, config.use_simd)?;
    let mut frame_index: u64 = 0;
    write_frame(&mut canvas, frame_index, output_dir, observer)?;
    frame_index += 1;

    for (i, &target) in targets.iter().enumerate() {
        let start_center = canvas.params().center;
        let pan_frames = frame_budget(config.fps, config.seconds_per_inflection, 1.0);
        for f in 1..=pan_frames {
            let t = f as f64 / pan_frames as f64;
            let center = lerp_complex(start_center, target, t);
            let zoom = canvas.params().zoom_level;
            apply_view(&mut canvas, center, zoom, observer)?;
            write_frame(&mut canvas, frame_index, output_dir, observer)?;
            frame_index += 1;
        }

        let target_zoom = inflection_zoom_level * 2f64.powi(-(i as i32));
        let start_zoom = canvas.params().zoom_level;
        let zoom_frames = frame_budget(config.fps, config.seconds_per_zoom, (target_zoom - start_zoom).abs());
        for f in 1..=zoom_frames {
            let t = f as f64 / zoom_frames as f64;
            let zoom = start_zoom + (target_zoom - start_zoom) * t;
            apply_view(&mut canvas, target, zoom, observer)?;
            write_frame(&mut canvas, frame_index, output_dir, observer)?;
            frame_index += 1;
        }

        let base_zoom = canvas.params().zoom_level;
        let morph_frames = frame_budget(config.fps, config.seconds_per_inflection, 1.0);
        for f in 1..=morph_frames {
            let t = f as f64 / morph_frames as f64;
            let partial_power = 1.0 + (inflection_power - 1.0) * t;
            // §6.5's zoom correction, generalized to the active formula's
            // own inflection power rather than hardcoded 2.
            let corrected_zoom = base_zoom / (partial_power / inflection_power);
            let mut p = canvas.params().clone();
            p.partial_inflection_power = partial_power;
            p.partial_inflection_coord = Complex::ZERO;
            p.set_center_and_zoom(Complex::ZERO, corrected_zoom);
            canvas.change_parameters(p, "animation-morph", observer)?;
            write_frame(&mut canvas, frame_index, output_dir, observer)?;
            frame_index += 1;
        }

        let mut p = canvas.params().clone();
        p.partial_inflection_power = 1.0;
        p.add_inflection_at(target, inflection_zoom_level);
        canvas.change_parameters(p, "animation-push-inflection", observer)?;
        write_frame(&mut canvas, frame_index, output_dir, observer)?;
        frame_index += 1;

        info!(inflection = i, target_count = targets.len(), "completed animation inflection step");
    }

    Ok(())
}

fn frame_budget(fps: u32, seconds_per_unit: f64, units: f64) -> u64 {
    ((fps as f64 * seconds_per_unit * units).round() as u64).max(1)
}

fn lerp_complex(a: Complex, b: Complex, t: f64) -> Complex {
    Complex::new(a.re + (b.re - a.re) * t, a.im + (b.im - a.im) * t)
}

fn apply_view(canvas: &mut FractalCanvas, center: Complex, zoom: f64, observer: &dyn Observer) -> Result<(), AppError> {
    let mut p = canvas.params().clone();
    p.set_center_and_zoom(center, zoom);
    canvas.change_parameters(p, "animation-frame", observer)?;
    Ok(())
}

fn write_frame(canvas: &mut FractalCanvas, frame_index: u64, output_dir: &Path, observer: &dyn Observer) -> Result<(), AppError> {
    canvas.enqueue_render(observer)?;
    canvas.enqueue_bitmap_render(true, false, observer);

    let path = output_dir.join(format!("frame{frame_index:06}.png"));
    let p = canvas.params();
    let metadata = ExportMetadata {
        formula_name: p.formula_meta().map(|m| m.name.to_string()).unwrap_or_default(),
        center_re: p.center.re.to_string(),
        center_im: p.center.im.to_string(),
        zoom_level: p.zoom_level.to_string(),
        max_iterations: p.max_iters,
        oversampling: p.oversampling,
        julia_c_re: p.julia.then(|| p.julia_seed.re.to_string()),
        julia_c_im: p.julia.then(|| p.julia_seed.im.to_string()),
    };
    export_png(canvas.bitmap(), &path, &metadata)?;
    info!(frame = frame_index, path = %path.display(), "wrote animation frame");
    Ok(())
}
