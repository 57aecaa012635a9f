//! Per-pixel gradient lookup and oversampling box-filter downsample.

use fractalmorph_core::gradient::sample_gradient;
use fractalmorph_core::{GradientFactors, Rgb};

use crate::bitmap::Bitmap;
use crate::iter_buffer::{IterBuffer, IterData};

/// Highlight colors used when `highlight_guessed` is set, distinguishing
/// guessed samples and interior ("minibrot") samples from ordinary escapes.
mod highlight {
    use fractalmorph_core::Rgb;

    pub const CALCULATED_MINIBROT: Rgb = Rgb::new(255, 0, 0);
    pub const GUESSED_MINIBROT: Rgb = Rgb::new(0, 0, 255);
    pub const GUESSED_ESCAPE: Rgb = Rgb::new(0, 255, 0);
}

/// Gradient configuration needed to color one sample.
#[derive(Clone, Debug)]
pub struct GradientConfig {
    pub colors: Vec<Rgb>,
    pub factors: GradientFactors,
    pub highlight_guessed: bool,
}

/// Colors a single sample per SPEC §4.5's classification.
#[inline]
pub fn color_sample(data: IterData, cfg: &GradientConfig) -> Rgb {
    if cfg.highlight_guessed {
        match (data.in_minibrot, data.guessed) {
            (true, false) => highlight::CALCULATED_MINIBROT,
            (true, true) => highlight::GUESSED_MINIBROT,
            (false, true) => highlight::GUESSED_ESCAPE,
            (false, false) => sample_gradient(&cfg.colors, data.iteration_count as f64, cfg.factors),
        }
    } else if data.in_minibrot {
        Rgb::BLACK
    } else {
        sample_gradient(&cfg.colors, data.iteration_count as f64, cfg.factors)
    }
}

/// Averages the `s²` samples of one bitmap pixel into an RGBA color.
#[inline]
pub fn average_pixel(samples: &[IterData], cfg: &GradientConfig) -> [u8; 4] {
    let n = samples.len();
    let (mut r, mut g, mut b) = (0u32, 0u32, 0u32);
    for &s in samples {
        let c = color_sample(s, cfg);
        r += c.r as u32;
        g += c.g as u32;
        b += c.b as u32;
    }
    [(r / n as u32) as u8, (g / n as u32) as u8, (b / n as u32) as u8, 255]
}

/// Colorizes the bitmap pixels `[px_min, px_max) × [py_min, py_max)`,
/// reading from `iter_buf` and writing into `bitmap`.
pub fn colorize_rect(
    iter_buf: &IterBuffer,
    bitmap: &mut Bitmap,
    px_min: u32,
    px_max: u32,
    py_min: u32,
    py_max: u32,
    cfg: &GradientConfig,
) {
    for py in py_min..py_max {
        for px in px_min..px_max {
            let samples = iter_buf.pixel_samples(px, py);
            let rgba = average_pixel(samples, cfg);
            bitmap.set_pixel(px, py, rgba);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fractalmorph_core::gradient::GradientFactors;

    fn cfg(highlight: bool) -> GradientConfig {
        GradientConfig {
            colors: vec![Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)],
            factors: GradientFactors::compute(1.0, 0.0, 2),
            highlight_guessed: highlight,
        }
    }

    #[test]
    fn minibrot_without_highlight_is_black() {
        let data = IterData::new(100, false, 100);
        assert_eq!(color_sample(data, &cfg(false)), Rgb::BLACK);
    }

    #[test]
    fn guessed_minibrot_is_blue_when_highlighted() {
        let data = IterData::new(100, true, 100);
        assert_eq!(color_sample(data, &cfg(true)), highlight::GUESSED_MINIBROT);
    }

    #[test]
    fn calculated_minibrot_is_red_when_highlighted() {
        let data = IterData::new(100, false, 100);
        assert_eq!(color_sample(data, &cfg(true)), highlight::CALCULATED_MINIBROT);
    }

    #[test]
    fn guessed_escape_is_green_when_highlighted() {
        let data = IterData::new(10, true, 100);
        assert_eq!(color_sample(data, &cfg(true)), highlight::GUESSED_ESCAPE);
    }

    #[test]
    fn average_pixel_mixes_channels() {
        let samples = [
            IterData::new(0, false, 100),
            IterData::new(100, false, 100),
        ];
        let rgba = average_pixel(&samples, &cfg(false));
        // One black (interior) sample, one gradient-colored escape sample
        // averaged together should not equal either extreme exactly.
        assert_eq!(rgba[3], 255);
    }

    #[test]
    fn colorize_rect_fills_requested_region() {
        let mut iter_buf = IterBuffer::new(4, 4, 1, 50);
        for y in 0..4 {
            for x in 0..4 {
                iter_buf.set(x, y, 10, false);
            }
        }
        let mut bitmap = Bitmap::new(4, 4);
        colorize_rect(&iter_buf, &mut bitmap, 1, 3, 1, 3, &cfg(false));
        // Pixel (0,0) untouched, should remain initial black-opaque.
        assert_eq!(bitmap.get_pixel(0, 0), [0, 0, 0, 255]);
    }
}
