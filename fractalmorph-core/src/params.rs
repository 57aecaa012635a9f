use crate::complex::Complex;
use crate::error::CoreError;
use crate::formula::{self, FormulaMeta};
use crate::gradient::{GradientFactors, Rgb};

/// Analytic map applied to the plane coordinate before or after the
/// inflection fold. Values 0-7 index [`TransformationType::TABLE`].
pub type TransformationType = u8;

pub mod transformation {
    use super::TransformationType;

    pub const IDENTITY: TransformationType = 0;
    pub const QUINTIC_NEST: TransformationType = 1;
    pub const COS: TransformationType = 2;
    pub const CONSTANT_OFFSET: TransformationType = 3;
    pub const SQRT: TransformationType = 4;
    pub const FOURTH_ROOT: TransformationType = 5;
    pub const LOG: TransformationType = 6;
    pub const PARTIAL_INFLECTION: TransformationType = 7;
}

/// An immutable-per-render snapshot of everything needed to map a pixel to
/// a plane coordinate, iterate it, and color the result.
///
/// A render takes a by-value copy of this struct (including the
/// inflection vector) at dispatch time, so a render is immune to
/// concurrent mutation by the controller thread.
#[derive(Debug, Clone, PartialEq)]
pub struct FractalParameters {
    pub target_width: u32,
    pub target_height: u32,
    pub oversampling: u32,
    pub bitmap_zoom: u32,

    pub center: Complex,
    pub x_range: f64,
    pub y_range: f64,
    pub zoom_level: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    topleft_corner: Complex,

    pub max_iters: u32,

    pub julia: bool,
    pub julia_seed: Complex,

    pub procedure_id: u32,

    pub inflections: Vec<Complex>,
    pub inflection_zoom_level: f64,

    pub pre_transformation_type: TransformationType,
    pub post_transformation_type: TransformationType,
    pub partial_inflection_power: f64,
    pub partial_inflection_coord: Complex,

    pub rotation_angle: f64,
    pub center_of_rotation: Complex,
    rotation_factor: Complex,

    pub gradient_colors: Vec<Rgb>,
    pub gradient_speed: f64,
    pub gradient_offset: f64,
    gradient_factors: GradientFactors,
}

fn default_palette() -> Vec<Rgb> {
    vec![
        Rgb::new(0, 7, 100),
        Rgb::new(32, 107, 203),
        Rgb::new(237, 255, 255),
        Rgb::new(255, 170, 0),
        Rgb::new(0, 2, 0),
    ]
}

impl FractalParameters {
    /// Canvas-side dimensions are supplied separately since they are owned
    /// by `FractalCanvas`, not reset by [`Self::reset`].
    pub fn new(target_width: u32, target_height: u32) -> Result<Self, CoreError> {
        let mut p = Self {
            target_width,
            target_height,
            oversampling: 1,
            bitmap_zoom: 1,
            center: Complex::ZERO,
            x_range: 4.0,
            y_range: 4.0,
            zoom_level: 0.0,
            pixel_width: 0.0,
            pixel_height: 0.0,
            topleft_corner: Complex::ZERO,
            max_iters: 1000,
            julia: false,
            julia_seed: Complex::ZERO,
            procedure_id: formula::procedure_id::MANDELBROT_2,
            inflections: Vec::new(),
            inflection_zoom_level: 0.0,
            pre_transformation_type: transformation::IDENTITY,
            post_transformation_type: transformation::IDENTITY,
            partial_inflection_power: 1.0,
            partial_inflection_coord: Complex::ZERO,
            rotation_angle: 0.0,
            center_of_rotation: Complex::ZERO,
            rotation_factor: Complex::new(1.0, 0.0),
            gradient_colors: default_palette(),
            gradient_speed: 1.0,
            gradient_offset: 0.0,
            gradient_factors: GradientFactors::compute(1.0, 0.0, 5),
        };
        p.validate_dimensions()?;
        p.recompute_geometry();
        Ok(p)
    }

    fn validate_dimensions(&self) -> Result<(), CoreError> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(CoreError::out_of_range("target dimensions must be > 0"));
        }
        if self.oversampling == 0 {
            return Err(CoreError::out_of_range("oversampling must be >= 1"));
        }
        if self.bitmap_zoom == 0 {
            return Err(CoreError::out_of_range("bitmap_zoom must be >= 1"));
        }
        if self.oversampling > 1 && self.bitmap_zoom > 1 {
            return Err(CoreError::out_of_range(
                "oversampling and bitmap_zoom are mutually exclusive",
            ));
        }
        Ok(())
    }

    /// Resets every field to the documented startup defaults, except the
    /// canvas-owned `target_width`/`target_height`.
    pub fn reset(&mut self) {
        let (w, h) = (self.target_width, self.target_height);
        *self = Self::new(w, h).expect("default parameters are always valid");
    }

    fn recompute_geometry(&mut self) {
        self.x_range = 4.0 * 2f64.powf(-self.zoom_level);
        self.y_range = self.x_range * self.target_height as f64 / self.target_width as f64;
        self.pixel_width = self.x_range / (self.target_width * self.oversampling) as f64;
        self.pixel_height = self.y_range / (self.target_height * self.oversampling) as f64;
        self.topleft_corner = Complex::new(
            self.center.re - self.x_range / 2.0,
            self.center.im + self.y_range / 2.0,
        );
    }

    /// Recomputes `x_range`, `y_range`, `pixel_width`, `pixel_height`, and
    /// the top-left corner. Returns whether anything actually changed.
    pub fn set_center_and_zoom(&mut self, center: Complex, zoom: f64) -> bool {
        if self.center == center && self.zoom_level == zoom {
            return false;
        }
        self.center = center;
        self.zoom_level = zoom;
        self.recompute_geometry();
        true
    }

    /// Rotates the viewport about its *current* center, not a stale pivot
    /// left over from a previous rotation.
    pub fn set_rotation(&mut self, angle: f64) {
        let visible_center = self.center_of_rotation
            + (self.center - self.center_of_rotation) * self.rotation_factor;
        self.center = visible_center;
        self.center_of_rotation = visible_center;
        self.rotation_angle = angle;
        let theta = 2.0 * std::f64::consts::PI * angle;
        self.rotation_factor = Complex::new(theta.cos(), theta.sin());
    }

    #[inline]
    fn rotate(&self, z: Complex) -> Complex {
        self.center_of_rotation + (z - self.center_of_rotation) * self.rotation_factor
    }

    /// The formula's generic `inflection_power`, used by [`Self::inflections`]
    /// and by the animation's partial-inflection zoom correction.
    pub fn formula_meta(&self) -> Result<FormulaMeta, CoreError> {
        formula::lookup(self.procedure_id)
    }

    /// Pushes a new inflection, recentering on the origin at a zoom scaled
    /// to keep the feature at the same apparent size.
    pub fn add_inflection(&mut self, c: Complex) {
        self.inflections.push(c);
        let n = self.inflections.len() as i32;
        self.set_center_and_zoom(Complex::ZERO, self.inflection_zoom_level * 2f64.powi(-n));
    }

    /// Like [`Self::add_inflection`] but lets the caller supply the
    /// `(center, zoom)` pair to capture *before* the push (used by the
    /// animator, which tracks pre-transformation coordinates directly).
    pub fn add_inflection_at(&mut self, c: Complex, inflection_zoom_level: f64) {
        self.inflection_zoom_level = inflection_zoom_level;
        self.add_inflection(c);
    }

    /// Pops the most recent inflection. If the stack becomes empty, the
    /// view recenters on the removed point; otherwise it recenters on the
    /// origin with zoom scaled symmetrically to `add_inflection`.
    pub fn remove_inflection(&mut self) -> Option<Complex> {
        let removed = self.inflections.pop()?;
        let n = self.inflections.len() as i32;
        if self.inflections.is_empty() {
            self.set_center_and_zoom(removed, self.inflection_zoom_level);
        } else {
            self.set_center_and_zoom(Complex::ZERO, self.inflection_zoom_level * 2f64.powi(-n));
        }
        Some(removed)
    }

    /// Captures the current zoom level *uncorrected*, i.e. pre-multiplied
    /// by `2^n` so that the next [`Self::add_inflection`] divides it back
    /// down to the zoom level actually in effect right now.
    pub fn set_inflection_zoom_level(&mut self) {
        let n = self.inflections.len() as i32;
        self.inflection_zoom_level = self.zoom_level * 2f64.powi(n);
    }

    /// Toggles Julia mode. Enabling samples the fully-transformed point at
    /// the current center as the new Julia seed and resets the view to the
    /// origin; disabling jumps to the seed itself.
    pub fn toggle_julia(&mut self) {
        if self.julia {
            self.julia = false;
            self.set_center_and_zoom(self.julia_seed, 0.0);
        } else {
            self.julia_seed = self.transform_point(self.center);
            self.julia = true;
            self.set_center_and_zoom(Complex::ZERO, 0.0);
        }
    }

    pub fn set_gradient_speed(&mut self, speed: f64) {
        self.gradient_speed = speed;
        self.refresh_gradient_factors();
    }

    pub fn set_gradient_offset(&mut self, offset: f64) {
        self.gradient_offset = offset - offset.floor();
        self.refresh_gradient_factors();
    }

    pub fn set_gradient_colors(&mut self, colors: Vec<Rgb>) {
        self.gradient_colors = colors;
        self.refresh_gradient_factors();
    }

    fn refresh_gradient_factors(&mut self) {
        self.gradient_factors = GradientFactors::compute(
            self.gradient_speed,
            self.gradient_offset,
            self.gradient_colors.len(),
        );
    }

    pub fn gradient_factors(&self) -> GradientFactors {
        self.gradient_factors
    }

    /// Maps an (oversampled) sample coordinate to the corresponding point
    /// on the complex plane, before any rotation or transformation.
    #[inline]
    pub fn map(&self, i: f64, j: f64) -> Complex {
        Complex::new(
            self.topleft_corner.re + i * self.pixel_width,
            self.topleft_corner.im - j * self.pixel_height,
        )
    }

    pub fn pre_transformation(&self, z: Complex) -> Complex {
        apply_transformation(self.pre_transformation_type, z, self)
    }

    pub fn post_transformation(&self, z: Complex) -> Complex {
        apply_transformation(self.post_transformation_type, z, self)
    }

    /// Folds the inflection stack newest-first: `z := z^k + p_i` for
    /// `i = n-1 .. 0`.
    pub fn inflections(&self, mut z: Complex, inflection_power: u32) -> Complex {
        if inflection_power == 2 {
            return self.inflections_m2(z);
        }
        for &p in self.inflections.iter().rev() {
            z = z.powi(inflection_power) + p;
        }
        z
    }

    /// Specialized power-2 fold using the scalar recurrence directly,
    /// avoiding the general `powi` call in the hot path.
    pub fn inflections_m2(&self, mut z: Complex) -> Complex {
        for &p in self.inflections.iter().rev() {
            z = Complex::new(z.re * z.re - z.im * z.im + p.re, 2.0 * z.re * z.im + p.im);
        }
        z
    }

    /// `post_transformation(inflections(pre_transformation(rotation(z))))`.
    fn transform_point(&self, z: Complex) -> Complex {
        let inflection_power = self
            .formula_meta()
            .map(|m| m.inflection_power)
            .unwrap_or(2);
        let z = self.rotate(z);
        let z = self.pre_transformation(z);
        let z = self.inflections(z, inflection_power);
        self.post_transformation(z)
    }

    /// `post_transformation(inflections(pre_transformation(rotation(map(i,j)))))`.
    #[inline]
    pub fn map_with_transformations(&self, i: f64, j: f64) -> Complex {
        self.transform_point(self.map(i, j))
    }

    /// Re-derives geometry after the canvas changes dimensions. Does not
    /// touch `center`/`zoom_level`; callers decide whether to preserve or
    /// reset the view.
    pub fn resize(&mut self, target_width: u32, target_height: u32) -> Result<(), CoreError> {
        self.target_width = target_width;
        self.target_height = target_height;
        self.validate_dimensions()?;
        self.recompute_geometry();
        Ok(())
    }

    pub fn set_oversampling(&mut self, oversampling: u32) -> Result<(), CoreError> {
        self.oversampling = oversampling;
        self.validate_dimensions()?;
        self.recompute_geometry();
        Ok(())
    }

    pub fn set_max_iterations(&mut self, max_iters: u32) -> Result<(), CoreError> {
        if max_iters == 0 {
            return Err(CoreError::InvalidMaxIterations(max_iters));
        }
        self.max_iters = max_iters;
        Ok(())
    }
}

fn apply_transformation(kind: TransformationType, z: Complex, params: &FractalParameters) -> Complex {
    match kind {
        transformation::IDENTITY => z,
        transformation::QUINTIC_NEST => {
            let c = z;
            let mut w = z;
            for _ in 0..5 {
                w = w * w + c;
            }
            w
        }
        transformation::COS => z.cos(),
        transformation::CONSTANT_OFFSET => z + Complex::new(2.0, 2.0),
        transformation::SQRT => z.sqrt(),
        transformation::FOURTH_ROOT => z.sqrt().sqrt(),
        transformation::LOG => z.ln(),
        transformation::PARTIAL_INFLECTION => {
            z.powf(params.partial_inflection_power) + params.partial_inflection_coord
        }
        _ => z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    #[test]
    fn default_geometry() {
        let p = FractalParameters::new(600, 600).unwrap();
        assert!((p.x_range - 4.0).abs() < EPSILON);
        assert!((p.y_range - 4.0).abs() < EPSILON);
        assert!((p.pixel_width * p.target_width as f64 * p.oversampling as f64 - p.x_range).abs() < EPSILON);
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(FractalParameters::new(0, 100).is_err());
        assert!(FractalParameters::new(100, 0).is_err());
    }

    #[test]
    fn rejects_simultaneous_oversampling_and_bitmap_zoom() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        p.bitmap_zoom = 2;
        assert!(p.set_oversampling(2).is_err());
    }

    #[test]
    fn set_center_and_zoom_reports_change() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        assert!(!p.set_center_and_zoom(Complex::ZERO, 0.0));
        assert!(p.set_center_and_zoom(Complex::new(1.0, 0.0), 0.0));
    }

    #[test]
    fn zoom_level_matches_x_range_relation() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        p.set_center_and_zoom(Complex::ZERO, 2.0);
        assert!((p.x_range - 1.0).abs() < EPSILON);
    }

    #[test]
    fn rotation_roundtrip_returns_to_original_center() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        p.set_center_and_zoom(Complex::new(0.3, -0.2), 1.0);
        let original = p.center;
        p.set_rotation(0.25);
        p.set_rotation(0.0);
        assert!((p.center.re - original.re).abs() < 1e-9);
        assert!((p.center.im - original.im).abs() < 1e-9);
    }

    #[test]
    fn add_then_remove_inflection_is_identity() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        let c = Complex::new(0.1, -0.05);
        p.add_inflection(c);
        assert_eq!(p.inflections.len(), 1);
        let popped = p.remove_inflection().unwrap();
        assert_eq!(popped, c);
        assert_eq!(p.inflections.len(), 0);
    }

    #[test]
    fn map_returns_center_at_geometric_middle() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        p.set_center_and_zoom(Complex::new(0.5, -0.5), 0.0);
        let middle = p.map(50.0, 50.0);
        assert!((middle.re - p.center.re).abs() < 1e-6);
        assert!((middle.im - p.center.im).abs() < 1e-6);
    }

    #[test]
    fn toggle_julia_twice_restores_julia_flag() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        let was_julia = p.julia;
        p.toggle_julia();
        p.toggle_julia();
        assert_eq!(p.julia, was_julia);
    }

    #[test]
    fn toggle_julia_enabling_then_disabling_returns_to_seed() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        p.toggle_julia();
        let seed = p.julia_seed;
        p.toggle_julia();
        assert_eq!(p.center, seed);
    }

    #[test]
    fn identity_transformation_is_noop() {
        let p = FractalParameters::new(100, 100).unwrap();
        let z = Complex::new(1.2, -3.4);
        assert_eq!(p.pre_transformation(z), z);
    }

    #[test]
    fn gradient_offset_normalizes_into_unit_interval() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        p.set_gradient_offset(1.75);
        assert!((p.gradient_offset - 0.75).abs() < 1e-12);
    }

    #[test]
    fn inflections_m2_matches_generic_power_2_fold() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        p.add_inflection(Complex::new(0.1, 0.0));
        p.add_inflection(Complex::new(-0.5, 0.3));
        let z = Complex::new(0.2, 0.1);
        assert_eq!(p.inflections(z, 2), p.inflections_m2(z));
    }

    #[test]
    fn reset_restores_defaults_but_keeps_dimensions() {
        let mut p = FractalParameters::new(320, 240).unwrap();
        p.set_center_and_zoom(Complex::new(5.0, 5.0), 10.0);
        p.add_inflection(Complex::new(0.1, 0.1));
        p.reset();
        assert_eq!(p.target_width, 320);
        assert_eq!(p.target_height, 240);
        assert_eq!(p.inflections.len(), 0);
        assert_eq!(p.zoom_level, 0.0);
    }
}
