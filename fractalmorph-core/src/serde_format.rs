use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::complex::Complex;
use crate::error::CoreError;
use crate::gradient::Rgb;
use crate::params::FractalParameters;

pub const PROGRAM_VERSION: f64 = 7.0;
const LEGACY_VERSION_CUTOFF: f64 = 6.0;

#[derive(Debug, Serialize, Deserialize)]
struct ComplexDoc {
    #[serde(rename = "Re")]
    re: f64,
    #[serde(rename = "Im")]
    im: f64,
}

impl From<Complex> for ComplexDoc {
    fn from(c: Complex) -> Self {
        Self { re: c.re, im: c.im }
    }
}

impl From<ComplexDoc> for Complex {
    fn from(c: ComplexDoc) -> Self {
        Complex::new(c.re, c.im)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RgbDoc {
    r: u8,
    g: u8,
    b: u8,
}

impl From<Rgb> for RgbDoc {
    fn from(c: Rgb) -> Self {
        Self { r: c.r, g: c.g, b: c.b }
    }
}

impl From<RgbDoc> for Rgb {
    fn from(c: RgbDoc) -> Self {
        Rgb::new(c.r, c.g, c.b)
    }
}

/// The current-schema document shape (`programVersion >= 6.0`).
///
/// Field order here is the output key order; the writer always emits
/// this exact shape, stamped with the crate's own `PROGRAM_VERSION`.
#[derive(Debug, Serialize, Deserialize)]
struct ParamsDocument {
    #[serde(rename = "programVersion")]
    program_version: f64,
    oversampling: u32,
    #[serde(rename = "screenWidth")]
    screen_width: u32,
    #[serde(rename = "screenHeight")]
    screen_height: u32,
    rotation_angle: f64,
    #[serde(rename = "center")]
    center: ComplexDoc,
    #[serde(rename = "zoomLevel")]
    zoom_level: f64,
    #[serde(rename = "maxIters")]
    max_iters: u32,
    #[serde(rename = "juliaSeed")]
    julia_seed: ComplexDoc,
    julia: bool,
    formula_identifier: u32,
    post_transformation_type: u8,
    pre_transformation_type: u8,
    #[serde(rename = "inflectionCount")]
    inflection_count: u32,
    #[serde(rename = "inflectionZoomLevel")]
    inflection_zoom_level: f64,
    #[serde(rename = "inflectionCoords")]
    inflection_coords: Vec<ComplexDoc>,
    #[serde(rename = "gradientSpeed")]
    gradient_speed: f64,
    #[serde(rename = "gradientOffset")]
    gradient_offset: f64,
    #[serde(rename = "gradientColors")]
    gradient_colors: Vec<RgbDoc>,
}

impl From<&FractalParameters> for ParamsDocument {
    fn from(p: &FractalParameters) -> Self {
        Self {
            program_version: PROGRAM_VERSION,
            oversampling: p.oversampling,
            screen_width: p.target_width,
            screen_height: p.target_height,
            rotation_angle: p.rotation_angle,
            center: p.center.into(),
            zoom_level: p.zoom_level,
            max_iters: p.max_iters,
            julia_seed: p.julia_seed.into(),
            julia: p.julia,
            formula_identifier: p.procedure_id,
            post_transformation_type: p.post_transformation_type,
            pre_transformation_type: p.pre_transformation_type,
            inflection_count: p.inflections.len() as u32,
            inflection_zoom_level: p.inflection_zoom_level,
            inflection_coords: p.inflections.iter().copied().map(Into::into).collect(),
            gradient_speed: p.gradient_speed,
            gradient_offset: p.gradient_offset,
            gradient_colors: p.gradient_colors.iter().copied().map(Into::into).collect(),
        }
    }
}

/// Serializes to pretty-printed JSON with 2-space indentation and the
/// stable key order declared by [`ParamsDocument`].
pub fn to_json(p: &FractalParameters) -> Result<String, CoreError> {
    let doc = ParamsDocument::from(p);
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Parses a parameter document and applies it onto `target`.
///
/// Keys absent from the document leave the corresponding field on
/// `target` untouched (per the format's "default to current value"
/// contract). Documents with `programVersion` missing or `< 6.0` are
/// read using the legacy `width`/`height`/`transformation_type` key
/// names instead of the current schema's names. A malformed document
/// leaves `target` entirely unmutated.
pub fn apply_json(target: &mut FractalParameters, text: &str) -> Result<(), CoreError> {
    let value: Value = serde_json::from_str(text)?;
    let obj = value.as_object().ok_or_else(|| {
        CoreError::out_of_range("parameter document must be a JSON object")
    });
    let obj = obj?;

    let program_version = obj.get("programVersion").and_then(Value::as_f64);
    let is_legacy = program_version.map(|v| v < LEGACY_VERSION_CUTOFF).unwrap_or(true);

    let mut next = target.clone();

    if let Some(w) = field_u32(obj, if is_legacy { "width" } else { "screenWidth" }) {
        next.target_width = w;
    }
    if let Some(h) = field_u32(obj, if is_legacy { "height" } else { "screenHeight" }) {
        next.target_height = h;
    }
    if let Some(o) = field_u32(obj, "oversampling") {
        next.oversampling = o;
    }
    if let Some(a) = field_f64(obj, "rotation_angle") {
        next.rotation_angle = a;
    }

    let mut center = next.center;
    if let Some(c) = obj.get("center").and_then(|v| parse_complex(v)) {
        center = c;
    }
    let zoom_level = field_f64(obj, "zoomLevel").unwrap_or(next.zoom_level);
    next.set_center_and_zoom(center, zoom_level);

    if let Some(m) = field_u32(obj, "maxIters") {
        next.set_max_iterations(m)?;
    }
    if let Some(seed) = obj.get("juliaSeed").and_then(|v| parse_complex(v)) {
        next.julia_seed = seed;
    }
    if let Some(j) = obj.get("julia").and_then(Value::as_bool) {
        next.julia = j;
    }
    if let Some(f) = field_u32(obj, "formula_identifier") {
        next.procedure_id = f;
    }

    if is_legacy {
        if let Some(t) = field_u32(obj, "transformation_type") {
            next.pre_transformation_type = t as u8;
        }
    } else {
        if let Some(t) = field_u32(obj, "pre_transformation_type") {
            next.pre_transformation_type = t as u8;
        }
        if let Some(t) = field_u32(obj, "post_transformation_type") {
            next.post_transformation_type = t as u8;
        }
    }

    if let Some(coords) = obj.get("inflectionCoords").and_then(Value::as_array) {
        let parsed: Option<Vec<Complex>> = coords.iter().map(parse_complex).collect();
        if let Some(parsed) = parsed {
            next.inflections = parsed;
        }
    }
    if let Some(z) = field_f64(obj, "inflectionZoomLevel") {
        next.inflection_zoom_level = z;
    }

    if let Some(s) = field_f64(obj, "gradientSpeed") {
        next.set_gradient_speed(s);
    }
    if let Some(o) = field_f64(obj, "gradientOffset") {
        next.set_gradient_offset(o);
    }
    if let Some(colors) = obj.get("gradientColors").and_then(Value::as_array) {
        let parsed: Option<Vec<Rgb>> = colors.iter().map(parse_rgb).collect();
        if let Some(parsed) = parsed {
            next.set_gradient_colors(parsed);
        }
    }

    *target = next;
    Ok(())
}

fn field_u32(obj: &serde_json::Map<String, Value>, key: &str) -> Option<u32> {
    obj.get(key).and_then(Value::as_u64).map(|v| v as u32)
}

fn field_f64(obj: &serde_json::Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

fn parse_complex(value: &Value) -> Option<Complex> {
    let re = value.get("Re").and_then(Value::as_f64)?;
    let im = value.get("Im").and_then(Value::as_f64)?;
    Some(Complex::new(re, im))
}

fn parse_rgb(value: &Value) -> Option<Rgb> {
    let r = value.get("r").and_then(Value::as_u64)? as u8;
    let g = value.get("g").and_then(Value::as_u64)? as u8;
    let b = value.get("b").and_then(Value::as_u64)? as u8;
    Some(Rgb::new(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_current_schema() {
        let mut p = FractalParameters::new(640, 480).unwrap();
        p.add_inflection(Complex::new(0.1, -0.2));
        p.set_gradient_offset(0.3);

        let json = to_json(&p).unwrap();
        let mut loaded = FractalParameters::new(640, 480).unwrap();
        apply_json(&mut loaded, &json).unwrap();

        assert_eq!(loaded.inflections, p.inflections);
        assert_eq!(loaded.max_iters, p.max_iters);
        assert!((loaded.gradient_offset - p.gradient_offset).abs() < 1e-12);
    }

    #[test]
    fn missing_keys_leave_current_value() {
        let mut p = FractalParameters::new(640, 480).unwrap();
        p.max_iters = 5000;
        apply_json(&mut p, "{}").unwrap();
        assert_eq!(p.max_iters, 5000);
    }

    #[test]
    fn legacy_width_height_keys_are_accepted() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        let legacy = r#"{"programVersion": 5.0, "width": 320, "height": 200, "transformation_type": 2}"#;
        apply_json(&mut p, legacy).unwrap();
        assert_eq!(p.target_width, 320);
        assert_eq!(p.target_height, 200);
        assert_eq!(p.pre_transformation_type, 2);
    }

    #[test]
    fn absent_program_version_is_treated_as_legacy() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        let doc = r#"{"width": 50, "height": 60}"#;
        apply_json(&mut p, doc).unwrap();
        assert_eq!(p.target_width, 50);
        assert_eq!(p.target_height, 60);
    }

    #[test]
    fn malformed_document_leaves_target_unchanged() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        let before = p.clone();
        let err = apply_json(&mut p, "not json").unwrap_err();
        assert!(matches!(err, CoreError::ParseError(_)));
        assert_eq!(p, before);
    }

    #[test]
    fn max_iters_present_in_document_is_applied() {
        // Regression test for the fixed parse-and-discard defect: a
        // present `maxIters` key must always be applied.
        let mut p = FractalParameters::new(100, 100).unwrap();
        let doc = r#"{"programVersion": 7.0, "maxIters": 42}"#;
        apply_json(&mut p, doc).unwrap();
        assert_eq!(p.max_iters, 42);
    }

    #[test]
    fn zero_max_iters_in_document_is_rejected() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        let before = p.clone();
        let doc = r#"{"programVersion": 7.0, "maxIters": 0}"#;
        let err = apply_json(&mut p, doc).unwrap_err();
        assert!(matches!(err, CoreError::InvalidMaxIterations(0)));
        assert_eq!(p, before);
    }

    #[test]
    fn writer_stamps_current_program_version() {
        let mut p = FractalParameters::new(100, 100).unwrap();
        let legacy = r#"{"programVersion": 5.0, "width": 100, "height": 100}"#;
        apply_json(&mut p, legacy).unwrap();
        let json = to_json(&p).unwrap();
        assert!(json.contains(&format!("{}", PROGRAM_VERSION)));
    }
}
