use crate::complex::Complex;
use crate::error::CoreError;

/// Numeric identifiers selecting an iteration kernel.
///
/// These values are stored in serialized parameter files, so they are
/// part of the on-disk format and must never be renumbered.
pub mod procedure_id {
    pub const MANDELBROT_2: u32 = 4;
    pub const BURNING_SHIP: u32 = 5;
    pub const MANDELBROT_3: u32 = 6;
    pub const MANDELBROT_4: u32 = 7;
    pub const MANDELBROT_5: u32 = 8;
    pub const TRIPLE_MATCHMAKER: u32 = 11;
    pub const CHECKERS: u32 = 12;
    pub const HIGH_POWER: u32 = 13;
    pub const TEST_CONTROL: u32 = 15;
}

/// Static metadata describing one entry of the formula registry.
#[derive(Debug, Clone, Copy)]
pub struct FormulaMeta {
    pub id: u32,
    pub name: &'static str,
    pub is_guessable: bool,
    pub is_escape_time: bool,
    pub inflection_power: u32,
    pub escape_radius: f64,
}

impl FormulaMeta {
    #[inline]
    pub fn escape_radius_sq(&self) -> f64 {
        self.escape_radius * self.escape_radius
    }
}

const HIGH_POWER_EXPONENT: u32 = 1 << 25;

const REGISTRY: &[FormulaMeta] = &[
    FormulaMeta {
        id: procedure_id::MANDELBROT_2,
        name: "mandelbrot-2",
        is_guessable: true,
        is_escape_time: true,
        inflection_power: 2,
        escape_radius: 256.0,
    },
    FormulaMeta {
        id: procedure_id::BURNING_SHIP,
        name: "burning-ship",
        is_guessable: false,
        is_escape_time: true,
        inflection_power: 2,
        escape_radius: 256.0,
    },
    FormulaMeta {
        id: procedure_id::MANDELBROT_3,
        name: "mandelbrot-3",
        is_guessable: true,
        is_escape_time: true,
        inflection_power: 3,
        escape_radius: 256.0,
    },
    FormulaMeta {
        id: procedure_id::MANDELBROT_4,
        name: "mandelbrot-4",
        is_guessable: true,
        is_escape_time: true,
        inflection_power: 4,
        // 2^(2/3), the bailout radius that keeps the |z|^4 comparison well
        // scaled for this formula.
        escape_radius: 1.587_401_051_968_199_5,
    },
    FormulaMeta {
        id: procedure_id::MANDELBROT_5,
        name: "mandelbrot-5",
        is_guessable: true,
        is_escape_time: true,
        inflection_power: 5,
        // 2^(2/4)
        escape_radius: std::f64::consts::SQRT_2,
    },
    FormulaMeta {
        id: procedure_id::TRIPLE_MATCHMAKER,
        name: "triple-matchmaker",
        is_guessable: false,
        is_escape_time: false,
        inflection_power: 2,
        escape_radius: 550.0,
    },
    FormulaMeta {
        id: procedure_id::CHECKERS,
        name: "checkers",
        is_guessable: true,
        is_escape_time: false,
        inflection_power: 2,
        escape_radius: 256.0,
    },
    FormulaMeta {
        id: procedure_id::HIGH_POWER,
        name: "high-power",
        is_guessable: true,
        is_escape_time: true,
        inflection_power: HIGH_POWER_EXPONENT,
        escape_radius: 256.0,
    },
    FormulaMeta {
        id: procedure_id::TEST_CONTROL,
        name: "test-control",
        is_guessable: true,
        is_escape_time: true,
        inflection_power: 2,
        escape_radius: 256.0,
    },
];

/// Looks up the static metadata for a `procedure_id`.
pub fn lookup(id: u32) -> Result<FormulaMeta, CoreError> {
    REGISTRY
        .iter()
        .copied()
        .find(|f| f.id == id)
        .ok_or(CoreError::UnknownFormula(id))
}

/// Returns `true` if `c` lies inside the main cardioid of the power-2 Mandelbrot set.
#[inline]
pub fn in_cardioid(re: f64, im: f64) -> bool {
    let im2 = im * im;
    let q = (re - 0.25) * (re - 0.25) + im2;
    q * (q + (re - 0.25)) <= 0.25 * im2
}

/// Returns `true` if `c` lies inside the period-2 bulb of the power-2 Mandelbrot set.
#[inline]
pub fn in_period2_bulb(re: f64, im: f64) -> bool {
    (re + 1.0) * (re + 1.0) + im * im <= 0.0625
}

/// `true` when `norm_sq` should be treated as "escaped".
///
/// Phrased as the negation of the bounded-magnitude predicate rather than
/// the forward `norm_sq > radius_sq` test so that `NaN` operands (which
/// make every ordinary comparison `false`) are classified as escaped. This
/// keeps the scalar kernel's semantics identical to the SIMD kernel's
/// XOR-with-all-true escape mask.
#[inline]
pub fn has_escaped(norm_sq: f64, radius_sq: f64) -> bool {
    !(norm_sq <= radius_sq)
}

/// Iterates a single sample for the given procedure and returns the
/// iteration count at which it escaped, or `max_iters` if it did not.
///
/// `c` is the per-point plane coordinate and `z0` the iteration seed;
/// the caller (the `FractalParameters`/canvas layer) decides which of the
/// two is the fixed Julia seed and which varies per pixel.
pub fn iterate_point(meta: &FormulaMeta, c: Complex, z0: Complex, max_iters: u32) -> u32 {
    match meta.id {
        procedure_id::MANDELBROT_2 => mandelbrot_2(c, z0, max_iters, meta.escape_radius_sq()),
        procedure_id::BURNING_SHIP => burning_ship(c, z0, max_iters, meta.escape_radius_sq()),
        procedure_id::MANDELBROT_3 => mandelbrot_n(c, z0, max_iters, meta.escape_radius_sq(), 3),
        procedure_id::MANDELBROT_4 => mandelbrot_n(c, z0, max_iters, meta.escape_radius_sq(), 4),
        procedure_id::MANDELBROT_5 => mandelbrot_n(c, z0, max_iters, meta.escape_radius_sq(), 5),
        procedure_id::HIGH_POWER => {
            mandelbrot_n(c, z0, max_iters, meta.escape_radius_sq(), HIGH_POWER_EXPONENT)
        }
        procedure_id::TRIPLE_MATCHMAKER => triple_matchmaker(c, max_iters),
        procedure_id::CHECKERS => checkers(c),
        procedure_id::TEST_CONTROL => mandelbrot_n(c, z0, 100, meta.escape_radius_sq(), 2),
        _ => unreachable!("unknown procedure id reached the kernel dispatch: {}", meta.id),
    }
}

fn mandelbrot_2(c: Complex, z0: Complex, max_iters: u32, radius_sq: f64) -> u32 {
    if z0.re == 0.0 && z0.im == 0.0 && (in_cardioid(c.re, c.im) || in_period2_bulb(c.re, c.im)) {
        return max_iters;
    }

    let mut z = z0;
    for n in 0..max_iters {
        z = Complex::new(z.re * z.re - z.im * z.im + c.re, 2.0 * z.re * z.im + c.im);
        if has_escaped(z.norm_sq(), radius_sq) {
            return n;
        }
    }
    max_iters
}

fn mandelbrot_n(c: Complex, z0: Complex, max_iters: u32, radius_sq: f64, n: u32) -> u32 {
    let mut z = z0;
    for i in 0..max_iters {
        z = z.powi(n) + c;
        if has_escaped(z.norm_sq(), radius_sq) {
            return i;
        }
    }
    max_iters
}

fn burning_ship(c: Complex, z0: Complex, max_iters: u32, radius_sq: f64) -> u32 {
    let mut z = z0;
    for n in 0..max_iters {
        let folded = Complex::new(z.re.abs(), z.im.abs());
        z = folded * folded + c;
        if has_escaped(z.norm_sq(), radius_sq) {
            return n;
        }
    }
    max_iters
}

/// Fixed-iteration accumulator formula; not an escape-time procedure.
///
/// Blends three rotated copies of the quadratic map with weights `a`, `b`,
/// `d` and accumulates `|g(z, c)|` at each step. The integer part of the
/// total is returned as the "iteration count".
fn triple_matchmaker(c: Complex, max_iters: u32) -> u32 {
    const A: f64 = 2.2;
    const B: f64 = 1.4;
    const D: f64 = 1.1;
    let sqrt3 = 3.0_f64.sqrt();
    let rot1 = Complex::new(-0.5, sqrt3 / 2.0);
    let rot2 = Complex::new(-0.5, -sqrt3 / 2.0);

    let mut z = Complex::ZERO;
    let mut acc = 0.0_f64;
    for _ in 0..max_iters {
        let z2 = z * z;
        let g = z2 * A + (z2 * rot1) * B + (z2 * rot2) * D + c;
        acc += g.norm();
        z = g;
        if !z.re.is_finite() || !z.im.is_finite() {
            break;
        }
    }
    (acc as u32).min(max_iters)
}

/// Synthetic tiled/angular classification used to visualize inflections.
///
/// Not escape-time: returns one of two fixed constants based on which
/// side of a unit-tile diagonal `c` falls on.
fn checkers(c: Complex) -> u32 {
    let tile_x = c.re.rem_euclid(1.0);
    let tile_y = c.im.rem_euclid(1.0);
    let angular = (tile_x - 0.5).atan2(tile_y - 0.5);
    if angular >= 0.0 {
        503
    } else {
        53
    }
}
