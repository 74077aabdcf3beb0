//! Two point boundary value problems
//!
//! * [`build_g1`]: start and end position and heading given (G1 Hermite interpolation)
//! * [`build_forward`]: start pose and start curvature given, end position matched
//!
//! Both work in the chord frame, where the end points are (0, 0) and (1, 0) and the
//! headings are measured relative to the chord.
//! Adapted from Bertolazzi and Frego, *G1 fitting with clothoids*, Mathematical Methods
//! in the Applied Sciences, 2015.

use core::f64::consts::PI;

use finitediff::FiniteDiff;
use libm::{atan2, hypot};
use tracing::{debug, trace, warn};

use crate::clothoid::{wrap_angle, Clothoid};
use crate::error::{check_finite, ClothoidError, Result};
use crate::fresnel::{generalized_fresnel_cs, generalized_fresnel_cs_moments};
use crate::Float;

/// solver tolerance on the end point residual
pub const DEFAULT_TOLERANCE: Float = 1e-10;

const G1_MAX_ITERATIONS: usize = 20;
const FORWARD_MAX_ITERATIONS: usize = 60;
/// half width of the end heading bracket around the circular arc solution
const FORWARD_HALF_BRACKET: Float = 2.6;
/// keep the end heading strictly inside (-pi, pi)
const FORWARD_ANGLE_MARGIN: Float = 1e-6;

/// coefficients of the initial guess polynomial for A
#[allow(clippy::excessive_precision)]
const CF: [Float; 6] = [
    2.989696028701907,
    0.716228953608281,
    -0.458969738821509,
    -0.502821153340377,
    0.261062141752652,
    -0.045854475238709,
];

/// G1 solution in the chord frame
#[derive(Debug, Clone, Copy)]
struct ChordSolution {
    /// kappa0 * chord length
    kappa: Float,
    /// dk * chord length^2
    dk: Float,
    /// length / chord length
    length: Float,
    iterations: usize,
}

fn initial_guess(phi0: Float, phi1: Float) -> Float {
    let x = phi0 / PI;
    let y = phi1 / PI;
    let xy = x * y;
    let x = x * x;
    let y = y * y;
    (phi0 + phi1)
        * (CF[0]
            + xy * (CF[1] + xy * CF[2])
            + (CF[3] + xy * CF[4]) * (x + y)
            + CF[5] * (x * x + y * y))
}

/// solve for A = dk * L^2 / 2 with the chord normalized to unit length
fn solve_chord_frame(phi0: Float, phi1: Float, tol: Float) -> Result<ChordSolution> {
    let delta = phi1 - phi0;
    let mut a = initial_guess(phi0, phi1);
    let mut converged = false;
    let mut iterations = 0;
    let mut residual = Float::INFINITY;
    while iterations < G1_MAX_ITERATIONS {
        let (int_c, int_s) = generalized_fresnel_cs_moments(3, 2.0 * a, delta - a, phi0);
        let g = int_s[0];
        residual = g.abs();
        trace!("g1 iteration {iterations}: A {a:e} g {g:e}");
        if residual < tol {
            converged = true;
            break;
        }
        let dg = int_c[2] - int_c[1];
        if dg == 0.0 || !dg.is_finite() {
            return Err(ClothoidError::degenerate(format!(
                "g1 derivative vanished at A = {a}"
            )));
        }
        a -= g / dg;
        iterations += 1;
    }
    if !converged {
        return Err(ClothoidError::nonconvergence("g1", iterations, residual));
    }

    let (x, _) = generalized_fresnel_cs(2.0 * a, delta - a, phi0);
    let length = 1.0 / x;
    if length <= 0.0 || !length.is_finite() {
        return Err(ClothoidError::degenerate(format!(
            "g1 root A = {a} gives non-positive length {length}"
        )));
    }
    Ok(ChordSolution {
        kappa: (delta - a) / length,
        dk: 2.0 * a / (length * length),
        length,
        iterations,
    })
}

/// Chord length and direction between the end points, failing on coincident points
pub(crate) fn chord(x0: Float, y0: Float, x1: Float, y1: Float) -> Result<(Float, Float)> {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let r = hypot(dx, dy);
    let scale = x0.abs().max(y0.abs()).max(x1.abs()).max(y1.abs()).max(1.0);
    if r <= Float::EPSILON * scale {
        return Err(ClothoidError::degenerate(format!(
            "coincident end points ({x0}, {y0}) and ({x1}, {y1})"
        )));
    }
    Ok((r, atan2(dy, dx)))
}

pub(crate) fn check_tolerance(tol: Float) -> Result<()> {
    if tol > 0.0 && tol.is_finite() {
        Ok(())
    } else {
        Err(ClothoidError::invalid_input(format!(
            "tolerance must be positive, got {tol}"
        )))
    }
}

/// The clothoid from (x0, y0) heading theta0 to (x1, y1) heading theta1,
/// also returning the number of Newton iterations used
pub fn build_g1_with_iterations(
    x0: Float,
    y0: Float,
    theta0: Float,
    x1: Float,
    y1: Float,
    theta1: Float,
    tol: Float,
) -> Result<(Clothoid, usize)> {
    for (name, v) in [
        ("x0", x0),
        ("y0", y0),
        ("theta0", theta0),
        ("x1", x1),
        ("y1", y1),
        ("theta1", theta1),
    ] {
        check_finite(name, v)?;
    }
    check_tolerance(tol)?;

    let (r, arot) = chord(x0, y0, x1, y1)?;
    let phi0 = wrap_angle(theta0 - arot);
    let phi1 = wrap_angle(theta1 - arot);
    let sol = solve_chord_frame(phi0, phi1, tol)?;

    let clothoid = Clothoid::new(
        x0,
        y0,
        theta0,
        sol.kappa / r,
        sol.dk / (r * r),
        sol.length * r,
    )?;
    debug!(
        "g1 ({x0}, {y0}, {theta0}) -> ({x1}, {y1}, {theta1}) in {} iterations: \
         kappa0 {:e} dk {:e} length {}",
        sol.iterations,
        clothoid.kappa_start(),
        clothoid.dk(),
        clothoid.length()
    );
    Ok((clothoid, sol.iterations))
}

/// The clothoid from (x0, y0) heading theta0 to (x1, y1) heading theta1
pub fn build_g1(
    x0: Float,
    y0: Float,
    theta0: Float,
    x1: Float,
    y1: Float,
    theta1: Float,
    tol: Float,
) -> Result<Clothoid> {
    build_g1_with_iterations(x0, y0, theta0, x1, y1, theta1, tol).map(|(c, _)| c)
}

/// Newton steps on a residual that changes sign over [lo, hi], falling back to
/// bisection whenever a step would leave the bracket
fn bracketed_newton<F>(
    residual: F,
    mut lo: Float,
    mut hi: Float,
    mut f_lo: Float,
    start: Float,
    tol: Float,
) -> Result<(Float, usize)>
where
    F: Fn(Float) -> Result<Float>,
{
    let mut x = start;
    let mut f = Float::INFINITY;
    for iterations in 0..FORWARD_MAX_ITERATIONS {
        f = residual(x)?;
        trace!("forward iteration {iterations}: phi1 {x} residual {f:e}");
        if f.abs() < tol {
            return Ok((x, iterations));
        }
        if f.signum() == f_lo.signum() {
            lo = x;
            f_lo = f;
        } else {
            hi = x;
        }
        if hi - lo < Float::EPSILON * PI {
            // the residual jumps across zero instead of reaching it
            warn!("forward: bracket collapsed at {x} with residual {f:e}");
            return Err(ClothoidError::nonconvergence("forward", iterations, f.abs()));
        }

        let derivative = vec![x].central_diff(&|p: &Vec<Float>| {
            residual(p[0]).unwrap_or(Float::NAN)
        })[0];
        let newton = x - f / derivative;
        let in_bracket = newton > lo && newton < hi;
        x = if derivative.is_finite() && derivative != 0.0 && in_bracket {
            newton
        } else {
            0.5 * (lo + hi)
        };
    }
    Err(ClothoidError::nonconvergence(
        "forward",
        FORWARD_MAX_ITERATIONS,
        f.abs(),
    ))
}

/// The clothoid starting at (x0, y0) with heading theta0 and curvature kappa0 that
/// passes through (x1, y1); the end heading is whatever the fit requires
pub fn build_forward(
    x0: Float,
    y0: Float,
    theta0: Float,
    kappa0: Float,
    x1: Float,
    y1: Float,
    tol: Float,
) -> Result<Clothoid> {
    for (name, v) in [
        ("x0", x0),
        ("y0", y0),
        ("theta0", theta0),
        ("kappa0", kappa0),
        ("x1", x1),
        ("y1", y1),
    ] {
        check_finite(name, v)?;
    }
    check_tolerance(tol)?;

    let (r, arot) = chord(x0, y0, x1, y1)?;
    let phi0 = wrap_angle(theta0 - arot);
    let target = kappa0 * r;
    let inner_tol = tol.min(1e-12);

    // start curvature of the chord frame G1 fit as a function of the end heading
    let residual = |phi1: Float| -> Result<Float> {
        Ok(solve_chord_frame(phi0, phi1, inner_tol)?.kappa - target)
    };

    let limit = PI - FORWARD_ANGLE_MARGIN;
    let lo = (-phi0 - FORWARD_HALF_BRACKET).max(-limit);
    let hi = (-phi0 + FORWARD_HALF_BRACKET).min(limit);
    let f_lo = residual(lo)?;
    let f_hi = residual(hi)?;
    if f_lo.signum() == f_hi.signum() {
        warn!("forward: start curvature {kappa0} is not reachable, residuals {f_lo:e} {f_hi:e}");
        return Err(ClothoidError::nonconvergence(
            "forward",
            0,
            f_lo.abs().min(f_hi.abs()),
        ));
    }

    // small angle model: kappa0 * r ~ -4 phi0 - 2 phi1
    let guess = (-(target + 4.0 * phi0) / 2.0).clamp(lo, hi);
    let (phi1, iterations) = bracketed_newton(residual, lo, hi, f_lo, guess, tol)?;

    let clothoid = build_g1(x0, y0, theta0, x1, y1, arot + phi1, inner_tol)?;
    debug!(
        "forward ({x0}, {y0}, {theta0}, {kappa0}) -> ({x1}, {y1}) in {iterations} iterations: \
         end heading {}",
        clothoid.theta_end()
    );
    Ok(clothoid)
}
