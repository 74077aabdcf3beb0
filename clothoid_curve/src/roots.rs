//! Real roots of polynomials up to degree 4, coefficients highest degree first.
//!
//! Results are ascending with near-repeated roots merged into one entry.

use core::f64::consts::PI;

use libm::{acos, cbrt, cos, sqrt};
use tinyvec::ArrayVec;

use crate::error::{ClothoidError, Result};
use crate::Float;

pub type Roots = ArrayVec<[Float; 4]>;

/// coefficients relatively smaller than this are treated as zero
const EPSILON: Float = 1e-14;
/// roots closer than this (relative) are the same root
const MERGE_TOLERANCE: Float = 1e-7;

fn horner(coeffs: &[Float], x: Float) -> (Float, Float) {
    let mut p = 0.0;
    let mut dp = 0.0;
    for &c in coeffs {
        dp = dp * x + p;
        p = p * x + c;
    }
    (p, dp)
}

fn scale_of(coeffs: &[Float]) -> Float {
    coeffs.iter().fold(0.0, |m: Float, c| m.max(c.abs()))
}

/// polish each root with a few Newton steps on the full polynomial, sort and merge
fn finish(coeffs: &[Float], roots: Roots) -> Roots {
    let mut polished: Roots = roots
        .into_iter()
        .filter(|r| r.is_finite())
        .map(|mut r| {
            for _ in 0..4 {
                let (p, dp) = horner(coeffs, r);
                if p == 0.0 || dp == 0.0 {
                    break;
                }
                let candidate = r - p / dp;
                if horner(coeffs, candidate).0.abs() < p.abs() {
                    r = candidate;
                } else {
                    break;
                }
            }
            r
        })
        .collect();
    polished.sort_by(|a, b| a.total_cmp(b));

    let mut result = Roots::new();
    for r in polished {
        match result.last_mut() {
            Some(last) if (r - *last).abs() <= MERGE_TOLERANCE * last.abs().max(1.0) => {
                *last = 0.5 * (*last + r);
            }
            _ => result.push(r),
        }
    }
    result
}

/// a*x + b = 0
fn solve_linear(a: Float, b: Float) -> Roots {
    let mut result = Roots::new();
    if a != 0.0 {
        result.push(-b / a);
    }
    result
}

fn quadratic_unpolished(a: Float, b: Float, c: Float) -> Roots {
    let scale = scale_of(&[a, b, c]);
    if scale == 0.0 {
        return Roots::new();
    }
    if a.abs() <= EPSILON * scale {
        return solve_linear(b, c);
    }
    let mut result = Roots::new();
    let delta = b * b - 4.0 * a * c;
    if delta < 0.0 {
        // a tangent root can come out slightly negative
        if delta > -4.0 * EPSILON * scale * scale {
            result.push(-b / (2.0 * a));
        }
        return result;
    }
    let q = -0.5 * (b + b.signum() * sqrt(delta));
    if q == 0.0 {
        result.push(0.0);
        return result;
    }
    result.push(q / a);
    result.push(c / q);
    result
}

/// a*x^2 + b*x + c = 0
pub fn solve_quadratic(a: Float, b: Float, c: Float) -> Roots {
    let coeffs = [a, b, c];
    finish(&coeffs, quadratic_unpolished(a, b, c))
}

/// x^3 + bn*x^2 + cn*x + dn = 0 by the depressed form
fn monic_cubic(bn: Float, cn: Float, dn: Float) -> Roots {
    let mut result = Roots::new();
    let shift = bn / 3.0;
    let p = cn - bn * bn / 3.0;
    let q = 2.0 * bn * bn * bn / 27.0 - bn * cn / 3.0 + dn;

    let half_q = 0.5 * q;
    let third_p = p / 3.0;
    let delta = half_q * half_q + third_p * third_p * third_p;

    let delta_scale = (half_q * half_q).max((third_p * third_p * third_p).abs());
    if delta > EPSILON * delta_scale {
        // one real root, Cardano with the cancellation-free branch
        let big_a = -half_q.signum() * cbrt(half_q.abs() + sqrt(delta));
        let big_b = if big_a != 0.0 { -third_p / big_a } else { 0.0 };
        result.push(big_a + big_b - shift);
    } else if p >= 0.0 {
        result.push(-shift);
    } else {
        // three real roots, trigonometric method
        let r = 2.0 * sqrt(-third_p);
        let arg = ((3.0 * q) / (2.0 * p) * sqrt(-3.0 / p)).clamp(-1.0, 1.0);
        let phi = acos(arg) / 3.0;
        for k in 0..3 {
            result.push(r * cos(phi - 2.0 * PI * k as Float / 3.0) - shift);
        }
    }
    result
}

fn cubic_unpolished(a: Float, b: Float, c: Float, d: Float) -> Roots {
    let scale = scale_of(&[a, b, c, d]);
    if a.abs() <= EPSILON * scale {
        return quadratic_unpolished(b, c, d);
    }
    monic_cubic(b / a, c / a, d / a)
}

/// a*x^3 + b*x^2 + c*x + d = 0
pub fn solve_cubic(a: Float, b: Float, c: Float, d: Float) -> Roots {
    let coeffs = [a, b, c, d];
    finish(&coeffs, cubic_unpolished(a, b, c, d))
}

/// a*x^4 + b*x^3 + c*x^2 + d*x + e = 0, Ferrari's method through the resolvent cubic
pub fn solve_quartic(a: Float, b: Float, c: Float, d: Float, e: Float) -> Roots {
    let coeffs = [a, b, c, d, e];
    let scale = scale_of(&coeffs);
    if a.abs() <= EPSILON * scale {
        return solve_cubic(b, c, d, e);
    }
    let (an, bn, cn, dn) = (b / a, c / a, d / a, e / a);

    // depressed quartic y^4 + p y^2 + q y + r with x = y - an / 4
    let shift = an / 4.0;
    let an2 = an * an;
    let p = bn - 3.0 * an2 / 8.0;
    let q = cn - an * bn / 2.0 + an2 * an / 8.0;
    let r = dn - an * cn / 4.0 + an2 * bn / 16.0 - 3.0 * an2 * an2 / 256.0;

    let mut ys = Roots::new();
    let depressed_scale = scale_of(&[1.0, p, q, r]);
    if q.abs() <= EPSILON * depressed_scale {
        // biquadratic
        for z in quadratic_unpolished(1.0, p, r) {
            if z > 0.0 {
                let y = sqrt(z);
                ys.push(-y);
                ys.push(y);
            } else if z > -EPSILON * depressed_scale {
                ys.push(0.0);
            }
        }
    } else {
        // resolvent 8m^3 + 8p m^2 + (2p^2 - 8r) m - q^2 = 0 has a positive root
        let m = monic_cubic(p, p * p / 4.0 - r, -q * q / 8.0)
            .into_iter()
            .fold(Float::NEG_INFINITY, Float::max);
        if m > 0.0 {
            let s = sqrt(2.0 * m);
            let half = 0.5 * p + m;
            let tq = q / (2.0 * s);
            for y in quadratic_unpolished(1.0, -s, half + tq) {
                ys.push(y);
            }
            for y in quadratic_unpolished(1.0, s, half - tq) {
                if ys.len() < 4 {
                    ys.push(y);
                }
            }
        }
    }

    let xs: Roots = ys.into_iter().map(|y| y - shift).collect();
    finish(&coeffs, xs)
}

/// Dispatch on the degree of coeffs (highest degree first, degree <= 4 after
/// dropping negligible leading coefficients)
pub fn real_roots(coeffs: &[Float]) -> Result<Roots> {
    let scale = scale_of(coeffs);
    let first = coeffs
        .iter()
        .position(|c| c.abs() > EPSILON * scale)
        .unwrap_or(coeffs.len());
    let trimmed = &coeffs[first..];
    match trimmed {
        [] | [_] => Ok(Roots::new()),
        [a, b] => Ok(solve_linear(*a, *b)),
        [a, b, c] => Ok(solve_quadratic(*a, *b, *c)),
        [a, b, c, d] => Ok(solve_cubic(*a, *b, *c, *d)),
        [a, b, c, d, e] => Ok(solve_quartic(*a, *b, *c, *d, *e)),
        _ => Err(ClothoidError::invalid_input(format!(
            "polynomial degree {} is above 4",
            trimmed.len() - 1
        ))),
    }
}
