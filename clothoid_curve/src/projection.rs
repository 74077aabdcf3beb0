//! Closest point on a clothoid to a query point
//!
//! Coarse sampling finds every basin of the squared distance, Newton's method refines
//! each one and Brent's method takes over where Newton can't be trusted.

use core::f64::consts::FRAC_PI_8;

use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::brent::BrentOpt;
use libm::{ceil, cos, hypot, sin};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use uom::si::f64::Length;
use uom::si::length::meter;

use crate::clothoid::{Clothoid, Position};
use crate::error::{check_finite, ClothoidError, Result};
use crate::Float;

const MIN_INTERVALS: usize = 16;
const MAX_INTERVALS: usize = 1 << 16;
const NEWTON_MAX_ITERATIONS: usize = 30;
const BRENT_MAX_ITERATIONS: u64 = 100;
/// distances this close are a tie, resolved to the smallest arc length
const TIE_TOLERANCE: Float = 1e-12;

/// Result of projecting a point onto a clothoid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// closest point on the curve
    pub x: Float,
    pub y: Float,
    /// arc length of the closest point, within [0, length]
    pub s: Float,
    /// distance from the query point, >= 0
    pub distance: Float,
}

/// squared distance along the curve, for Brent
struct DistanceCost<'a> {
    clothoid: &'a Clothoid,
    qx: Float,
    qy: Float,
}

impl CostFunction for DistanceCost<'_> {
    type Param = Float;
    type Output = Float;

    fn cost(&self, s: &Self::Param) -> core::result::Result<Self::Output, Error> {
        let (x, y) = self.clothoid.eval(*s);
        let dx = x - self.qx;
        let dy = y - self.qy;
        Ok(dx * dx + dy * dy)
    }
}

fn candidate(clothoid: &Clothoid, qx: Float, qy: Float, s: Float) -> Projection {
    let (x, y) = clothoid.eval(s);
    Projection {
        x,
        y,
        s,
        distance: hypot(x - qx, y - qy),
    }
}

/// Newton on f(s) = |P(s) - q|^2 / 2 inside [a, b], None when it can't be trusted
fn newton(
    clothoid: &Clothoid,
    qx: Float,
    qy: Float,
    s0: Float,
    a: Float,
    b: Float,
) -> Option<Float> {
    let step_tol = 1e-14 * clothoid.length().max(1.0);
    let mut s = s0;
    for iteration in 0..NEWTON_MAX_ITERATIONS {
        let (x, y) = clothoid.eval(s);
        let theta = clothoid.theta(s);
        let (tx, ty) = (cos(theta), sin(theta));
        let (dx, dy) = (x - qx, y - qy);
        // f' = T.(P - q), f'' = 1 + kappa N.(P - q)
        let f1 = tx * dx + ty * dy;
        let f2 = 1.0 + clothoid.kappa(s) * (-ty * dx + tx * dy);
        if f2.is_nan() || f2 <= 0.0 {
            return None;
        }
        let step = f1 / f2;
        let next = s - step;
        trace!("projection newton {iteration}: s {s} f' {f1:e}");
        if next < a || next > b {
            return None;
        }
        s = next;
        if step.abs() <= step_tol {
            return Some(s);
        }
    }
    None
}

fn brent(clothoid: &Clothoid, qx: Float, qy: Float, a: Float, b: Float) -> Result<Float> {
    let cost = DistanceCost { clothoid, qx, qy };
    let solver = BrentOpt::new(a, b).set_tolerance(1e-10, 1e-14);
    let res = Executor::new(cost, solver)
        .configure(|state| state.max_iters(BRENT_MAX_ITERATIONS))
        .run()
        .map_err(|err| {
            warn!("projection brent failed on [{a}, {b}]: {err}");
            ClothoidError::nonconvergence("projection", BRENT_MAX_ITERATIONS as usize, Float::NAN)
        })?;
    let state = res.state();
    match state.get_best_param() {
        Some(s) if s.is_finite() => Ok(*s),
        _ => Err(ClothoidError::nonconvergence(
            "projection",
            state.get_iter() as usize,
            state.get_best_cost(),
        )),
    }
}

/// Closest point of the curve (restricted to [0, length]) to (qx, qy)
pub fn project(clothoid: &Clothoid, qx: Float, qy: Float) -> Result<Projection> {
    check_finite("x", qx)?;
    check_finite("y", qy)?;
    let length = clothoid.length();
    let start = candidate(clothoid, qx, qy, 0.0);
    if length == 0.0 {
        return Ok(start);
    }

    // each sample interval turns by at most pi/8
    let k_max = clothoid.max_abs_kappa(0.0, length);
    let turning = ceil(length * k_max / FRAC_PI_8);
    let intervals = if turning.is_finite() && turning > MIN_INTERVALS as Float {
        (turning as usize).min(MAX_INTERVALS)
    } else {
        MIN_INTERVALS
    };
    let h = length / intervals as Float;
    let s_at = |i: usize| if i == intervals { length } else { i as Float * h };
    let samples: Vec<Float> = (0..=intervals)
        .map(|i| {
            let (x, y) = clothoid.eval(s_at(i));
            (x - qx) * (x - qx) + (y - qy) * (y - qy)
        })
        .collect();

    let mut best = start;
    let mut consider = |p: Projection| {
        if p.distance < best.distance - TIE_TOLERANCE
            || (p.distance <= best.distance + TIE_TOLERANCE && p.s < best.s)
        {
            best = p;
        }
    };
    consider(candidate(clothoid, qx, qy, length));

    for i in 0..=intervals {
        let left = i.checked_sub(1).map(|j| samples[j]);
        let right = samples.get(i + 1).copied();
        let is_minimum =
            left.map_or(true, |d| samples[i] <= d) && right.map_or(true, |d| samples[i] <= d);
        if !is_minimum {
            continue;
        }
        let a = s_at(i.saturating_sub(1));
        let b = s_at((i + 1).min(intervals));
        let s = match newton(clothoid, qx, qy, s_at(i), a, b) {
            Some(s) => s,
            None => brent(clothoid, qx, qy, a, b)?,
        };
        consider(candidate(clothoid, qx, qy, s.clamp(0.0, length)));
    }
    Ok(best)
}

impl Clothoid {
    pub fn project(&self, x: Float, y: Float) -> Result<Projection> {
        project(self, x, y)
    }

    pub fn closest_point(&self, x: Float, y: Float) -> Result<(Float, Float)> {
        let p = project(self, x, y)?;
        Ok((p.x, p.y))
    }

    pub fn closest_point_arc_length(&self, x: Float, y: Float) -> Result<Float> {
        Ok(project(self, x, y)?.s)
    }

    pub fn distance(&self, x: Float, y: Float) -> Result<Float> {
        Ok(project(self, x, y)?.distance)
    }

    /// Lateral distance positive to the left of the direction of travel, minus offset
    pub fn distance_iso(&self, x: Float, y: Float, offset: Float) -> Result<Float> {
        check_finite("offset", offset)?;
        let p = project(self, x, y)?;
        let theta = self.theta(p.s);
        let side = -sin(theta) * (x - p.x) + cos(theta) * (y - p.y);
        let signed = if side < 0.0 { -p.distance } else { p.distance };
        Ok(signed - offset)
    }

    /// Lateral distance positive to the right of the direction of travel, minus offset
    pub fn distance_sae(&self, x: Float, y: Float, offset: Float) -> Result<Float> {
        check_finite("offset", offset)?;
        Ok(-self.distance_iso(x, y, -offset)?)
    }

    /// find the closest/nearest point on the clothoid to the provided point
    /// return the xy location, s distance along curve and distance to point
    pub fn get_nearest(&self, pt: &Position) -> Result<(Position, Length, Length)> {
        let [x, y] = pt.as_array_meter();
        let p = project(self, x, y)?;
        Ok((
            Position::from_array_meter([p.x, p.y]),
            Length::new::<meter>(p.s),
            Length::new::<meter>(p.distance),
        ))
    }
}
