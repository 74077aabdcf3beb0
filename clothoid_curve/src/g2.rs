//! G2 (curvature continuous) interpolation between two poses with given curvature
//!
//! The connection is made of three clothoids S0, SM, S1. S0 starts at the first pose
//! with its curvature, S1 ends at the second pose with its curvature, and every
//! junction is continuous in position, heading and curvature.
//!
//! Adapted from Bertolazzi and Frego, *On the G2 Hermite interpolation problem with
//! clothoids*, Journal of Computational and Applied Mathematics, 2018.

use core::f64::consts::{FRAC_PI_2, FRAC_PI_4, FRAC_PI_8, PI};

use finitediff::FiniteDiff;
use libm::{cos, hypot};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clothoid::{wrap_angle, Clothoid};
use crate::error::{check_finite, ClothoidError, Result};
use crate::fit::{build_g1, check_tolerance, chord, DEFAULT_TOLERANCE};
use crate::Float;

/// most line search halvings per Newton step
const MAX_BACKTRACKS: usize = 30;

/// Tuning of the three arc solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct G2Params {
    /// rough maximum heading swept by each transition arc S0 and S1, capped at pi
    pub max_sweep: Float,
    /// rough maximum deviation of the transition arcs from the G1 guess, capped at pi/4
    pub max_deviation: Float,
    /// end point residual accepted as converged
    pub tolerance: Float,
    pub max_iterations: usize,
}

impl Default for G2Params {
    fn default() -> Self {
        Self {
            max_sweep: PI,
            max_deviation: FRAC_PI_8,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: 100,
        }
    }
}

impl G2Params {
    fn validated(&self) -> Result<Self> {
        let positive = |v: Float| v > 0.0;
        if !positive(self.max_sweep) || !positive(self.max_deviation) {
            return Err(ClothoidError::invalid_input(format!(
                "max_sweep {} and max_deviation {} must be positive",
                self.max_sweep, self.max_deviation
            )));
        }
        check_tolerance(self.tolerance)?;
        if self.max_iterations == 0 {
            return Err(ClothoidError::invalid_input("max_iterations must be positive"));
        }
        Ok(Self {
            max_sweep: self.max_sweep.min(PI),
            max_deviation: self.max_deviation.min(FRAC_PI_4),
            ..*self
        })
    }
}

/// Three G2 continuous clothoids
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct G2Chain {
    segments: [Clothoid; 3],
    iterations: usize,
}

impl G2Chain {
    /// S0, SM, S1 in order of travel
    pub fn segments(&self) -> &[Clothoid; 3] {
        &self.segments
    }

    pub fn s0(&self) -> &Clothoid {
        &self.segments[0]
    }

    pub fn sm(&self) -> &Clothoid {
        &self.segments[1]
    }

    pub fn s1(&self) -> &Clothoid {
        &self.segments[2]
    }

    pub fn total_length(&self) -> Float {
        self.segments.iter().map(Clothoid::length).sum()
    }

    /// Newton iterations the solve took
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl IntoIterator for G2Chain {
    type Item = Clothoid;
    type IntoIter = core::array::IntoIter<Clothoid, 3>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

/// the problem in the frame where the end points are (-1, 0) and (1, 0)
struct Normalized {
    th0: Float,
    k0: Float,
    k1: Float,
    s0: Float,
    s1: Float,
    /// total heading change th1 - th0
    dtheta: Float,
}

impl Normalized {
    fn kappa_b(&self, sm: Float, kappa_a: Float) -> Float {
        (2.0 * self.dtheta - self.s0 * self.k0 - self.s1 * self.k1 - kappa_a * (self.s0 + sm))
            / (sm + self.s1)
    }

    /// The three arcs for middle length sm and junction curvature kappa_a, starting
    /// from the pose given, each arc continuing from the evaluated end of the one before.
    /// `scale` maps normalized lengths into the frame of the start pose.
    fn chain(
        &self,
        start: (Float, Float, Float),
        sm: Float,
        kappa_a: Float,
        scale: Float,
    ) -> [Clothoid; 3] {
        let kappa_b = self.kappa_b(sm, kappa_a);
        let lambda = 1.0 / scale;
        let (x0, y0, theta0) = start;
        let first = Clothoid::from_raw(
            x0,
            y0,
            theta0,
            self.k0 * lambda,
            (kappa_a - self.k0) / self.s0 * lambda * lambda,
            self.s0 * scale,
        );
        let middle = continue_arc(&first, kappa_b * lambda, sm * scale);
        let last = continue_arc(&middle, self.k1 * lambda, self.s1 * scale);
        [first, middle, last]
    }

    fn residual(&self, sm: Float, kappa_a: Float) -> [Float; 2] {
        let [_, _, last] = self.chain((-1.0, 0.0, self.th0), sm, kappa_a, 1.0);
        let (x, y) = last.eval(last.length());
        [x - 1.0, y]
    }
}

/// the arc starting at the end of prev and reaching kappa_end after length
fn continue_arc(prev: &Clothoid, kappa_end: Float, length: Float) -> Clothoid {
    let (x, y) = prev.eval(prev.length());
    let kappa = prev.kappa_end();
    Clothoid::from_raw(
        x,
        y,
        prev.theta_end(),
        kappa,
        (kappa_end - kappa) / length,
        length,
    )
}

/// transition length heuristic for one end of the guess
fn transition_length(
    k: Float,
    k_guess: Float,
    guess_dk: Float,
    l3: Float,
    params: &G2Params,
) -> Float {
    let mut s = l3;
    let tmp = 0.5 * (k - k_guess).abs() / params.max_deviation;
    if tmp * s > 1.0 {
        s = 1.0 / tmp;
    }
    let tmp = ((k + k_guess).abs() + s * guess_dk) / (2.0 * params.max_sweep);
    if tmp * s > 1.0 {
        s = 1.0 / tmp;
    }
    s
}

fn solve_2x2(j: [[Float; 2]; 2], f: [Float; 2]) -> Option<[Float; 2]> {
    let det = j[0][0] * j[1][1] - j[0][1] * j[1][0];
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    Some([
        -(j[1][1] * f[0] - j[0][1] * f[1]) / det,
        -(-j[1][0] * f[0] + j[0][0] * f[1]) / det,
    ])
}

/// Join (x0, y0, theta0, kappa0) to (x1, y1, theta1, kappa1) with three G2 continuous clothoids
#[allow(clippy::too_many_arguments)]
pub fn solve_g2(
    x0: Float,
    y0: Float,
    theta0: Float,
    kappa0: Float,
    x1: Float,
    y1: Float,
    theta1: Float,
    kappa1: Float,
    params: G2Params,
) -> Result<G2Chain> {
    for (name, v) in [
        ("x0", x0),
        ("y0", y0),
        ("theta0", theta0),
        ("kappa0", kappa0),
        ("x1", x1),
        ("y1", y1),
        ("theta1", theta1),
        ("kappa1", kappa1),
    ] {
        check_finite(name, v)?;
    }
    let params = params.validated()?;

    let (r, arot) = chord(x0, y0, x1, y1)?;
    // normalized lengths are real lengths times lambda
    let lambda = 2.0 / r;
    let th0 = wrap_angle(theta0 - arot);
    let th1 = wrap_angle(theta1 - arot);
    let k0 = kappa0 / lambda;
    let k1 = kappa1 / lambda;

    let guess = build_g1(-1.0, 0.0, th0, 1.0, 0.0, th1, params.tolerance)?;
    let k_a = guess.kappa_start();
    let k_b = guess.kappa_end();
    let guess_dk = guess.dk().abs();
    let l3 = guess.length() / 3.0;

    let mut s0 = transition_length(k0, k_a, guess_dk, l3, &params);
    let mut s1 = transition_length(k1, k_b, guess_dk, l3, &params);
    let dth = (th0 - th1).abs() / (2.0 * PI);
    let shrink = cos(dth.powi(4) * FRAC_PI_2).powi(3);
    s0 *= shrink;
    s1 *= shrink;

    let problem = Normalized {
        th0,
        k0,
        k1,
        s0,
        s1,
        dtheta: th1 - th0,
    };

    let mut u = vec![
        (guess.length() - s0 - s1).max(l3),
        guess.kappa(s0),
    ];
    let norm = |u: &[Float]| {
        let f = problem.residual(u[0], u[1]);
        hypot(f[0], f[1])
    };

    let mut residual = norm(&u);
    let mut iterations = 0;
    let mut converged = residual < params.tolerance;
    while !converged && iterations < params.max_iterations {
        trace!("g2 iteration {iterations}: sm {} kappa_a {} residual {residual:e}", u[0], u[1]);
        let f = problem.residual(u[0], u[1]);
        let grad_x = u.central_diff(&|p: &Vec<Float>| problem.residual(p[0], p[1])[0]);
        let grad_y = u.central_diff(&|p: &Vec<Float>| problem.residual(p[0], p[1])[1]);
        let Some(step) = solve_2x2([[grad_x[0], grad_x[1]], [grad_y[0], grad_y[1]]], f) else {
            break;
        };

        // damped step keeping the middle arc length positive
        let mut alpha = 1.0;
        let mut accepted = false;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = vec![u[0] + alpha * step[0], u[1] + alpha * step[1]];
            if candidate[0] > 0.0 {
                let candidate_residual = norm(&candidate);
                if candidate_residual < residual {
                    u = candidate;
                    residual = candidate_residual;
                    accepted = true;
                    break;
                }
            }
            alpha *= 0.5;
        }
        iterations += 1;
        if !accepted {
            break;
        }
        converged = residual < params.tolerance;
    }
    if !converged {
        return Err(ClothoidError::nonconvergence("g2", iterations, residual));
    }

    let segments = problem.chain((x0, y0, theta0), u[0], u[1], 1.0 / lambda);
    for segment in &segments {
        let p = segment.parameters();
        Clothoid::new(p[0], p[1], p[2], p[3], p[4], p[5])?;
    }
    debug!(
        "g2 ({x0}, {y0}, {theta0}, {kappa0}) -> ({x1}, {y1}, {theta1}, {kappa1}) \
         in {iterations} iterations, lengths {} {} {}",
        segments[0].length(),
        segments[1].length(),
        segments[2].length()
    );
    Ok(G2Chain {
        segments,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use core::f64::consts::FRAC_PI_6;

    fn check_chain(chain: &G2Chain, start: [Float; 4], end: [Float; 4]) {
        let [s0, sm, s1] = chain.segments();
        assert_eq!(s0.x_start(), start[0]);
        assert_eq!(s0.y_start(), start[1]);
        assert_eq!(s0.theta_start(), start[2]);
        assert_abs_diff_eq!(s0.kappa_start(), start[3], epsilon = 1e-12);

        for (a, b) in [(s0, sm), (sm, s1)] {
            assert!(a.length() > 0.0);
            assert_abs_diff_eq!(a.x_end(), b.x_start(), epsilon = 1e-12);
            assert_abs_diff_eq!(a.y_end(), b.y_start(), epsilon = 1e-12);
            assert_abs_diff_eq!(a.theta_end(), b.theta_start(), epsilon = 1e-12);
            assert_abs_diff_eq!(a.kappa_end(), b.kappa_start(), epsilon = 1e-12);
        }

        assert_abs_diff_eq!(s1.x_end(), end[0], epsilon = 1e-8);
        assert_abs_diff_eq!(s1.y_end(), end[1], epsilon = 1e-8);
        assert_abs_diff_eq!(wrap_angle(s1.theta_end() - end[2]), 0.0, epsilon = 1e-8);
        assert_abs_diff_eq!(s1.kappa_end(), end[3], epsilon = 1e-8);

        let total: Float = chain.segments().iter().map(|c| c.length()).sum();
        assert_abs_diff_eq!(chain.total_length(), total);
    }

    #[test]
    fn solve_g2_cases() {
        let _ = env_logger::builder().is_test(true).try_init();
        let cases = [
            ([0.0, 0.0, 0.0, 0.0], [1.0, 1.0, FRAC_PI_4, 0.1]),
            ([1.0, 2.0, FRAC_PI_6, 0.2], [-1.0, -2.0, -FRAC_PI_6, -0.2]),
            ([0.0, 0.0, 0.0, 0.5], [3.0, 1.0, -1.0, -0.3]),
            ([0.0, 0.0, 1.2, 0.0], [2.0, 0.0, 1.3, 0.0]),
        ];
        for (start, end) in cases {
            let chain = solve_g2(
                start[0],
                start[1],
                start[2],
                start[3],
                end[0],
                end[1],
                end[2],
                end[3],
                G2Params::default(),
            )
            .unwrap();
            assert_eq!(chain.into_iter().count(), 3);
            check_chain(&chain, start, end);
        }
    }

    #[test]
    fn straight_line() {
        let chain = solve_g2(0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, G2Params::default()).unwrap();
        assert_eq!(chain.iterations(), 0);
        assert_abs_diff_eq!(chain.total_length(), 1.0, epsilon = 1e-12);
        for c in chain.segments() {
            assert_abs_diff_eq!(c.kappa_start(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(c.dk(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn g2_errors() {
        let err =
            solve_g2(1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, G2Params::default()).unwrap_err();
        assert!(err.is_degenerate());

        let params = G2Params {
            max_sweep: -1.0,
            ..G2Params::default()
        };
        let err = solve_g2(0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, params).unwrap_err();
        assert!(err.is_invalid_input());

        // one iteration is not enough for a curved connection
        let params = G2Params {
            max_iterations: 1,
            ..G2Params::default()
        };
        let err = solve_g2(0.0, 0.0, 0.0, 0.0, 1.0, 1.0, FRAC_PI_4, 0.1, params).unwrap_err();
        assert!(err.is_nonconvergence());
    }

    #[test]
    fn chain_serializes() {
        let chain =
            solve_g2(0.0, 0.0, 0.0, 0.0, 1.0, 1.0, FRAC_PI_4, 0.1, G2Params::default()).unwrap();
        let json = serde_json::to_string(&chain).unwrap();
        let back: G2Chain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chain);
    }
}
