//! Intersections between two clothoids, or of a clothoid with itself
//!
//! Both arcs are covered with [`AabbTree`]s and only leaves whose boxes overlap are
//! examined. For each such pair the leaf of the first arc is replaced by its osculating
//! parabola and the leaf of the second by a line or its osculating circle; the real
//! roots of that low degree problem seed a Newton iteration on P_a(s) - P_b(t) = 0.
//!
//! Tangential contacts make the Newton system singular and may be missed.

use libm::{cos, hypot, sin};
use tracing::{debug, trace};

use crate::bbox::{AabbTree, Leaf};
use crate::clothoid::Clothoid;
use crate::roots::{solve_quadratic, solve_quartic, Roots};
use crate::Float;

const NEWTON_MAX_ITERATIONS: usize = 20;
/// leaves with less turning than this are treated as straight lines when seeding
const LINE_SWEEP: Float = 1e-4;
/// crossings with tangents closer to parallel than this are tangential contacts
const MIN_CROSSING_SINE: Float = 1e-8;
/// arc lengths closer than this are the same crossing
const DUPLICATE_TOLERANCE: Float = 1e-8;

fn cross(ax: Float, ay: Float, bx: Float, by: Float) -> Float {
    ax * by - ay * bx
}

/// position, unit tangent and curvature at s
fn frame(clothoid: &Clothoid, s: Float) -> ((Float, Float), (Float, Float), Float) {
    let theta = clothoid.theta(s);
    (clothoid.eval(s), (cos(theta), sin(theta)), clothoid.kappa(s))
}

/// Arc length offsets u from the middle of leaf_a where its osculating parabola meets
/// the line or osculating circle at the middle of leaf_b
fn seeds(a: &Clothoid, leaf_a: &Leaf, b: &Clothoid, leaf_b: &Leaf) -> Roots {
    let ((mx, my), (tx, ty), k) = frame(a, leaf_a.mid());
    let (nx, ny) = (-ty, tx);
    let ((px, py), (t2x, t2y), k2) = frame(b, leaf_b.mid());

    if (k2 * leaf_b.length()).abs() < LINE_SWEEP {
        // cross(T2, Q(u) - P2) = 0 with Q(u) = M + T u + k/2 N u^2
        solve_quadratic(
            0.5 * k * cross(t2x, t2y, nx, ny),
            cross(t2x, t2y, tx, ty),
            cross(t2x, t2y, mx - px, my - py),
        )
    } else {
        // |Q(u) - O|^2 = R^2, O the centre of curvature of b
        let (ox, oy) = (px - t2y / k2, py + t2x / k2);
        let r2 = 1.0 / (k2 * k2);
        let (dx, dy) = (mx - ox, my - oy);
        solve_quartic(
            0.25 * k * k,
            0.0,
            1.0 + k * (dx * nx + dy * ny),
            2.0 * (dx * tx + dy * ty),
            dx * dx + dy * dy - r2,
        )
    }
}

/// Newton on F(s, t) = P_a(s) - P_b(t), J = [T_a, -T_b]
fn refine(a: &Clothoid, b: &Clothoid, mut s: Float, mut t: Float) -> Option<(Float, Float)> {
    let scale = a.length().max(b.length()).max(1.0);
    for iteration in 0..NEWTON_MAX_ITERATIONS {
        let ((xa, ya), (tax, tay), _) = frame(a, s);
        let ((xb, yb), (tbx, tby), _) = frame(b, t);
        let (fx, fy) = (xa - xb, ya - yb);
        let residual = hypot(fx, fy);
        let det = cross(tax, tay, tbx, tby);
        trace!("intersection newton {iteration}: s {s} t {t} |F| {residual:e}");
        if det.abs() < MIN_CROSSING_SINE {
            return None;
        }
        // [tax -tbx; tay -tby] [ds; dt] = -F
        s += (-fx * -tby + tbx * -fy) / -det;
        t += (tax * -fy - tay * -fx) / -det;
        if !s.is_finite() || !t.is_finite() {
            return None;
        }
        if residual <= 1e-12 * scale {
            return Some((s, t));
        }
    }
    None
}

/// s if it lies near the leaf it was seeded from and on the arc, clamped to the arc
fn accept(clothoid: &Clothoid, leaf: &Leaf, s: Float) -> Option<Float> {
    let eps = 1e-10 * clothoid.length().max(1.0);
    let near_leaf = s >= leaf.s0 - leaf.length() && s <= leaf.s1 + leaf.length();
    let on_arc = s >= -eps && s <= clothoid.length() + eps;
    (near_leaf && on_arc).then(|| s.clamp(0.0, clothoid.length()))
}

/// crossings for one pair of overlapping leaves
fn leaf_pair(
    a: &Clothoid,
    leaf_a: &Leaf,
    b: &Clothoid,
    leaf_b: &Leaf,
    found: &mut Vec<(Float, Float)>,
) {
    let ((mx, my), (tx, ty), k) = frame(a, leaf_a.mid());
    let ((px, py), (t2x, t2y), _) = frame(b, leaf_b.mid());
    let try_seed = |s: Float, t: Float| {
        let (s, t) = refine(a, b, s, t)?;
        Some((accept(a, leaf_a, s)?, accept(b, leaf_b, t)?))
    };

    let before = found.len();
    for u in seeds(a, leaf_a, b, leaf_b) {
        if u.abs() > 1.5 * leaf_a.length() {
            continue;
        }
        let qx = mx + tx * u - 0.5 * k * ty * u * u;
        let qy = my + ty * u + 0.5 * k * tx * u * u;
        let t = leaf_b.mid() + t2x * (qx - px) + t2y * (qy - py);
        if let Some(hit) = try_seed(leaf_a.mid() + u, t) {
            found.push(hit);
        }
    }
    if found.len() == before {
        if let Some(hit) = try_seed(leaf_a.mid(), leaf_b.mid()) {
            found.push(hit);
        }
    }
}

/// sort by the first arc length and collapse repeats
fn dedup(mut found: Vec<(Float, Float)>, scale: Float) -> Vec<(Float, Float)> {
    found.sort_by(|p, q| p.0.total_cmp(&q.0).then(p.1.total_cmp(&q.1)));
    let tol = DUPLICATE_TOLERANCE * scale;
    let mut result: Vec<(Float, Float)> = Vec::with_capacity(found.len());
    for (s, t) in found {
        let repeated = result
            .iter()
            .any(|&(rs, rt)| (rs - s).abs() <= tol && (rt - t).abs() <= tol);
        if !repeated {
            result.push((s, t));
        }
    }
    result
}

/// Arc length pairs (s on a, t on b) where the two clothoids cross, ordered by s.
/// Passing the same clothoid twice gives its self intersections.
pub fn intersections(a: &Clothoid, b: &Clothoid) -> Vec<(Float, Float)> {
    if a == b {
        return self_intersections(a);
    }
    let tree_a = AabbTree::build(a);
    let tree_b = AabbTree::build(b);
    let mut found = Vec::new();
    for (i, j) in tree_a.overlapping_leaves(&tree_b) {
        leaf_pair(a, &tree_a.leaves()[i], b, &tree_b.leaves()[j], &mut found);
    }
    let result = dedup(found, a.length().max(b.length()).max(1.0));
    debug!("{} intersections", result.len());
    result
}

/// Crossing points, evaluated on a
pub fn intersection_points(a: &Clothoid, b: &Clothoid) -> Vec<(Float, Float)> {
    intersections(a, b)
        .into_iter()
        .map(|(s, _)| a.eval(s))
        .collect()
}

/// Pairs (s, t), s < t, where the clothoid crosses itself.
///
/// A clothoid segment is part of a single Euler spiral, which never crosses itself,
/// so this is empty unless the curve is a circle of more than one turn, whose
/// overlapping part is coincident rather than crossing and isn't reported either.
pub fn self_intersections(clothoid: &Clothoid) -> Vec<(Float, Float)> {
    let tree = AabbTree::build(clothoid);
    let leaves = tree.leaves();
    let mut found = Vec::new();
    for (i, j) in tree.overlapping_leaves(&tree) {
        // identical and adjacent leaves turn too little to cross
        if j <= i + 1 {
            continue;
        }
        leaf_pair(clothoid, &leaves[i], clothoid, &leaves[j], &mut found);
    }
    let scale = clothoid.length().max(1.0);
    found.retain(|&(s, t)| t - s > DUPLICATE_TOLERANCE * scale);
    dedup(found, scale)
}

impl Clothoid {
    pub fn intersections(&self, other: &Clothoid) -> Vec<(Float, Float)> {
        intersections(self, other)
    }

    pub fn intersection_points(&self, other: &Clothoid) -> Vec<(Float, Float)> {
        intersection_points(self, other)
    }

    pub fn self_intersections(&self) -> Vec<(Float, Float)> {
        self_intersections(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{build_g1, DEFAULT_TOLERANCE};
    use approx::assert_abs_diff_eq;
    use core::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn g1(p: [Float; 6]) -> Clothoid {
        build_g1(p[0], p[1], p[2], p[3], p[4], p[5], DEFAULT_TOLERANCE).unwrap()
    }

    #[test]
    fn intersection_arc_lengths() {
        let _ = env_logger::builder().is_test(true).try_init();
        let clothoid = g1([0.0, 0.0, FRAC_PI_4, 1.0, 1.0, 0.0]);
        let cases = [
            ([0.0, 0.0, PI, 1.0, 0.95, -FRAC_PI_4], 2),
            ([1.0, 0.0, PI, 1.0, 2.0, -FRAC_PI_4], 1),
            ([1.0, 0.0, PI, 0.5, 0.5, -FRAC_PI_4], 0),
        ];
        for (params, expected) in cases {
            let other = g1(params);
            let found = intersections(&clothoid, &other);
            assert_eq!(found.len(), expected, "{params:?}: {found:?}");
            for pair in found.windows(2) {
                assert!(pair[0].0 < pair[1].0);
            }
            for (s, t) in &found {
                assert!(*s >= 0.0 && *s <= clothoid.length());
                assert!(*t >= 0.0 && *t <= other.length());
                let (x0, y0) = clothoid.eval(*s);
                let (x1, y1) = other.eval(*t);
                assert_abs_diff_eq!(x0, x1, epsilon = 1e-9);
                assert_abs_diff_eq!(y0, y1, epsilon = 1e-9);
            }

            let points = intersection_points(&clothoid, &other);
            assert_eq!(points.len(), expected);
            for (x, y) in points {
                assert_abs_diff_eq!(other.distance(x, y).unwrap(), 0.0, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn crossing_lines() {
        let a = Clothoid::new(0.0, -1.0, FRAC_PI_2, 0.0, 0.0, 2.0).unwrap();
        let b = Clothoid::new(-1.0, 0.0, 0.0, 0.0, 0.0, 2.0).unwrap();
        let found = a.intersections(&b);
        assert_eq!(found.len(), 1);
        assert_abs_diff_eq!(found[0].0, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(found[0].1, 1.0, epsilon = 1e-12);

        // parallel lines never meet
        let c = Clothoid::new(-1.0, 0.5, 0.0, 0.0, 0.0, 2.0).unwrap();
        assert!(b.intersections(&c).is_empty());
    }

    #[test]
    fn circle_and_line() {
        // unit circle, full turn, crossed by the x axis
        let circle = Clothoid::new(0.0, -1.0, 0.0, 1.0, 0.0, 2.0 * PI - 1e-3).unwrap();
        let line = Clothoid::new(-2.0, 0.0, 0.0, 0.0, 0.0, 4.0).unwrap();
        let found = circle.intersections(&line);
        assert_eq!(found.len(), 2);
        assert_abs_diff_eq!(found[0].0, FRAC_PI_2, epsilon = 1e-10);
        assert_abs_diff_eq!(found[0].1, 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(found[1].0, 3.0 * FRAC_PI_2, epsilon = 1e-10);
        assert_abs_diff_eq!(found[1].1, 1.0, epsilon = 1e-10);

        // the other way round the pairs swap
        let found = line.intersections(&circle);
        assert_eq!(found.len(), 2);
        assert_abs_diff_eq!(found[0].0, 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(found[1].0, 3.0, epsilon = 1e-10);
    }

    #[test]
    fn line_through_spiral_windings() {
        let spiral = Clothoid::new(0.0, 0.0, 0.0, 0.0, 1.0, 6.0).unwrap();
        let line = Clothoid::new(0.0, 0.85, 0.0, 0.0, 0.0, 2.0).unwrap();
        let found = spiral.intersections(&line);
        let expected = [1.8459, 3.1374, 3.9423, 4.7355, 5.2875, 5.9201];
        assert_eq!(found.len(), expected.len(), "{found:?}");
        for ((s, t), e) in found.into_iter().zip(expected) {
            assert_abs_diff_eq!(s, e, epsilon = 1e-3);
            let (x, y) = spiral.eval(s);
            assert_abs_diff_eq!(x, t, epsilon = 1e-9);
            assert_abs_diff_eq!(y, 0.85, epsilon = 1e-9);
        }
    }

    #[test]
    fn self_intersection() {
        let spiral = Clothoid::new(0.0, 0.0, 0.0, -2.0, 0.5, 8.0).unwrap();
        assert!(spiral.self_intersections().is_empty());
        assert!(intersections(&spiral, &spiral).is_empty());

        // coincident overlap of a circle longer than a turn is not a crossing
        let circle = Clothoid::new(0.0, 0.0, 0.0, 1.0, 0.0, 3.0 * PI).unwrap();
        assert!(circle.self_intersections().is_empty());
    }
}
