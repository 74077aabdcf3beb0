//! Fresnel integrals and the generalized Fresnel moments a clothoid is evaluated with.
//!
//! ```text
//! C(x) = ∫_0^x cos(π/2 t²) dt        S(x) = ∫_0^x sin(π/2 t²) dt
//!
//! X_k(a, b, c) = ∫_0^1 t^k cos(a/2 t² + b t + c) dt
//! Y_k(a, b, c) = ∫_0^1 t^k sin(a/2 t² + b t + c) dt
//! ```
//!
//! | x   | C(x)       | S(x)       |
//! | :-: | :--------: | :--------: |
//! | 0.0 | 0.00000000 | 0.00000000 |
//! | 0.5 | 0.49234423 | 0.06473243 |
//! | 1.0 | 0.77989340 | 0.43825915 |
//! | 1.5 | 0.44526118 | 0.69750496 |
//! | 2.0 | 0.48825341 | 0.34341568 |
//! | 2.5 | 0.45741301 | 0.61918176 |
//!
//! adapted from ebertolazzi/Clothoids.git Fresnel.cc, which in turn adapted the
//! Fresnel evaluation from William J. Thompson, *Atlas for computing mathematical
//! functions*, Wiley, 1997 (C version by Venkata Sivakanth Telasula, 2005).

use core::f64::consts::{FRAC_1_PI, FRAC_2_SQRT_PI, FRAC_PI_2, PI};

use libm::{cos, floor, sin, sqrt};

use crate::Float;

/// Highest moment order (exclusive) any caller needs: X_0, X_1, X_2
pub const MAX_MOMENTS: usize = 3;

/// |a| below which the series in `a` is used instead of the Fresnel difference form
const A_THRESHOLD: Float = 0.01;
/// number of terms of the series in `a`
const A_SERIES_SIZE: usize = 3;
/// size of the a = 0 moment table, enough for MAX_MOMENTS + 4 * A_SERIES_SIZE + 2
const ZERO_TABLE: usize = 45;
/// beyond this |x| the Fresnel integrals equal their limits to double precision
const FRESNEL_LIMIT: Float = 1e15;
/// relative size of the last series term kept
const SERIES_EPS: Float = 1e-15;

#[allow(clippy::excessive_precision)]
const FRN: [Float; 11] = [
    0.49999988085884732562,
    1.3511177791210715095,
    1.3175407836168659241,
    1.1861149300293854992,
    0.7709627298888346769,
    0.4173874338787963957,
    0.19044202705272903923,
    0.06655998896627697537,
    0.022789258616785717418,
    0.0040116689358507943804,
    0.0012192036851249883877,
];

#[allow(clippy::excessive_precision)]
const FRD: [Float; 12] = [
    1.0,
    2.7022305772400260215,
    4.2059268151438492767,
    4.5221882840107715516,
    3.7240352281630359588,
    2.4589286254678152943,
    1.3125491629443702962,
    0.5997685720120932908,
    0.20907680750378849485,
    0.07159621634657901433,
    0.012602969513793714191,
    0.0038302423512931250065,
];

#[allow(clippy::excessive_precision)]
const GN: [Float; 11] = [
    0.50000014392706344801,
    0.032346434925349128728,
    0.17619325157863254363,
    0.038606273170706486252,
    0.023693692309257725361,
    0.007092018516845033662,
    0.0012492123212412087428,
    0.00044023040894778468486,
    -8.80266827476172521e-6,
    -1.4033554916580018648e-8,
    2.3509221782155474353e-10,
];

#[allow(clippy::excessive_precision)]
const GD: [Float; 12] = [
    1.0,
    2.0646987497019598937,
    2.9109311766948031235,
    2.6561936751333032911,
    2.0195563983177268073,
    1.1167891129189363902,
    0.57267874755973172715,
    0.19408481169593070798,
    0.07634808341431248904,
    0.011573247407207865977,
    0.0044099273693067311209,
    -0.00009070958410429993314,
];

/// evaluate the rational function num/den in x with Horner's scheme
fn rational(num: &[Float; 11], den: &[Float; 12], x: Float) -> Float {
    let mut sumn = 0.0;
    let mut sumd = den[11];
    for k in (0..=10).rev() {
        sumn = num[k] + x * sumn;
        sumd = den[k] + x * sumd;
    }
    sumn / sumd
}

/// sum over n of t^n / ((2n + m)! (4n + 2m + 1)), m = 0 for C and 1 for S
fn power_series(t: Float, m: Float) -> Float {
    let mut fact_index = m;
    let mut fact = 1.0;
    let mut den = 2.0 * m + 1.0;
    let mut num = 1.0;
    let mut sum = 1.0 / den;
    loop {
        fact_index += 2.0;
        fact *= fact_index * (fact_index - 1.0);
        den += 4.0;
        num *= t;
        let term = num / (fact * den);
        sum += term;
        if term.abs() <= SERIES_EPS * sum.abs() {
            return sum;
        }
    }
}

/// the auxiliary f (offset -2) or g (offset 2) series of the large argument expansion
fn asymptotic_series(t: Float, offset: Float) -> Float {
    let mut odd = -1.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    for _ in 0..100 {
        odd += 4.0;
        term *= odd * (odd + offset) * t;
        sum += term;
        if term.abs() <= 0.1 * SERIES_EPS * sum.abs() {
            break;
        }
    }
    sum
}

/// Fresnel cosine and sine integrals C(y), S(y)
pub fn fresnel_cs(y: Float) -> (Float, Float) {
    if y.is_nan() {
        return (Float::NAN, Float::NAN);
    }
    let x = y.abs();

    let (c_value, s_value) = if x < 1.0 {
        let t = -(FRAC_PI_2 * x * x).powi(2);
        (x * power_series(t, 0.0), FRAC_PI_2 * x * x * x * power_series(t, 1.0))
    } else if x < FRESNEL_LIMIT {
        // C = 1/2 + f sin(u) - g cos(u), S = 1/2 - f cos(u) - g sin(u)
        let (f, g) = if x < 6.0 {
            (rational(&FRN, &FRD, x), rational(&GN, &GD, x))
        } else {
            let s = PI * x * x;
            let t = -1.0 / (s * s);
            let px = PI * x;
            (asymptotic_series(t, -2.0) / px, asymptotic_series(t, 2.0) / (px * px * x))
        };
        let u = FRAC_PI_2 * (x * x);
        let (sin_u, cos_u) = (sin(u), cos(u));
        (0.5 + f * sin_u - g * cos_u, 0.5 - f * cos_u - g * sin_u)
    } else {
        (0.5, 0.5)
    };

    if y < 0.0 {
        (-c_value, -s_value)
    } else {
        (c_value, s_value)
    }
}

/// C(t), S(t) and, for nk > 1, the moments ∫_0^t u^k cos/sin(π/2 u²) du for k < nk
pub fn fresnel_cs_moments(nk: usize, t: Float) -> ([Float; MAX_MOMENTS], [Float; MAX_MOMENTS]) {
    let mut c = [0.0; MAX_MOMENTS];
    let mut s = [0.0; MAX_MOMENTS];
    (c[0], s[0]) = fresnel_cs(t);
    if nk > 1 {
        let tt = FRAC_PI_2 * (t * t);
        let ss = sin(tt);
        let cc = cos(tt);
        c[1] = ss * FRAC_1_PI;
        s[1] = (1.0 - cc) * FRAC_1_PI;
        if nk > 2 {
            c[2] = (t * ss - s[0]) * FRAC_1_PI;
            s[2] = (c[0] - t * cc) * FRAC_1_PI;
        }
    }
    (c, s)
}

fn lommel_reduced(mu: Float, nu: Float, b: Float) -> Float {
    let mut tmp = 1.0 / ((mu + nu + 1.0) * (mu - nu + 1.0));
    let mut res = tmp;
    for n in 1..=100 {
        let nf = n as Float;
        tmp *= (-b / (2.0 * nf + mu - nu + 1.0)) * (b / (2.0 * nf + mu + nu + 1.0));
        res += tmp;
        if tmp.abs() < (res.abs() * 1e-50) {
            break;
        }
    }
    res
}

/// X_k(0, b), Y_k(0, b) for k < nk, b >= 0
fn eval_xy_a_zero(nk: usize, b: Float) -> ([Float; ZERO_TABLE], [Float; ZERO_TABLE]) {
    let mut x = [0.0; ZERO_TABLE];
    let mut y = [0.0; ZERO_TABLE];
    let sb = sin(b);
    let cb = cos(b);
    let b2 = b * b;
    if b.abs() < 1e-3 {
        x[0] = 1.0 - (b2 / 6.0) * (1.0 - (b2 / 20.0) * (1.0 - (b2 / 42.0)));
        y[0] = (b / 2.0) * (1.0 - (b2 / 12.0) * (1.0 - (b2 / 30.0)));
    } else {
        x[0] = sb / b;
        y[0] = (1.0 - cb) / b;
    }
    // the upward recurrence is stable while k < b
    let m = (floor(2.0 * b) as usize).clamp(1, nk.max(2) - 1);
    for k in 1..m {
        let kf = k as Float;
        x[k] = (sb - kf * y[k - 1]) / b;
        y[k] = (kf * x[k - 1] - cb) / b;
    }
    // Lommel functions for the unstable part
    if m < nk {
        let big_a = b * sb;
        let big_d = sb - b * cb;
        let big_b = b * big_d;
        let big_c = -b2 * sb;
        let m_offset = m as Float + 0.5;
        let mut r_la = lommel_reduced(m_offset, 1.5, b);
        let mut r_ld = lommel_reduced(m_offset, 0.5, b);
        for k in m..nk {
            let kf = k as Float;
            let k_offset = kf + 1.5;
            let r_lb = lommel_reduced(k_offset, 0.5, b);
            let r_lc = lommel_reduced(k_offset, 1.5, b);
            x[k] = (kf * big_a * r_la + big_b * r_lb + cb) / (1.0 + kf);
            y[k] = (big_c * r_lc + sb) / (2.0 + kf) + big_d * r_ld;
            r_la = r_lc;
            r_ld = r_lb;
        }
    }
    (x, y)
}

fn eval_xy_a_small(
    nk: usize,
    a: Float,
    b: Float,
    p: usize,
) -> ([Float; MAX_MOMENTS], [Float; MAX_MOMENTS]) {
    let nkk = nk + 4 * p + 2;
    // X_k(0, -b) = X_k(0, b) and Y_k(0, -b) = -Y_k(0, b)
    let (x0, mut y0) = eval_xy_a_zero(nkk, b.abs());
    if b < 0.0 {
        y0.iter_mut().take(nkk).for_each(|v| *v = -*v);
    }

    let mut x = [0.0; MAX_MOMENTS];
    let mut y = [0.0; MAX_MOMENTS];
    for j in 0..nk {
        x[j] = x0[j] - (a / 2.0) * y0[j + 2];
        y[j] = y0[j] + (a / 2.0) * x0[j + 2];
    }

    let mut t = 1.0;
    let aa = -a * a / 4.0;
    for n in 1..=p {
        t *= aa / ((2 * n * (2 * n - 1)) as Float);
        let bf = a / ((4 * n + 2) as Float);
        for j in 0..nk {
            let jj = 4 * n + j;
            x[j] += t * (x0[jj] - bf * y0[jj + 2]);
            y[j] += t * (y0[jj] + bf * x0[jj + 2]);
        }
    }
    (x, y)
}

fn eval_xy_a_large(nk: usize, a: Float, b: Float) -> ([Float; MAX_MOMENTS], [Float; MAX_MOMENTS]) {
    let s = a.signum();
    let absa = a.abs();
    let m_1_sqrt_pi = FRAC_2_SQRT_PI * 0.5;
    let z = m_1_sqrt_pi * sqrt(absa);
    let ell = s * b * m_1_sqrt_pi / sqrt(absa);
    let g = -0.5 * s * (b * b) / absa;
    let mut cg = cos(g) / z;
    let mut sg = sin(g) / z;

    let (cl, sl) = fresnel_cs_moments(nk, ell);
    let (cz, sz) = fresnel_cs_moments(nk, ell + z);

    let mut x = [0.0; MAX_MOMENTS];
    let mut y = [0.0; MAX_MOMENTS];

    let d_c0 = cz[0] - cl[0];
    let d_s0 = sz[0] - sl[0];
    x[0] = cg * d_c0 - s * sg * d_s0;
    y[0] = sg * d_c0 + s * cg * d_s0;

    if nk > 1 {
        cg /= z;
        sg /= z;
        let d_c1 = cz[1] - cl[1];
        let d_s1 = sz[1] - sl[1];
        let dc = d_c1 - ell * d_c0;
        let ds = d_s1 - ell * d_s0;
        x[1] = cg * dc - s * sg * ds;
        y[1] = sg * dc + s * cg * ds;
        if nk > 2 {
            let d_c2 = cz[2] - cl[2];
            let d_s2 = sz[2] - sl[2];
            let dc = d_c2 + ell * (ell * d_c0 - 2.0 * d_c1);
            let ds = d_s2 + ell * (ell * d_s0 - 2.0 * d_s1);
            cg /= z;
            sg /= z;
            x[2] = cg * dc - s * sg * ds;
            y[2] = sg * dc + s * cg * ds;
        }
    }
    (x, y)
}

/// The moments X_k(a, b, c), Y_k(a, b, c) for k < nk (nk <= 3)
pub fn generalized_fresnel_cs_moments(
    nk: usize,
    a: Float,
    b: Float,
    c: Float,
) -> ([Float; MAX_MOMENTS], [Float; MAX_MOMENTS]) {
    let nk = nk.clamp(1, MAX_MOMENTS);
    let (mut int_c, mut int_s) = if a.abs() < A_THRESHOLD {
        eval_xy_a_small(nk, a, b, A_SERIES_SIZE)
    } else {
        eval_xy_a_large(nk, a, b)
    };

    let cosc = cos(c);
    let sinc = sin(c);
    for k in 0..nk {
        let xx = int_c[k];
        let yy = int_s[k];
        int_c[k] = xx * cosc - yy * sinc;
        int_s[k] = xx * sinc + yy * cosc;
    }
    (int_c, int_s)
}

/// ∫_0^1 cos/sin(a/2 t² + b t + c) dt
///
/// A clothoid of length s is x0 + s * C, y0 + s * S with
/// (C, S) = generalized_fresnel_cs(dk s², kappa0 s, theta0).
pub fn generalized_fresnel_cs(a: Float, b: Float, c: Float) -> (Float, Float) {
    let (int_c, int_s) = generalized_fresnel_cs_moments(1, a, b, c);
    (int_c[0], int_s[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// composite Simpson rule reference for the generalized moments
    fn simpson_moment(k: i32, a: Float, b: Float, c: Float) -> (Float, Float) {
        let n = 4000;
        let h = 1.0 / n as Float;
        let mut sum_c = 0.0;
        let mut sum_s = 0.0;
        for i in 0..=n {
            let t = i as Float * h;
            let w = if i == 0 || i == n {
                1.0
            } else if i % 2 == 1 {
                4.0
            } else {
                2.0
            };
            let phase = 0.5 * a * t * t + b * t + c;
            let tk = t.powi(k);
            sum_c += w * tk * phase.cos();
            sum_s += w * tk * phase.sin();
        }
        (sum_c * h / 3.0, sum_s * h / 3.0)
    }

    #[test]
    fn reference_values() {
        let table = [
            (0.0, 0.0, 0.0),
            (0.5, 0.49234423, 0.06473243),
            (1.0, 0.77989340, 0.43825915),
            (1.5, 0.44526118, 0.69750496),
            (2.0, 0.48825341, 0.34341568),
            (2.5, 0.45741301, 0.61918176),
        ];
        for (x, c, s) in table {
            let (fc, fs) = fresnel_cs(x);
            assert_abs_diff_eq!(fc, c, epsilon = 1e-8);
            assert_abs_diff_eq!(fs, s, epsilon = 1e-8);
            // odd symmetry
            let (nc, ns) = fresnel_cs(-x);
            assert_eq!(nc, -fc);
            assert_eq!(ns, -fs);
        }
    }

    #[test]
    fn branch_boundaries_are_continuous() {
        for edge in [1.0, 6.0] {
            let (c0, s0) = fresnel_cs(edge - 1e-12);
            let (c1, s1) = fresnel_cs(edge + 1e-12);
            assert_abs_diff_eq!(c0, c1, epsilon = 1e-10);
            assert_abs_diff_eq!(s0, s1, epsilon = 1e-10);
        }
    }

    #[test]
    fn asymptotic_limits() {
        let (c, s) = fresnel_cs(1e4);
        assert_abs_diff_eq!(c, 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(s, 0.5, epsilon = 1e-4);
        let (c, s) = fresnel_cs(Float::INFINITY);
        assert_eq!((c, s), (0.5, 0.5));
        let (c, s) = fresnel_cs(-1e300);
        assert_eq!((c, s), (-0.5, -0.5));
        let (c, s) = fresnel_cs(Float::NAN);
        assert!(c.is_nan() && s.is_nan());
    }

    #[test]
    fn moments_match_quadrature() {
        let cases = [
            (0.0, 0.0, 0.0),
            (0.0, 0.7, 0.3),
            (0.005, -2.0, 1.0),
            (0.005, 9.5, -0.4),
            (0.3, 1.2, 0.0),
            (-2.5, 0.4, 0.8),
            (12.0, -3.0, 2.0),
            (-0.009, -0.2, -1.0),
        ];
        for (a, b, c) in cases {
            let (int_c, int_s) = generalized_fresnel_cs_moments(3, a, b, c);
            for k in 0..3 {
                let (qc, qs) = simpson_moment(k as i32, a, b, c);
                assert_abs_diff_eq!(int_c[k], qc, epsilon = 1e-9);
                assert_abs_diff_eq!(int_s[k], qs, epsilon = 1e-9);
            }
            let (c0, s0) = generalized_fresnel_cs(a, b, c);
            assert_eq!(c0, int_c[0]);
            assert_eq!(s0, int_s[0]);
        }
    }

    #[test]
    fn straight_line_moments() {
        let (int_c, int_s) = generalized_fresnel_cs_moments(3, 0.0, 0.0, 0.0);
        assert_abs_diff_eq!(int_c[0], 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(int_c[1], 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(int_c[2], 1.0 / 3.0, epsilon = 1e-15);
        for v in int_s {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-15);
        }
    }
}
