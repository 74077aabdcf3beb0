use core::f64::consts::PI;
use core::fmt;
use core::marker::PhantomData;
use core::ops::Neg;

use libm::{atan2, cos, sin};
use serde::{Deserialize, Serialize};
use typenum::{N2, Z0};
use uom::si::f64::{Angle, Curvature, Length};
use uom::si::marker::AngleKind;
use uom::si::{angle::radian, curvature::radian_per_meter, length::meter, Quantity, ISQ, SI};

use crate::error::{check_finite, ClothoidError, Result};
use crate::fresnel::generalized_fresnel_cs;
use crate::Float;

/// wrap a raw angle into (-pi, pi]
pub(crate) fn wrap_angle(angle: Float) -> Float {
    PI - (PI - angle).rem_euclid(2.0 * PI)
}

/// put angle into -pi, pi range
pub fn angle_unwrap(angle: Angle) -> Angle {
    Angle::new::<radian>(wrap_angle(angle.get::<radian>()))
}

/*
dimension: ISQ<
        N2,     // length
        Z0,     // mass
        Z0,     // time
        Z0,     // electric current
        Z0,     // thermodynamic temperature
        Z0,     // amount of substance
        Z0>;    // luminous intensity
*/
pub type CurvaturePerLength =
    Quantity<ISQ<N2, Z0, Z0, Z0, Z0, Z0, Z0, dyn AngleKind>, SI<Float>, Float>;

// TODO(lucasw) a radian_per_square_meter unit would remove the need for these
pub fn curvature_per_meter(val: Float) -> CurvaturePerLength {
    CurvaturePerLength {
        dimension: PhantomData,
        units: PhantomData,
        value: val,
    }
}

/// turn CurvaturePerLength into a float, radians per square meter
pub fn curvature_per_meter_float(cpl: CurvaturePerLength) -> Float {
    cpl.value
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: Length,
    pub y: Length,
}

impl Neg for Position {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl Position {
    pub fn from_array_meter(p: [Float; 2]) -> Self {
        Position {
            x: Length::new::<meter>(p[0]),
            y: Length::new::<meter>(p[1]),
        }
    }

    pub fn as_array_meter(&self) -> [Float; 2] {
        [self.x.get::<meter>(), self.y.get::<meter>()]
    }
}

/// Mirror line for [`Clothoid::flip`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    /// y -> -y
    X,
    /// x -> -x
    Y,
    /// the tangent line at the start point
    Start,
}

/// One clothoid segment, immutable
///
/// theta(s) = theta0 + kappa0 * s + 1/2 * dk * s^2, kappa(s) = kappa0 + dk * s.
/// Evaluation is defined for any s, values outside [0, length] extrapolate the spiral.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[Float; 6]", into = "[Float; 6]")]
pub struct Clothoid {
    x0: Float,
    y0: Float,
    /// start heading, stored as given
    theta0: Float,
    /// start curvature 1/r
    kappa0: Float,
    /// curvature rate, how much curvature changes per unit length
    dk: Float,
    length: Float,
}

impl TryFrom<[Float; 6]> for Clothoid {
    type Error = ClothoidError;

    fn try_from(p: [Float; 6]) -> Result<Self> {
        Self::new(p[0], p[1], p[2], p[3], p[4], p[5])
    }
}

impl From<Clothoid> for [Float; 6] {
    fn from(clothoid: Clothoid) -> Self {
        clothoid.parameters()
    }
}

impl fmt::Display for Clothoid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Clothoid: [")?;
        writeln!(f, "\tx: {:0.6}, y: {:0.6}", self.x0, self.y0)?;
        writeln!(
            f,
            "\ttheta0 (initial yaw/heading): {:0.6} radians ({:0.3}°)",
            self.theta0,
            self.theta0.to_degrees()
        )?;
        write!(f, "\tkappa0 (curvature 1/r): {:0.6}", self.kappa0)?;
        if self.kappa0 != 0.0 {
            write!(f, " radius: {:.3}", 1.0 / self.kappa0)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "\tdk (curvature rate, curvature per unit length): {:0.6}",
            self.dk
        )?;
        writeln!(f, "\tlength: {:0.6}", self.length)?;
        write!(f, "]")
    }
}

impl Clothoid {
    /// Build from the canonical 6-tuple, rejecting non-finite values and negative length
    pub fn new(
        x0: Float,
        y0: Float,
        theta0: Float,
        kappa0: Float,
        dk: Float,
        length: Float,
    ) -> Result<Self> {
        check_finite("x0", x0)?;
        check_finite("y0", y0)?;
        check_finite("theta0", theta0)?;
        check_finite("kappa0", kappa0)?;
        check_finite("dk", dk)?;
        check_finite("length", length)?;
        if length < 0.0 {
            return Err(ClothoidError::invalid_input(format!(
                "length must be non-negative, got {length}"
            )));
        }
        Ok(Self {
            x0,
            y0,
            theta0,
            kappa0,
            dk,
            length,
        })
    }

    pub fn create(
        x0: Length,
        y0: Length,
        theta0: Angle,
        curvature0: Curvature,
        curvature_rate: CurvaturePerLength,
        length: Length,
    ) -> Result<Self> {
        Self::new(
            x0.get::<meter>(),
            y0.get::<meter>(),
            theta0.get::<radian>(),
            curvature0.get::<radian_per_meter>(),
            curvature_per_meter_float(curvature_rate),
            length.get::<meter>(),
        )
    }

    /// unvalidated construction for solver internals working on finite values
    pub(crate) fn from_raw(
        x0: Float,
        y0: Float,
        theta0: Float,
        kappa0: Float,
        dk: Float,
        length: Float,
    ) -> Self {
        Self {
            x0,
            y0,
            theta0,
            kappa0,
            dk,
            length,
        }
    }

    /// [x0, y0, theta0, kappa0, dk, length]
    pub fn parameters(&self) -> [Float; 6] {
        [
            self.x0,
            self.y0,
            self.theta0,
            self.kappa0,
            self.dk,
            self.length,
        ]
    }

    pub fn length(&self) -> Float {
        self.length
    }

    pub fn dk(&self) -> Float {
        self.dk
    }

    pub fn x_start(&self) -> Float {
        self.x0
    }

    pub fn y_start(&self) -> Float {
        self.y0
    }

    pub fn theta_start(&self) -> Float {
        self.theta0
    }

    pub fn kappa_start(&self) -> Float {
        self.kappa0
    }

    pub fn x_end(&self) -> Float {
        self.x(self.length)
    }

    pub fn y_end(&self) -> Float {
        self.y(self.length)
    }

    pub fn theta_end(&self) -> Float {
        self.theta(self.length)
    }

    pub fn kappa_end(&self) -> Float {
        self.kappa(self.length)
    }

    pub fn get_start_theta(&self) -> Angle {
        Angle::new::<radian>(self.theta0)
    }

    pub fn curvature(&self) -> Curvature {
        Curvature::new::<radian_per_meter>(self.kappa0)
    }

    pub fn curvature_rate(&self) -> CurvaturePerLength {
        curvature_per_meter(self.dk)
    }

    pub fn length_typed(&self) -> Length {
        Length::new::<meter>(self.length)
    }

    /// position at arc length s
    pub fn eval(&self, s: Float) -> (Float, Float) {
        let (f_c, f_s) = generalized_fresnel_cs(self.dk * s * s, self.kappa0 * s, self.theta0);
        (self.x0 + s * f_c, self.y0 + s * f_s)
    }

    /// position at arc length s, rejecting a non-finite s
    pub fn eval_checked(&self, s: Float) -> Result<(Float, Float)> {
        check_finite("s", s)?;
        Ok(self.eval(s))
    }

    // s is length along the curve, x and y will be in same units
    pub fn get_xy(&self, s: Length) -> Position {
        let (x, y) = self.eval(s.get::<meter>());
        Position::from_array_meter([x, y])
    }

    pub fn x(&self, s: Float) -> Float {
        self.eval(s).0
    }

    pub fn y(&self, s: Float) -> Float {
        self.eval(s).1
    }

    pub fn theta(&self, s: Float) -> Float {
        self.theta0 + s * (self.kappa0 + 0.5 * s * self.dk)
    }

    pub fn kappa(&self, s: Float) -> Float {
        self.kappa0 + s * self.dk
    }

    pub fn x_d(&self, s: Float) -> Float {
        cos(self.theta(s))
    }

    pub fn y_d(&self, s: Float) -> Float {
        sin(self.theta(s))
    }

    pub fn theta_d(&self, s: Float) -> Float {
        self.kappa(s)
    }

    pub fn x_dd(&self, s: Float) -> Float {
        -self.kappa(s) * sin(self.theta(s))
    }

    pub fn y_dd(&self, s: Float) -> Float {
        self.kappa(s) * cos(self.theta(s))
    }

    pub fn theta_dd(&self, _s: Float) -> Float {
        self.dk
    }

    pub fn x_ddd(&self, s: Float) -> Float {
        let th = self.theta(s);
        let k = self.kappa(s);
        -self.dk * sin(th) - k * k * cos(th)
    }

    pub fn y_ddd(&self, s: Float) -> Float {
        let th = self.theta(s);
        let k = self.kappa(s);
        self.dk * cos(th) - k * k * sin(th)
    }

    pub fn theta_ddd(&self, _s: Float) -> Float {
        0.0
    }

    /// the clothoid starting at s along this one, covering the rest of it
    pub fn get_clothoid(&self, s: Length) -> Self {
        let s = s.get::<meter>();
        self.state_at(s, (self.length - s).max(0.0))
    }

    pub fn get_end_clothoid(&self) -> Self {
        self.state_at(self.length, 0.0)
    }

    /// a clothoid continuing this one from arc length s, with its own length
    pub(crate) fn state_at(&self, s: Float, length: Float) -> Self {
        let (x, y) = self.eval(s);
        Self {
            x0: x,
            y0: y,
            theta0: self.theta(s),
            kappa0: self.kappa(s),
            dk: self.dk,
            length,
        }
    }

    /// Scale about (cx, cy); a negative factor also reflects through the centre
    pub fn scale(&self, factor: Float, cx: Float, cy: Float) -> Result<Self> {
        check_finite("factor", factor)?;
        check_finite("cx", cx)?;
        check_finite("cy", cy)?;
        if factor == 0.0 {
            return Ok(Self::default());
        }
        let abs_factor = factor.abs();
        let theta0 = if factor < 0.0 {
            self.theta0 + PI
        } else {
            self.theta0
        };
        // overflow surfaces as InvalidInput
        Self::new(
            cx + factor * (self.x0 - cx),
            cy + factor * (self.y0 - cy),
            theta0,
            self.kappa0 / abs_factor,
            self.dk / (factor * factor),
            self.length * abs_factor,
        )
    }

    pub fn scale_about_start(&self, factor: Float) -> Result<Self> {
        self.scale(factor, self.x0, self.y0)
    }

    pub fn translate(&self, dx: Float, dy: Float) -> Result<Self> {
        check_finite("dx", dx)?;
        check_finite("dy", dy)?;
        Self::new(
            self.x0 + dx,
            self.y0 + dy,
            self.theta0,
            self.kappa0,
            self.dk,
            self.length,
        )
    }

    /// Rigid rotation by angle about (cx, cy)
    pub fn rotate(&self, angle: Float, cx: Float, cy: Float) -> Result<Self> {
        check_finite("angle", angle)?;
        check_finite("cx", cx)?;
        check_finite("cy", cy)?;
        let c = cos(angle);
        let s = sin(angle);
        let dx = self.x0 - cx;
        let dy = self.y0 - cy;
        Self::new(
            cx + c * dx - s * dy,
            cy + c * dy + s * dx,
            self.theta0 + angle,
            self.kappa0,
            self.dk,
            self.length,
        )
    }

    /// Same geometry traversed from the end back to the start
    pub fn reverse(&self) -> Self {
        let (x, y) = self.eval(self.length);
        Self {
            x0: x,
            y0: y,
            theta0: self.theta(self.length) + PI,
            kappa0: -self.kappa(self.length),
            dk: self.dk,
            length: self.length,
        }
    }

    /// The part of the curve between s_begin and s_end
    pub fn trim(&self, s_begin: Float, s_end: Float) -> Result<Self> {
        check_finite("s_begin", s_begin)?;
        check_finite("s_end", s_end)?;
        if s_begin > s_end {
            return Err(ClothoidError::invalid_input(format!(
                "trim range reversed: s_begin {s_begin} > s_end {s_end}"
            )));
        }
        Ok(self.state_at(s_begin, s_end - s_begin))
    }

    pub fn flip(&self, axis: FlipAxis) -> Self {
        let (x0, y0, theta0) = match axis {
            FlipAxis::X => (
                self.x0,
                -self.y0,
                atan2(-sin(self.theta0), cos(self.theta0)),
            ),
            FlipAxis::Y => (
                -self.x0,
                self.y0,
                atan2(sin(self.theta0), -cos(self.theta0)),
            ),
            FlipAxis::Start => (self.x0, self.y0, self.theta0),
        };
        Self {
            x0,
            y0,
            theta0,
            kappa0: -self.kappa0,
            dk: -self.dk,
            length: self.length,
        }
    }

    /// num equally spaced points from s = 0 to s = length, num = 1 gives only the start
    pub fn sample(&self, num: usize) -> Result<Vec<[Float; 2]>> {
        if num == 0 {
            return Err(ClothoidError::invalid_input("sample count must be positive"));
        }
        let step = self.length / ((num - 1).max(1) as Float);
        Ok((0..num)
            .map(|i| {
                let (x, y) = self.eval(i as Float * step);
                [x, y]
            })
            .collect())
    }

    pub fn get_points<const NUM: usize>(&self) -> [[Float; 2]; NUM] {
        let mut xys = [[0.0; 2]; NUM];
        let step = self.length / (NUM.saturating_sub(1).max(1) as Float);
        for (i, xys_i) in xys.iter_mut().enumerate() {
            let (x, y) = self.eval(i as Float * step);
            *xys_i = [x, y];
        }
        xys
    }

    /// largest |kappa| over [s0, s1], curvature being linear in s
    pub(crate) fn max_abs_kappa(&self, s0: Float, s1: Float) -> Float {
        self.kappa(s0).abs().max(self.kappa(s1).abs())
    }
}
