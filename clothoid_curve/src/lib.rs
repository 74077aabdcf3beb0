//! Clothoid (Euler spiral) curves: evaluation, G1/G2 fitting, projection and intersection.
//!
//! A clothoid is a curve whose curvature changes linearly with arc length:
//!
//! ```text
//! theta(s) = theta0 + kappa0 * s + 1/2 * dk * s^2
//! kappa(s) = kappa0 + dk * s
//! ```
//!
//! Positions are evaluated through the generalized Fresnel integrals in [`fresnel`].

pub mod bbox;
pub mod cache;
pub mod clothoid;
pub mod error;
pub mod fit;
pub mod fresnel;
pub mod g2;
pub mod intersection;
pub mod projection;
pub mod roots;

pub type Float = f64;

pub use crate::cache::{CacheInfo, CachedClothoid};
pub use crate::clothoid::{
    angle_unwrap, curvature_per_meter, curvature_per_meter_float, Clothoid, CurvaturePerLength,
    FlipAxis, Position,
};
pub use crate::error::{ClothoidError, Result};
pub use crate::fit::{build_forward, build_g1, build_g1_with_iterations};
pub use crate::g2::{solve_g2, G2Chain, G2Params};
pub use crate::intersection::{intersection_points, intersections, self_intersections};
pub use crate::projection::Projection;

#[cfg(test)]
mod tests {
    use uom::si::curvature::radian_per_meter;
    use uom::si::f64::{Curvature, ReciprocalLength};
    use uom::si::reciprocal_length::reciprocal_meter;

    #[test]
    fn curvature_vs_reciprocal_length() {
        let c0 = Curvature::new::<radian_per_meter>(0.5);
        let c1: Curvature = ReciprocalLength::new::<reciprocal_meter>(0.5).into();
        // the angle kind doesn't distinguish these
        assert_eq!(c0, c1);
    }
}
