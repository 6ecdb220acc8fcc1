//! Physical constants and material defaults for the snow solver.
//!
//! The elastic moduli follow the usual snow defaults: a Young's modulus of
//! 1.4e5 Pa and a Poisson ratio of 0.2, converted to Lame parameters at
//! solver construction. Hardening and the critical compression/stretch
//! thresholds control how quickly the material transitions from elastic to
//! plastic response.

use glam::DVec3;

/// Gravity acceleration vector (m/s^2). The z axis points up.
pub const GRAVITY: DVec3 = DVec3::new(0.0, 0.0, -9.8);

/// Initial Young's modulus (Pa) before hardening.
pub const YOUNGS_MODULUS: f64 = 1.4e5;

/// Poisson ratio of snow.
pub const POISSONS_RATIO: f64 = 0.2;

/// Hardening coefficient: exponential stiffening rate under plastic flow.
pub const HARDENING: f64 = 10.0;

/// Critical compression: lower bound on elastic singular values is
/// `1 - CRITICAL_COMPRESSION`.
pub const CRITICAL_COMPRESSION: f64 = 2.5e-2;

/// Critical stretch: upper bound on elastic singular values is
/// `1 + CRITICAL_STRETCH`.
pub const CRITICAL_STRETCH: f64 = 7.5e-3;

/// PIC/FLIP blend weight. 0 is pure PIC, 1 is pure FLIP.
pub const FLIP_ALPHA: f64 = 0.95;

/// Rest density of freshly fallen snow (kg/m^3).
pub const SNOW_DENSITY: f64 = 400.0;

/// First Lame parameter (shear modulus) from Young's modulus and Poisson
/// ratio.
pub fn lame_mu(youngs_modulus: f64, poissons_ratio: f64) -> f64 {
    youngs_modulus / (2.0 * (1.0 + poissons_ratio))
}

/// Second Lame parameter from Young's modulus and Poisson ratio.
pub fn lame_lambda(youngs_modulus: f64, poissons_ratio: f64) -> f64 {
    youngs_modulus * poissons_ratio
        / ((1.0 + poissons_ratio) * (1.0 - 2.0 * poissons_ratio))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lame_parameters_from_snow_defaults() {
        let mu = lame_mu(YOUNGS_MODULUS, POISSONS_RATIO);
        let lambda = lame_lambda(YOUNGS_MODULUS, POISSONS_RATIO);
        assert!((mu - 58333.333333333336).abs() < 1e-6);
        assert!((lambda - 38888.88888888889).abs() < 1e-6);
    }
}
