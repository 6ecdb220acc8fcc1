//! Cubic B-spline interpolation kernel on the uniform grid.
//!
//! Particles couple to grid nodes through the tensor product of the 1D
//! cubic spline. The support is two cells in every direction, so a particle
//! touches at most a 4x4x4 block of nodes.

use glam::{DVec3, IVec3};

/// 1D cubic B-spline weight. Support is `|x| < 2`.
#[inline]
pub fn bspline(x: f64) -> f64 {
    let a = x.abs();
    if a < 1.0 {
        0.5 * a * a * a - a * a + 2.0 / 3.0
    } else if a < 2.0 {
        let b = 2.0 - a;
        b * b * b / 6.0
    } else {
        0.0
    }
}

/// Derivative of the 1D cubic B-spline.
#[inline]
pub fn bspline_deriv(x: f64) -> f64 {
    let a = x.abs();
    if a < 1.0 {
        x.signum() * (1.5 * a * a - 2.0 * a)
    } else if a < 2.0 {
        let b = 2.0 - a;
        x.signum() * (-0.5 * b * b)
    } else {
        0.0
    }
}

/// 3D interpolation weight for a particle-to-node offset already divided by
/// the grid spacing.
#[inline]
pub fn weight(d: DVec3) -> f64 {
    bspline(d.x) * bspline(d.y) * bspline(d.z)
}

/// Gradient of the 3D weight with respect to the particle position.
#[inline]
pub fn weight_gradient(d: DVec3, inv_h: f64) -> DVec3 {
    let nx = bspline(d.x);
    let ny = bspline(d.y);
    let nz = bspline(d.z);
    DVec3::new(
        bspline_deriv(d.x) * ny * nz,
        nx * bspline_deriv(d.y) * nz,
        nx * ny * bspline_deriv(d.z),
    ) * inv_h
}

/// Inclusive integer range of grid nodes a particle at `position` couples
/// to: `floor(p/h) - 1` through `floor(p/h) + 2` along each axis.
#[inline]
pub fn support_range(position: DVec3, inv_h: f64) -> (IVec3, IVec3) {
    let base = (position * inv_h).floor().as_ivec3();
    (base - IVec3::ONE, base + IVec3::splat(2))
}
