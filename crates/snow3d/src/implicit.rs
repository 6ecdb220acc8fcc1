//! Semi-implicit velocity update via a matrix-free conjugate-residual solve.
//!
//! The linear operator applies `A v = v - (beta * dt / m) * df(v)`, where
//! `df` is the first-order change in nodal elastic force under a virtual
//! nodal velocity field `v`. Nothing is assembled; every application walks
//! the particles once.

use glam::{DMat3, DVec3};

use crate::forces::hardened_lame;
use crate::grid::Grid;
use crate::kernels::{support_range, weight_gradient};
use crate::math::{cofactor, cofactor_differential, ddot, outer, polar_decompose};
use crate::particle::Particles;
use crate::SnowParams;

/// Residual threshold for the conjugate-residual iteration.
pub const SOLVER_TOLERANCE: f64 = 1e-10;

/// Iteration cap; hitting it keeps the best iterate and logs a warning.
pub const SOLVER_MAX_ITERATIONS: usize = 500;

/// Differential of the first Piola-Kirchhoff-style stress term
/// `2 mu (F - R) + lambda (J - 1) cof(F)` along the increment `df`.
pub(crate) fn stress_differential(
    deform_elastic: &DMat3,
    d_deform_elastic: &DMat3,
    mu: f64,
    lambda: f64,
) -> DMat3 {
    let (r, s) = polar_decompose(deform_elastic);

    // The rotation differential dR = R * skew(a, b, c) follows from the
    // skew-symmetric part of R^T dF; the unknowns solve a symmetric 3x3
    // system built from S.
    let omega = r.transpose() * *d_deform_elastic - d_deform_elastic.transpose() * r;
    let s00 = s.x_axis.x;
    let s11 = s.y_axis.y;
    let s22 = s.z_axis.z;
    let s01 = s.y_axis.x;
    let s02 = s.z_axis.x;
    let s12 = s.z_axis.y;
    let coeffs = DMat3::from_cols(
        DVec3::new(s00 + s11, s12, -s02),
        DVec3::new(s12, s00 + s22, s01),
        DVec3::new(-s02, s01, s11 + s22),
    );
    let rhs = DVec3::new(omega.y_axis.x, omega.z_axis.x, omega.z_axis.y);
    let abc = coeffs.inverse() * rhs;
    let skew = DMat3::from_cols(
        DVec3::new(0.0, -abc.x, -abc.y),
        DVec3::new(abc.x, 0.0, -abc.z),
        DVec3::new(abc.y, abc.z, 0.0),
    );
    let d_rotation = r * skew;

    let je = deform_elastic.determinant();
    let cof = cofactor(deform_elastic);
    let d_je = ddot(&cof, d_deform_elastic);
    let d_cof = cofactor_differential(deform_elastic, d_deform_elastic);

    (*d_deform_elastic - d_rotation) * (2.0 * mu)
        + (cof * d_je + d_cof * (je - 1.0)) * lambda
}

/// The matrix-free operator for one tick's implicit system.
pub(crate) struct ImplicitOperator<'a> {
    pub grid: &'a Grid,
    pub particles: &'a Particles,
    pub params: &'a SnowParams,
    pub dt: f64,
}

impl ImplicitOperator<'_> {
    /// Applies `A` to the nodal velocity field `v`, writing into `out`.
    pub fn apply(&self, v: &[DVec3], out: &mut [DVec3]) {
        debug_assert_eq!(v.len(), self.grid.len());
        debug_assert_eq!(out.len(), self.grid.len());

        let inv_h = self.grid.inv_h();
        let mut d_force = vec![DVec3::ZERO; v.len()];

        for particle in self.particles.iter() {
            let (gmin, gmax) = support_range(particle.position, inv_h);

            // dF_E = dt * (sum_g v_g outer grad w) * F_E
            let mut gradient = DMat3::ZERO;
            for gz in gmin.z..=gmax.z {
                for gy in gmin.y..=gmax.y {
                    for gx in gmin.x..=gmax.x {
                        let Some(index) =
                            self.grid.index(glam::IVec3::new(gx, gy, gz))
                        else {
                            continue;
                        };
                        let node_position = self.grid.nodes()[index].position;
                        let grad_w = weight_gradient(
                            (particle.position - node_position) * inv_h,
                            inv_h,
                        );
                        gradient += outer(v[index], grad_w);
                    }
                }
            }
            let d_deform_elastic = gradient * particle.deform_elastic * self.dt;

            let jp = particle.deform_plastic.determinant();
            let (mu, lambda) = hardened_lame(self.params, jp);
            let d_stress = stress_differential(
                &particle.deform_elastic,
                &d_deform_elastic,
                mu,
                lambda,
            );
            let unweighted = d_stress
                * particle.deform_elastic.transpose()
                * (-particle.volume0);

            for gz in gmin.z..=gmax.z {
                for gy in gmin.y..=gmax.y {
                    for gx in gmin.x..=gmax.x {
                        let Some(index) =
                            self.grid.index(glam::IVec3::new(gx, gy, gz))
                        else {
                            continue;
                        };
                        let node_position = self.grid.nodes()[index].position;
                        let grad_w = weight_gradient(
                            (particle.position - node_position) * inv_h,
                            inv_h,
                        );
                        d_force[index] += unweighted * grad_w;
                    }
                }
            }
        }

        let scale = self.params.beta * self.dt;
        for (index, node) in self.grid.nodes().iter().enumerate() {
            out[index] = v[index];
            if node.mass > 0.0 {
                out[index] -= d_force[index] * (scale / node.mass);
            }
        }
    }
}

fn dot(a: &[DVec3], b: &[DVec3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x.dot(*y)).sum()
}

/// Matrix-free conjugate-residual iteration, warm-started from `x`.
///
/// Stops when the residual norm drops below `tolerance` or after
/// `max_iterations` applications; in the latter case the best iterate is
/// kept and a warning is logged.
pub(crate) fn conjugate_residual(
    op: &ImplicitOperator<'_>,
    x: &mut [DVec3],
    b: &[DVec3],
    max_iterations: usize,
    tolerance: f64,
) {
    let n = b.len();
    let mut r = vec![DVec3::ZERO; n];
    let mut scratch = vec![DVec3::ZERO; n];

    op.apply(x, &mut scratch);
    for i in 0..n {
        r[i] = b[i] - scratch[i];
    }

    let mut p = r.clone();
    let mut a_r = vec![DVec3::ZERO; n];
    op.apply(&r, &mut a_r);
    let mut a_p = a_r.clone();
    let mut r_dot_ar = dot(&r, &a_r);

    for iteration in 0..max_iterations {
        if dot(&r, &r).sqrt() <= tolerance {
            log::debug!("conjugate residual converged after {iteration} iterations");
            return;
        }

        let ap_dot_ap = dot(&a_p, &a_p);
        if ap_dot_ap == 0.0 || r_dot_ar == 0.0 {
            break;
        }

        let alpha = r_dot_ar / ap_dot_ap;
        for i in 0..n {
            x[i] += p[i] * alpha;
            r[i] -= a_p[i] * alpha;
        }

        op.apply(&r, &mut a_r);
        let r_dot_ar_next = dot(&r, &a_r);
        let beta = r_dot_ar_next / r_dot_ar;
        for i in 0..n {
            p[i] = r[i] + p[i] * beta;
            a_p[i] = a_r[i] + a_p[i] * beta;
        }
        r_dot_ar = r_dot_ar_next;
    }

    if dot(&r, &r).sqrt() > tolerance {
        log::warn!(
            "conjugate residual stopped at residual {:.3e} after {} iterations",
            dot(&r, &r).sqrt(),
            max_iterations
        );
    }
}

/// Solves the implicit system for end-of-tick velocities, starting from the
/// explicit estimate. Falls back to that estimate wherever the solve cannot
/// improve it.
pub(crate) fn solve_velocities(
    grid: &mut Grid,
    particles: &Particles,
    params: &SnowParams,
    dt: f64,
) {
    let b: Vec<DVec3> = grid.nodes().iter().map(|n| n.velocity_star).collect();
    let mut x = b.clone();
    {
        let op = ImplicitOperator {
            grid,
            particles,
            params,
            dt,
        };
        conjugate_residual(&op, &mut x, &b, SOLVER_MAX_ITERATIONS, SOLVER_TOLERANCE);
    }
    for (node, velocity) in grid.nodes_mut().iter_mut().zip(x) {
        node.velocity_next = velocity;
    }
}
