//! Grid force computation and explicit velocity integration.
//!
//! Forces start from gravity and accumulate the fixed-corotated stress
//! response of every particle, weighted by the interpolation gradient. The
//! explicit integrator then advances nodal velocities and applies the
//! collision projection in place.

use glam::{DMat3, DVec3};
use rayon::prelude::*;

use crate::collision::{collide, Collider};
use crate::constants::GRAVITY;
use crate::grid::Grid;
use crate::kernels::{support_range, weight_gradient};
use crate::math::polar_rot;
use crate::particle::Particles;
use crate::SnowParams;

/// Hardened Lame parameters for a given plastic determinant.
#[inline]
pub(crate) fn hardened_lame(params: &SnowParams, jp: f64) -> (f64, f64) {
    let e = (params.hardening * (1.0 - jp)).exp();
    (params.mu0 * e, params.lambda0 * e)
}

/// Initializes nodal forces to gravity and accumulates the stress response
/// of every particle over its support window.
pub fn compute_forces(grid: &mut Grid, particles: &Particles, params: &SnowParams) {
    for node in grid.nodes_mut() {
        node.force = GRAVITY * node.mass;
    }

    let inv_h = grid.inv_h();
    for particle in particles.iter() {
        let jp = particle.deform_plastic.determinant();
        let je = particle.deform_elastic.determinant();
        let (mu, lambda) = hardened_lame(params, jp);

        let rotation = polar_rot(&particle.deform_elastic);
        let corotated = (particle.deform_elastic - rotation)
            * particle.deform_elastic.transpose()
            * (2.0 * mu);
        let volumetric =
            DMat3::from_diagonal(DVec3::splat(lambda * (je - 1.0) * je));
        let unweighted_force = (corotated + volumetric) * (-particle.volume0);

        let (gmin, gmax) = support_range(particle.position, inv_h);
        for gz in gmin.z..=gmax.z {
            for gy in gmin.y..=gmax.y {
                for gx in gmin.x..=gmax.x {
                    let Some(index) = grid.index(glam::IVec3::new(gx, gy, gz)) else {
                        continue;
                    };
                    let node_position = grid.nodes()[index].position;
                    let grad_w = weight_gradient(
                        (particle.position - node_position) * inv_h,
                        inv_h,
                    );
                    grid.nodes_mut()[index].force += unweighted_force * grad_w;
                }
            }
        }
    }
}

/// Explicit velocity update `v* = v + dt * f / m` followed by the collision
/// projection, per node. Nodes without mass keep their rasterized velocity.
pub fn integrate_explicit(grid: &mut Grid, colliders: &[Box<dyn Collider>], dt: f64) {
    grid.nodes_mut().par_iter_mut().for_each(|node| {
        node.velocity_star = node.velocity;
        if node.mass > 0.0 {
            node.velocity_star += node.force * (dt / node.mass);
        }
        node.velocity_star = collide(node.velocity_star, node.position, colliders);
    });
}
