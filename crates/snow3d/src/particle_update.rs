//! End-of-tick particle update: deformation gradient evolution, plastic
//! yield, PIC/FLIP velocity blend, collision, and advection.
//!
//! Every particle only reads the grid and writes itself, so the whole pass
//! runs in parallel and is bitwise reproducible for any thread count.

use glam::{DMat3, DVec3};
use rayon::prelude::*;

use crate::collision::{collide, Collider};
use crate::grid::Grid;
use crate::math::svd3;
use crate::particle::Particles;
use crate::transfer::{gather_pic_flip, velocity_gradient};
use crate::SnowParams;

/// Advances all particles to the end of the tick from the updated grid
/// velocities.
pub fn update_particles(
    grid: &Grid,
    particles: &mut Particles,
    colliders: &[Box<dyn Collider>],
    params: &SnowParams,
    dt: f64,
) {
    let sigma_min = DVec3::splat(1.0 - params.critical_compression);
    let sigma_max = DVec3::splat(1.0 + params.critical_stretch);
    let alpha = params.alpha;

    particles.par_iter_mut().for_each(|particle| {
        // Trial elastic update from the grid velocity gradient; the full
        // gradient F = F_E * F_P is transported as a whole.
        let gradient = velocity_gradient(grid, particle.position);
        let multiplier = DMat3::IDENTITY + gradient * dt;
        let deform_trial =
            multiplier * particle.deform_elastic * particle.deform_plastic;
        let elastic_trial = multiplier * particle.deform_elastic;

        // Plastic yield: clamp the elastic singular values and push the
        // remainder of the deformation into the plastic factor.
        let svd = svd3(&elastic_trial);
        let sigma = svd.sigma.clamp(sigma_min, sigma_max);
        particle.deform_elastic =
            svd.u * DMat3::from_diagonal(sigma) * svd.v.transpose();
        particle.deform_plastic = svd.v
            * DMat3::from_diagonal(sigma.recip())
            * svd.u.transpose()
            * deform_trial;

        // PIC/FLIP velocity blend.
        let (v_pic, v_flip) = gather_pic_flip(grid, particle);
        particle.velocity_star = v_pic * (1.0 - alpha) + v_flip * alpha;

        // Collision, then advection with the post-collision velocity.
        particle.velocity_star =
            collide(particle.velocity_star, particle.position, colliders);
        particle.velocity = particle.velocity_star;
        particle.position += particle.velocity * dt;
    });
}
