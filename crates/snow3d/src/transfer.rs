//! Particle-grid transfer.
//!
//! P2G scatters mass and momentum into the 4x4x4 support window of every
//! particle; G2P gathers the updated grid velocities back. The scatter loop
//! is intentionally serial so results do not depend on scheduling; the
//! gathers are free functions the (parallel) particle update calls per
//! particle.

use glam::{DMat3, DVec3};

use crate::grid::Grid;
use crate::kernels::{support_range, weight, weight_gradient};
use crate::math::outer;
use crate::particle::{Particle, Particles};

/// Rasterizes particle mass and momentum to the grid, then converts nodal
/// momentum to velocity. Nodes that receive no mass get zero velocity.
pub fn rasterize(grid: &mut Grid, particles: &Particles) {
    for node in grid.nodes_mut() {
        node.mass = 0.0;
        node.velocity = DVec3::ZERO;
    }

    let h = grid.h();
    let inv_h = grid.inv_h();
    for particle in particles.iter() {
        let (gmin, gmax) = support_range(particle.position, inv_h);
        for gz in gmin.z..=gmax.z {
            for gy in gmin.y..=gmax.y {
                for gx in gmin.x..=gmax.x {
                    let Some(index) = grid.index(glam::IVec3::new(gx, gy, gz)) else {
                        continue;
                    };
                    let node_position =
                        DVec3::new(gx as f64, gy as f64, gz as f64) * h;
                    let w = weight((particle.position - node_position) * inv_h);
                    if w == 0.0 {
                        continue;
                    }
                    let weighted_mass = particle.mass * w;
                    let node = &mut grid.nodes_mut()[index];
                    node.mass += weighted_mass;
                    node.velocity += particle.velocity * weighted_mass;
                }
            }
        }
    }

    for node in grid.nodes_mut() {
        if node.mass > 0.0 {
            node.velocity /= node.mass;
        } else {
            node.velocity = DVec3::ZERO;
        }
    }
}

/// Assigns every particle its rest volume from the freshly rasterized grid
/// masses. Runs once, on the initialization tick; `volume0` is frozen
/// afterwards.
pub fn compute_particle_volumes(grid: &mut Grid, particles: &mut Particles) {
    let h = grid.h();
    let inv_h = grid.inv_h();
    let cell_volume = h * h * h;

    for node in grid.nodes_mut() {
        node.density0 = node.mass / cell_volume;
    }

    for particle in particles.iter_mut() {
        let mut density = 0.0;
        let (gmin, gmax) = support_range(particle.position, inv_h);
        for gz in gmin.z..=gmax.z {
            for gy in gmin.y..=gmax.y {
                for gx in gmin.x..=gmax.x {
                    let Some(index) = grid.index(glam::IVec3::new(gx, gy, gz)) else {
                        continue;
                    };
                    let node = &grid.nodes()[index];
                    density += node.density0
                        * weight((particle.position - node.position) * inv_h);
                }
            }
        }
        if density > 0.0 {
            particle.volume0 = particle.mass / density;
        } else {
            log::warn!("particle outside the grid kept zero rest volume");
        }
    }
}

/// Gradient of the end-of-tick grid velocity field at a particle position.
pub fn velocity_gradient(grid: &Grid, position: DVec3) -> DMat3 {
    let inv_h = grid.inv_h();
    let mut gradient = DMat3::ZERO;
    let (gmin, gmax) = support_range(position, inv_h);
    for gz in gmin.z..=gmax.z {
        for gy in gmin.y..=gmax.y {
            for gx in gmin.x..=gmax.x {
                let Some(index) = grid.index(glam::IVec3::new(gx, gy, gz)) else {
                    continue;
                };
                let node = &grid.nodes()[index];
                let grad_w = weight_gradient((position - node.position) * inv_h, inv_h);
                gradient += outer(node.velocity_next, grad_w);
            }
        }
    }
    gradient
}

/// Gathers the PIC and FLIP velocity estimates for one particle from the
/// start- and end-of-tick grid velocities.
pub fn gather_pic_flip(grid: &Grid, particle: &Particle) -> (DVec3, DVec3) {
    let inv_h = grid.inv_h();
    let mut v_pic = DVec3::ZERO;
    let mut delta = DVec3::ZERO;
    let (gmin, gmax) = support_range(particle.position, inv_h);
    for gz in gmin.z..=gmax.z {
        for gy in gmin.y..=gmax.y {
            for gx in gmin.x..=gmax.x {
                let Some(index) = grid.index(glam::IVec3::new(gx, gy, gz)) else {
                    continue;
                };
                let node = &grid.nodes()[index];
                let w = weight((particle.position - node.position) * inv_h);
                v_pic += node.velocity_next * w;
                delta += (node.velocity_next - node.velocity) * w;
            }
        }
    }
    (v_pic, particle.velocity + delta)
}
