//! Material point method snow simulation.
//!
//! Snow is represented as particles carrying mass and an elastic/plastic
//! deformation gradient. Every tick the solver:
//! 1. Rasterizes particle mass and momentum to a uniform grid (P2G).
//! 2. On the very first tick only, fixes per-particle rest volumes.
//! 3. Accumulates gravity and the fixed-corotated stress response into
//!    nodal forces.
//! 4. Integrates nodal velocities explicitly.
//! 5. Projects nodal velocities against the collider list.
//! 6. Optionally refines the velocities with a semi-implicit
//!    conjugate-residual solve.
//! 7. Transports and plastically clamps the deformation gradients.
//! 8. Blends PIC and FLIP velocity estimates per particle.
//! 9. Projects particle velocities against the colliders.
//! 10. Advects particles.
//!
//! # Example
//!
//! ```
//! use glam::{DVec3, UVec3};
//! use snow3d::{Particle, SnowSolver};
//!
//! let mut solver = SnowSolver::new(0.1, UVec3::new(10, 10, 10)).unwrap();
//! solver
//!     .add_particle(Particle::new(
//!         DVec3::new(0.5, 0.5, 0.5),
//!         DVec3::ZERO,
//!         1e-3,
//!     ))
//!     .unwrap();
//!
//! let dt = 1e-4;
//! for tick in 0..10 {
//!     solver.update(dt, tick).unwrap();
//! }
//! ```

pub mod collision;
pub mod constants;
pub mod error;
pub mod forces;
pub mod grid;
pub mod implicit;
pub mod kernels;
pub mod math;
pub mod particle;
pub mod particle_update;
pub mod snapshot;
pub mod transfer;

pub use collision::{collide, Collider, HalfSpace, Wedge};
pub use error::SnowError;
pub use glam::{DMat3, DVec3, IVec3, UVec3};
pub use grid::{Grid, GridNode};
pub use particle::{Particle, Particles};

use crate::constants::{
    lame_lambda, lame_mu, CRITICAL_COMPRESSION, CRITICAL_STRETCH, FLIP_ALPHA,
    HARDENING, POISSONS_RATIO, YOUNGS_MODULUS,
};

/// Material and integration parameters.
#[derive(Clone, Copy, Debug)]
pub struct SnowParams {
    /// Initial shear modulus.
    pub mu0: f64,
    /// Initial second Lame parameter.
    pub lambda0: f64,
    /// Exponential hardening coefficient.
    pub hardening: f64,
    /// Lower clamp margin for elastic singular values.
    pub critical_compression: f64,
    /// Upper clamp margin for elastic singular values.
    pub critical_stretch: f64,
    /// PIC/FLIP blend weight; 0 is pure PIC, 1 is pure FLIP.
    pub alpha: f64,
    /// Implicitness of the velocity update; only used when
    /// `implicit_integration` is set.
    pub beta: f64,
    /// Enables the semi-implicit conjugate-residual velocity solve.
    pub implicit_integration: bool,
}

impl Default for SnowParams {
    fn default() -> Self {
        Self {
            mu0: lame_mu(YOUNGS_MODULUS, POISSONS_RATIO),
            lambda0: lame_lambda(YOUNGS_MODULUS, POISSONS_RATIO),
            hardening: HARDENING,
            critical_compression: CRITICAL_COMPRESSION,
            critical_stretch: CRITICAL_STRETCH,
            alpha: FLIP_ALPHA,
            beta: 1.0,
            implicit_integration: false,
        }
    }
}

/// The snow solver: owns the grid, the particle set, and the collider list.
///
/// All state is mutated only inside [`SnowSolver::update`]; between ticks the
/// particle and grid views are consistent snapshots.
pub struct SnowSolver {
    grid: Grid,
    particles: Particles,
    colliders: Vec<Box<dyn Collider>>,
    /// Material and integration parameters. Free to tweak between ticks.
    pub params: SnowParams,
    ticks: u64,
}

impl SnowSolver {
    /// Creates a solver over a grid of `size` nodes per axis with spacing
    /// `h`, no particles, and no colliders.
    pub fn new(h: f64, size: UVec3) -> Result<Self, SnowError> {
        let grid = Grid::new(h, size)?;
        log::info!(
            "snow solver: {}x{}x{} nodes, h={}",
            size.x,
            size.y,
            size.z,
            h
        );
        Ok(Self {
            grid,
            particles: Particles::new(),
            colliders: Vec::new(),
            params: SnowParams::default(),
            ticks: 0,
        })
    }

    /// Adds a particle.
    ///
    /// Before the first tick any positive-mass particle is accepted and its
    /// rest volume is computed during initialization. Afterwards particles
    /// must arrive with a precomputed rest volume.
    pub fn add_particle(&mut self, particle: Particle) -> Result<(), SnowError> {
        if !(particle.mass > 0.0) {
            return Err(SnowError::NonPositiveMass {
                mass: particle.mass,
            });
        }
        if self.ticks > 0 && !(particle.volume0 > 0.0) {
            return Err(SnowError::VolumeUninitialized);
        }
        self.particles.push(particle);
        Ok(())
    }

    /// Installs a collider. The solver queries every collider for every
    /// grid node and particle each tick.
    pub fn add_collider(&mut self, collider: Box<dyn Collider>) {
        self.colliders.push(collider);
    }

    /// Advances the simulation by one tick of length `dt`.
    ///
    /// `tick_index` must equal the number of completed ticks: the first call
    /// passes 0 (running the one-time volume initialization), the next 1,
    /// and so on.
    pub fn update(&mut self, dt: f64, tick_index: u64) -> Result<(), SnowError> {
        if tick_index != self.ticks {
            return Err(SnowError::TickOutOfOrder {
                expected: self.ticks,
                actual: tick_index,
            });
        }
        log::debug!("tick {tick_index}: dt={dt}");

        log::debug!("step 1: rasterize mass and momentum");
        transfer::rasterize(&mut self.grid, &self.particles);

        if tick_index == 0 {
            log::debug!("step 2: initialize particle volumes");
            transfer::compute_particle_volumes(&mut self.grid, &mut self.particles);
        }

        log::debug!("steps 3-5: forces, explicit update, node collisions");
        forces::compute_forces(&mut self.grid, &self.particles, &self.params);
        forces::integrate_explicit(&mut self.grid, &self.colliders, dt);

        if self.params.implicit_integration {
            log::debug!("step 6: implicit velocity solve");
            implicit::solve_velocities(&mut self.grid, &self.particles, &self.params, dt);
        } else {
            for node in self.grid.nodes_mut() {
                node.velocity_next = node.velocity_star;
            }
        }

        log::debug!("steps 7-10: particle update");
        particle_update::update_particles(
            &self.grid,
            &mut self.particles,
            &self.colliders,
            &self.params,
            dt,
        );

        self.check_particle_state()?;
        self.ticks += 1;
        Ok(())
    }

    /// Number of completed ticks.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The grid, read-only.
    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// The particle set, read-only.
    #[inline]
    pub fn particle_set(&self) -> &Particles {
        &self.particles
    }

    /// Read-only iteration over particles, in insertion order.
    pub fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    /// Read-only iteration over grid nodes, in flat-index order.
    pub fn grid_nodes(&self) -> impl Iterator<Item = &GridNode> {
        self.grid.nodes().iter()
    }

    pub(crate) fn restore(grid: Grid, particles: Particles, ticks: u64) -> Self {
        Self {
            grid,
            particles,
            colliders: Vec::new(),
            params: SnowParams::default(),
            ticks,
        }
    }

    /// End-of-tick numerical health sweep over particle state.
    fn check_particle_state(&self) -> Result<(), SnowError> {
        for (index, p) in self.particles.iter().enumerate() {
            let finite = p.position.is_finite()
                && p.velocity.is_finite()
                && math::mat_is_finite(&p.deform_elastic)
                && math::mat_is_finite(&p.deform_plastic);
            if !finite {
                return Err(SnowError::NonFiniteParticle { index });
            }
            let det = p.deform_elastic.determinant();
            if det <= 0.0 {
                return Err(SnowError::NonPositiveDeterminant { index, det });
            }
        }
        Ok(())
    }
}
