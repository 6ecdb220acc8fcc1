//! Lagrangian snow particles.

use glam::{DMat3, DVec3};
use rayon::prelude::*;

/// A single material point.
///
/// The deformation gradient is stored as its elastic and plastic factors;
/// the full gradient is their product. `volume0` is assigned once during
/// the solver's initialization tick and never changes afterwards.
#[derive(Clone, Copy, Debug)]
pub struct Particle {
    /// World position.
    pub position: DVec3,
    /// Velocity at the current tick.
    pub velocity: DVec3,
    /// Scratch velocity between the grid gather and the collision pass.
    pub velocity_star: DVec3,
    /// Mass, constant for the particle's lifetime.
    pub mass: f64,
    /// Rest volume; zero until the initialization tick assigns it.
    pub volume0: f64,
    /// Elastic part of the deformation gradient.
    pub deform_elastic: DMat3,
    /// Plastic part of the deformation gradient.
    pub deform_plastic: DMat3,
}

impl Particle {
    /// Creates a particle with an undeformed configuration.
    pub fn new(position: DVec3, velocity: DVec3, mass: f64) -> Self {
        Self {
            position,
            velocity,
            velocity_star: DVec3::ZERO,
            mass,
            volume0: 0.0,
            deform_elastic: DMat3::IDENTITY,
            deform_plastic: DMat3::IDENTITY,
        }
    }

    /// Attaches a precomputed rest volume, for particles introduced after
    /// the initialization tick.
    pub fn with_volume0(mut self, volume0: f64) -> Self {
        self.volume0 = volume0;
        self
    }
}

/// Flat particle storage with stable iteration order.
#[derive(Default)]
pub struct Particles {
    list: Vec<Particle>,
}

impl Particles {
    /// Creates an empty particle set.
    pub fn new() -> Self {
        Self { list: Vec::new() }
    }

    /// Appends a particle; insertion order is iteration order.
    pub fn push(&mut self, particle: Particle) {
        self.list.push(particle);
    }

    /// Number of particles.
    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True when no particles have been added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Particle by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.list.get(index)
    }

    /// Read-only iteration in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.list.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.list.iter_mut()
    }

    pub(crate) fn par_iter_mut(&mut self) -> rayon::slice::IterMut<'_, Particle> {
        self.list.par_iter_mut()
    }

    /// Sum of particle masses.
    pub fn total_mass(&self) -> f64 {
        self.list.iter().map(|p| p.mass).sum()
    }

    /// Total particle momentum.
    pub fn momentum(&self) -> DVec3 {
        self.list
            .iter()
            .fold(DVec3::ZERO, |acc, p| acc + p.velocity * p.mass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particle_is_undeformed() {
        let p = Particle::new(DVec3::splat(0.5), DVec3::ZERO, 1e-3);
        assert_eq!(p.deform_elastic, DMat3::IDENTITY);
        assert_eq!(p.deform_plastic, DMat3::IDENTITY);
        assert_eq!(p.volume0, 0.0);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut particles = Particles::new();
        for i in 0..8 {
            particles.push(Particle::new(
                DVec3::new(i as f64, 0.0, 0.0),
                DVec3::ZERO,
                1.0,
            ));
        }
        let xs: Vec<f64> = particles.iter().map(|p| p.position.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn mass_and_momentum_totals() {
        let mut particles = Particles::new();
        particles.push(Particle::new(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0), 2.0));
        particles.push(Particle::new(DVec3::ZERO, DVec3::new(0.0, 3.0, 0.0), 0.5));
        assert!((particles.total_mass() - 2.5).abs() < 1e-15);
        let momentum = particles.momentum();
        assert!((momentum - DVec3::new(2.0, 1.5, 0.0)).abs().max_element() < 1e-15);
    }
}
