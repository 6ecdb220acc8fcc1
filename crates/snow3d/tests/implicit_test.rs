//! Behavior of the optional semi-implicit velocity solve.

use glam::{DVec3, UVec3};
use snow3d::math::svd3;
use snow3d::{HalfSpace, Particle, SnowSolver};

const DT: f64 = 1e-4;

fn seeded_solver() -> SnowSolver {
    let mut solver = SnowSolver::new(0.05, UVec3::new(12, 12, 10)).unwrap();
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..2 {
                solver
                    .add_particle(Particle::new(
                        DVec3::new(
                            0.25 + i as f64 * 0.03,
                            0.25 + j as f64 * 0.03,
                            0.18 + k as f64 * 0.03,
                        ),
                        DVec3::new(0.05, 0.0, -0.4),
                        0.04,
                    ))
                    .unwrap();
            }
        }
    }
    solver.add_collider(Box::new(HalfSpace::reference_floor()));
    solver
}

fn position_bits(solver: &SnowSolver) -> Vec<u64> {
    solver
        .particles()
        .flat_map(|p| {
            p.position
                .to_array()
                .into_iter()
                .chain(p.velocity.to_array())
        })
        .map(f64::to_bits)
        .collect()
}

/// With the implicitness weight at zero the solve degenerates to the
/// identity, so the implicit path must reproduce the explicit one exactly.
#[test]
fn zero_beta_implicit_matches_explicit_bitwise() {
    let mut explicit = seeded_solver();
    let mut implicit = seeded_solver();
    implicit.params.implicit_integration = true;
    implicit.params.beta = 0.0;

    for tick in 0..10 {
        explicit.update(DT, tick).unwrap();
        implicit.update(DT, tick).unwrap();
    }

    assert_eq!(position_bits(&explicit), position_bits(&implicit));
}

/// The fully implicit path stays finite and keeps the plastic bounds while
/// resolving contact.
#[test]
fn implicit_path_is_stable_through_contact() {
    let mut solver = seeded_solver();
    solver.params.implicit_integration = true;
    solver.params.beta = 1.0;

    for tick in 0..20 {
        solver.update(DT, tick).unwrap();
    }

    let lower = 1.0 - solver.params.critical_compression - 1e-12;
    let upper = 1.0 + solver.params.critical_stretch + 1e-12;
    for particle in solver.particles() {
        assert!(particle.position.is_finite());
        assert!(particle.velocity.is_finite());
        let svd = svd3(&particle.deform_elastic);
        for axis in 0..3 {
            assert!((lower..=upper).contains(&svd.sigma[axis]));
        }
    }
}

/// Implicit and explicit integration agree closely for a short, smooth
/// interval; the implicit correction is a small perturbation at this step
/// size.
#[test]
fn implicit_stays_near_explicit_for_small_steps() {
    let mut explicit = seeded_solver();
    let mut implicit = seeded_solver();
    implicit.params.implicit_integration = true;

    for tick in 0..5 {
        explicit.update(DT, tick).unwrap();
        implicit.update(DT, tick).unwrap();
    }

    for (a, b) in explicit.particles().zip(implicit.particles()) {
        let drift = (a.position - b.position).abs().max_element();
        assert!(drift < 1e-5, "paths diverged by {drift}");
    }
}
