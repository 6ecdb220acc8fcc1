//! End-to-end solver scenarios: free fall, floor contact, transfer
//! round-trips, conservation, plasticity bounds, and determinism.

use glam::{DMat3, DVec3, UVec3};
use snow3d::math::svd3;
use snow3d::{transfer, Grid, HalfSpace, Particle, Particles, SnowError, SnowSolver};

const DT: f64 = 1e-4;

/// A single particle under gravity alone follows the analytic parabola.
#[test]
fn free_fall_matches_the_analytic_trajectory() {
    let mut solver = SnowSolver::new(0.1, UVec3::new(10, 10, 10)).unwrap();
    solver
        .add_particle(Particle::new(DVec3::splat(0.5), DVec3::ZERO, 0.01))
        .unwrap();

    let ticks = 100u64;
    for tick in 0..ticks {
        solver.update(DT, tick).unwrap();
    }

    let p = solver.particles().next().unwrap();
    let elapsed = ticks as f64 * DT;
    let expected_z = 0.5 - 0.5 * 9.8 * elapsed * elapsed;
    assert!(
        (p.position.z - expected_z).abs() < 1e-3,
        "z = {}, expected {}",
        p.position.z,
        expected_z
    );
    assert!((p.position.x - 0.5).abs() < 1e-9);
    assert!((p.position.y - 0.5).abs() < 1e-9);
}

/// A particle dropped over the rough floor settles onto it: it never sinks
/// below the plane, never climbs back above its start, and loses most of
/// its speed.
#[test]
fn floor_contact_sticks_and_damps() {
    let mut solver = SnowSolver::new(0.05, UVec3::new(20, 20, 8)).unwrap();
    solver
        .add_particle(Particle::new(DVec3::new(0.5, 0.5, 0.2), DVec3::ZERO, 0.4))
        .unwrap();
    solver.add_collider(Box::new(HalfSpace::reference_floor()));

    let mut previous_z = 0.2f64;
    let mut max_rise = 0.0f64;
    for tick in 0..1000 {
        solver.update(DT, tick).unwrap();
        let z = solver.particles().next().unwrap().position.z;
        assert!(z > 0.099, "particle sank through the floor: z = {z}");
        max_rise = max_rise.max(z - previous_z);
        previous_z = z;
    }

    let p = solver.particles().next().unwrap();
    assert!(p.position.z < 0.2, "particle never fell");
    assert!(
        max_rise < 5e-4,
        "particle bounced upward by {max_rise} in one tick"
    );
    // Free fall over the same interval would reach 0.98 m/s.
    assert!(
        p.velocity.length() < 0.5,
        "contact failed to damp the fall: speed = {}",
        p.velocity.length()
    );
}

/// Rasterizing a uniform velocity field and gathering it straight back
/// reproduces the field per particle.
#[test]
fn transfer_round_trip_preserves_uniform_velocity() {
    let mut grid = Grid::new(0.1, UVec3::new(12, 12, 12)).unwrap();
    let mut particles = Particles::new();
    let velocity = DVec3::new(1.0, 0.0, 0.0);
    for i in 0..4 {
        for j in 0..4 {
            particles.push(Particle::new(
                DVec3::new(
                    0.42 + i as f64 * 0.13,
                    0.45 + j as f64 * 0.11,
                    0.55,
                ),
                velocity,
                2e-3,
            ));
        }
    }

    transfer::rasterize(&mut grid, &particles);
    for node in grid.nodes_mut() {
        node.velocity_next = node.velocity;
    }

    for particle in particles.iter() {
        let (v_pic, _) = transfer::gather_pic_flip(&grid, particle);
        assert!(
            (v_pic - velocity).abs().max_element() < 1e-10,
            "gathered velocity {v_pic}"
        );
    }
}

/// Grid mass and momentum equal the particle totals right after
/// rasterization, before any force is applied.
#[test]
fn rasterization_conserves_mass_and_momentum() {
    let mut grid = Grid::new(0.1, UVec3::new(12, 12, 12)).unwrap();
    let mut particles = Particles::new();
    for i in 0..30 {
        particles.push(Particle::new(
            DVec3::new(
                0.35 + (i % 5) as f64 * 0.1,
                0.4 + (i % 3) as f64 * 0.12,
                0.45 + (i % 2) as f64 * 0.15,
            ),
            DVec3::new(0.3 * i as f64, -0.2, 0.1),
            1e-3 + 1e-5 * i as f64,
        ));
    }

    transfer::rasterize(&mut grid, &particles);

    let mass_error =
        (grid.total_mass() - particles.total_mass()).abs() / particles.total_mass();
    assert!(mass_error < 1e-9, "relative mass error {mass_error}");

    let momentum_error = (grid.momentum() - particles.momentum())
        .abs()
        .max_element();
    assert!(momentum_error < 1e-9, "momentum error {momentum_error}");
}

/// Elastic singular values stay inside the yield surface after every tick,
/// even through hard contact.
#[test]
fn plastic_clamp_bounds_hold_through_contact() {
    let mut solver = SnowSolver::new(0.05, UVec3::new(16, 16, 10)).unwrap();
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                solver
                    .add_particle(Particle::new(
                        DVec3::new(
                            0.35 + i as f64 * 0.03,
                            0.35 + j as f64 * 0.03,
                            0.16 + k as f64 * 0.03,
                        ),
                        DVec3::new(0.0, 0.0, -1.0),
                        0.05,
                    ))
                    .unwrap();
            }
        }
    }
    solver.add_collider(Box::new(HalfSpace::reference_floor()));

    let lower = 1.0 - solver.params.critical_compression - 1e-12;
    let upper = 1.0 + solver.params.critical_stretch + 1e-12;
    for tick in 0..60 {
        solver.update(DT, tick).unwrap();
        for (index, particle) in solver.particles().enumerate() {
            let svd = svd3(&particle.deform_elastic);
            for axis in 0..3 {
                let sigma = svd.sigma[axis];
                assert!(
                    (lower..=upper).contains(&sigma),
                    "tick {tick}, particle {index}: singular value {sigma}"
                );
            }
        }
    }
}

/// An infinite velocity poisons the tick and is reported as a numerical
/// failure instead of silently propagating.
#[test]
fn non_finite_state_is_detected_at_the_tick_boundary() {
    let mut solver = SnowSolver::new(0.1, UVec3::new(10, 10, 10)).unwrap();
    solver
        .add_particle(Particle::new(
            DVec3::splat(0.5),
            DVec3::new(f64::INFINITY, 0.0, 0.0),
            0.01,
        ))
        .unwrap();

    assert!(matches!(
        solver.update(DT, 0),
        Err(SnowError::NonFiniteParticle { index: 0 })
    ));
}

/// A deformation gradient that loses orientation is rejected.
#[test]
fn negative_elastic_determinant_is_detected() {
    let mut solver = SnowSolver::new(0.1, UVec3::new(10, 10, 10)).unwrap();
    let mut particle = Particle::new(DVec3::splat(0.5), DVec3::ZERO, 0.01);
    particle.deform_elastic = DMat3::from_diagonal(DVec3::new(-1.0, 1.0, 1.0));
    solver.add_particle(particle).unwrap();

    assert!(matches!(
        solver.update(DT, 0),
        Err(SnowError::NonPositiveDeterminant { index: 0, .. })
    ));
}

/// The same scene, step size, and tick count produce bitwise identical
/// particle positions on every run.
#[test]
fn reruns_are_bitwise_deterministic() {
    let run = || {
        let mut solver = SnowSolver::new(0.05, UVec3::new(16, 16, 10)).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                solver
                    .add_particle(Particle::new(
                        DVec3::new(0.3 + i as f64 * 0.04, 0.3 + j as f64 * 0.04, 0.25),
                        DVec3::new(0.1, -0.05, -0.5),
                        0.03,
                    ))
                    .unwrap();
            }
        }
        solver.add_collider(Box::new(HalfSpace::reference_floor()));
        for tick in 0..30 {
            solver.update(DT, tick).unwrap();
        }
        solver
            .particles()
            .flat_map(|p| p.position.to_array())
            .map(f64::to_bits)
            .collect::<Vec<u64>>()
    };

    assert_eq!(run(), run());
}
