//! Scene generators and headless simulation drivers.
//!
//! Scenes write and consume `frame-<n>.snowstate` files so the generator,
//! the headless simulator, and any external viewer stay decoupled. All
//! sampling is deterministic lattice sampling.

use std::error::Error;
use std::path::{Path, PathBuf};

use glam::{DVec3, UVec3};
use snow3d::constants::SNOW_DENSITY;
use snow3d::{HalfSpace, Particle, SnowSolver, Wedge};

/// Lattice spacing between sampled particles (m).
pub const PARTICLE_SPACING: f64 = 0.0072;

/// Grid spacing: two particles per cell along each axis.
pub const GRID_SPACING: f64 = 2.0 * PARTICLE_SPACING;

/// Side length of the cubic simulation domain (m).
pub const DOMAIN_SIZE: f64 = 1.0;

const FRAME_DT: f64 = 1e-4;
const TICKS_PER_FRAME: u64 = 100;

fn frame_path(dir: &Path, frame: u64) -> PathBuf {
    dir.join(format!("frame-{frame}.snowstate"))
}

fn domain_solver() -> Result<SnowSolver, Box<dyn Error>> {
    let nodes = (DOMAIN_SIZE / GRID_SPACING) as u32;
    Ok(SnowSolver::new(GRID_SPACING, UVec3::splat(nodes))?)
}

/// Particles on a cubic lattice filling a sphere.
pub fn snowball_particles(
    center: DVec3,
    radius: f64,
    density: f64,
    spacing: f64,
) -> Vec<Particle> {
    let mass = density * spacing * spacing * spacing;
    let steps = (radius / spacing).ceil() as i32;
    let mut particles = Vec::new();
    for i in -steps..=steps {
        for j in -steps..=steps {
            for k in -steps..=steps {
                let offset =
                    DVec3::new(i as f64, j as f64, k as f64) * spacing;
                if offset.length() <= radius {
                    particles.push(Particle::new(center + offset, DVec3::ZERO, mass));
                }
            }
        }
    }
    particles
}

/// Particles on a cubic lattice filling an axis-aligned box.
pub fn slab_particles(
    center: DVec3,
    half_extents: DVec3,
    density: f64,
    spacing: f64,
) -> Vec<Particle> {
    let mass = density * spacing * spacing * spacing;
    let steps = (half_extents / spacing).ceil().as_ivec3();
    let mut particles = Vec::new();
    for i in -steps.x..=steps.x {
        for j in -steps.y..=steps.y {
            for k in -steps.z..=steps.z {
                let offset =
                    DVec3::new(i as f64, j as f64, k as f64) * spacing;
                if offset.abs().cmple(half_extents).all() {
                    particles.push(Particle::new(center + offset, DVec3::ZERO, mass));
                }
            }
        }
    }
    particles
}

/// Prints build information and the available routines.
pub fn info(_args: &[String]) -> Result<(), Box<dyn Error>> {
    println!("snow {} (solver snow3d)", env!("CARGO_PKG_VERSION"));
    println!("domain: {DOMAIN_SIZE} m cube, h={GRID_SPACING}, particle spacing {PARTICLE_SPACING}");
    Ok(())
}

/// Generates the snowball scene and writes its initial frame.
pub fn gen_snowball(args: &[String]) -> Result<(), Box<dyn Error>> {
    let out_dir = PathBuf::from(args.first().map(String::as_str).unwrap_or("."));
    let mut solver = domain_solver()?;

    let center = DVec3::splat(0.5);
    for particle in
        snowball_particles(center, 0.03, SNOW_DENSITY, PARTICLE_SPACING)
    {
        solver.add_particle(particle)?;
    }
    log::info!("snowball scene: {} particles", solver.particle_set().len());

    let path = frame_path(&out_dir, 0);
    solver.save_state(&path)?;
    println!("frame 0 written to {}", path.display());
    Ok(())
}

/// Generates the slab scene and writes its initial frame.
pub fn gen_slab(args: &[String]) -> Result<(), Box<dyn Error>> {
    let out_dir = PathBuf::from(args.first().map(String::as_str).unwrap_or("."));
    let mut solver = domain_solver()?;

    let center = DVec3::new(0.5, 0.5, 0.35);
    let half_extents = DVec3::new(0.15, 0.15, 0.03);
    for particle in
        slab_particles(center, half_extents, SNOW_DENSITY, PARTICLE_SPACING)
    {
        solver.add_particle(particle)?;
    }
    log::info!("slab scene: {} particles", solver.particle_set().len());

    let path = frame_path(&out_dir, 0);
    solver.save_state(&path)?;
    println!("frame 0 written to {}", path.display());
    Ok(())
}

fn run_headless(
    args: &[String],
    install_colliders: impl Fn(&mut SnowSolver),
) -> Result<(), Box<dyn Error>> {
    let dir = PathBuf::from(args.first().map(String::as_str).unwrap_or("."));
    let frames: u64 = match args.get(1) {
        Some(raw) => raw.parse()?,
        None => 60,
    };

    let mut solver = SnowSolver::load_state(frame_path(&dir, 0))?;
    install_colliders(&mut solver);

    let mut tick = solver.ticks();
    let first_frame = tick / TICKS_PER_FRAME + 1;
    for frame in first_frame..=frames {
        for _ in 0..TICKS_PER_FRAME {
            solver.update(FRAME_DT, tick)?;
            tick += 1;
        }
        let path = frame_path(&dir, frame);
        solver.save_state(&path)?;
        log::info!("frame {frame}/{frames} written to {}", path.display());
    }
    println!("simulated {frames} frames into {}", dir.display());
    Ok(())
}

/// Headless snowball drop: the reference floor under gravity.
pub fn sim_scene0(args: &[String]) -> Result<(), Box<dyn Error>> {
    run_headless(args, |solver| {
        solver.add_collider(Box::new(HalfSpace::reference_floor()));
    })
}

/// Headless slab over a wedge: the slab lands on a ridge and tears.
pub fn sim_scene1(args: &[String]) -> Result<(), Box<dyn Error>> {
    run_headless(args, |solver| {
        solver.add_collider(Box::new(HalfSpace::reference_floor()));
        solver.add_collider(Box::new(Wedge::new(
            DVec3::new(0.5, 0.5, 0.2),
            DVec3::new(-1.0, 0.0, 1.0),
            DVec3::new(1.0, 0.0, 1.0),
            1.0,
        )));
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowball_lattice_is_deterministic_and_spherical() {
        let a = snowball_particles(DVec3::splat(0.5), 0.03, 400.0, 0.0072);
        let b = snowball_particles(DVec3::splat(0.5), 0.03, 400.0, 0.0072);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.position, y.position);
        }
        for p in &a {
            assert!((p.position - DVec3::splat(0.5)).length() <= 0.03 + 1e-12);
        }
    }

    #[test]
    fn slab_lattice_fills_the_box() {
        let half = DVec3::new(0.05, 0.04, 0.01);
        let particles = slab_particles(DVec3::splat(0.5), half, 400.0, 0.01);
        assert!(!particles.is_empty());
        for p in &particles {
            let offset = (p.position - DVec3::splat(0.5)).abs();
            assert!(offset.cmple(half + DVec3::splat(1e-12)).all());
        }
    }
}
