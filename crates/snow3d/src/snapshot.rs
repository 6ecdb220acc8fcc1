//! Snowstate snapshot files.
//!
//! A snapshot is a magic tag and version, the grid shape and spacing, the
//! completed-tick count, and one dense little-endian record of doubles per
//! particle. Loading a snapshot reconstructs a solver that resumes exactly
//! where the saved one stopped; saving and reloading is bitwise lossless.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use glam::{DMat3, DVec3, UVec3};
use serde::{Deserialize, Serialize};

use crate::error::SnowError;
use crate::grid::Grid;
use crate::particle::{Particle, Particles};
use crate::SnowSolver;

/// File extension used by the scene tools.
pub const SNAPSHOT_EXTENSION: &str = "snowstate";

const MAGIC: [u8; 8] = *b"SNOWSTAT";
const VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Header {
    magic: [u8; 8],
    version: u32,
    size: [u32; 3],
    h: f64,
    ticks: u64,
    particle_count: u64,
}

/// Serde proxy for one particle; glam types flattened to plain arrays.
#[derive(Serialize, Deserialize)]
struct ParticleRecord {
    position: [f64; 3],
    velocity: [f64; 3],
    mass: f64,
    volume0: f64,
    deform_elastic: [f64; 9],
    deform_plastic: [f64; 9],
}

impl From<&Particle> for ParticleRecord {
    fn from(p: &Particle) -> Self {
        Self {
            position: p.position.to_array(),
            velocity: p.velocity.to_array(),
            mass: p.mass,
            volume0: p.volume0,
            deform_elastic: p.deform_elastic.to_cols_array(),
            deform_plastic: p.deform_plastic.to_cols_array(),
        }
    }
}

impl From<ParticleRecord> for Particle {
    fn from(record: ParticleRecord) -> Self {
        Self {
            position: DVec3::from_array(record.position),
            velocity: DVec3::from_array(record.velocity),
            velocity_star: DVec3::ZERO,
            mass: record.mass,
            volume0: record.volume0,
            deform_elastic: DMat3::from_cols_array(&record.deform_elastic),
            deform_plastic: DMat3::from_cols_array(&record.deform_plastic),
        }
    }
}

impl SnowSolver {
    /// Writes the solver state to a snowstate file.
    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> Result<(), SnowError> {
        let mut writer = BufWriter::new(File::create(path)?);
        let header = Header {
            magic: MAGIC,
            version: VERSION,
            size: self.grid().size().to_array(),
            h: self.grid().h(),
            ticks: self.ticks(),
            particle_count: self.particle_set().len() as u64,
        };
        bincode::serialize_into(&mut writer, &header)?;
        for particle in self.particles() {
            bincode::serialize_into(&mut writer, &ParticleRecord::from(particle))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reconstructs a solver from a snowstate file.
    ///
    /// Colliders and parameters are not part of the snapshot; the caller
    /// reinstalls them before resuming.
    pub fn load_state<P: AsRef<Path>>(path: P) -> Result<Self, SnowError> {
        let mut reader = BufReader::new(File::open(path)?);
        let header: Header = bincode::deserialize_from(&mut reader)?;
        if header.magic != MAGIC {
            return Err(SnowError::BadMagic);
        }
        if header.version != VERSION {
            return Err(SnowError::UnsupportedVersion {
                found: header.version,
            });
        }

        let grid = Grid::new(header.h, UVec3::from_array(header.size))?;
        let mut particles = Particles::new();
        for _ in 0..header.particle_count {
            let record: ParticleRecord = bincode::deserialize_from(&mut reader)?;
            particles.push(Particle::from(record));
        }

        log::info!(
            "loaded snowstate: {} particles, {} completed ticks",
            particles.len(),
            header.ticks
        );
        Ok(SnowSolver::restore(grid, particles, header.ticks))
    }
}
