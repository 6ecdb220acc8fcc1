//! Error types for solver configuration, state, numerics, and snapshot I/O.

use thiserror::Error;

/// Errors surfaced by the snow solver and its snapshot format.
#[derive(Debug, Error)]
pub enum SnowError {
    /// Grid spacing must be positive and finite.
    #[error("non-positive grid spacing: {h}")]
    NonPositiveSpacing {
        /// The rejected spacing value.
        h: f64,
    },

    /// Every grid dimension must hold at least one node.
    #[error("zero-extent grid: {nx}x{ny}x{nz}")]
    ZeroExtentGrid {
        /// Node count along x.
        nx: u32,
        /// Node count along y.
        ny: u32,
        /// Node count along z.
        nz: u32,
    },

    /// Particle mass must be positive.
    #[error("non-positive particle mass: {mass}")]
    NonPositiveMass {
        /// The rejected mass value.
        mass: f64,
    },

    /// Ticks must be advanced in order, starting from zero.
    #[error("tick out of order: expected {expected}, got {actual}")]
    TickOutOfOrder {
        /// The tick index the solver expects next.
        expected: u64,
        /// The tick index that was passed in.
        actual: u64,
    },

    /// A particle added after the initialization tick must carry a
    /// precomputed rest volume.
    #[error("particle rest volume not initialized")]
    VolumeUninitialized,

    /// A particle picked up a NaN or infinite component during the tick.
    #[error("non-finite particle state at index {index}")]
    NonFiniteParticle {
        /// Index of the offending particle.
        index: usize,
    },

    /// The elastic deformation gradient lost orientation or collapsed.
    #[error("non-positive elastic determinant {det} at particle {index}")]
    NonPositiveDeterminant {
        /// Index of the offending particle.
        index: usize,
        /// The offending determinant value.
        det: f64,
    },

    /// Snapshot file read/write failure.
    #[error("snapshot i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot payload could not be encoded or decoded.
    #[error("snapshot encoding: {0}")]
    Encoding(#[from] bincode::Error),

    /// The file is not a snowstate snapshot.
    #[error("bad snapshot magic")]
    BadMagic,

    /// The snapshot was written by an incompatible format version.
    #[error("unsupported snapshot version {found}")]
    UnsupportedVersion {
        /// Version number found in the file.
        found: u32,
    },
}
