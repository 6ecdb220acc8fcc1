//! Uniform Eulerian grid of collocated nodes.
//!
//! Nodes live at integer multiples of the spacing `h` and are stored in one
//! flat `Vec` indexed `ix + nx * (iy + ny * iz)`. Each node carries the
//! velocity at the start of the tick (`velocity`), the post-force estimate
//! (`velocity_star`), and the end-of-tick value (`velocity_next`) as three
//! explicit fields; nothing in the solver selects a buffer by tick parity.

use glam::{DVec3, IVec3, UVec3};

use crate::error::SnowError;

/// A single grid node.
#[derive(Clone, Copy, Debug)]
pub struct GridNode {
    /// Integer lattice coordinates.
    pub location: UVec3,
    /// World position, `h * location`.
    pub position: DVec3,
    /// Mass rasterized from particles this tick.
    pub mass: f64,
    /// Velocity at the start of the tick.
    pub velocity: DVec3,
    /// Velocity at the end of the tick.
    pub velocity_next: DVec3,
    /// Post-force, pre-solve velocity estimate.
    pub velocity_star: DVec3,
    /// Force accumulated this tick.
    pub force: DVec3,
    /// Rest density, fixed during the initialization tick.
    pub density0: f64,
}

impl GridNode {
    fn new(location: UVec3, h: f64) -> Self {
        Self {
            location,
            position: location.as_dvec3() * h,
            mass: 0.0,
            velocity: DVec3::ZERO,
            velocity_next: DVec3::ZERO,
            velocity_star: DVec3::ZERO,
            force: DVec3::ZERO,
            density0: 0.0,
        }
    }
}

/// The uniform grid owning all nodes.
pub struct Grid {
    size: UVec3,
    h: f64,
    inv_h: f64,
    nodes: Vec<GridNode>,
}

impl Grid {
    /// Creates a grid of `size` nodes per axis with spacing `h`.
    pub fn new(h: f64, size: UVec3) -> Result<Self, SnowError> {
        if !(h > 0.0) || !h.is_finite() {
            return Err(SnowError::NonPositiveSpacing { h });
        }
        if size.x == 0 || size.y == 0 || size.z == 0 {
            return Err(SnowError::ZeroExtentGrid {
                nx: size.x,
                ny: size.y,
                nz: size.z,
            });
        }

        // x runs fastest so pushes land in flat-index order.
        let mut nodes = Vec::with_capacity((size.x * size.y * size.z) as usize);
        for iz in 0..size.z {
            for iy in 0..size.y {
                for ix in 0..size.x {
                    nodes.push(GridNode::new(UVec3::new(ix, iy, iz), h));
                }
            }
        }

        Ok(Self {
            size,
            h,
            inv_h: 1.0 / h,
            nodes,
        })
    }

    /// Node counts per axis.
    #[inline]
    pub fn size(&self) -> UVec3 {
        self.size
    }

    /// Grid spacing.
    #[inline]
    pub fn h(&self) -> f64 {
        self.h
    }

    /// Reciprocal grid spacing.
    #[inline]
    pub fn inv_h(&self) -> f64 {
        self.inv_h
    }

    /// Total node count.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the grid has no nodes. Construction forbids this; present
    /// for completeness of the collection surface.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Flat index of in-bounds lattice coordinates.
    #[inline]
    pub fn flat_index(&self, location: UVec3) -> usize {
        (location.x + self.size.x * (location.y + self.size.y * location.z)) as usize
    }

    /// Flat index of possibly out-of-bounds coordinates; `None` when the
    /// node does not exist.
    #[inline]
    pub fn index(&self, location: IVec3) -> Option<usize> {
        if location.x < 0
            || location.y < 0
            || location.z < 0
            || location.x >= self.size.x as i32
            || location.y >= self.size.y as i32
            || location.z >= self.size.z as i32
        {
            return None;
        }
        Some(self.flat_index(location.as_uvec3()))
    }

    /// All nodes, flat-index order.
    #[inline]
    pub fn nodes(&self) -> &[GridNode] {
        &self.nodes
    }

    /// All nodes, mutable.
    #[inline]
    pub fn nodes_mut(&mut self) -> &mut [GridNode] {
        &mut self.nodes
    }

    /// Sum of node masses.
    pub fn total_mass(&self) -> f64 {
        self.nodes.iter().map(|n| n.mass).sum()
    }

    /// Total momentum held on the grid at the start of the tick.
    pub fn momentum(&self) -> DVec3 {
        self.nodes
            .iter()
            .fold(DVec3::ZERO, |acc, n| acc + n.velocity * n.mass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_configuration() {
        assert!(matches!(
            Grid::new(0.0, UVec3::new(4, 4, 4)),
            Err(SnowError::NonPositiveSpacing { .. })
        ));
        assert!(matches!(
            Grid::new(-0.1, UVec3::new(4, 4, 4)),
            Err(SnowError::NonPositiveSpacing { .. })
        ));
        assert!(matches!(
            Grid::new(0.5, UVec3::new(4, 0, 4)),
            Err(SnowError::ZeroExtentGrid { .. })
        ));
    }

    #[test]
    fn flat_index_layout() {
        let grid = Grid::new(0.5, UVec3::new(3, 4, 5)).unwrap();
        assert_eq!(grid.len(), 60);
        let idx = grid.flat_index(UVec3::new(2, 3, 1));
        assert_eq!(idx, 2 + 3 * (3 + 4 * 1));
        let node = &grid.nodes()[idx];
        assert_eq!(node.location, UVec3::new(2, 3, 1));
        assert_eq!(node.position, DVec3::new(1.0, 1.5, 0.5));
    }

    #[test]
    fn index_rejects_out_of_bounds() {
        let grid = Grid::new(1.0, UVec3::new(4, 4, 4)).unwrap();
        assert!(grid.index(IVec3::new(-1, 0, 0)).is_none());
        assert!(grid.index(IVec3::new(0, 4, 0)).is_none());
        assert!(grid.index(IVec3::new(3, 3, 3)).is_some());
    }

    #[test]
    fn every_node_is_addressable_by_its_location() {
        let grid = Grid::new(1.0, UVec3::new(3, 3, 3)).unwrap();
        for (i, node) in grid.nodes().iter().enumerate() {
            assert_eq!(grid.flat_index(node.location), i);
        }
    }
}
