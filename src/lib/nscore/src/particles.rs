use nalgebra::Vector3;

use crate::error::SolverError;
use crate::grid::Grid;

/// Sentinel cell-range marker for an empty fluid cell (§6), mirrored from
/// the host-side neighbor-search convention: `cell_start[c] == EMPTY_CELL`
/// means no particle hashes to cell `c`.
pub const EMPTY_CELL: u32 = 0xFFFF_FFFF;

/// Particle positions, velocities and the uniform-grid hash buckets handed
/// in by the host at every step (§6). Sorted by cell so that
/// `cell_start[c]..cell_end[c]` indexes a contiguous run of `x_sorted`/
/// `vel_sorted` for cell `c`; this is the CPU analogue of the source's
/// device-side neighbor-search output.
pub struct ParticleArrays<'a> {
    pub x_sorted: &'a [Vector3<f64>],
    pub vel_sorted: &'a [Vector3<f64>],
    pub radius: &'a [f64],
    pub cell_start: &'a [u32],
    pub cell_end: &'a [u32],
    pub grid_particle_index: &'a [u32],
}

impl<'a> ParticleArrays<'a> {
    pub fn particle_count(&self) -> usize {
        self.x_sorted.len()
    }

    /// Validates the cross-array invariants a malformed host call could
    /// break (§7e): equal lengths, cell tables sized to the fluid grid, and
    /// every non-empty range well-formed.
    pub fn validate(&self, grid: &Grid) -> Result<(), SolverError> {
        let n = self.x_sorted.len();
        if self.vel_sorted.len() != n || self.radius.len() != n || self.grid_particle_index.len() != n {
            return Err(SolverError::ParticleArrayInconsistent {
                reason: format!(
                    "array length mismatch: x_sorted={}, vel_sorted={}, radius={}, grid_particle_index={}",
                    n,
                    self.vel_sorted.len(),
                    self.radius.len(),
                    self.grid_particle_index.len()
                ),
                expected_cells: grid.n_cells(),
            });
        }
        let expected_cells = grid.n_cells();
        if self.cell_start.len() != expected_cells || self.cell_end.len() != expected_cells {
            return Err(SolverError::ParticleArrayInconsistent {
                reason: format!(
                    "cell_start/cell_end length {}/{} does not match fluid grid cell count",
                    self.cell_start.len(),
                    self.cell_end.len()
                ),
                expected_cells,
            });
        }
        for c in 0..expected_cells {
            let start = self.cell_start[c];
            let end = self.cell_end[c];
            if start == EMPTY_CELL {
                continue;
            }
            if end < start || end as usize > n {
                return Err(SolverError::ParticleArrayInconsistent {
                    reason: format!("cell {c} has malformed range [{start}, {end})"),
                    expected_cells,
                });
            }
        }
        Ok(())
    }

    /// Particle indices hashed to cell `(i, j, k)`, or an empty slice.
    pub fn particles_in_cell(&self, grid: &Grid, i: usize, j: usize, k: usize) -> std::ops::Range<usize> {
        let c = grid.linear_cell_id(i, j, k);
        let start = self.cell_start[c];
        if start == EMPTY_CELL {
            0..0
        } else {
            start as usize..self.cell_end[c] as usize
        }
    }
}

/// Per-particle reciprocal drag force computed by C7, indexed by the same
/// sorted order as `ParticleArrays` (§4.7). The host is responsible for
/// scattering this back into its own unsorted particle buffer via
/// `grid_particle_index`.
#[derive(Clone, Debug)]
pub struct ParticleForces {
    pub force_sorted: Vec<Vector3<f64>>,
}

impl ParticleForces {
    pub fn zeros(n: usize) -> Self {
        ParticleForces {
            force_sorted: vec![Vector3::zeros(); n],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundaryKind, Config};

    fn test_grid() -> Grid {
        let config = Config {
            nx: 2,
            ny: 2,
            nz: 2,
            lx: 1.0,
            ly: 1.0,
            lz: 1.0,
            rho: 1000.0,
            nu: 1e-6,
            gravity: [0.0, 0.0, 0.0],
            gravity_enabled: false,
            beta: 0.0,
            theta: 1.0,
            tol: 1e-9,
            max_iter: 200,
            bc_bot: BoundaryKind::Dirichlet,
            bc_top: BoundaryKind::Dirichlet,
            p_top: None,
            dt: 1e-3,
        };
        Grid::new(&config)
    }

    #[test]
    fn rejects_mismatched_cell_table_length() {
        let grid = test_grid();
        let x = vec![Vector3::zeros(); 3];
        let vel = vec![Vector3::zeros(); 3];
        let radius = vec![0.01; 3];
        let idx = vec![0u32, 1, 2];
        let cell_start = vec![EMPTY_CELL; 4];
        let cell_end = vec![EMPTY_CELL; 4];
        let arrays = ParticleArrays {
            x_sorted: &x,
            vel_sorted: &vel,
            radius: &radius,
            cell_start: &cell_start,
            cell_end: &cell_end,
            grid_particle_index: &idx,
        };
        assert!(arrays.validate(&grid).is_err());
    }

    #[test]
    fn accepts_well_formed_arrays() {
        let grid = test_grid();
        let x = vec![Vector3::zeros(); 1];
        let vel = vec![Vector3::zeros(); 1];
        let radius = vec![0.01];
        let idx = vec![0u32];
        let mut cell_start = vec![EMPTY_CELL; grid.n_cells()];
        let mut cell_end = vec![EMPTY_CELL; grid.n_cells()];
        cell_start[0] = 0;
        cell_end[0] = 1;
        let arrays = ParticleArrays {
            x_sorted: &x,
            vel_sorted: &vel,
            radius: &radius,
            cell_start: &cell_start,
            cell_end: &cell_end,
            grid_particle_index: &idx,
        };
        assert!(arrays.validate(&grid).is_ok());
        assert_eq!(arrays.particles_in_cell(&grid, 0, 0, 0), 0..1);
        assert_eq!(arrays.particles_in_cell(&grid, 1, 1, 1), 0..0);
    }
}
