use crate::config::Config;

/// Cell-centered and face-centered indexing for the staggered grid (C1,
/// §9 "Ghost-cell index arithmetic"). Isolating this behind a small
/// abstraction decouples field storage from the stencil kernels and lets
/// every kernel be written once in terms of logical (possibly negative,
/// ghost) coordinates.
#[derive(Clone, Copy, Debug)]
pub struct Grid {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl Grid {
    pub fn new(config: &Config) -> Self {
        let (dx, dy, dz) = config.cell_size();
        Grid {
            nx: config.nx,
            ny: config.ny,
            nz: config.nz,
            dx,
            dy,
            dz,
        }
    }

    pub fn n_cells(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn cell_volume(&self) -> f64 {
        self.dx * self.dy * self.dz
    }

    /// Radius of the sphere inscribed in a cell box, used by C2.
    pub fn cell_sphere_radius(&self) -> f64 {
        self.dx.min(self.dy).min(self.dz) / 2.0
    }

    pub fn cell_sphere_volume(&self) -> f64 {
        let r = self.cell_sphere_radius();
        4.0 / 3.0 * std::f64::consts::PI * r.powi(3)
    }

    /// Physical center of cell (i, j, k), i, j, k in 0..nx/ny/nz.
    pub fn cell_center(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        [
            (i as f64 + 0.5) * self.dx,
            (j as f64 + 0.5) * self.dy,
            (k as f64 + 0.5) * self.dz,
        ]
    }

    /// Shape of a scalar/vector/tensor cell-centered field storage array
    /// including the one-cell ghost halo on all six faces: `(nx+2, ny+2, nz+2)`.
    pub fn storage_shape(&self) -> (usize, usize, usize) {
        (self.nx + 2, self.ny + 2, self.nz + 2)
    }

    /// Maps a logical cell coordinate (including ghost index -1..=n) to the
    /// backing array coordinate.
    #[inline]
    pub fn cell_index(&self, i: isize, j: isize, k: isize) -> (usize, usize, usize) {
        debug_assert!(i >= -1 && i <= self.nx as isize);
        debug_assert!(j >= -1 && j <= self.ny as isize);
        debug_assert!(k >= -1 && k <= self.nz as isize);
        ((i + 1) as usize, (j + 1) as usize, (k + 1) as usize)
    }

    /// Shape of a staggered face-scalar field: `(nx+1, ny+1, nz+1)` (§3).
    pub fn face_storage_shape(&self) -> (usize, usize, usize) {
        (self.nx + 1, self.ny + 1, self.nz + 1)
    }

    /// Maps a logical face coordinate (0..=n on every axis) to the backing
    /// face-array coordinate. `axis` selects which staggered component is
    /// being addressed, retained for call-site clarity even though the
    /// storage shape here does not depend on it.
    #[inline]
    pub fn face_index(&self, i: usize, j: usize, k: usize, axis: Axis) -> (usize, usize, usize) {
        let _ = axis;
        debug_assert!(i <= self.nx && j <= self.ny && k <= self.nz);
        (i, j, k)
    }

    /// Linear cell id used by the particle-hash interface (§6), consistent
    /// with the layout `id = k*nx*ny + j*nx + i`.
    #[inline]
    pub fn linear_cell_id(&self, i: usize, j: usize, k: usize) -> usize {
        k * self.nx * self.ny + j * self.nx + i
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}
