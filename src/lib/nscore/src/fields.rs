use nalgebra::Vector3;
use ndarray::Array3;

use crate::grid::{Axis, Grid};

/// Cell-centered scalar field with a one-cell ghost halo on every face (§3).
#[derive(Clone, Debug)]
pub struct ScalarField {
    data: Array3<f64>,
}

impl ScalarField {
    pub fn zeros(grid: &Grid) -> Self {
        ScalarField {
            data: Array3::zeros(grid.storage_shape()),
        }
    }

    pub fn filled(grid: &Grid, value: f64) -> Self {
        ScalarField {
            data: Array3::from_elem(grid.storage_shape(), value),
        }
    }

    #[inline]
    pub fn get(&self, grid: &Grid, i: isize, j: isize, k: isize) -> f64 {
        let (a, b, c) = grid.cell_index(i, j, k);
        self.data[[a, b, c]]
    }

    #[inline]
    pub fn set(&mut self, grid: &Grid, i: isize, j: isize, k: isize, value: f64) {
        let (a, b, c) = grid.cell_index(i, j, k);
        self.data[[a, b, c]] = value;
    }

    pub fn raw(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn raw_mut(&mut self) -> &mut Array3<f64> {
        &mut self.data
    }

    /// True if every interior cell holds a finite value; used to surface
    /// `SolverError::NonFiniteField` (§7b).
    pub fn all_finite_interior(&self, grid: &Grid) -> Option<(isize, isize, isize)> {
        for k in 0..grid.nz as isize {
            for j in 0..grid.ny as isize {
                for i in 0..grid.nx as isize {
                    if !self.get(grid, i, j, k).is_finite() {
                        return Some((i, j, k));
                    }
                }
            }
        }
        None
    }
}

/// Cell-centered 3-vector field, same ghost layout as `ScalarField`.
#[derive(Clone, Debug)]
pub struct VectorField {
    data: Array3<Vector3<f64>>,
}

impl VectorField {
    pub fn zeros(grid: &Grid) -> Self {
        VectorField {
            data: Array3::from_elem(grid.storage_shape(), Vector3::zeros()),
        }
    }

    #[inline]
    pub fn get(&self, grid: &Grid, i: isize, j: isize, k: isize) -> Vector3<f64> {
        let (a, b, c) = grid.cell_index(i, j, k);
        self.data[[a, b, c]]
    }

    #[inline]
    pub fn set(&mut self, grid: &Grid, i: isize, j: isize, k: isize, value: Vector3<f64>) {
        let (a, b, c) = grid.cell_index(i, j, k);
        self.data[[a, b, c]] = value;
    }

    pub fn raw(&self) -> &Array3<Vector3<f64>> {
        &self.data
    }

    /// True if every interior cell holds a finite value in all three
    /// components; used to surface `SolverError::NonFiniteField` (§7b).
    pub fn all_finite_interior(&self, grid: &Grid) -> Option<(isize, isize, isize)> {
        for k in 0..grid.nz as isize {
            for j in 0..grid.ny as isize {
                for i in 0..grid.nx as isize {
                    let v = self.get(grid, i, j, k);
                    if !v.x.is_finite() || !v.y.is_finite() || !v.z.is_finite() {
                        return Some((i, j, k));
                    }
                }
            }
        }
        None
    }
}

/// Symmetric 3x3 tensor stored as six independent components (I4, §9
/// "Tensor storage"): `xx, xy, xz, yy, yz, zz`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SymmetricTensor3 {
    pub xx: f64,
    pub xy: f64,
    pub xz: f64,
    pub yy: f64,
    pub yz: f64,
    pub zz: f64,
}

impl SymmetricTensor3 {
    /// Retrieve element (row, col) respecting symmetry.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        match (row.min(col), row.max(col)) {
            (0, 0) => self.xx,
            (0, 1) => self.xy,
            (0, 2) => self.xz,
            (1, 1) => self.yy,
            (1, 2) => self.yz,
            (2, 2) => self.zz,
            _ => unreachable!("symmetric tensor index out of range"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TensorField {
    data: Array3<SymmetricTensor3>,
}

impl TensorField {
    pub fn zeros(grid: &Grid) -> Self {
        TensorField {
            data: Array3::from_elem(grid.storage_shape(), SymmetricTensor3::default()),
        }
    }

    #[inline]
    pub fn get(&self, grid: &Grid, i: isize, j: isize, k: isize) -> SymmetricTensor3 {
        let (a, b, c) = grid.cell_index(i, j, k);
        self.data[[a, b, c]]
    }

    #[inline]
    pub fn set(&mut self, grid: &Grid, i: isize, j: isize, k: isize, value: SymmetricTensor3) {
        let (a, b, c) = grid.cell_index(i, j, k);
        self.data[[a, b, c]] = value;
    }

    /// True if every interior cell holds a finite value in all six
    /// components; used to surface `SolverError::NonFiniteField` (§7b).
    pub fn all_finite_interior(&self, grid: &Grid) -> Option<(isize, isize, isize)> {
        for k in 0..grid.nz as isize {
            for j in 0..grid.ny as isize {
                for i in 0..grid.nx as isize {
                    let t = self.get(grid, i, j, k);
                    let finite = t.xx.is_finite()
                        && t.xy.is_finite()
                        && t.xz.is_finite()
                        && t.yy.is_finite()
                        && t.yz.is_finite()
                        && t.zz.is_finite();
                    if !finite {
                        return Some((i, j, k));
                    }
                }
            }
        }
        None
    }
}

/// A single staggered face-velocity component (`v_x`, `v_y`, or `v_z`),
/// dimensions `(nx+1)(ny+1)(nz+1)` (§3). No ghost halo: face values are
/// only ever read by the host-facing unstaggering step (C6).
#[derive(Clone, Debug)]
pub struct FaceScalarField {
    data: Array3<f64>,
    axis: Axis,
}

impl FaceScalarField {
    pub fn zeros(grid: &Grid, axis: Axis) -> Self {
        FaceScalarField {
            data: Array3::zeros(grid.face_storage_shape()),
            axis,
        }
    }

    #[inline]
    pub fn get(&self, grid: &Grid, i: usize, j: usize, k: usize) -> f64 {
        let (a, b, c) = grid.face_index(i, j, k, self.axis);
        self.data[[a, b, c]]
    }

    #[inline]
    pub fn set(&mut self, grid: &Grid, i: usize, j: usize, k: usize, value: f64) {
        let (a, b, c) = grid.face_index(i, j, k, self.axis);
        self.data[[a, b, c]] = value;
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundaryKind, Config};

    fn test_grid() -> Grid {
        let config = Config {
            nx: 4,
            ny: 4,
            nz: 4,
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
    fn scalar_field_set_get_round_trip() {
        let grid = test_grid();
        let mut field = ScalarField::zeros(&grid);
        field.set(&grid, 2, 2, 2, 3.5);
        assert_eq!(field.get(&grid, 2, 2, 2), 3.5);
        assert_eq!(field.get(&grid, -1, 0, 0), 0.0);
    }

    #[test]
    fn symmetric_tensor_access_is_symmetric() {
        let tau = SymmetricTensor3 {
            xx: 1.0,
            xy: 2.0,
            xz: 3.0,
            yy: 4.0,
            yz: 5.0,
            zz: 6.0,
        };
        assert_eq!(tau.get(0, 1), tau.get(1, 0));
        assert_eq!(tau.get(1, 2), tau.get(2, 1));
        assert_eq!(tau.get(0, 2), tau.get(2, 0));
    }
}
