use crate::config::Config;
use crate::fields::{FaceScalarField, ScalarField, VectorField};
use crate::grid::{Axis, Grid};

/// Pressure update `p <- beta*p + epsilon` (C6, §4.6). `beta == 0` recovers
/// plain Chorin splitting (the correction replaces `p` outright); `beta >
/// 0` accumulates the Langtangen incremental-pressure variant selected via
/// `Config::beta`.
pub fn correct_pressure(config: &Config, grid: &Grid, p: &mut ScalarField, epsilon: &ScalarField) {
    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                let updated = config.beta * p.get(grid, i, j, k) + epsilon.get(grid, i, j, k);
                p.set(grid, i, j, k, updated);
            }
        }
    }
}

/// Top-plane Dirichlet pressure override (§6): `p_top`, when set, forces the
/// `z = nz-1` plane of `p` to the configured value outright, overwriting
/// whatever `correct_pressure` just blended there. Mirrors
/// `poisson::apply_p_top_override`'s treatment of `epsilon`.
pub fn apply_p_top_override(grid: &Grid, config: &Config, p: &mut ScalarField) {
    let Some(p_top) = config.p_top else {
        return;
    };
    let k_top = grid.nz as isize - 1;
    for j in 0..grid.ny as isize {
        for i in 0..grid.nx as isize {
            p.set(grid, i, j, k_top, p_top);
        }
    }
}

/// Velocity correction `v <- v* - (dt/rho) * grad(epsilon)` (C6).
pub fn correct_velocity(
    config: &Config,
    grid: &Grid,
    v_star: &VectorField,
    epsilon: &ScalarField,
    v_out: &mut VectorField,
) {
    let inv_2dx = 1.0 / (2.0 * grid.dx);
    let inv_2dy = 1.0 / (2.0 * grid.dy);
    let inv_2dz = 1.0 / (2.0 * grid.dz);
    let scale = config.dt / config.rho;

    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                let deps_dx = (epsilon.get(grid, i + 1, j, k) - epsilon.get(grid, i - 1, j, k)) * inv_2dx;
                let deps_dy = (epsilon.get(grid, i, j + 1, k) - epsilon.get(grid, i, j - 1, k)) * inv_2dy;
                let deps_dz = (epsilon.get(grid, i, j, k + 1) - epsilon.get(grid, i, j, k - 1)) * inv_2dz;

                let v_s = v_star.get(grid, i, j, k);
                let corrected = nalgebra::Vector3::new(
                    v_s.x - scale * deps_dx,
                    v_s.y - scale * deps_dy,
                    v_s.z - scale * deps_dz,
                );
                v_out.set(grid, i, j, k, corrected);
            }
        }
    }
}

/// Interpolates the cell-centered corrected velocity onto the three
/// staggered face arrays (C6, §4.6). Each axis is written into its own
/// `(nx+1)(ny+1)(nz+1)`-shaped array with its own independent bound — the
/// source's guard (`x < nx && y < ny && x < nz`) compared the wrong
/// coordinate against the wrong extent and silently collapsed the y/z-face
/// writes onto the x-face array; here each call addresses only its own
/// array so that bug cannot recur (§9).
pub fn unstagger_to_faces(
    grid: &Grid,
    v: &VectorField,
    face_x: &mut FaceScalarField,
    face_y: &mut FaceScalarField,
    face_z: &mut FaceScalarField,
) {
    debug_assert_eq!(face_x.axis(), Axis::X);
    debug_assert_eq!(face_y.axis(), Axis::Y);
    debug_assert_eq!(face_z.axis(), Axis::Z);

    for k in 0..=grid.nz {
        for j in 0..=grid.ny {
            for i in 0..=grid.nx {
                let value = face_average_x(grid, v, i, j, k);
                face_x.set(grid, i, j, k, value);
            }
        }
    }
    for k in 0..=grid.nz {
        for j in 0..=grid.ny {
            for i in 0..=grid.nx {
                let value = face_average_y(grid, v, i, j, k);
                face_y.set(grid, i, j, k, value);
            }
        }
    }
    for k in 0..=grid.nz {
        for j in 0..=grid.ny {
            for i in 0..=grid.nx {
                let value = face_average_z(grid, v, i, j, k);
                face_z.set(grid, i, j, k, value);
            }
        }
    }
}

#[inline]
fn face_average_x(grid: &Grid, v: &VectorField, i: usize, j: usize, k: usize) -> f64 {
    let jc = (j as isize).min(grid.ny as isize - 1);
    let kc = (k as isize).min(grid.nz as isize - 1);
    let left = v.get(grid, i as isize - 1, jc, kc).x;
    let right = v.get(grid, i as isize, jc, kc).x;
    0.5 * (left + right)
}

#[inline]
fn face_average_y(grid: &Grid, v: &VectorField, i: usize, j: usize, k: usize) -> f64 {
    let ic = (i as isize).min(grid.nx as isize - 1);
    let kc = (k as isize).min(grid.nz as isize - 1);
    let lo = v.get(grid, ic, j as isize - 1, kc).y;
    let hi = v.get(grid, ic, j as isize, kc).y;
    0.5 * (lo + hi)
}

#[inline]
fn face_average_z(grid: &Grid, v: &VectorField, i: usize, j: usize, k: usize) -> f64 {
    let ic = (i as isize).min(grid.nx as isize - 1);
    let jc = (j as isize).min(grid.ny as isize - 1);
    let lo = v.get(grid, ic, jc, k as isize - 1).z;
    let hi = v.get(grid, ic, jc, k as isize).z;
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundaryKind;

    fn test_config() -> Config {
        Config {
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
        }
    }

    #[test]
    fn beta_zero_replaces_pressure_outright() {
        let config = test_config();
        let grid = Grid::new(&config);
        let mut p = ScalarField::filled(&grid, 100.0);
        let epsilon = ScalarField::filled(&grid, 5.0);
        correct_pressure(&config, &grid, &mut p, &epsilon);
        assert_eq!(p.get(&grid, 1, 1, 1), 5.0);
    }

    #[test]
    fn beta_one_accumulates_pressure() {
        let mut config = test_config();
        config.beta = 1.0;
        let grid = Grid::new(&config);
        let mut p = ScalarField::filled(&grid, 100.0);
        let epsilon = ScalarField::filled(&grid, 5.0);
        correct_pressure(&config, &grid, &mut p, &epsilon);
        assert_eq!(p.get(&grid, 1, 1, 1), 105.0);
    }

    #[test]
    fn p_top_override_forces_top_plane_even_with_nonzero_beta() {
        let mut config = test_config();
        config.beta = 1.0;
        config.p_top = Some(7.0);
        let grid = Grid::new(&config);
        let mut p = ScalarField::filled(&grid, 100.0);
        let epsilon = ScalarField::filled(&grid, 5.0);
        correct_pressure(&config, &grid, &mut p, &epsilon);
        apply_p_top_override(&grid, &config, &mut p);
        let k_top = grid.nz as isize - 1;
        assert_eq!(p.get(&grid, 1, 1, k_top), 7.0);
        assert_eq!(p.get(&grid, 1, 1, 1), 105.0);
    }

    #[test]
    fn faces_are_written_independently_per_axis() {
        let config = test_config();
        let grid = Grid::new(&config);
        let mut v = VectorField::zeros(&grid);
        for k in 0..grid.nz as isize {
            for j in 0..grid.ny as isize {
                for i in 0..grid.nx as isize {
                    v.set(&grid, i, j, k, nalgebra::Vector3::new(1.0, 2.0, 3.0));
                }
            }
        }
        let mut face_x = FaceScalarField::zeros(&grid, Axis::X);
        let mut face_y = FaceScalarField::zeros(&grid, Axis::Y);
        let mut face_z = FaceScalarField::zeros(&grid, Axis::Z);
        unstagger_to_faces(&grid, &v, &mut face_x, &mut face_y, &mut face_z);

        assert_eq!(face_x.get(&grid, 2, 2, 2), 1.0);
        assert_eq!(face_y.get(&grid, 2, 2, 2), 2.0);
        assert_eq!(face_z.get(&grid, 2, 2, 2), 3.0);
    }
}
