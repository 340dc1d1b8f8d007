use nalgebra::Vector3;

use crate::boundary::BoundaryRegime;
use crate::config::{BoundaryKind, Config};
use crate::error::SolverError;
use crate::fields::{ScalarField, VectorField};
use crate::grid::Grid;

/// Outcome of a single pressure-correction solve (C5). Non-convergence
/// within `max_iter` is reported here rather than raised as a
/// `SolverError` — the driver folds it into `StepReport` as a warning
/// (§7c); only a non-finite residual is treated as fatal.
#[derive(Clone, Copy, Debug)]
pub struct PoissonReport {
    pub iterations: usize,
    pub residual_norm: f64,
    pub converged: bool,
}

/// Central-difference gradient of a scalar field at cell `(i, j, k)`.
fn gradient(grid: &Grid, field: &ScalarField, i: isize, j: isize, k: isize) -> Vector3<f64> {
    let inv_2dx = 1.0 / (2.0 * grid.dx);
    let inv_2dy = 1.0 / (2.0 * grid.dy);
    let inv_2dz = 1.0 / (2.0 * grid.dz);
    Vector3::new(
        (field.get(grid, i + 1, j, k) - field.get(grid, i - 1, j, k)) * inv_2dx,
        (field.get(grid, i, j + 1, k) - field.get(grid, i, j - 1, k)) * inv_2dy,
        (field.get(grid, i, j, k + 1) - field.get(grid, i, j, k - 1)) * inv_2dz,
    )
}

fn divergence(grid: &Grid, v: &VectorField, i: isize, j: isize, k: isize) -> f64 {
    let inv_2dx = 1.0 / (2.0 * grid.dx);
    let inv_2dy = 1.0 / (2.0 * grid.dy);
    let inv_2dz = 1.0 / (2.0 * grid.dz);
    (v.get(grid, i + 1, j, k).x - v.get(grid, i - 1, j, k).x) * inv_2dx
        + (v.get(grid, i, j + 1, k).y - v.get(grid, i, j - 1, k).y) * inv_2dy
        + (v.get(grid, i, j, k + 1).z - v.get(grid, i, j, k - 1).z) * inv_2dz
}

/// Caches the two quantities the Poisson equation needs once per step
/// (C4, §4.4):
///
/// `f1 = rho*div(v*)/dt + rho*(grad(phi).v*)/(dt*phi) + rho*dphi/(dt^2*phi)`
/// `f2 = grad(phi)/phi`
///
/// so that every Jacobi sweep only has to recompute `grad(epsilon)` and
/// form `f = f1 - f2.grad(epsilon)`.
pub fn assemble_forcing(
    grid: &Grid,
    config: &Config,
    phi: &ScalarField,
    dphi: &ScalarField,
    v_star: &VectorField,
    f1_out: &mut ScalarField,
    f2_out: &mut VectorField,
) {
    let dt = config.dt;
    let rho = config.rho;

    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                let phi_c = phi.get(grid, i, j, k).max(1e-12);
                let v_c = v_star.get(grid, i, j, k);
                let grad_phi = gradient(grid, phi, i, j, k);
                let dphi_c = dphi.get(grid, i, j, k);

                let div_v = divergence(grid, v_star, i, j, k);
                let f1 = rho * div_v / dt
                    + rho * grad_phi.dot(&v_c) / (dt * phi_c)
                    + rho * dphi_c / (dt * dt * phi_c);
                let f2 = grad_phi / phi_c;

                f1_out.set(grid, i, j, k, f1);
                f2_out.set(grid, i, j, k, f2);
            }
        }
    }
}

/// Whether `(i, j, k)` lies on a z-Dirichlet boundary plane (I5): those
/// cells hold an externally-fixed pressure value (enforced directly on the
/// interior plane, the same way `corrector::apply_p_top_override` pins the
/// top), so the Jacobi sweep leaves them untouched.
fn is_fixed_z_plane(grid: &Grid, config: &Config, k: isize) -> bool {
    (k == 0 && config.bc_bot == BoundaryKind::Dirichlet)
        || (k == grid.nz as isize - 1 && config.bc_top == BoundaryKind::Dirichlet)
}

/// One Jacobi sweep writing `epsilon_new` from `epsilon`, over-relaxed by
/// `theta` (C5, §4.5). Uses the constant-coefficient stencil — porosity
/// only enters through the cached forcing `f1`/`f2`, not the Laplacian
/// coefficients. Does not touch ghosts — callers refresh them afterward.
fn jacobi_sweep(
    grid: &Grid,
    config: &Config,
    f1: &ScalarField,
    f2: &VectorField,
    epsilon: &ScalarField,
    epsilon_new: &mut ScalarField,
) {
    let dx2 = grid.dx * grid.dx;
    let dy2 = grid.dy * grid.dy;
    let dz2 = grid.dz * grid.dz;
    let denom = 2.0 * (dx2 * dy2 + dx2 * dz2 + dy2 * dz2);

    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                let eps_old = epsilon.get(grid, i, j, k);
                if is_fixed_z_plane(grid, config, k) {
                    epsilon_new.set(grid, i, j, k, eps_old);
                    continue;
                }

                let grad_eps = gradient(grid, epsilon, i, j, k);
                let f = f1.get(grid, i, j, k) - f2.get(grid, i, j, k).dot(&grad_eps);

                let eps_xm = epsilon.get(grid, i - 1, j, k);
                let eps_xp = epsilon.get(grid, i + 1, j, k);
                let eps_ym = epsilon.get(grid, i, j - 1, k);
                let eps_yp = epsilon.get(grid, i, j + 1, k);
                let eps_zm = epsilon.get(grid, i, j, k - 1);
                let eps_zp = epsilon.get(grid, i, j, k + 1);

                let numerator = dy2 * dz2 * (eps_xm + eps_xp)
                    + dx2 * dz2 * (eps_ym + eps_yp)
                    + dx2 * dy2 * (eps_zm + eps_zp)
                    - dx2 * dy2 * dz2 * f;
                let gauss_jacobi_value = numerator / denom;
                let updated = (1.0 - config.theta) * eps_old + config.theta * gauss_jacobi_value;
                epsilon_new.set(grid, i, j, k, updated);
            }
        }
    }
}

/// Per-cell residual `r = (eps_new - eps)^2 / (eps_new^2 + 1e-16)`, written
/// into `norm` and max-reduced (§4.5, I5). Zero on the boundary planes the
/// sweep does not update.
fn reduce_residual(
    grid: &Grid,
    config: &Config,
    epsilon_old: &ScalarField,
    epsilon_new: &ScalarField,
    norm: &mut ScalarField,
) -> f64 {
    let mut max_r: f64 = 0.0;
    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                if is_fixed_z_plane(grid, config, k) {
                    norm.set(grid, i, j, k, 0.0);
                    continue;
                }
                let e_new = epsilon_new.get(grid, i, j, k);
                let e_old = epsilon_old.get(grid, i, j, k);
                let r = (e_new - e_old).powi(2) / (e_new * e_new + 1e-16);
                norm.set(grid, i, j, k, r);
                max_r = max_r.max(r);
            }
        }
    }
    max_r
}

/// Overwrites the top plane of `epsilon` with the externally scheduled
/// pressure override, when present (§6 `p_top`).
fn apply_p_top_override(grid: &Grid, config: &Config, epsilon: &mut ScalarField) {
    let Some(p_top) = config.p_top else { return };
    for j in 0..grid.ny as isize {
        for i in 0..grid.nx as isize {
            epsilon.set(grid, i, j, grid.nz as isize - 1, p_top);
        }
    }
}

/// Runs the INIT -> SWEEP -> REFRESH -> REDUCE -> CONVERGED? state machine
/// to convergence or `config.max_iter`, whichever comes first (C4 + C5).
/// `epsilon` is both the warm-start input and the solution output; `norm`
/// receives the per-cell residual field from the final sweep.
pub fn solve(
    grid: &Grid,
    config: &Config,
    phi: &ScalarField,
    dphi: &ScalarField,
    v_star: &VectorField,
    epsilon: &mut ScalarField,
    norm: &mut ScalarField,
    regime: BoundaryRegime,
) -> Result<PoissonReport, SolverError> {
    let mut f1 = ScalarField::zeros(grid);
    let mut f2 = VectorField::zeros(grid);
    assemble_forcing(grid, config, phi, dphi, v_star, &mut f1, &mut f2);

    let mut epsilon_new = epsilon.clone();
    let mut iterations = 0usize;
    let mut residual = f64::INFINITY;

    loop {
        jacobi_sweep(grid, config, &f1, &f2, epsilon, &mut epsilon_new);
        apply_p_top_override(grid, config, &mut epsilon_new);
        crate::boundary::refresh_scalar_ghosts(grid, &mut epsilon_new, regime, 0.0, config.p_top.unwrap_or(0.0));

        residual = reduce_residual(grid, config, epsilon, &epsilon_new, norm);
        std::mem::swap(epsilon, &mut epsilon_new);
        iterations += 1;

        if !residual.is_finite() {
            return Err(SolverError::PoissonDiverged { iterations, norm: residual });
        }
        if residual <= config.tol {
            return Ok(PoissonReport {
                iterations,
                residual_norm: residual,
                converged: true,
            });
        }
        if iterations >= config.max_iter {
            break;
        }
    }

    Ok(PoissonReport {
        iterations,
        residual_norm: residual,
        converged: false,
    })
}
