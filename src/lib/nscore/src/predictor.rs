use nalgebra::Vector3;

use crate::boundary::BoundaryRegime;
use crate::config::{BoundaryKind, Config};
use crate::fields::{ScalarField, SymmetricTensor3, TensorField, VectorField};
use crate::grid::Grid;

/// Central-difference viscous stress tensor `tau_ab = nu * (dv_a/dx_b +
/// dv_b/dx_a)` at every interior cell (C3, §4.3). Ghosts must already be
/// current; callers refresh them via `boundary::refresh_vector_ghosts`
/// before calling this.
pub fn compute_stress_tensor(grid: &Grid, v: &VectorField, nu: f64, out: &mut TensorField) {
    let inv_2dx = 1.0 / (2.0 * grid.dx);
    let inv_2dy = 1.0 / (2.0 * grid.dy);
    let inv_2dz = 1.0 / (2.0 * grid.dz);

    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                let dvdx = (v.get(grid, i + 1, j, k) - v.get(grid, i - 1, j, k)) * inv_2dx;
                let dvdy = (v.get(grid, i, j + 1, k) - v.get(grid, i, j - 1, k)) * inv_2dy;
                // z-derivative reads the z-neighbor plane, not x's (fixes
                // the source's collapsed face-array indexing defect, §9).
                let dvdz = (v.get(grid, i, j, k + 1) - v.get(grid, i, j, k - 1)) * inv_2dz;

                let tau = SymmetricTensor3 {
                    xx: 2.0 * nu * dvdx.x,
                    xy: nu * (dvdx.y + dvdy.x),
                    xz: nu * (dvdx.z + dvdz.x),
                    yy: 2.0 * nu * dvdy.y,
                    yz: nu * (dvdy.z + dvdz.y),
                    zz: 2.0 * nu * dvdz.z,
                };
                out.set(grid, i, j, k, tau);
            }
        }
    }
}

/// Divergence of the porosity-weighted advective momentum flux,
/// `div(phi * v (x) v)`, by central differences of the flux components
/// evaluated at neighboring cell centers.
fn divergence_of_momentum_flux(grid: &Grid, phi: &ScalarField, v: &VectorField, out: &mut VectorField) {
    let inv_2dx = 1.0 / (2.0 * grid.dx);
    let inv_2dy = 1.0 / (2.0 * grid.dy);
    let inv_2dz = 1.0 / (2.0 * grid.dz);

    let flux_row = |phi_c: f64, v_c: Vector3<f64>, v_a: f64| -> Vector3<f64> { phi_c * v_a * v_c };

    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                let v_xp = v.get(grid, i + 1, j, k);
                let v_xm = v.get(grid, i - 1, j, k);
                let v_yp = v.get(grid, i, j + 1, k);
                let v_ym = v.get(grid, i, j - 1, k);
                let v_zp = v.get(grid, i, j, k + 1);
                let v_zm = v.get(grid, i, j, k - 1);

                let phi_xp = phi.get(grid, i + 1, j, k);
                let phi_xm = phi.get(grid, i - 1, j, k);
                let phi_yp = phi.get(grid, i, j + 1, k);
                let phi_ym = phi.get(grid, i, j - 1, k);
                let phi_zp = phi.get(grid, i, j, k + 1);
                let phi_zm = phi.get(grid, i, j, k - 1);

                let d_dx = (flux_row(phi_xp, v_xp, v_xp.x) - flux_row(phi_xm, v_xm, v_xm.x)) * inv_2dx;
                let d_dy = (flux_row(phi_yp, v_yp, v_yp.y) - flux_row(phi_ym, v_ym, v_ym.y)) * inv_2dy;
                let d_dz = (flux_row(phi_zp, v_zp, v_zp.z) - flux_row(phi_zm, v_zm, v_zm.z)) * inv_2dz;

                out.set(grid, i, j, k, d_dx + d_dy + d_dz);
            }
        }
    }
}

/// Divergence of the porosity-weighted viscous stress, `div(phi * tau)`.
fn divergence_of_stress(grid: &Grid, phi: &ScalarField, tau: &TensorField, out: &mut VectorField) {
    let inv_2dx = 1.0 / (2.0 * grid.dx);
    let inv_2dy = 1.0 / (2.0 * grid.dy);
    let inv_2dz = 1.0 / (2.0 * grid.dz);

    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                let row = |axis: usize, t: SymmetricTensor3| {
                    Vector3::new(t.get(axis, 0), t.get(axis, 1), t.get(axis, 2))
                };

                let phi_xp = phi.get(grid, i + 1, j, k);
                let phi_xm = phi.get(grid, i - 1, j, k);
                let phi_yp = phi.get(grid, i, j + 1, k);
                let phi_ym = phi.get(grid, i, j - 1, k);
                let phi_zp = phi.get(grid, i, j, k + 1);
                let phi_zm = phi.get(grid, i, j, k - 1);

                let tau_xp = tau.get(grid, i + 1, j, k);
                let tau_xm = tau.get(grid, i - 1, j, k);
                let tau_yp = tau.get(grid, i, j + 1, k);
                let tau_ym = tau.get(grid, i, j - 1, k);
                let tau_zp = tau.get(grid, i, j, k + 1);
                let tau_zm = tau.get(grid, i, j, k - 1);

                let mut acc = Vector3::zeros();
                for axis in 0..3 {
                    let d_dx = (phi_xp * row(axis, tau_xp).x - phi_xm * row(axis, tau_xm).x) * inv_2dx;
                    let d_dy = (phi_yp * row(axis, tau_yp).y - phi_ym * row(axis, tau_ym).y) * inv_2dy;
                    let d_dz = (phi_zp * row(axis, tau_zp).z - phi_zm * row(axis, tau_zm).z) * inv_2dz;
                    acc[axis] = d_dx + d_dy + d_dz;
                }
                out.set(grid, i, j, k, acc);
            }
        }
    }
}

/// Gradient of a scalar field by central differences at cell `(i, j, k)`.
fn gradient_scalar(grid: &Grid, field: &ScalarField, i: isize, j: isize, k: isize) -> Vector3<f64> {
    let inv_2dx = 1.0 / (2.0 * grid.dx);
    let inv_2dy = 1.0 / (2.0 * grid.dy);
    let inv_2dz = 1.0 / (2.0 * grid.dz);
    Vector3::new(
        (field.get(grid, i + 1, j, k) - field.get(grid, i - 1, j, k)) * inv_2dx,
        (field.get(grid, i, j + 1, k) - field.get(grid, i, j - 1, k)) * inv_2dy,
        (field.get(grid, i, j, k + 1) - field.get(grid, i, j, k - 1)) * inv_2dz,
    )
}

/// Explicit predictor step (C3, §4.3):
///
/// `v* = v - (beta/rho)*grad(p)*dt/phi + (1/rho)*div(phi tau)*dt/phi
///        - dt*f_i - v*dphi/phi - div(phi v v)*dt/phi - g*dt*[gravity_enabled]`
///
/// `beta` selects the Chorin (0) vs. Langtangen incremental-pressure (0,1]
/// projection variant by folding a fraction of the previous-step pressure
/// gradient directly into this term.
pub fn predict_velocity(
    grid: &Grid,
    config: &Config,
    phi: &ScalarField,
    v: &VectorField,
    p: &ScalarField,
    dphi: &ScalarField,
    tau: &TensorField,
    interaction_force_density: &VectorField,
    v_star: &mut VectorField,
) {
    let mut adv = VectorField::zeros(grid);
    let mut visc = VectorField::zeros(grid);
    divergence_of_momentum_flux(grid, phi, v, &mut adv);
    divergence_of_stress(grid, phi, tau, &mut visc);

    let gravity: Vector3<f64> = if config.gravity_enabled {
        Vector3::from_row_slice(&config.gravity)
    } else {
        Vector3::zeros()
    };

    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                let phi_c = phi.get(grid, i, j, k).max(1e-12);
                let v_c = v.get(grid, i, j, k);
                let adv_c = adv.get(grid, i, j, k);
                let visc_c = visc.get(grid, i, j, k);
                let f_int = interaction_force_density.get(grid, i, j, k);
                let grad_p = gradient_scalar(grid, p, i, j, k);
                let dphi_c = dphi.get(grid, i, j, k);

                let dt_over_phi = config.dt / phi_c;
                let pressure_term = -(config.beta / config.rho) * grad_p * dt_over_phi;
                let viscous_term = (visc_c / config.rho) * dt_over_phi;
                let advective_term = -adv_c * dt_over_phi;
                let interaction_term = -config.dt * f_int;
                let porosity_term = -v_c * (dphi_c / phi_c);
                let gravity_term = -gravity * config.dt;

                let v_new = v_c
                    + pressure_term
                    + viscous_term
                    + advective_term
                    + interaction_term
                    + porosity_term
                    + gravity_term;
                v_star.set(grid, i, j, k, v_new);
            }
        }
    }

    pin_neumann_normal_velocity(grid, config, v, v_star);
}

/// No-flux pin: a Neumann z-boundary forbids normal (z) flow through the
/// bottom/top planes, so the predicted normal component there is pinned to
/// the prior step's value rather than whatever the interior stencil
/// produced (§4.3 step 4). Reused by the corrector to re-enforce the same
/// pin after the pressure correction perturbs it.
pub(crate) fn pin_neumann_normal_velocity(
    grid: &Grid,
    config: &Config,
    v: &VectorField,
    v_star: &mut VectorField,
) {
    if config.bc_bot != BoundaryKind::Neumann && config.bc_top != BoundaryKind::Neumann {
        return;
    }
    for j in 0..grid.ny as isize {
        for i in 0..grid.nx as isize {
            if config.bc_bot == BoundaryKind::Neumann {
                let prior = v.get(grid, i, j, 0);
                let mut updated = v_star.get(grid, i, j, 0);
                updated.z = prior.z;
                v_star.set(grid, i, j, 0, updated);
            }
            if config.bc_top == BoundaryKind::Neumann {
                let prior = v.get(grid, i, j, grid.nz as isize - 1);
                let mut updated = v_star.get(grid, i, j, grid.nz as isize - 1);
                updated.z = prior.z;
                v_star.set(grid, i, j, grid.nz as isize - 1, updated);
            }
        }
    }
}

pub fn refresh_velocity_ghosts(grid: &Grid, v: &mut VectorField, regime: BoundaryRegime) {
    crate::boundary::refresh_vector_ghosts(grid, v, regime, Vector3::zeros(), Vector3::zeros());
}
