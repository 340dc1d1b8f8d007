use nalgebra::Vector3;

use crate::boundary::BoundaryRegime;
use crate::config::{BoundaryKind, Config};
use crate::error::SolverError;
use crate::fields::{ScalarField, VectorField};
use crate::grid::Grid;
use crate::particles::ParticleArrays;

/// Exact intersection volume of two spheres of radius `r1`, `r2` whose
/// centers are `d` apart (the lens-cap formula, §4.2). Handles the three
/// regimes explicitly rather than relying on the general formula's
/// cancellation at the extremes, since that cancellation is numerically
/// fragile near `d == 0`.
pub fn sphere_sphere_overlap_volume(r1: f64, r2: f64, d: f64) -> f64 {
    if d >= r1 + r2 {
        return 0.0;
    }
    let d = d.max(0.0);
    if d <= (r1 - r2).abs() {
        let r_min = r1.min(r2);
        return 4.0 / 3.0 * std::f64::consts::PI * r_min.powi(3);
    }
    let num = std::f64::consts::PI * (r1 + r2 - d).powi(2)
        * (d * d + 2.0 * d * r2 - 3.0 * r2 * r2 + 2.0 * d * r1 + 6.0 * r1 * r2 - 3.0 * r1 * r1);
    num / (12.0 * d)
}

/// Minimum-image separation along one axis of length `length`, used when
/// the axis is periodic. x and y are unconditionally periodic (§4.1); z
/// only wraps when `BoundaryKind::Periodic`.
#[inline]
fn wrap_delta(delta: f64, length: f64, periodic: bool) -> f64 {
    if !periodic {
        return delta;
    }
    let mut d = delta;
    if d > 0.5 * length {
        d -= length;
    } else if d < -0.5 * length {
        d += length;
    }
    d
}

/// Accumulated per-cell void-fraction state produced by C2.
pub struct PorosityFields {
    pub phi: ScalarField,
    pub vp_avg: VectorField,
    pub d_avg: ScalarField,
}

impl PorosityFields {
    pub fn zeros(grid: &Grid) -> Self {
        PorosityFields {
            phi: ScalarField::filled(grid, 1.0),
            vp_avg: VectorField::zeros(grid),
            d_avg: ScalarField::zeros(grid),
        }
    }
}

/// Projects the particle arrays onto the fluid grid as a void fraction
/// `phi`, particle-velocity average `vp_avg` and particle-diameter average
/// `d_avg` (C2). Sweeps the 27-cell neighborhood of each fluid cell since a
/// particle hashed to an adjacent cell may still overlap it.
///
/// Fixes the source's empty-cell defect: cells with no overlapping
/// particles are detected by an explicit overlap-count guard (`n > 0`)
/// rather than by inspecting an otherwise-unassigned accumulator (§9).
pub fn compute_porosity(
    grid: &Grid,
    config: &Config,
    particles: &ParticleArrays,
    out: &mut PorosityFields,
) -> Result<(), SolverError> {
    particles.validate(grid)?;

    let z_periodic = config.bc_bot == BoundaryKind::Periodic && config.bc_top == BoundaryKind::Periodic;
    let r_cell = grid.cell_sphere_radius();
    let v_cell_sphere = grid.cell_sphere_volume();

    for k in 0..grid.nz {
        for j in 0..grid.ny {
            for i in 0..grid.nx {
                let center = grid.cell_center(i, j, k);
                let center = Vector3::new(center[0], center[1], center[2]);

                let mut solid_volume = 0.0;
                let mut vel_sum = Vector3::zeros();
                let mut diameter_sum = 0.0;
                let mut n: u32 = 0;

                for dk in -1i64..=1 {
                    for dj in -1i64..=1 {
                        for di in -1i64..=1 {
                            let ni = i as i64 + di;
                            let nj = j as i64 + dj;
                            let nk = k as i64 + dk;
                            let (ni, wrapped_x) = wrap_index(ni, grid.nx);
                            let (nj, wrapped_y) = wrap_index(nj, grid.ny);
                            let (nk, in_range_z) = if z_periodic {
                                wrap_index(nk, grid.nz)
                            } else {
                                (nk.max(0) as usize, nk >= 0 && nk < grid.nz as i64)
                            };
                            if !wrapped_x || !wrapped_y || !in_range_z {
                                continue;
                            }

                            for p in particles.particles_in_cell(grid, ni, nj, nk as usize) {
                                let pos = particles.x_sorted[p];
                                let delta = Vector3::new(
                                    wrap_delta(pos.x - center.x, config.lx, true),
                                    wrap_delta(pos.y - center.y, config.ly, true),
                                    wrap_delta(pos.z - center.z, config.lz, z_periodic),
                                );
                                let dist = delta.norm();
                                let overlap = sphere_sphere_overlap_volume(
                                    r_cell,
                                    particles.radius[p],
                                    dist,
                                );
                                if overlap <= 0.0 {
                                    continue;
                                }
                                solid_volume += overlap;
                                vel_sum += particles.vel_sorted[p];
                                diameter_sum += 2.0 * particles.radius[p];
                                n += 1;
                            }
                        }
                    }
                }

                let (phi, vp_avg, d_avg) = if n > 0 {
                    let phi = (1.0 - solid_volume / v_cell_sphere).clamp(0.0, 1.0);
                    let vp_avg = vel_sum / n as f64;
                    let d_avg = diameter_sum / n as f64;
                    (phi, vp_avg, d_avg)
                } else {
                    (1.0, Vector3::zeros(), 0.0)
                };

                out.phi.set(grid, i as isize, j as isize, k as isize, phi);
                out.vp_avg.set(grid, i as isize, j as isize, k as isize, vp_avg);
                out.d_avg.set(grid, i as isize, j as isize, k as isize, d_avg);
            }
        }
    }

    Ok(())
}

/// Wraps a possibly-out-of-range neighbor index into `0..n`, reporting
/// whether the axis is actually periodic there (always true for x/y; for a
/// non-periodic z, an out-of-range index is simply skipped).
#[inline]
fn wrap_index(idx: i64, n: usize) -> (usize, bool) {
    let n = n as i64;
    if idx >= 0 && idx < n {
        (idx as usize, true)
    } else {
        (idx.rem_euclid(n) as usize, true)
    }
}

/// Step-to-step porosity change `dphi = phi - phi_prev` (§3, §4.2). Forced
/// to zero on the very first step by the caller, since there is no prior
/// porosity field to difference against yet.
pub fn compute_dphi(grid: &Grid, phi: &ScalarField, phi_prev: &ScalarField, out: &mut ScalarField) {
    for k in -1..=grid.nz as isize {
        for j in -1..=grid.ny as isize {
            for i in -1..=grid.nx as isize {
                let delta = phi.get(grid, i, j, k) - phi_prev.get(grid, i, j, k);
                out.set(grid, i, j, k, delta);
            }
        }
    }
}

pub fn refresh_porosity_ghosts(grid: &Grid, fields: &mut PorosityFields, regime: BoundaryRegime) {
    crate::boundary::refresh_scalar_ghosts(grid, &mut fields.phi, regime, 1.0, 1.0);
    crate::boundary::refresh_vector_ghosts(
        grid,
        &mut fields.vp_avg,
        regime,
        Vector3::zeros(),
        Vector3::zeros(),
    );
    crate::boundary::refresh_scalar_ghosts(grid, &mut fields.d_avg, regime, 0.0, 0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::particles::EMPTY_CELL;

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
    fn overlap_is_zero_when_far_apart() {
        assert_eq!(sphere_sphere_overlap_volume(0.1, 0.1, 10.0), 0.0);
    }

    #[test]
    fn overlap_equals_small_sphere_volume_when_fully_contained() {
        let v = sphere_sphere_overlap_volume(1.0, 0.1, 0.0);
        let expected = 4.0 / 3.0 * std::f64::consts::PI * 0.1f64.powi(3);
        assert!((v - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_cell_defaults_to_full_porosity() {
        let config = test_config();
        let grid = Grid::new(&config);
        let cell_count = grid.n_cells();
        let x: Vec<Vector3<f64>> = vec![];
        let vel: Vec<Vector3<f64>> = vec![];
        let radius: Vec<f64> = vec![];
        let idx: Vec<u32> = vec![];
        let cell_start = vec![EMPTY_CELL; cell_count];
        let cell_end = vec![EMPTY_CELL; cell_count];
        let particles = ParticleArrays {
            x_sorted: &x,
            vel_sorted: &vel,
            radius: &radius,
            cell_start: &cell_start,
            cell_end: &cell_end,
            grid_particle_index: &idx,
        };
        let mut out = PorosityFields::zeros(&grid);
        compute_porosity(&grid, &config, &particles, &mut out).unwrap();
        for k in 0..grid.nz as isize {
            for j in 0..grid.ny as isize {
                for i in 0..grid.nx as isize {
                    assert_eq!(out.phi.get(&grid, i, j, k), 1.0);
                }
            }
        }
    }

    #[test]
    fn single_centered_particle_reduces_porosity() {
        let config = test_config();
        let grid = Grid::new(&config);
        let cell_count = grid.n_cells();
        let center = grid.cell_center(2, 2, 2);
        let x = vec![Vector3::new(center[0], center[1], center[2])];
        let vel = vec![Vector3::new(1.0, 0.0, 0.0)];
        let radius = vec![grid.cell_sphere_radius()];
        let idx = vec![0u32];
        let mut cell_start = vec![EMPTY_CELL; cell_count];
        let mut cell_end = vec![EMPTY_CELL; cell_count];
        let c = grid.linear_cell_id(2, 2, 2);
        cell_start[c] = 0;
        cell_end[c] = 1;
        let particles = ParticleArrays {
            x_sorted: &x,
            vel_sorted: &vel,
            radius: &radius,
            cell_start: &cell_start,
            cell_end: &cell_end,
            grid_particle_index: &idx,
        };
        let mut out = PorosityFields::zeros(&grid);
        compute_porosity(&grid, &config, &particles, &mut out).unwrap();
        let phi = out.phi.get(&grid, 2, 2, 2);
        assert!(phi < 1.0, "expected reduced porosity at occupied cell, got {phi}");
        assert!(phi >= 0.0);
    }

    #[test]
    fn vp_avg_is_the_unweighted_arithmetic_mean_of_contributions() {
        let config = test_config();
        let grid = Grid::new(&config);
        let cell_count = grid.n_cells();
        let center = grid.cell_center(2, 2, 2);
        // Two particles of unequal overlap volume both hashed to the same
        // cell: vp_avg must be their plain average (2.0), not weighted by
        // how much of the cell sphere each one occupies.
        let x = vec![
            Vector3::new(center[0], center[1], center[2]),
            Vector3::new(center[0] + 0.02, center[1], center[2]),
        ];
        let vel = vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(3.0, 0.0, 0.0)];
        let radius = vec![grid.cell_sphere_radius(), grid.cell_sphere_radius() * 0.5];
        let idx = vec![0u32, 1u32];
        let mut cell_start = vec![EMPTY_CELL; cell_count];
        let mut cell_end = vec![EMPTY_CELL; cell_count];
        let c = grid.linear_cell_id(2, 2, 2);
        cell_start[c] = 0;
        cell_end[c] = 2;
        let particles = ParticleArrays {
            x_sorted: &x,
            vel_sorted: &vel,
            radius: &radius,
            cell_start: &cell_start,
            cell_end: &cell_end,
            grid_particle_index: &idx,
        };
        let mut out = PorosityFields::zeros(&grid);
        compute_porosity(&grid, &config, &particles, &mut out).unwrap();
        let vp_avg = out.vp_avg.get(&grid, 2, 2, 2);
        assert!((vp_avg.x - 2.0).abs() < 1e-9, "expected arithmetic mean 2.0, got {vp_avg:?}");
    }

    #[test]
    fn dphi_is_the_plain_difference_of_porosity_fields() {
        let config = test_config();
        let grid = Grid::new(&config);
        let phi = ScalarField::filled(&grid, 0.7);
        let phi_prev = ScalarField::filled(&grid, 0.9);
        let mut dphi = ScalarField::zeros(&grid);
        compute_dphi(&grid, &phi, &phi_prev, &mut dphi);
        assert!((dphi.get(&grid, 2, 2, 2) - (-0.2)).abs() < 1e-12);
    }
}
