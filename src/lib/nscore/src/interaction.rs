use nalgebra::Vector3;

use crate::config::Config;
use crate::fields::VectorField;
use crate::grid::Grid;
use crate::particles::{ParticleArrays, ParticleForces};
use crate::porosity::PorosityFields;

/// Dense-bed threshold separating the Ergun (1952) and Wen-Yu (1966)
/// closures (§4.7).
const ERGUN_WEN_YU_THRESHOLD: f64 = 0.8;
const DILUTE_UPPER_BOUND: f64 = 0.999;

/// `Re = phi * rho * |v_rel| * d_p / mu`, the porosity-corrected particle
/// Reynolds number both closures are parameterized by.
pub fn reynolds_number(phi: f64, rho: f64, mu: f64, d_p: f64, v_rel: f64) -> f64 {
    if mu <= 0.0 || d_p <= 0.0 {
        return 0.0;
    }
    (phi * rho * v_rel.abs() * d_p) / mu
}

/// Schiller-Naumann drag coefficient used inside the Wen-Yu closure.
fn drag_coefficient(re: f64) -> f64 {
    if re <= 0.0 {
        return 0.0;
    }
    if re < 1000.0 {
        24.0 / re * (1.0 + 0.15 * re.powf(0.687))
    } else {
        0.44
    }
}

/// Ergun (1952) interphase momentum-transfer coefficient, valid for the
/// dense regime `phi <= 0.8` (§4.7).
fn ergun_beta(phi: f64, mu: f64, rho: f64, d_p: f64, v_rel: f64) -> f64 {
    if d_p <= 0.0 {
        return 0.0;
    }
    let one_minus_phi = 1.0 - phi;
    150.0 * mu * one_minus_phi * one_minus_phi / (phi * d_p * d_p)
        + 1.75 * rho * one_minus_phi * v_rel.abs() / d_p
}

/// Wen-Yu (1966) interphase momentum-transfer coefficient, valid for the
/// dilute regime `0.8 < phi < 0.999` (§4.7).
fn wen_yu_beta(phi: f64, rho: f64, d_p: f64, cd: f64, v_rel: f64) -> f64 {
    if d_p <= 0.0 || phi <= 0.0 {
        return 0.0;
    }
    0.75 * cd * rho * phi * (1.0 - phi) * v_rel.abs() / d_p * phi.powf(-2.65)
}

/// Selects Ergun vs. Wen-Yu by the porosity threshold and returns the
/// resulting momentum-transfer coefficient `beta` such that the per-cell
/// drag force density is `f_i = beta * (v_f - v_p)` (§4.7).
pub fn drag_momentum_transfer_coefficient(phi: f64, rho: f64, mu: f64, d_p: f64, v_rel: f64) -> f64 {
    let phi = phi.clamp(0.0, 1.0);
    if phi <= ERGUN_WEN_YU_THRESHOLD {
        ergun_beta(phi, mu, rho, d_p, v_rel)
    } else if phi < DILUTE_UPPER_BOUND {
        let re = reynolds_number(phi, rho, mu, d_p, v_rel);
        let cd = drag_coefficient(re);
        wen_yu_beta(phi, rho, d_p, cd, v_rel)
    } else {
        0.0
    }
}

/// Per-cell drag force density, `f_i = beta * (v_f - v_p_avg)` (C7,
/// force-density pass run before the predictor). The predictor applies it
/// to the fluid as `-dt * f_i`, so a particle outrunning the fluid (`v_rel`
/// pointing along the particle's motion) drags the fluid along with it.
/// Empty cells (`d_avg == 0`, guarded the same way as C2) contribute
/// nothing.
pub fn compute_force_density(
    grid: &Grid,
    config: &Config,
    porosity: &PorosityFields,
    v_f: &VectorField,
    out: &mut VectorField,
) {
    let mu = config.rho * config.nu;
    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                let d_p = porosity.d_avg.get(grid, i, j, k);
                if d_p <= 0.0 {
                    out.set(grid, i, j, k, Vector3::zeros());
                    continue;
                }
                let phi = porosity.phi.get(grid, i, j, k);
                let v_fluid = v_f.get(grid, i, j, k);
                let v_particle = porosity.vp_avg.get(grid, i, j, k);
                let v_rel = v_fluid - v_particle;
                let beta =
                    drag_momentum_transfer_coefficient(phi, config.rho, mu, d_p, v_rel.norm());
                out.set(grid, i, j, k, beta * v_rel);
            }
        }
    }
}

/// Reciprocal per-particle drag force scattered back onto the particle
/// array (C7, second pass, run after the corrector): `f_drag = (f_i / (1 -
/// phi)) * (4/3 pi r^3)` (§4.7). Each particle reads the fluid
/// velocity/porosity of the cell it last hashed into and accumulates its
/// own drag force directly by index — the source relied on an atomic add
/// into a shared per-cell bucket; on a single CPU thread that collapses to
/// a plain accumulate, so this writes `force_sorted[p]` exactly once per
/// particle with no contention to resolve (§9).
pub fn scatter_particle_forces(
    grid: &Grid,
    config: &Config,
    porosity: &PorosityFields,
    v_f: &VectorField,
    particles: &ParticleArrays,
    out: &mut ParticleForces,
) {
    let mu = config.rho * config.nu;

    for k in 0..grid.nz {
        for j in 0..grid.ny {
            for i in 0..grid.nx {
                let phi = porosity.phi.get(grid, i as isize, j as isize, k as isize);
                let v_fluid = v_f.get(grid, i as isize, j as isize, k as isize);

                for p in particles.particles_in_cell(grid, i, j, k) {
                    let v_particle = particles.vel_sorted[p];
                    let radius = particles.radius[p];
                    let d_p = 2.0 * radius;
                    let v_rel = v_fluid - v_particle;
                    let beta =
                        drag_momentum_transfer_coefficient(phi, config.rho, mu, d_p, v_rel.norm());
                    let f_i = beta * v_rel;
                    let particle_volume = (4.0 / 3.0) * std::f64::consts::PI * radius.powi(3);
                    out.force_sorted[p] = (f_i / (1.0 - phi).max(1e-12)) * particle_volume;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundaryKind;
    use crate::particles::EMPTY_CELL;

    fn test_config() -> Config {
        Config {
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
        }
    }

    #[test]
    fn dense_bed_uses_ergun_closure() {
        let beta = drag_momentum_transfer_coefficient(0.4, 1000.0, 1e-3, 0.01, 1.0);
        assert!(beta > 0.0);
    }

    #[test]
    fn dilute_bed_uses_wen_yu_closure() {
        let beta = drag_momentum_transfer_coefficient(0.9, 1000.0, 1e-3, 0.01, 1.0);
        assert!(beta > 0.0);
    }

    #[test]
    fn fully_dilute_bed_has_no_drag() {
        let beta = drag_momentum_transfer_coefficient(0.9999, 1000.0, 1e-3, 0.01, 1.0);
        assert_eq!(beta, 0.0);
    }

    #[test]
    fn empty_cell_contributes_no_force_density() {
        let config = test_config();
        let grid = Grid::new(&config);
        let porosity = PorosityFields::zeros(&grid);
        let v_f = VectorField::zeros(&grid);
        let mut out = VectorField::zeros(&grid);
        compute_force_density(&grid, &config, &porosity, &v_f, &mut out);
        assert_eq!(out.get(&grid, 0, 0, 0), Vector3::zeros());
    }

    #[test]
    fn scatter_writes_one_force_per_particle() {
        let config = test_config();
        let grid = Grid::new(&config);
        let mut porosity = PorosityFields::zeros(&grid);
        porosity.d_avg.set(&grid, 0, 0, 0, 0.01);
        porosity.phi.set(&grid, 0, 0, 0, 0.5);
        porosity.vp_avg.set(&grid, 0, 0, 0, Vector3::zeros());
        let v_f = VectorField::zeros(&grid);

        let x = vec![Vector3::zeros()];
        let vel = vec![Vector3::new(1.0, 0.0, 0.0)];
        let radius = vec![0.005];
        let idx = vec![0u32];
        let mut cell_start = vec![EMPTY_CELL; grid.n_cells()];
        let mut cell_end = vec![EMPTY_CELL; grid.n_cells()];
        cell_start[0] = 0;
        cell_end[0] = 1;
        let particles = ParticleArrays {
            x_sorted: &x,
            vel_sorted: &vel,
            radius: &radius,
            cell_start: &cell_start,
            cell_end: &cell_end,
            grid_particle_index: &idx,
        };
        let mut forces = ParticleForces::zeros(1);
        scatter_particle_forces(&grid, &config, &porosity, &v_f, &particles, &mut forces);
        assert_ne!(forces.force_sorted[0], Vector3::zeros());
    }
}
