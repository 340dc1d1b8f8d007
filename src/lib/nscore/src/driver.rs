use nalgebra::Vector3;
use wasm_bindgen::prelude::*;

use crate::boundary::{self, BoundaryRegime};
use crate::config::Config;
use crate::corrector;
use crate::error::SolverError;
use crate::fields::{FaceScalarField, ScalarField, TensorField, VectorField};
use crate::grid::{Axis, Grid};
use crate::interaction;
use crate::particles::{ParticleArrays, ParticleForces};
use crate::poisson::{self, PoissonReport};
use crate::porosity::{self, PorosityFields};
use crate::predictor;

/// Summary of one `NSCore::step` call, returned alongside the mutated
/// field state (§4.8). Poisson non-convergence is a warning here, not a
/// `SolverError` — the step still completed and its fields are usable.
#[derive(Clone, Copy, Debug)]
pub struct StepReport {
    pub poisson_iterations: usize,
    pub poisson_residual_norm: f64,
    pub poisson_converged: bool,
}

/// Owns one simulation's full field state and orchestrates a step (C8).
/// Constructed once per simulation; `step` advances it in place.
pub struct NSCore {
    grid: Grid,
    config: Config,
    regime: BoundaryRegime,

    v: VectorField,
    v_star: VectorField,
    p: ScalarField,
    epsilon: ScalarField,
    norm: ScalarField,
    tau: TensorField,

    porosity: PorosityFields,
    phi_prev: ScalarField,
    dphi: ScalarField,
    is_first_step: bool,

    face_vx: FaceScalarField,
    face_vy: FaceScalarField,
    face_vz: FaceScalarField,

    interaction_force: VectorField,
}

impl NSCore {
    /// Validates `config` and allocates all field storage (§6, §7a).
    pub fn new(config: Config) -> Result<Self, SolverError> {
        config.validate()?;
        let grid = Grid::new(&config);
        let regime = BoundaryRegime::from_config(&config);

        tracing::info!(
            nx = config.nx,
            ny = config.ny,
            nz = config.nz,
            rho = config.rho,
            nu = config.nu,
            "constructing fluid core"
        );

        Ok(NSCore {
            v: VectorField::zeros(&grid),
            v_star: VectorField::zeros(&grid),
            p: ScalarField::zeros(&grid),
            epsilon: ScalarField::zeros(&grid),
            norm: ScalarField::zeros(&grid),
            tau: TensorField::zeros(&grid),
            porosity: PorosityFields::zeros(&grid),
            phi_prev: ScalarField::filled(&grid, 1.0),
            dphi: ScalarField::zeros(&grid),
            is_first_step: true,
            face_vx: FaceScalarField::zeros(&grid, Axis::X),
            face_vy: FaceScalarField::zeros(&grid, Axis::Y),
            face_vz: FaceScalarField::zeros(&grid, Axis::Z),
            interaction_force: VectorField::zeros(&grid),
            grid,
            config,
            regime,
        })
    }

    /// Advances the coupled fluid/particle state by `dt` (§4.8). Order:
    /// C2 (porosity projection) -> C7 force density -> C3 (predictor) -> C4
    /// (forcing) -> C5 (Jacobi) -> C6 (corrector) -> C7 reciprocal scatter,
    /// with a ghost refresh between every stage that reads neighbor cells.
    /// A fatal numeric or particle-array error aborts the in-flight step
    /// and leaves the previous field state untouched from the caller's
    /// point of view only insofar as the erroring stage itself made no
    /// partial writes visible before returning.
    pub fn step(
        &mut self,
        dt: f64,
        particles: &ParticleArrays,
        forces_out: &mut ParticleForces,
    ) -> Result<StepReport, SolverError> {
        tracing::debug!(dt, "stepping fluid core");
        self.config.dt = dt;

        particles.validate(&self.grid)?;

        self.phi_prev = self.porosity.phi.clone();

        porosity::compute_porosity(&self.grid, &self.config, particles, &mut self.porosity)?;
        porosity::refresh_porosity_ghosts(&self.grid, &mut self.porosity, self.regime);
        if self.is_first_step {
            self.dphi = ScalarField::zeros(&self.grid);
            self.is_first_step = false;
        } else {
            porosity::compute_dphi(&self.grid, &self.porosity.phi, &self.phi_prev, &mut self.dphi);
        }

        interaction::compute_force_density(
            &self.grid,
            &self.config,
            &self.porosity,
            &self.v,
            &mut self.interaction_force,
        );

        boundary::refresh_vector_ghosts(&self.grid, &mut self.v, self.regime, Vector3::zeros(), Vector3::zeros());
        predictor::compute_stress_tensor(&self.grid, &self.v, self.config.nu, &mut self.tau);

        let v_prior = self.v.clone();
        predictor::predict_velocity(
            &self.grid,
            &self.config,
            &self.porosity.phi,
            &self.v,
            &self.p,
            &self.dphi,
            &self.tau,
            &self.interaction_force,
            &mut self.v_star,
        );
        predictor::refresh_velocity_ghosts(&self.grid, &mut self.v_star, self.regime);

        let report: PoissonReport = poisson::solve(
            &self.grid,
            &self.config,
            &self.porosity.phi,
            &self.dphi,
            &self.v_star,
            &mut self.epsilon,
            &mut self.norm,
            self.regime,
        )?;
        if !report.converged {
            tracing::warn!(
                iterations = report.iterations,
                residual = report.residual_norm,
                "pressure solve did not converge within max_iter"
            );
        }

        corrector::correct_pressure(&self.config, &self.grid, &mut self.p, &self.epsilon);
        corrector::apply_p_top_override(&self.grid, &self.config, &mut self.p);
        boundary::refresh_scalar_ghosts(&self.grid, &mut self.p, self.regime, 0.0, self.config.p_top.unwrap_or(0.0));

        corrector::correct_velocity(&self.config, &self.grid, &self.v_star, &self.epsilon, &mut self.v);
        predictor::pin_neumann_normal_velocity(&self.grid, &self.config, &v_prior, &mut self.v);
        boundary::refresh_vector_ghosts(&self.grid, &mut self.v, self.regime, Vector3::zeros(), Vector3::zeros());

        corrector::unstagger_to_faces(
            &self.grid,
            &self.v,
            &mut self.face_vx,
            &mut self.face_vy,
            &mut self.face_vz,
        );

        if forces_out.force_sorted.len() != particles.particle_count() {
            *forces_out = ParticleForces::zeros(particles.particle_count());
        }
        interaction::scatter_particle_forces(
            &self.grid,
            &self.config,
            &self.porosity,
            &self.v,
            particles,
            forces_out,
        );

        if let Some((name, i, j, k)) = first_non_finite(
            &self.grid,
            &self.v,
            &self.v_star,
            &self.p,
            &self.epsilon,
            &self.porosity.phi,
            &self.tau,
        ) {
            tracing::error!(field = name, i, j, k, "non-finite field after step");
            return Err(SolverError::NonFiniteField { field: name, i, j, k });
        }

        Ok(StepReport {
            poisson_iterations: report.iterations,
            poisson_residual_norm: report.residual_norm,
            poisson_converged: report.converged,
        })
    }

    /// Flattened interior pressure field, row-major `k, j, i` (§3 snapshot
    /// API restriction: only `p, v, v_p, phi, dphi, norm, epsilon` are
    /// ever exposed to the host).
    pub fn pressure_snapshot(&self) -> Vec<f64> {
        flatten_scalar(&self.grid, &self.p)
    }

    pub fn velocity_snapshot(&self) -> Vec<f64> {
        flatten_vector(&self.grid, &self.v)
    }

    /// Predicted velocity `v*` produced by C3, held until the next step
    /// overwrites it (§3 snapshot API: `v_p`).
    pub fn predicted_velocity_snapshot(&self) -> Vec<f64> {
        flatten_vector(&self.grid, &self.v_star)
    }

    pub fn phi_snapshot(&self) -> Vec<f64> {
        flatten_scalar(&self.grid, &self.porosity.phi)
    }

    pub fn dphi_snapshot(&self) -> Vec<f64> {
        flatten_scalar(&self.grid, &self.dphi)
    }

    pub fn epsilon_snapshot(&self) -> Vec<f64> {
        flatten_scalar(&self.grid, &self.epsilon)
    }

    /// Per-cell Poisson residual from the final sweep of the last solve
    /// (§3's `norm` field; I5: zero on cells the sweep did not update).
    pub fn norm_snapshot(&self) -> Vec<f64> {
        flatten_scalar(&self.grid, &self.norm)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn flatten_scalar(grid: &Grid, field: &ScalarField) -> Vec<f64> {
    let mut out = Vec::with_capacity(grid.n_cells());
    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                out.push(field.get(grid, i, j, k));
            }
        }
    }
    out
}

fn flatten_vector(grid: &Grid, field: &VectorField) -> Vec<f64> {
    let mut out = Vec::with_capacity(grid.n_cells() * 3);
    for k in 0..grid.nz as isize {
        for j in 0..grid.ny as isize {
            for i in 0..grid.nx as isize {
                let v = field.get(grid, i, j, k);
                out.push(v.x);
                out.push(v.y);
                out.push(v.z);
            }
        }
    }
    out
}

/// Checks every field the fatal non-finite guard must cover (§7b: "any
/// field", not just velocity) and returns the name and coordinate of the
/// first offender found, checking in this fixed order.
fn first_non_finite(
    grid: &Grid,
    v: &VectorField,
    v_star: &VectorField,
    p: &ScalarField,
    epsilon: &ScalarField,
    phi: &ScalarField,
    tau: &TensorField,
) -> Option<(&'static str, isize, isize, isize)> {
    if let Some((i, j, k)) = v.all_finite_interior(grid) {
        return Some(("v", i, j, k));
    }
    if let Some((i, j, k)) = v_star.all_finite_interior(grid) {
        return Some(("v_star", i, j, k));
    }
    if let Some((i, j, k)) = p.all_finite_interior(grid) {
        return Some(("p", i, j, k));
    }
    if let Some((i, j, k)) = epsilon.all_finite_interior(grid) {
        return Some(("epsilon", i, j, k));
    }
    if let Some((i, j, k)) = phi.all_finite_interior(grid) {
        return Some(("phi", i, j, k));
    }
    if let Some((i, j, k)) = tau.all_finite_interior(grid) {
        return Some(("tau", i, j, k));
    }
    None
}

/// WASM-facing wrapper: `wasm-bindgen` cannot export generic lifetimes or
/// slices of `nalgebra::Vector3` directly, so particle arrays cross the
/// boundary as flat `f64`/`u32` buffers and are re-assembled here before
/// delegating to `NSCore::step` (mirrors the host-facing surface of the
/// original `ReservoirSimulator` bindings).
#[wasm_bindgen]
pub struct WasmNSCore {
    inner: NSCore,
}

#[wasm_bindgen]
impl WasmNSCore {
    #[wasm_bindgen(constructor)]
    pub fn new(config_js: JsValue) -> Result<WasmNSCore, JsValue> {
        let config: Config = serde_wasm_bindgen::from_value(config_js)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let inner = NSCore::new(config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmNSCore { inner })
    }

    #[wasm_bindgen(js_name = step)]
    pub fn step_js(
        &mut self,
        dt: f64,
        x_flat: &[f64],
        vel_flat: &[f64],
        radius: &[f64],
        cell_start: &[u32],
        cell_end: &[u32],
        grid_particle_index: &[u32],
    ) -> Result<JsValue, JsValue> {
        let n = radius.len();
        let x_sorted: Vec<Vector3<f64>> = x_flat
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect();
        let vel_sorted: Vec<Vector3<f64>> = vel_flat
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect();

        let particles = ParticleArrays {
            x_sorted: &x_sorted,
            vel_sorted: &vel_sorted,
            radius,
            cell_start,
            cell_end,
            grid_particle_index,
        };

        let mut forces = ParticleForces::zeros(n);
        let report = self
            .inner
            .step(dt, &particles, &mut forces)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let forces_flat: Vec<f64> = forces
            .force_sorted
            .iter()
            .flat_map(|f| [f.x, f.y, f.z])
            .collect();

        #[derive(serde::Serialize)]
        struct StepResult {
            poisson_iterations: usize,
            poisson_residual_norm: f64,
            poisson_converged: bool,
            forces: Vec<f64>,
        }

        serde_wasm_bindgen::to_value(&StepResult {
            poisson_iterations: report.poisson_iterations,
            poisson_residual_norm: report.poisson_residual_norm,
            poisson_converged: report.poisson_converged,
            forces: forces_flat,
        })
        .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = getPressure)]
    pub fn get_pressure(&self) -> Vec<f64> {
        self.inner.pressure_snapshot()
    }

    #[wasm_bindgen(js_name = getVelocity)]
    pub fn get_velocity(&self) -> Vec<f64> {
        self.inner.velocity_snapshot()
    }

    #[wasm_bindgen(js_name = getPredictedVelocity)]
    pub fn get_predicted_velocity(&self) -> Vec<f64> {
        self.inner.predicted_velocity_snapshot()
    }

    #[wasm_bindgen(js_name = getPhi)]
    pub fn get_phi(&self) -> Vec<f64> {
        self.inner.phi_snapshot()
    }

    #[wasm_bindgen(js_name = getDphi)]
    pub fn get_dphi(&self) -> Vec<f64> {
        self.inner.dphi_snapshot()
    }

    #[wasm_bindgen(js_name = getEpsilon)]
    pub fn get_epsilon(&self) -> Vec<f64> {
        self.inner.epsilon_snapshot()
    }

    #[wasm_bindgen(js_name = getNorm)]
    pub fn get_norm(&self) -> Vec<f64> {
        self.inner.norm_snapshot()
    }

    #[wasm_bindgen(js_name = getDimensions)]
    pub fn get_dimensions(&self) -> Vec<u32> {
        vec![
            self.inner.grid.nx as u32,
            self.inner.grid.ny as u32,
            self.inner.grid.nz as u32,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundaryKind;
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
            gravity: [0.0, 0.0, -9.81],
            gravity_enabled: false,
            beta: 0.0,
            theta: 0.8,
            tol: 1e-6,
            max_iter: 500,
            bc_bot: BoundaryKind::Dirichlet,
            bc_top: BoundaryKind::Dirichlet,
            p_top: None,
            dt: 1e-3,
        }
    }

    #[test]
    fn empty_box_stays_at_rest_with_no_gravity() {
        let config = test_config();
        let mut core = NSCore::new(config).unwrap();
        let grid = core.grid;
        let x: Vec<Vector3<f64>> = vec![];
        let vel: Vec<Vector3<f64>> = vec![];
        let radius: Vec<f64> = vec![];
        let idx: Vec<u32> = vec![];
        let cell_start = vec![EMPTY_CELL; grid.n_cells()];
        let cell_end = vec![EMPTY_CELL; grid.n_cells()];
        let particles = ParticleArrays {
            x_sorted: &x,
            vel_sorted: &vel,
            radius: &radius,
            cell_start: &cell_start,
            cell_end: &cell_end,
            grid_particle_index: &idx,
        };
        let mut forces = ParticleForces::zeros(0);
        let report = core.step(1e-3, &particles, &mut forces).unwrap();
        assert!(report.poisson_converged);
        for v in core.velocity_snapshot() {
            assert!(v.abs() < 1e-9);
        }
    }

    #[test]
    fn construction_rejects_invalid_config() {
        let mut config = test_config();
        config.nx = 0;
        assert!(NSCore::new(config).is_err());
    }

    fn empty_particles_of(grid: &Grid) -> (Vec<u32>, Vec<u32>) {
        (vec![EMPTY_CELL; grid.n_cells()], vec![EMPTY_CELL; grid.n_cells()])
    }

    /// P7: a Neumann z-boundary's normal velocity must survive a full step
    /// (predictor pin, pressure correction, re-pin) unperturbed, not just
    /// the predictor stage in isolation.
    #[test]
    fn neumann_boundary_velocity_survives_full_step() {
        let mut config = test_config();
        config.bc_bot = BoundaryKind::Neumann;
        let mut core = NSCore::new(config).unwrap();
        let grid = core.grid;
        core.v.set(&grid, 1, 1, 0, Vector3::new(0.0, 0.0, 0.37));

        let (cell_start, cell_end) = empty_particles_of(&grid);
        let x: Vec<Vector3<f64>> = vec![];
        let vel: Vec<Vector3<f64>> = vec![];
        let radius: Vec<f64> = vec![];
        let idx: Vec<u32> = vec![];
        let particles = ParticleArrays {
            x_sorted: &x,
            vel_sorted: &vel,
            radius: &radius,
            cell_start: &cell_start,
            cell_end: &cell_end,
            grid_particle_index: &idx,
        };
        let mut forces = ParticleForces::zeros(0);
        core.step(1e-3, &particles, &mut forces).unwrap();

        assert_eq!(core.v.get(&grid, 1, 1, 0).z, 0.37);
    }

    /// P5: correcting a velocity field that starts with substantial
    /// divergence should drive the divergence far down, not leave it
    /// unchanged.
    #[test]
    fn pressure_correction_reduces_velocity_divergence() {
        let mut config = test_config();
        config.tol = 1e-9;
        config.max_iter = 5000;
        let mut core = NSCore::new(config).unwrap();
        let grid = core.grid;

        for k in -1..=grid.nz as isize {
            for j in -1..=grid.ny as isize {
                for i in -1..=grid.nx as isize {
                    core.v.set(&grid, i, j, k, Vector3::new(0.1 * i as f64, 0.0, 0.0));
                }
            }
        }
        let initial_divergence = central_divergence(&grid, &core.v, 2, 2, 2);
        assert!(initial_divergence.abs() > 1e-2);

        let (cell_start, cell_end) = empty_particles_of(&grid);
        let x: Vec<Vector3<f64>> = vec![];
        let vel: Vec<Vector3<f64>> = vec![];
        let radius: Vec<f64> = vec![];
        let idx: Vec<u32> = vec![];
        let particles = ParticleArrays {
            x_sorted: &x,
            vel_sorted: &vel,
            radius: &radius,
            cell_start: &cell_start,
            cell_end: &cell_end,
            grid_particle_index: &idx,
        };
        let mut forces = ParticleForces::zeros(0);
        core.step(1e-3, &particles, &mut forces).unwrap();

        let final_divergence = central_divergence(&grid, &core.v, 2, 2, 2);
        assert!(
            final_divergence.abs() < 1e-3,
            "expected divergence to collapse toward zero, got {final_divergence}"
        );
    }

    fn central_divergence(grid: &Grid, v: &VectorField, i: isize, j: isize, k: isize) -> f64 {
        let inv_2dx = 1.0 / (2.0 * grid.dx);
        let inv_2dy = 1.0 / (2.0 * grid.dy);
        let inv_2dz = 1.0 / (2.0 * grid.dz);
        (v.get(grid, i + 1, j, k).x - v.get(grid, i - 1, j, k).x) * inv_2dx
            + (v.get(grid, i, j + 1, k).y - v.get(grid, i, j - 1, k).y) * inv_2dy
            + (v.get(grid, i, j, k + 1).z - v.get(grid, i, j, k - 1).z) * inv_2dz
    }
}
