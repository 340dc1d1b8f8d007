use serde::{Deserialize, Serialize};

use crate::error::SolverError;

/// Per-axis boundary regime. The x- and y-axes are always periodic (§4.1);
/// only the z-axis is configurable via `bc_bot`/`bc_top`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryKind {
    Dirichlet = 0,
    Neumann = 1,
    Periodic = 2,
}

impl BoundaryKind {
    pub fn from_tag(tag: u8) -> Result<Self, SolverError> {
        match tag {
            0 => Ok(BoundaryKind::Dirichlet),
            1 => Ok(BoundaryKind::Neumann),
            2 => Ok(BoundaryKind::Periodic),
            other => Err(SolverError::UnknownBoundaryTag { tag: other }),
        }
    }
}

/// Configuration surface recognized by the core (§6). Constructed once and
/// validated at `NSCore::new` — invalid configuration is a fatal,
/// non-retryable error (§7a).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub lx: f64,
    pub ly: f64,
    pub lz: f64,

    /// Fluid density [kg/m^3].
    pub rho: f64,
    /// Kinematic viscosity [m^2/s]. Setting to 0 disables the viscous and
    /// interaction-force terms entirely (§4.3, §4.7).
    pub nu: f64,
    /// Gravity vector, zeroed out unless `gravity_enabled` is set.
    pub gravity: [f64; 3],
    pub gravity_enabled: bool,

    /// Projection variant selector: 0 = Chorin (recommended), (0, 1] =
    /// Langtangen et al. (2002) incremental variant.
    pub beta: f64,
    /// Jacobi over-relaxation factor, in (0, 1].
    pub theta: f64,
    pub tol: f64,
    pub max_iter: usize,

    pub bc_bot: BoundaryKind,
    pub bc_top: BoundaryKind,

    /// Externally scheduled upper-boundary pressure. When `Some`, C1
    /// overwrites the top-plane `p`, `epsilon`, `epsilon_new` before the
    /// next Poisson solve.
    pub p_top: Option<f64>,

    pub dt: f64,
}

impl Config {
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.nx == 0 || self.ny == 0 || self.nz == 0 {
            return Err(SolverError::InvalidGridSize {
                nx: self.nx,
                ny: self.ny,
                nz: self.nz,
            });
        }
        if self.lx <= 0.0 || self.ly <= 0.0 || self.lz <= 0.0 {
            return Err(SolverError::InvalidBoxExtent {
                lx: self.lx,
                ly: self.ly,
                lz: self.lz,
            });
        }
        if !(self.rho > 0.0) {
            return Err(SolverError::InvalidDensity { rho: self.rho });
        }
        if !(self.theta > 0.0 && self.theta <= 1.0) {
            return Err(SolverError::InvalidTheta { theta: self.theta });
        }
        if !(0.0..=1.0).contains(&self.beta) {
            return Err(SolverError::InvalidBeta { beta: self.beta });
        }
        Ok(())
    }

    /// Cell size `d = L / n` along each axis.
    pub fn cell_size(&self) -> (f64, f64, f64) {
        (
            self.lx / self.nx as f64,
            self.ly / self.ny as f64,
            self.lz / self.nz as f64,
        )
    }
}
