use thiserror::Error;

/// Error taxonomy for the fluid core: configuration, numeric, and
/// particle-array consistency failures are all fatal and non-retryable.
/// Poisson non-convergence is deliberately *not* a variant here — it is
/// reported as a warning on `StepReport` instead (see `driver::StepReport`).
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid grid size: nx={nx}, ny={ny}, nz={nz} (all dimensions must be > 0)")]
    InvalidGridSize { nx: usize, ny: usize, nz: usize },

    #[error("invalid box extent: Lx={lx}, Ly={ly}, Lz={lz} (all extents must be > 0)")]
    InvalidBoxExtent { lx: f64, ly: f64, lz: f64 },

    #[error("invalid fluid density rho={rho} (must be > 0)")]
    InvalidDensity { rho: f64 },

    #[error("invalid over-relaxation theta={theta} (must be in (0, 1])")]
    InvalidTheta { theta: f64 },

    #[error("invalid projection parameter beta={beta} (must be in [0, 1])")]
    InvalidBeta { beta: f64 },

    #[error("unknown boundary tag {tag} (expected 0=Dirichlet, 1=Neumann, 2=Periodic)")]
    UnknownBoundaryTag { tag: u8 },

    #[error("non-finite value in field `{field}` at cell ({i}, {j}, {k})")]
    NonFiniteField {
        field: &'static str,
        i: isize,
        j: isize,
        k: isize,
    },

    #[error(
        "particle-array inconsistency: {reason} (fluid grid has {expected_cells} cells)"
    )]
    ParticleArrayInconsistent {
        reason: String,
        expected_cells: usize,
    },

    #[error("poisson solve diverged after {iterations} iterations (last norm {norm:e})")]
    PoissonDiverged { iterations: usize, norm: f64 },
}
