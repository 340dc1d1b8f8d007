use crate::config::{BoundaryKind, Config};
use crate::fields::{ScalarField, TensorField, VectorField};
use crate::grid::Grid;

/// Resolved per-axis boundary regime (x and y are always periodic, §4.1).
#[derive(Clone, Copy, Debug)]
pub struct BoundaryRegime {
    pub bot: BoundaryKind,
    pub top: BoundaryKind,
}

impl BoundaryRegime {
    pub fn from_config(config: &Config) -> Self {
        BoundaryRegime {
            bot: config.bc_bot,
            top: config.bc_top,
        }
    }
}

/// Ghost value for a one-sided Dirichlet mirror: reflects the interior value
/// about the externally fixed boundary value (§4.1, I1).
#[inline]
fn dirichlet_ghost(boundary_value: f64, first_interior: f64) -> f64 {
    2.0 * boundary_value - first_interior
}

/// Refreshes the one-cell ghost halo of a cell-centered scalar field in
/// place (C1). x and y are always periodic; z follows `regime`. `boundary_value`
/// supplies the externally fixed Dirichlet value on the bottom/top planes
/// (ignored for Neumann/Periodic).
pub fn refresh_scalar_ghosts(
    grid: &Grid,
    field: &mut ScalarField,
    regime: BoundaryRegime,
    z_boundary_bot: f64,
    z_boundary_top: f64,
) {
    let nx = grid.nx as isize;
    let ny = grid.ny as isize;
    let nz = grid.nz as isize;

    // x: periodic wrap.
    for k in -1..=nz {
        for j in -1..=ny {
            let lo = field.get(grid, 0, j, k);
            let hi = field.get(grid, nx - 1, j, k);
            field.set(grid, -1, j, k, hi);
            field.set(grid, nx, j, k, lo);
        }
    }

    // y: periodic wrap.
    for k in -1..=nz {
        for i in -1..=nx {
            let lo = field.get(grid, i, 0, k);
            let hi = field.get(grid, i, ny - 1, k);
            field.set(grid, i, -1, k, hi);
            field.set(grid, i, ny, k, lo);
        }
    }

    // z: regime-dependent.
    for j in -1..=ny {
        for i in -1..=nx {
            let bot_ghost = match regime.bot {
                BoundaryKind::Dirichlet => {
                    dirichlet_ghost(z_boundary_bot, field.get(grid, i, j, 0))
                }
                BoundaryKind::Neumann => field.get(grid, i, j, 0),
                BoundaryKind::Periodic => field.get(grid, i, j, nz - 1),
            };
            let top_ghost = match regime.top {
                BoundaryKind::Dirichlet => {
                    dirichlet_ghost(z_boundary_top, field.get(grid, i, j, nz - 1))
                }
                BoundaryKind::Neumann => field.get(grid, i, j, nz - 1),
                BoundaryKind::Periodic => field.get(grid, i, j, 0),
            };
            field.set(grid, i, j, -1, bot_ghost);
            field.set(grid, i, j, nz, top_ghost);
        }
    }
}

/// Same rule as `refresh_scalar_ghosts` applied componentwise to a vector
/// field (I4: every component of a vector/tensor quantity shares one
/// boundary regime, none may be refreshed independently).
pub fn refresh_vector_ghosts(
    grid: &Grid,
    field: &mut VectorField,
    regime: BoundaryRegime,
    z_boundary_bot: nalgebra::Vector3<f64>,
    z_boundary_top: nalgebra::Vector3<f64>,
) {
    let nx = grid.nx as isize;
    let ny = grid.ny as isize;
    let nz = grid.nz as isize;

    for k in -1..=nz {
        for j in -1..=ny {
            let lo = field.get(grid, 0, j, k);
            let hi = field.get(grid, nx - 1, j, k);
            field.set(grid, -1, j, k, hi);
            field.set(grid, nx, j, k, lo);
        }
    }

    for k in -1..=nz {
        for i in -1..=nx {
            let lo = field.get(grid, i, 0, k);
            let hi = field.get(grid, i, ny - 1, k);
            field.set(grid, i, -1, k, hi);
            field.set(grid, i, ny, k, lo);
        }
    }

    for j in -1..=ny {
        for i in -1..=nx {
            let bot_ghost = match regime.bot {
                BoundaryKind::Dirichlet => {
                    2.0 * z_boundary_bot - field.get(grid, i, j, 0)
                }
                BoundaryKind::Neumann => field.get(grid, i, j, 0),
                BoundaryKind::Periodic => field.get(grid, i, j, nz - 1),
            };
            let top_ghost = match regime.top {
                BoundaryKind::Dirichlet => {
                    2.0 * z_boundary_top - field.get(grid, i, j, nz - 1)
                }
                BoundaryKind::Neumann => field.get(grid, i, j, nz - 1),
                BoundaryKind::Periodic => field.get(grid, i, j, 0),
            };
            field.set(grid, i, j, -1, bot_ghost);
            field.set(grid, i, j, nz, top_ghost);
        }
    }
}

/// Tensor fields are refreshed with a plain zero-gradient/periodic copy —
/// stress is never pinned to an external Dirichlet value (§4.3). All six
/// components move together per cell (I4).
pub fn refresh_tensor_ghosts(grid: &Grid, field: &mut TensorField, regime: BoundaryRegime) {
    let nx = grid.nx as isize;
    let ny = grid.ny as isize;
    let nz = grid.nz as isize;

    for k in -1..=nz {
        for j in -1..=ny {
            let lo = field.get(grid, 0, j, k);
            let hi = field.get(grid, nx - 1, j, k);
            field.set(grid, -1, j, k, hi);
            field.set(grid, nx, j, k, lo);
        }
    }
    for k in -1..=nz {
        for i in -1..=nx {
            let lo = field.get(grid, i, 0, k);
            let hi = field.get(grid, i, ny - 1, k);
            field.set(grid, i, -1, k, hi);
            field.set(grid, i, ny, k, lo);
        }
    }
    for j in -1..=ny {
        for i in -1..=nx {
            let bot_ghost = match regime.bot {
                BoundaryKind::Periodic => field.get(grid, i, j, nz - 1),
                BoundaryKind::Dirichlet | BoundaryKind::Neumann => field.get(grid, i, j, 0),
            };
            let top_ghost = match regime.top {
                BoundaryKind::Periodic => field.get(grid, i, j, 0),
                BoundaryKind::Dirichlet | BoundaryKind::Neumann => field.get(grid, i, j, nz - 1),
            };
            field.set(grid, i, j, -1, bot_ghost);
            field.set(grid, i, j, nz, top_ghost);
        }
    }
}
