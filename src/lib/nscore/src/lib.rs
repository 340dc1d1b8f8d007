//! Two-way coupled discrete-element / porous-flow fluid core.
//!
//! A [`driver::NSCore`] owns one simulation's grid and field state; each
//! call to [`driver::NSCore::step`] advances the coupled system by one
//! `dt`, taking the particle state as input and returning both the
//! reciprocal drag forces to scatter back onto the particles and a
//! [`driver::StepReport`] describing whether the pressure solve converged.

pub mod boundary;
pub mod config;
pub mod corrector;
pub mod driver;
pub mod error;
pub mod fields;
pub mod grid;
pub mod interaction;
pub mod particles;
pub mod poisson;
pub mod porosity;
pub mod predictor;

pub use config::{BoundaryKind, Config};
pub use driver::{NSCore, StepReport, WasmNSCore};
pub use error::SolverError;
pub use particles::{ParticleArrays, ParticleForces, EMPTY_CELL};

use wasm_bindgen::prelude::*;

/// Routes Rust panics to the browser console instead of an opaque
/// `unreachable` trap; a no-op everywhere but `wasm32`.
#[wasm_bindgen(start)]
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
