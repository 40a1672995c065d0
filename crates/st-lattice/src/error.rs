// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use thiserror::Error;

use crate::config::ConfigError;
use crate::integrator::IntegratorError;

pub type LatticeResult<T> = Result<T, LatticeError>;

#[derive(Debug, Error)]
pub enum LatticeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("numerical divergence: {0}")]
    Divergence(#[from] IntegratorError),
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("buffer length {actual} does not match lattice size {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("iteration panicked: {0}")]
    Panicked(String),
}
