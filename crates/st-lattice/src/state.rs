// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! The evolving complex amplitude on the lattice.
//!
//! A [`LatticeState`] keeps the unit-norm amplitude vector, a single-slot
//! snapshot of the previous macro step and the derived entanglement vector.
//! Every successful [`LatticeState::evolve`] leaves the amplitude at unit norm,
//! either by rescaling or by drawing a fresh random phase vector when the
//! integrated state collapsed to zero.

use std::f64::consts::TAU;

use ndarray::ArrayViewD;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, error, warn};

use crate::error::{LatticeError, LatticeResult};
use crate::integrator::AdaptiveIntegrator;
use crate::lattice::LatticeShape;
use crate::operator::{LatticeOperator, OperatorMemory};

/// How the amplitude was brought back to unit norm after a macro step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvolveOutcome {
    Renormalised,
    /// The integrated state had zero norm and was replaced by random phases.
    Reinitialised,
}

#[derive(Clone, Debug)]
pub struct LatticeState {
    shape: LatticeShape,
    amplitudes: Vec<Complex64>,
    previous: Option<Vec<Complex64>>,
    entanglement: Vec<Complex64>,
    entanglement_factor: f64,
    rng: StdRng,
}

impl LatticeState {
    /// Random unit-norm state `exp(iθ)/√N` with one uniform phase per point.
    pub fn random(shape: LatticeShape, entanglement_factor: f64, mut rng: StdRng) -> Self {
        let amplitudes = random_phases(shape.total_points(), &mut rng);
        Self {
            shape,
            entanglement: vec![Complex64::new(0.0, 0.0); shape.total_points()],
            amplitudes,
            previous: None,
            entanglement_factor,
            rng,
        }
    }

    /// Builds a state from explicit amplitudes, normalised to unit norm when possible.
    pub fn from_amplitudes(
        shape: LatticeShape,
        amplitudes: Vec<Complex64>,
        entanglement_factor: f64,
        rng: StdRng,
    ) -> LatticeResult<Self> {
        if amplitudes.len() != shape.total_points() {
            return Err(LatticeError::LengthMismatch {
                expected: shape.total_points(),
                actual: amplitudes.len(),
            });
        }
        let mut state = Self {
            shape,
            entanglement: vec![Complex64::new(0.0, 0.0); amplitudes.len()],
            amplitudes,
            previous: None,
            entanglement_factor,
            rng,
        };
        let norm = l2_norm(&state.amplitudes);
        if norm > 0.0 {
            state.amplitudes.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(state)
    }

    /// Advances the state by one macro step of length `dt`.
    pub fn evolve(
        &mut self,
        dt: f64,
        integrator: &AdaptiveIntegrator,
        operator: &dyn LatticeOperator,
    ) -> LatticeResult<EvolveOutcome> {
        let memory = OperatorMemory {
            history: self.previous.as_deref(),
            entanglement: &self.entanglement,
        };
        let solution = integrator
            .solve(
                |t, y, out| operator.derivative(t, y, &memory, out),
                dt,
                &self.amplitudes,
            )
            .map_err(|err| {
                error!(%err, "lattice evolution failed");
                LatticeError::from(err)
            })?;
        debug!(
            accepted = solution.accepted_steps,
            rejected = solution.rejected_steps,
            evaluations = solution.evaluations,
            "macro step integrated"
        );

        let mut next = solution.y;
        let norm = l2_norm(&next);
        let outcome = if norm > 0.0 {
            next.iter_mut().for_each(|v| *v /= norm);
            EvolveOutcome::Renormalised
        } else {
            warn!("lattice state norm collapsed to zero; reinitialising phases");
            next = random_phases(self.shape.total_points(), &mut self.rng);
            EvolveOutcome::Reinitialised
        };

        self.previous = Some(next.clone());
        self.entanglement = next
            .iter()
            .map(|v| v.conj() * self.entanglement_factor)
            .collect();
        self.amplitudes = next;
        Ok(outcome)
    }

    pub fn shape(&self) -> &LatticeShape {
        &self.shape
    }

    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Snapshot recorded by the last completed macro step.
    pub fn previous(&self) -> Option<&[Complex64]> {
        self.previous.as_deref()
    }

    pub fn history_len(&self) -> usize {
        usize::from(self.previous.is_some())
    }

    pub fn entanglement(&self) -> &[Complex64] {
        &self.entanglement
    }

    pub fn magnitude(&self) -> Vec<f64> {
        self.amplitudes.iter().map(|v| v.norm()).collect()
    }

    pub fn phase(&self) -> Vec<f64> {
        self.amplitudes.iter().map(|v| v.arg()).collect()
    }

    pub fn norm(&self) -> f64 {
        l2_norm(&self.amplitudes)
    }

    pub fn reshape(&self) -> LatticeResult<ArrayViewD<'_, Complex64>> {
        self.shape.view(&self.amplitudes)
    }
}

fn random_phases<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<Complex64> {
    let scale = 1.0 / (len as f64).sqrt();
    (0..len)
        .map(|_| Complex64::from_polar(scale, rng.gen_range(0.0..TAU)))
        .collect()
}

pub(crate) fn l2_norm(values: &[Complex64]) -> f64 {
    values.iter().map(|v| v.norm_sqr()).sum::<f64>().sqrt()
}
