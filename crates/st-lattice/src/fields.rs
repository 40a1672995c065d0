// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Static fields derived once from the embedding.
//!
//! Both fields are sampled on the physical coordinates `x_k = i_k · dx`.
//!
//! * [`PotentialField`] sums a gravitational `r⁻⁴` well scaled by `1/Λ²`, an
//!   electromagnetic `r⁻⁴` term, a Higgs-flux `r⁻¹` term and a scalar field
//!   equal to the tiled embedding bits. `r` is the anisotropically weighted
//!   distance from the origin, offset by `1e-10` so it never vanishes.
//! * [`CouplingVector`] is a Gaussian envelope (σ = 5·dx) around the lattice
//!   centre, skewed by a `z·w1` cross term and masked by the embedding bits,
//!   then normalised.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::config::{constants, LatticeConfig, LATTICE_RANK};
use crate::embedding::Embedding;
use crate::lattice::LatticeShape;
use crate::state::l2_norm;

const RADIUS_OFFSET: f64 = 1e-10;
const Z_AXIS: usize = 2;
const W1_AXIS: usize = 4;

#[derive(Clone, Debug)]
pub struct PotentialField {
    values: Vec<f64>,
    scalar: Vec<f64>,
}

impl PotentialField {
    pub fn derive(cfg: &LatticeConfig, shape: &LatticeShape, embedding: &Embedding) -> Self {
        let scalar = embedding.tiled(shape.total_points());
        let g_term = -constants::G * constants::NEUTRON_MASS * constants::inv_lambda_sq();
        let em_term = cfg.em_strength * constants::E_CHARGE * constants::E_CHARGE
            / (4.0 * PI * constants::EPSILON_0);
        let higgs_term = constants::higgs_vev() * cfg.flux_coupling;

        let values = (0..shape.total_points())
            .map(|index| {
                let coords = shape.coords(index);
                let r_sq: f64 = coords
                    .iter()
                    .zip(cfg.anisotropic_weights.iter())
                    .map(|(&c, &w)| {
                        let x = c as f64 * cfg.dx;
                        w * x * x
                    })
                    .sum();
                let r = r_sq.sqrt() + RADIUS_OFFSET;
                let r4 = r.powi(4);
                g_term / r4 + em_term / r4 + higgs_term / r + cfg.scalar_coupling * scalar[index]
            })
            .collect();

        Self { values, scalar }
    }

    /// Wraps precomputed potential values; the scalar component is left at zero.
    #[cfg(test)]
    pub(crate) fn from_values(values: Vec<f64>) -> Self {
        let scalar = vec![0.0; values.len()];
        Self { values, scalar }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The tiled embedding bits that seed the scalar-field contribution.
    pub fn scalar_component(&self) -> &[f64] {
        &self.scalar
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Unit-norm rank-one coupling vector (all zeros when every embedding bit is 0).
#[derive(Clone, Debug)]
pub struct CouplingVector {
    values: Vec<Complex64>,
}

impl CouplingVector {
    pub fn derive(cfg: &LatticeConfig, shape: &LatticeShape, embedding: &Embedding) -> Self {
        let mut centre = [0.0f64; LATTICE_RANK];
        for (axis, c) in centre.iter_mut().enumerate() {
            *c = (shape.dims()[axis] / 2) as f64 * cfg.dx;
        }
        let sigma = 5.0 * cfg.dx;

        let mut values: Vec<Complex64> = (0..shape.total_points())
            .map(|index| {
                if !embedding.bit(index) {
                    return Complex64::new(0.0, 0.0);
                }
                let coords = shape.coords(index);
                let mut offsets = [0.0f64; LATTICE_RANK];
                for axis in 0..LATTICE_RANK {
                    offsets[axis] = coords[axis] as f64 * cfg.dx - centre[axis];
                }
                let r_sq: f64 = offsets.iter().map(|d| d * d).sum();
                let cross = 1.0 + 2.0 * offsets[Z_AXIS] * offsets[W1_AXIS];
                let envelope = (-r_sq / (2.0 * sigma * sigma)).exp();
                Complex64::new(envelope * cross, 0.0)
            })
            .collect();

        let norm = l2_norm(&values);
        if norm > 0.0 {
            values.iter_mut().for_each(|v| *v /= norm);
        }
        Self { values }
    }

    pub fn values(&self) -> &[Complex64] {
        &self.values
    }

    /// `⟨w, ψ⟩ = Σ conj(wᵢ) ψᵢ`.
    pub fn project(&self, state: &[Complex64]) -> Complex64 {
        self.values
            .iter()
            .zip(state)
            .map(|(w, v)| w.conj() * v)
            .sum()
    }

    pub fn norm(&self) -> f64 {
        l2_norm(&self.values)
    }
}
