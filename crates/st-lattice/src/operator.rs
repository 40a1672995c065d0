// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Time derivative driving the lattice state.
//!
//! The [`Hamiltonian`] evaluates, for every lattice point,
//!
//! ```text
//! dψ/dt = clamp( -i/ħ · (K + V(t)ψ + X(t)) + W(t) + F )
//! ```
//!
//! * `K = -ħ²/(2mₙ) · s · Δψ` with a periodic six-axis second difference `Δ`
//!   and the kinetic scale `s`,
//! * `V(t) = V · (1 + 2 sin t)` the time-modulated potential field,
//! * `X(t) = Σ_axes g(t)(ψ⁻ - ψ)·conj(ψ⁺ - ψ)` with `g(t) = g₀(1 + sin t)`,
//!   where `ψ⁻`/`ψ⁺` are the neighbours one step down/up the axis,
//! * `W(t) = κ e^{2it} ⟨w, ψ⟩ w` the rank-one long-range coupling,
//! * `F = φ · exp(i·T·tanh(arg ψ - arg ψ_prev)) · |ψ|`, present only once a
//!   previous snapshot exists.
//!
//! Real and imaginary parts are clamped independently to `±field_clamp_max`.

use std::sync::Arc;

use num_complex::Complex64;

use crate::config::{constants, LatticeConfig, LATTICE_RANK};
use crate::fields::{CouplingVector, PotentialField};
use crate::lattice::LatticeShape;

/// Cross-step context handed to the derivative on every evaluation.
#[derive(Clone, Copy, Debug)]
pub struct OperatorMemory<'a> {
    /// Snapshot from the previous macro step, if any.
    pub history: Option<&'a [Complex64]>,
    /// `conj(ψ) · entanglement_factor` from the previous macro step.
    pub entanglement: &'a [Complex64],
}

impl OperatorMemory<'_> {
    pub fn empty() -> OperatorMemory<'static> {
        OperatorMemory {
            history: None,
            entanglement: &[],
        }
    }
}

/// A deterministic derivative `dψ/dt = D(t, ψ, memory)`.
pub trait LatticeOperator: Send + Sync {
    fn derivative(
        &self,
        t: f64,
        state: &[Complex64],
        memory: &OperatorMemory<'_>,
        out: &mut [Complex64],
    );
}

/// Coefficients copied out of [`LatticeConfig`] at construction.
#[derive(Clone, Copy, Debug)]
struct Coefficients {
    inv_dx_sq: f64,
    kinetic: f64,
    entanglement_coupling: f64,
    wormhole_coupling: f64,
    feedback: f64,
    temporal_constant: f64,
    clamp: f64,
}

#[derive(Clone, Debug)]
pub struct Hamiltonian {
    shape: LatticeShape,
    potential: Arc<PotentialField>,
    coupling: Arc<CouplingVector>,
    coeffs: Coefficients,
}

impl Hamiltonian {
    pub fn new(
        cfg: &LatticeConfig,
        shape: LatticeShape,
        potential: Arc<PotentialField>,
        coupling: Arc<CouplingVector>,
    ) -> Self {
        let hbar = constants::HBAR;
        let coeffs = Coefficients {
            inv_dx_sq: 1.0 / (cfg.dx * cfg.dx),
            kinetic: -hbar * hbar / (2.0 * constants::NEUTRON_MASS) * cfg.kinetic_scale,
            entanglement_coupling: cfg.entanglement_coupling,
            wormhole_coupling: cfg.wormhole_coupling,
            feedback: cfg.ctc_feedback_factor,
            temporal_constant: cfg.temporal_constant(),
            clamp: cfg.field_clamp_max,
        };
        Self {
            shape,
            potential,
            coupling,
            coeffs,
        }
    }
}

impl LatticeOperator for Hamiltonian {
    fn derivative(
        &self,
        t: f64,
        state: &[Complex64],
        memory: &OperatorMemory<'_>,
        out: &mut [Complex64],
    ) {
        let c = &self.coeffs;
        let hbar = constants::HBAR;
        let neighbour_coupling = c.entanglement_coupling * (1.0 + t.sin());
        let potential_mod = 1.0 + 2.0 * t.sin();
        let minus_i_over_hbar = Complex64::new(0.0, -1.0 / hbar);

        let overlap = self.coupling.project(state);
        let wormhole = Complex64::from_polar(c.wormhole_coupling, 2.0 * t) * overlap;

        let potential = self.potential.values();
        let coupling = self.coupling.values();

        for (index, slot) in out.iter_mut().enumerate() {
            let centre = state[index];
            let mut laplacian = Complex64::new(0.0, 0.0);
            let mut entangled = Complex64::new(0.0, 0.0);
            for axis in 0..LATTICE_RANK {
                let (prev, next) = self.shape.neighbours(index, axis);
                let down = state[prev];
                let up = state[next];
                laplacian += (down + up - centre * 2.0) * c.inv_dx_sq;
                entangled += (down - centre) * (up - centre).conj() * neighbour_coupling;
            }

            let kinetic = laplacian * c.kinetic;
            let potential_term = centre * (potential[index] * potential_mod);
            let mut total = (kinetic + potential_term + entangled) * minus_i_over_hbar;
            total += wormhole * coupling[index];

            if let Some(past) = memory.history {
                let phase_diff = centre.arg() - past[index].arg();
                let sorting = c.temporal_constant * phase_diff.tanh();
                total += Complex64::from_polar(c.feedback * centre.norm(), sorting);
            }

            *slot = Complex64::new(
                total.re.clamp(-c.clamp, c.clamp),
                total.im.clamp(-c.clamp, c.clamp),
            );
        }
    }
}
