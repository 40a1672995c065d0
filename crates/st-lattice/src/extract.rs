// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Collapses a lattice snapshot into a 256-bit candidate.
//!
//! Each point gets a complex feature
//!
//! ```text
//! f = |ψ| + 0.5·arg(ψ)/π + 0.1·R[i mod d₅] + 0.1·j4·sin(arg ψ)
//! ```
//!
//! where `R` is the state summed over the first five axes. Points are stably
//! sorted by `(Re f, Im f)`; the upper half of the order becomes `1` bits. The
//! first 256 bits in lattice order form the candidate, most significant first.
//! An all-zero pattern is replaced by 128 randomly placed ones drawn from the
//! caller's generator, and the result is clamped to `[1, n]`.

use std::cmp::Ordering;

use ndarray::Axis;
use num_bigint::BigUint;
use num_complex::Complex64;
use num_traits::Zero;
use rand::Rng;
use tracing::{debug, warn};

use crate::config::{curve_order, LatticeConfig, LATTICE_RANK};
use crate::embedding::EMBEDDING_BITS;
use crate::error::LatticeResult;
use crate::state::LatticeState;
use crate::validator::CandidateValidator;

const FALLBACK_ONES: usize = EMBEDDING_BITS / 2;

/// A candidate before validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub value: BigUint,
    /// True when the bit pattern was all zeros and was resampled.
    pub fallback: bool,
}

/// Outcome of one extract-and-validate pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    pub candidate: Candidate,
    pub matched: bool,
    pub secret: String,
}

/// Append-only record of validated candidates.
#[derive(Clone, Debug, Default)]
pub struct CandidateHistory {
    entries: Vec<BigUint>,
}

impl CandidateHistory {
    pub fn push(&mut self, candidate: BigUint) {
        self.entries.push(candidate);
    }

    pub fn as_slice(&self) -> &[BigUint] {
        &self.entries
    }

    pub fn last(&self) -> Option<&BigUint> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct CandidateExtractor {
    j4_coupling: f64,
    ceiling: BigUint,
}

impl CandidateExtractor {
    pub fn new(cfg: &LatticeConfig) -> Self {
        Self {
            j4_coupling: cfg.j4_coupling,
            ceiling: curve_order(),
        }
    }

    pub fn ceiling(&self) -> &BigUint {
        &self.ceiling
    }

    /// Per-point sort keys.
    pub fn features(&self, state: &LatticeState) -> LatticeResult<Vec<Complex64>> {
        let magnitude = state.magnitude();
        let phase = state.phase();

        let view = state.reshape()?;
        let mut reduced = view.sum_axis(Axis(0));
        for _ in 1..LATTICE_RANK - 1 {
            reduced = reduced.sum_axis(Axis(0));
        }
        let reduced: Vec<Complex64> = reduced.iter().copied().collect();
        let period = reduced.len();

        Ok((0..magnitude.len())
            .map(|i| {
                let wave = self.j4_coupling * phase[i].sin();
                let base = magnitude[i] + 0.5 * (phase[i] / std::f64::consts::PI) + 0.1 * wave;
                reduced[i % period] * 0.1 + base
            })
            .collect())
    }

    /// Median split of the features: positions in the upper half of the stable
    /// order are `true`.
    pub fn median_bits(features: &[Complex64]) -> Vec<bool> {
        let mut order: Vec<usize> = (0..features.len()).collect();
        order.sort_by(|&a, &b| lexicographic(&features[a], &features[b]));
        let mut bits = vec![false; features.len()];
        for &index in &order[features.len() / 2..] {
            bits[index] = true;
        }
        bits
    }

    /// Derives the clamped candidate for `state`.
    pub fn derive<R: Rng + ?Sized>(
        &self,
        state: &LatticeState,
        rng: &mut R,
    ) -> LatticeResult<Candidate> {
        let features = self.features(state)?;
        let bits = Self::median_bits(&features);
        let mut value = pack(&bits[..EMBEDDING_BITS.min(bits.len())]);
        let mut fallback = false;

        if value.is_zero() {
            warn!("extracted bit pattern is all zeros; sampling fallback candidate");
            let mut resampled = [false; EMBEDDING_BITS];
            for index in rand::seq::index::sample(rng, EMBEDDING_BITS, FALLBACK_ONES) {
                resampled[index] = true;
            }
            value = pack(&resampled);
            fallback = true;
        }

        let value = value.clamp(BigUint::from(1u32), self.ceiling.clone());
        Ok(Candidate { value, fallback })
    }

    /// Derives a candidate, asks `validator` about it and records matches.
    pub fn extract<R, V>(
        &self,
        state: &LatticeState,
        target: &str,
        validator: &V,
        history: &mut CandidateHistory,
        rng: &mut R,
    ) -> LatticeResult<Extraction>
    where
        R: Rng + ?Sized,
        V: CandidateValidator + ?Sized,
    {
        let candidate = self.derive(state, rng)?;
        let verdict = validator.validate(&candidate.value, target);
        debug!(
            candidate = %format!("{:#x}", candidate.value),
            matched = verdict.matched,
            "candidate validated"
        );
        if verdict.matched {
            history.push(candidate.value.clone());
            return Ok(Extraction {
                candidate,
                matched: true,
                secret: verdict.secret,
            });
        }
        Ok(Extraction {
            candidate,
            matched: false,
            secret: String::new(),
        })
    }
}

fn lexicographic(a: &Complex64, b: &Complex64) -> Ordering {
    a.re.total_cmp(&b.re).then_with(|| a.im.total_cmp(&b.im))
}

/// Packs bits MSB-first into an integer.
fn pack(bits: &[bool]) -> BigUint {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    let pad = bytes.len() * 8 - bits.len();
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            let pos = pad + i;
            bytes[pos / 8] |= 1 << (7 - pos % 8);
        }
    }
    BigUint::from_bytes_be(&bytes)
}
