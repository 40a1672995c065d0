// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use num_bigint::BigUint;

/// Answer returned by a [`CandidateValidator`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Validation {
    pub matched: bool,
    /// Encoded secret on a match, empty otherwise.
    pub secret: String,
}

impl Validation {
    pub fn miss() -> Self {
        Self::default()
    }

    pub fn hit(secret: impl Into<String>) -> Self {
        Self {
            matched: true,
            secret: secret.into(),
        }
    }
}

/// External oracle deciding whether a candidate corresponds to `target`.
///
/// Implementations must not fail: anything that cannot be checked is a miss.
pub trait CandidateValidator {
    fn validate(&self, candidate: &BigUint, target: &str) -> Validation;
}

impl<F> CandidateValidator for F
where
    F: Fn(&BigUint, &str) -> Validation,
{
    fn validate(&self, candidate: &BigUint, target: &str) -> Validation {
        self(candidate, target)
    }
}
