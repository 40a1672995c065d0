// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Immutable run parameters for the lattice simulation.
//!
//! A [`LatticeConfig`] is built once (defaults, TOML, environment overrides),
//! validated, and then shared by reference with the controller and the
//! operator. Nothing mutates it after construction.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use num_bigint::BigUint;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of lattice axes.
pub const LATTICE_RANK: usize = 6;

/// Physical constants shared by the field builders and the operator.
pub mod constants {
    /// Gravitational constant (m³ kg⁻¹ s⁻²).
    pub const G: f64 = 6.674_30e-11;
    /// Speed of light (m/s).
    pub const C: f64 = 2.997_924_58e8;
    /// Reduced Planck constant (J·s).
    pub const HBAR: f64 = 1.054_571_8e-34;
    /// Elementary charge (C).
    pub const E_CHARGE: f64 = 1.602_176_62e-19;
    /// Vacuum permittivity (F/m).
    pub const EPSILON_0: f64 = 8.854_187_817e-12;
    /// Neutron mass (kg).
    pub const NEUTRON_MASS: f64 = 1.67e-27;
    /// Cosmological constant (m⁻²).
    pub const LAMBDA: f64 = 1.1e-52;

    /// Higgs vacuum expectation value expressed as a mass (kg).
    pub fn higgs_vev() -> f64 {
        246e9 * E_CHARGE / (C * C)
    }

    /// Planck length (m).
    pub fn planck_length() -> f64 {
        (HBAR * G / C.powi(3)).sqrt()
    }

    /// Planck time (s).
    pub fn planck_time() -> f64 {
        (HBAR * G / C.powi(5)).sqrt()
    }

    /// `1 / Λ²`, the gravitational entropy scale.
    pub fn inv_lambda_sq() -> f64 {
        1.0 / (LAMBDA * LAMBDA)
    }
}

/// Big-endian secp256k1 group order; candidates are clamped into `[1, n]`.
const SECP256K1_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Upper bound of the candidate range.
pub fn curve_order() -> BigUint {
    BigUint::from_bytes_be(&SECP256K1_ORDER)
}

/// Errors raised while building or validating configuration and embeddings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("lattice axis {axis} has zero length")]
    EmptyAxis { axis: usize },
    #[error("lattice dims {dims:?} exceed the addressable point count")]
    LatticeTooLarge { dims: [usize; LATTICE_RANK] },
    #[error("lattice holds {points} points but at least {required} are needed")]
    LatticeTooSmall { points: usize, required: usize },
    #[error("{name} must be positive and finite (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be finite (got {value})")]
    NonFinite { name: &'static str, value: f64 },
    #[error("anisotropic weight for axis {axis} must be finite and non-negative (got {value})")]
    InvalidWeight { axis: usize, value: f64 },
    #[error("{name} must be at least 1")]
    ZeroCount { name: &'static str },
    #[error("embedding is missing")]
    MissingEmbedding,
    #[error("embedding is not a hexadecimal integer: {0:?}")]
    MalformedEmbedding(String),
    #[error("embedding needs {bits} bits but only 256 are available")]
    EmbeddingTooWide { bits: u64 },
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// Numeric parameters for one simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    /// Lattice extent per axis `(x, y, z, t, w1, w2)`.
    pub dims: [usize; LATTICE_RANK],
    pub max_iterations: usize,
    /// Macro time step (s).
    pub dt: f64,
    /// Spatial step (m).
    pub dx: f64,
    pub ctc_feedback_factor: f64,
    pub wormhole_coupling: f64,
    pub entanglement_coupling: f64,
    pub em_strength: f64,
    pub flux_coupling: f64,
    /// Per-component clamp applied to the derivative.
    pub field_clamp_max: f64,
    pub rtol: f64,
    pub atol: f64,
    /// Weights of the anisotropic distance used by the potential.
    pub anisotropic_weights: [f64; LATTICE_RANK],
    pub scalar_coupling: f64,
    pub j4_coupling: f64,
    pub entanglement_factor: f64,
    /// Compensates the unit mismatch of the discretised kinetic term.
    pub kinetic_scale: f64,
    pub heartbeat_interval: usize,
    pub max_integrator_steps: usize,
    /// Base seed; `None` draws from OS entropy.
    ///
    /// Per-label seeds are derived with `DefaultHasher`, so a seeded run is
    /// reproducible with the same Rust toolchain but not guaranteed across
    /// toolchain releases.
    pub seed: Option<u64>,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            dims: [5, 5, 5, 5, 3, 3],
            max_iterations: 10_000,
            dt: 1e-12,
            dx: 1e-15,
            ctc_feedback_factor: 0.5,
            wormhole_coupling: 5000.0,
            entanglement_coupling: 2.0,
            em_strength: 3.0,
            flux_coupling: 1e-3,
            field_clamp_max: 1e6,
            rtol: 1e-6,
            atol: 1e-9,
            anisotropic_weights: [1.0, 1.0, 1.0, 0.1, 0.1, 0.1],
            scalar_coupling: 1e-2,
            j4_coupling: 1.0,
            entanglement_factor: 0.2,
            kinetic_scale: 1e30,
            heartbeat_interval: 10,
            max_integrator_steps: 10_000,
            seed: None,
        }
    }
}

impl LatticeConfig {
    /// Parses a TOML document; missing keys fall back to the defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(source)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Applies `ST_LATTICE_SEED` and `ST_LATTICE_MAX_ITERATIONS` when they parse.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(seed) = std::env::var("ST_LATTICE_SEED")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.seed = Some(seed);
        }
        if let Some(iterations) = std::env::var("ST_LATTICE_MAX_ITERATIONS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            self.max_iterations = iterations;
        }
        self
    }

    pub fn with_dims(mut self, dims: [usize; LATTICE_RANK]) -> Self {
        self.dims = dims;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Product of the axis lengths.
    pub fn total_points(&self) -> usize {
        self.dims.iter().product()
    }

    /// Scale of the history feedback phase rotation.
    pub fn temporal_constant(&self) -> f64 {
        constants::planck_time() / self.dt
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(axis) = self.dims.iter().position(|&d| d == 0) {
            return Err(ConfigError::EmptyAxis { axis });
        }
        let points = self
            .dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .filter(|&points| points <= isize::MAX as usize)
            .ok_or(ConfigError::LatticeTooLarge { dims: self.dims })?;
        if points < crate::embedding::EMBEDDING_BITS {
            return Err(ConfigError::LatticeTooSmall {
                points,
                required: crate::embedding::EMBEDDING_BITS,
            });
        }
        for (name, value) in [
            ("dt", self.dt),
            ("dx", self.dx),
            ("rtol", self.rtol),
            ("atol", self.atol),
            ("field_clamp_max", self.field_clamp_max),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        for (name, value) in [
            ("ctc_feedback_factor", self.ctc_feedback_factor),
            ("wormhole_coupling", self.wormhole_coupling),
            ("entanglement_coupling", self.entanglement_coupling),
            ("em_strength", self.em_strength),
            ("flux_coupling", self.flux_coupling),
            ("scalar_coupling", self.scalar_coupling),
            ("j4_coupling", self.j4_coupling),
            ("entanglement_factor", self.entanglement_factor),
            ("kinetic_scale", self.kinetic_scale),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }
        for (axis, &value) in self.anisotropic_weights.iter().enumerate() {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidWeight { axis, value });
            }
        }
        if self.heartbeat_interval == 0 {
            return Err(ConfigError::ZeroCount {
                name: "heartbeat_interval",
            });
        }
        if self.max_integrator_steps == 0 {
            return Err(ConfigError::ZeroCount {
                name: "max_integrator_steps",
            });
        }
        Ok(())
    }
}

/// Returns a generator for `label`: derived from `seed` when present, otherwise
/// seeded from the operating system.
pub fn seeded_rng(seed: Option<u64>, label: &str) -> StdRng {
    match seed {
        Some(base) => {
            let mut hasher = DefaultHasher::new();
            base.hash(&mut hasher);
            label.hash(&mut hasher);
            StdRng::seed_from_u64(hasher.finish())
        }
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
    use std::sync::{Mutex, OnceLock};

    fn with_env(vars: &[(&str, Option<&str>)], test: impl FnOnce()) {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        let _lock = GUARD
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let snapshot: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(key, value)| {
                let previous = std::env::var(key).ok();
                match value {
                    Some(val) => std::env::set_var(key, val),
                    None => std::env::remove_var(key),
                }
                ((*key).to_string(), previous)
            })
            .collect();

        let result = catch_unwind(AssertUnwindSafe(test));

        for (key, value) in snapshot {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }

        if let Err(err) = result {
            resume_unwind(err);
        }
    }

    #[test]
    fn default_lattice_has_expected_point_count() {
        let cfg = LatticeConfig::default();
        assert_eq!(cfg.total_points(), 5625);
        cfg.validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        let err = LatticeConfig::default()
            .with_dims([5, 5, 0, 5, 3, 3])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyAxis { axis: 2 }));

        let err = LatticeConfig::default()
            .with_dims([2, 2, 2, 2, 2, 2])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::LatticeTooSmall { points: 64, .. }));

        let cfg = LatticeConfig {
            dt: f64::NAN,
            ..LatticeConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::NonPositive { name: "dt", .. }
        ));
    }

    #[test]
    fn overflowing_dims_are_rejected_instead_of_panicking() {
        let err = LatticeConfig::from_toml_str("dims = [4096, 4096, 4096, 4096, 4096, 4096]\n")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::LatticeTooLarge { dims: [4096, 4096, 4096, 4096, 4096, 4096] }
        ));

        let err = LatticeConfig::default()
            .with_dims([usize::MAX, 2, 1, 1, 1, 1])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::LatticeTooLarge { .. }));
    }

    #[test]
    fn validation_rejects_non_finite_couplings_and_negative_weights() {
        let mut weights = LatticeConfig::default().anisotropic_weights;
        weights[4] = -0.1;
        let cfg = LatticeConfig {
            anisotropic_weights: weights,
            ..LatticeConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::InvalidWeight { axis: 4, .. }
        ));

        let cfg = LatticeConfig {
            kinetic_scale: f64::INFINITY,
            ..LatticeConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::NonFinite { name: "kinetic_scale", .. }
        ));

        let cfg = LatticeConfig {
            wormhole_coupling: f64::NAN,
            ..LatticeConfig::default()
        };
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::NonFinite { name: "wormhole_coupling", .. }
        ));

        let cfg = LatticeConfig {
            anisotropic_weights: [0.0; LATTICE_RANK],
            ..LatticeConfig::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn env_overrides_apply_when_they_parse() {
        with_env(
            &[
                ("ST_LATTICE_SEED", Some(" 42 ")),
                ("ST_LATTICE_MAX_ITERATIONS", Some("17")),
            ],
            || {
                let cfg = LatticeConfig::default().with_env_overrides();
                assert_eq!(cfg.seed, Some(42));
                assert_eq!(cfg.max_iterations, 17);
            },
        );
        with_env(
            &[
                ("ST_LATTICE_SEED", Some("not-a-seed")),
                ("ST_LATTICE_MAX_ITERATIONS", Some("-3")),
            ],
            || {
                let cfg = LatticeConfig::default()
                    .with_seed(5)
                    .with_env_overrides();
                assert_eq!(cfg.seed, Some(5));
                assert_eq!(cfg.max_iterations, 10_000);
            },
        );
        with_env(
            &[("ST_LATTICE_SEED", None), ("ST_LATTICE_MAX_ITERATIONS", None)],
            || {
                let cfg = LatticeConfig::default().with_env_overrides();
                assert_eq!(cfg, LatticeConfig::default());
            },
        );
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let cfg = LatticeConfig::from_toml_str(
            "dims = [4, 4, 4, 4, 2, 2]\nmax_iterations = 7\nseed = 99\n",
        )
        .unwrap();
        assert_eq!(cfg.dims, [4, 4, 4, 4, 2, 2]);
        assert_eq!(cfg.max_iterations, 7);
        assert_eq!(cfg.seed, Some(99));
        assert_eq!(cfg.dt, 1e-12);

        let err = LatticeConfig::from_toml_str("dims = \"oops\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn curve_order_matches_secp256k1() {
        let expected = BigUint::parse_bytes(
            b"FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141",
            16,
        )
        .unwrap();
        assert_eq!(curve_order(), expected);
    }

    #[test]
    fn seeded_rngs_are_stable_per_label() {
        let a: u64 = seeded_rng(Some(7), "lattice").gen();
        let b: u64 = seeded_rng(Some(7), "lattice").gen();
        let c: u64 = seeded_rng(Some(7), "extract").gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
