// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Six-dimensional toroidal lattice simulation.
//!
//! A 256-bit embedding seeds a static potential field and a rank-one coupling
//! vector. The complex lattice state is then evolved with an adaptive
//! Dormand–Prince integrator, renormalised after every macro step, and
//! collapsed into a 256-bit candidate by a median split of per-point
//! features. An external [`CandidateValidator`] decides when to stop.

pub mod config;
pub mod controller;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod fields;
pub mod integrator;
pub mod lattice;
pub mod operator;
pub mod state;
pub mod telemetry;
pub mod validator;

pub use config::{constants, curve_order, seeded_rng, ConfigError, LatticeConfig, LATTICE_RANK};
pub use controller::{SimulationController, SimulationReport, SimulationStatus, StopSignal};
pub use embedding::{Embedding, EMBEDDING_BITS};
pub use error::{LatticeError, LatticeResult};
pub use extract::{Candidate, CandidateExtractor, CandidateHistory, Extraction};
pub use fields::{CouplingVector, PotentialField};
pub use integrator::{AdaptiveIntegrator, IntegratorError, Solution};
pub use lattice::LatticeShape;
pub use operator::{Hamiltonian, LatticeOperator, OperatorMemory};
pub use state::{EvolveOutcome, LatticeState};
pub use telemetry::{init_tracing, TelemetryInitError};
pub use validator::{CandidateValidator, Validation};
