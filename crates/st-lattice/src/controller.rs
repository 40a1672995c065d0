// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Evolve → extract → validate loop.
//!
//! A [`SimulationController`] derives the static fields from the embedding
//! once, then runs up to a fixed number of iterations. Each iteration advances
//! the lattice by one macro step, extracts a candidate and hands it to the
//! validator. The run ends in exactly one terminal [`SimulationStatus`]; errors
//! raised inside an iteration are logged and recorded in the report instead of
//! being returned.
//!
//! Cancellation is cooperative. [`StopSignal`] wraps an atomic flag that can be
//! cloned into another thread; the loop polls it between iterations only.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use num_bigint::BigUint;
use rand::rngs::StdRng;
use tracing::{error, info, warn};

use crate::config::{seeded_rng, LatticeConfig};
use crate::embedding::Embedding;
use crate::error::{LatticeError, LatticeResult};
use crate::extract::{CandidateExtractor, CandidateHistory, Extraction};
use crate::fields::{CouplingVector, PotentialField};
use crate::integrator::AdaptiveIntegrator;
use crate::lattice::LatticeShape;
use crate::operator::{Hamiltonian, LatticeOperator};
use crate::state::LatticeState;
use crate::validator::CandidateValidator;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationStatus {
    Created,
    Running,
    Succeeded,
    Exhausted,
    Stopped,
    Failed,
}

impl SimulationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Created | Self::Running)
    }
}

/// Thread-safe cooperative stop flag.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Summary of a finished (or not yet started) run.
#[derive(Clone, Debug)]
pub struct SimulationReport {
    pub status: SimulationStatus,
    /// Completed evolve/extract/validate cycles.
    pub iterations: usize,
    pub last_candidate: Option<BigUint>,
    pub secret: Option<String>,
    pub failure: Option<String>,
}

pub struct SimulationController<V: CandidateValidator> {
    cfg: LatticeConfig,
    target: String,
    validator: V,
    embedding: Embedding,
    potential: Arc<PotentialField>,
    coupling: Arc<CouplingVector>,
    operator: Box<dyn LatticeOperator>,
    integrator: AdaptiveIntegrator,
    extractor: CandidateExtractor,
    state: LatticeState,
    history: CandidateHistory,
    rng: StdRng,
    stop: StopSignal,
    status: SimulationStatus,
    running: bool,
    iterations: usize,
    last_candidate: Option<BigUint>,
    secret: Option<String>,
    failure: Option<String>,
}

impl<V: CandidateValidator> SimulationController<V> {
    /// Validates `cfg`, derives the potential and coupling fields from
    /// `embedding` and seeds a random unit-norm lattice state.
    pub fn new(
        cfg: LatticeConfig,
        target: impl Into<String>,
        embedding: Embedding,
        validator: V,
    ) -> LatticeResult<Self> {
        cfg.validate()?;
        let shape = LatticeShape::new(cfg.dims);
        let potential = Arc::new(PotentialField::derive(&cfg, &shape, &embedding));
        let coupling = Arc::new(CouplingVector::derive(&cfg, &shape, &embedding));
        info!(
            points = shape.total_points(),
            set_bits = embedding.count_ones(),
            coupling_norm = coupling.norm(),
            "embedding injected into lattice fields"
        );

        let operator = Box::new(Hamiltonian::new(
            &cfg,
            shape,
            Arc::clone(&potential),
            Arc::clone(&coupling),
        ));
        let integrator = AdaptiveIntegrator::new(cfg.rtol, cfg.atol, cfg.max_integrator_steps);
        let state = LatticeState::random(
            shape,
            cfg.entanglement_factor,
            seeded_rng(cfg.seed, "st-lattice.state"),
        );

        Ok(Self {
            extractor: CandidateExtractor::new(&cfg),
            rng: seeded_rng(cfg.seed, "st-lattice.extract"),
            target: target.into(),
            cfg,
            validator,
            embedding,
            potential,
            coupling,
            operator,
            integrator,
            state,
            history: CandidateHistory::default(),
            stop: StopSignal::new(),
            status: SimulationStatus::Created,
            running: false,
            iterations: 0,
            last_candidate: None,
            secret: None,
            failure: None,
        })
    }

    /// Like [`SimulationController::new`] with the embedding given as an integer.
    pub fn from_integer(
        cfg: LatticeConfig,
        target: impl Into<String>,
        embedding: &BigUint,
        validator: V,
    ) -> LatticeResult<Self> {
        let embedding = Embedding::from_biguint(embedding)?;
        Self::new(cfg, target, embedding, validator)
    }

    /// Like [`SimulationController::new`] with the embedding given as hex text.
    pub fn from_hex(
        cfg: LatticeConfig,
        target: impl Into<String>,
        embedding: &str,
        validator: V,
    ) -> LatticeResult<Self> {
        let embedding = Embedding::from_hex(embedding)?;
        Self::new(cfg, target, embedding, validator)
    }

    /// Replaces the derivative driving the lattice.
    pub fn with_operator(mut self, operator: Box<dyn LatticeOperator>) -> Self {
        self.operator = operator;
        self
    }

    /// Shares an existing stop flag, e.g. one handed to the validator.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Runs with the configured iteration budget.
    pub fn start(&mut self) -> SimulationReport {
        self.run(self.cfg.max_iterations)
    }

    /// Runs at most `iterations` cycles and returns the terminal report.
    pub fn run(&mut self, iterations: usize) -> SimulationReport {
        if self.status.is_terminal() {
            warn!(status = ?self.status, "simulation already finished; not rerunning");
            return self.report();
        }
        self.status = SimulationStatus::Running;
        self.running = true;
        info!(iterations, target = %self.target, "starting lattice simulation");

        for iteration in 0..iterations {
            if self.stop.is_stop_requested() {
                info!(iteration, "simulation stopped");
                self.status = SimulationStatus::Stopped;
                break;
            }
            match self.iterate() {
                Ok(extraction) => {
                    self.iterations += 1;
                    let candidate = extraction.candidate.value;
                    if extraction.matched {
                        info!(iteration, candidate = %format!("{candidate:#x}"), "candidate matched");
                        self.last_candidate = Some(candidate);
                        self.secret = Some(extraction.secret);
                        self.status = SimulationStatus::Succeeded;
                        break;
                    }
                    if iteration % self.cfg.heartbeat_interval == 0 {
                        info!(iteration, candidate = %format!("{candidate:#x}"), "heartbeat");
                    }
                    self.last_candidate = Some(candidate);
                }
                Err(err) => {
                    error!(iteration, %err, "simulation iteration failed");
                    self.failure = Some(err.to_string());
                    self.status = SimulationStatus::Failed;
                    break;
                }
            }
        }

        if self.status == SimulationStatus::Running {
            if self.stop.is_stop_requested() {
                self.status = SimulationStatus::Stopped;
            } else {
                info!(iterations = self.iterations, "iteration budget exhausted without a match");
                self.status = SimulationStatus::Exhausted;
            }
        }
        self.running = false;
        info!(status = ?self.status, iterations = self.iterations, "simulation finished");
        self.report()
    }

    fn iterate(&mut self) -> LatticeResult<Extraction> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.state
                .evolve(self.cfg.dt, &self.integrator, self.operator.as_ref())?;
            self.extractor.extract(
                &self.state,
                &self.target,
                &self.validator,
                &mut self.history,
                &mut self.rng,
            )
        }));
        outcome.map_err(|payload| LatticeError::Panicked(panic_message(payload)))?
    }

    /// Requests a stop and marks the controller as not running. Idempotent.
    pub fn shutdown(&mut self) {
        self.stop.request_stop();
        self.running = false;
        info!("simulation shutdown requested");
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_stop_requested()
    }

    /// Handle for requesting a stop from another thread.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            status: self.status,
            iterations: self.iterations,
            last_candidate: self.last_candidate.clone(),
            secret: self.secret.clone(),
            failure: self.failure.clone(),
        }
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn history(&self) -> &CandidateHistory {
        &self.history
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    pub fn state(&self) -> &LatticeState {
        &self.state
    }

    pub fn potential(&self) -> &PotentialField {
        &self.potential
    }

    pub fn coupling(&self) -> &CouplingVector {
        &self.coupling
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::Validation;

    fn never(_: &BigUint, _: &str) -> Validation {
        Validation::miss()
    }

    fn small_config() -> LatticeConfig {
        LatticeConfig::default()
            .with_dims([4, 4, 4, 2, 1, 2])
            .with_seed(5)
    }

    #[test]
    fn status_terminality() {
        assert!(!SimulationStatus::Created.is_terminal());
        assert!(!SimulationStatus::Running.is_terminal());
        for status in [
            SimulationStatus::Succeeded,
            SimulationStatus::Exhausted,
            SimulationStatus::Stopped,
            SimulationStatus::Failed,
        ] {
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn construction_rejects_bad_inputs() {
        let err = SimulationController::from_hex(small_config(), "t", "", never).err().unwrap();
        assert!(matches!(err, LatticeError::Config(_)));

        let wide = BigUint::from(1u32) << 300;
        let err = SimulationController::from_integer(small_config(), "t", &wide, never)
            .err()
            .unwrap();
        assert!(matches!(err, LatticeError::Config(_)));

        let cfg = small_config().with_dims([1, 1, 1, 1, 1, 1]);
        let err = SimulationController::from_hex(cfg, "t", "0x1", never).err().unwrap();
        assert!(matches!(err, LatticeError::Config(_)));
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let remote = signal.clone();
        assert!(!signal.is_stop_requested());
        remote.request_stop();
        assert!(signal.is_stop_requested());
    }

    #[test]
    fn stop_during_final_iteration_reports_stopped() {
        let signal = StopSignal::new();
        let remote = signal.clone();
        let validator = move |_: &BigUint, _: &str| {
            remote.request_stop();
            Validation::miss()
        };
        let mut controller = SimulationController::from_hex(small_config(), "t", "0xabc", validator)
            .unwrap()
            .with_stop_signal(signal);
        let report = controller.run(1);
        assert_eq!(report.status, SimulationStatus::Stopped);
        assert_eq!(report.iterations, 1);
        assert!(report.last_candidate.is_some());
        assert!(!controller.is_running());
    }

    #[test]
    fn rerunning_a_finished_controller_is_a_no_op() {
        let mut controller =
            SimulationController::from_hex(small_config(), "t", "0xabc", never).unwrap();
        let first = controller.run(2);
        assert_eq!(first.status, SimulationStatus::Exhausted);
        let second = controller.run(5);
        assert_eq!(second.status, SimulationStatus::Exhausted);
        assert_eq!(second.iterations, 2);
    }

    #[test]
    fn panicking_validator_fails_the_run() {
        let validator = |_: &BigUint, _: &str| -> Validation { panic!("validator exploded") };
        let mut controller =
            SimulationController::from_hex(small_config(), "t", "0xabc", validator).unwrap();
        let report = controller.run(3);
        assert_eq!(report.status, SimulationStatus::Failed);
        assert_eq!(report.iterations, 0);
        assert!(report.failure.unwrap().contains("validator exploded"));
    }
}
