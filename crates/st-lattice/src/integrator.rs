// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Adaptive explicit Runge–Kutta integration over a single macro step.
//!
//! The solver is the Dormand–Prince 5(4) pair with first-same-as-last reuse,
//! a Hairer-style initial step guess and the usual safety-factor step control.
//! Any non-finite derivative, a collapsing step size, or an exhausted step
//! budget is reported as an [`IntegratorError`]; a stale state is never
//! returned.

use num_complex::Complex64;
use thiserror::Error;

const C: [f64; 6] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];
const A: [&[f64]; 6] = [
    &[],
    &[1.0 / 5.0],
    &[3.0 / 40.0, 9.0 / 40.0],
    &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
    &[
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
    ],
    &[
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ],
];
const B: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];
/// Difference between the fifth and embedded fourth order weights.
const E: [f64; 7] = [
    -71.0 / 57600.0,
    0.0,
    71.0 / 16695.0,
    -71.0 / 1920.0,
    17253.0 / 339200.0,
    -22.0 / 525.0,
    1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const ERROR_EXPONENT: f64 = -1.0 / 5.0;

#[derive(Debug, Error)]
pub enum IntegratorError {
    #[error("integration span must be positive and finite (got {span})")]
    InvalidSpan { span: f64 },
    #[error("derivative produced a non-finite value at t={t}")]
    NonFiniteDerivative { t: f64 },
    #[error("step size collapsed to {step} at t={t}")]
    StepSizeUnderflow { t: f64, step: f64 },
    #[error("step budget of {limit} exhausted at t={t}")]
    StepLimit { t: f64, limit: usize },
}

/// Result of a successful solve.
#[derive(Clone, Debug)]
pub struct Solution {
    /// State at the end of the span.
    pub y: Vec<Complex64>,
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub evaluations: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct AdaptiveIntegrator {
    rtol: f64,
    atol: f64,
    max_steps: usize,
}

impl AdaptiveIntegrator {
    pub fn new(rtol: f64, atol: f64, max_steps: usize) -> Self {
        Self {
            rtol,
            atol,
            max_steps,
        }
    }

    /// Integrates `dy/dt = f(t, y)` from `t = 0` to `t = span`.
    ///
    /// `f` writes the derivative into its third argument.
    pub fn solve<F>(
        &self,
        mut f: F,
        span: f64,
        y0: &[Complex64],
    ) -> Result<Solution, IntegratorError>
    where
        F: FnMut(f64, &[Complex64], &mut [Complex64]),
    {
        if !(span.is_finite() && span > 0.0) {
            return Err(IntegratorError::InvalidSpan { span });
        }
        let n = y0.len();
        let zero = Complex64::new(0.0, 0.0);
        let mut y = y0.to_vec();
        let mut y_new = vec![zero; n];
        let mut scratch = vec![zero; n];
        let mut k: Vec<Vec<Complex64>> = (0..7).map(|_| vec![zero; n]).collect();
        let mut evaluations = 0usize;

        f(0.0, &y, &mut k[0]);
        evaluations += 1;
        ensure_finite(&k[0], 0.0)?;

        let mut h = {
            let (head, tail) = k.split_at_mut(1);
            self.initial_step(&mut f, span, &y, &head[0], &mut scratch, &mut tail[0])?
        };
        evaluations += 1;

        let mut t = 0.0f64;
        let mut accepted_steps = 0usize;
        let mut rejected_steps = 0usize;

        while t < span {
            if accepted_steps + rejected_steps >= self.max_steps {
                return Err(IntegratorError::StepLimit {
                    t,
                    limit: self.max_steps,
                });
            }
            let min_step = 10.0 * f64::EPSILON * t.abs().max(f64::MIN_POSITIVE);
            if h < min_step {
                return Err(IntegratorError::StepSizeUnderflow { t, step: h });
            }

            let mut step_rejected = false;
            loop {
                let reaches_end = h >= span - t;
                if reaches_end {
                    h = span - t;
                }
                for stage in 1..6 {
                    for i in 0..n {
                        let mut acc = zero;
                        for (j, &a) in A[stage].iter().enumerate() {
                            acc += k[j][i] * a;
                        }
                        scratch[i] = y[i] + acc * h;
                    }
                    let (_, rest) = k.split_at_mut(stage);
                    f(t + C[stage] * h, &scratch, &mut rest[0]);
                    evaluations += 1;
                    ensure_finite(&rest[0], t + C[stage] * h)?;
                }
                for i in 0..n {
                    let mut acc = zero;
                    for (j, &b) in B.iter().enumerate() {
                        acc += k[j][i] * b;
                    }
                    y_new[i] = y[i] + acc * h;
                }
                let t_new = if reaches_end { span } else { t + h };
                f(t_new, &y_new, &mut k[6]);
                evaluations += 1;
                ensure_finite(&k[6], t_new)?;

                let err = self.error_norm(&k, &y, &y_new, h);
                if !err.is_finite() {
                    return Err(IntegratorError::NonFiniteDerivative { t: t_new });
                }
                if err < 1.0 {
                    let mut factor = if err == 0.0 {
                        MAX_FACTOR
                    } else {
                        MAX_FACTOR.min(SAFETY * err.powf(ERROR_EXPONENT))
                    };
                    if step_rejected {
                        factor = factor.min(1.0);
                    }
                    t = t_new;
                    std::mem::swap(&mut y, &mut y_new);
                    k.swap(0, 6);
                    accepted_steps += 1;
                    h *= factor;
                    break;
                }

                h *= MIN_FACTOR.max(SAFETY * err.powf(ERROR_EXPONENT));
                rejected_steps += 1;
                step_rejected = true;
                if h < min_step {
                    return Err(IntegratorError::StepSizeUnderflow { t, step: h });
                }
                if accepted_steps + rejected_steps >= self.max_steps {
                    return Err(IntegratorError::StepLimit {
                        t,
                        limit: self.max_steps,
                    });
                }
            }
        }

        Ok(Solution {
            y,
            accepted_steps,
            rejected_steps,
            evaluations,
        })
    }

    fn initial_step<F>(
        &self,
        f: &mut F,
        span: f64,
        y0: &[Complex64],
        f0: &[Complex64],
        y1: &mut [Complex64],
        f1: &mut [Complex64],
    ) -> Result<f64, IntegratorError>
    where
        F: FnMut(f64, &[Complex64], &mut [Complex64]),
    {
        let scale: Vec<f64> = y0.iter().map(|v| self.atol + v.norm() * self.rtol).collect();
        let d0 = rms(y0.iter().zip(&scale).map(|(v, s)| v.norm() / s));
        let d1 = rms(f0.iter().zip(&scale).map(|(v, s)| v.norm() / s));
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        }
        .min(span);

        for i in 0..y0.len() {
            y1[i] = y0[i] + f0[i] * h0;
        }
        f(h0, y1, f1);
        ensure_finite(f1, h0)?;
        let d2 = rms(
            f1.iter()
                .zip(f0)
                .zip(&scale)
                .map(|((a, b), s)| (a - b).norm() / s),
        ) / h0;

        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / 5.0)
        };
        Ok((100.0 * h0).min(h1).min(span))
    }

    fn error_norm(
        &self,
        k: &[Vec<Complex64>],
        y: &[Complex64],
        y_new: &[Complex64],
        h: f64,
    ) -> f64 {
        rms((0..y.len()).map(|i| {
            let mut acc = Complex64::new(0.0, 0.0);
            for (j, &e) in E.iter().enumerate() {
                acc += k[j][i] * e;
            }
            let scale = self.atol + y[i].norm().max(y_new[i].norm()) * self.rtol;
            (acc * h).norm() / scale
        }))
    }
}

fn rms(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for v in values {
        sum += v * v;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        (sum / count as f64).sqrt()
    }
}

fn ensure_finite(values: &[Complex64], t: f64) -> Result<(), IntegratorError> {
    if values.iter().all(|v| v.re.is_finite() && v.im.is_finite()) {
        Ok(())
    } else {
        Err(IntegratorError::NonFiniteDerivative { t })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn exponential_decay_matches_closed_form() {
        let integrator = AdaptiveIntegrator::new(1e-8, 1e-10, 10_000);
        let y0 = [Complex64::new(1.0, 0.0), Complex64::new(0.0, 2.0)];
        let solution = integrator
            .solve(
                |_t, y, out| {
                    for (o, v) in out.iter_mut().zip(y) {
                        *o = -*v;
                    }
                },
                2.0,
                &y0,
            )
            .unwrap();
        let decay = (-2.0f64).exp();
        assert_relative_eq!(solution.y[0].re, decay, max_relative = 1e-6);
        assert_relative_eq!(solution.y[1].im, 2.0 * decay, max_relative = 1e-6);
        assert!(solution.accepted_steps > 1);
    }

    #[test]
    fn rotation_preserves_modulus() {
        let integrator = AdaptiveIntegrator::new(1e-9, 1e-12, 10_000);
        let y0 = [Complex64::new(0.6, 0.8)];
        let solution = integrator
            .solve(
                |_t, y, out| out[0] = Complex64::new(0.0, -3.0) * y[0],
                std::f64::consts::PI,
                &y0,
            )
            .unwrap();
        assert_relative_eq!(solution.y[0].norm(), 1.0, epsilon = 1e-6);
        let expected = y0[0] * Complex64::new(0.0, -3.0 * std::f64::consts::PI).exp();
        assert!((solution.y[0] - expected).norm() < 1e-5);
    }

    #[test]
    fn non_finite_derivative_is_reported() {
        let integrator = AdaptiveIntegrator::new(1e-6, 1e-9, 100);
        let err = integrator
            .solve(
                |_t, _y, out| out.fill(Complex64::new(f64::NAN, 0.0)),
                1.0,
                &[Complex64::new(1.0, 0.0)],
            )
            .unwrap_err();
        assert!(matches!(err, IntegratorError::NonFiniteDerivative { .. }));
    }

    #[test]
    fn tiny_budget_surfaces_step_limit() {
        let integrator = AdaptiveIntegrator::new(1e-12, 1e-14, 2);
        let err = integrator
            .solve(
                |t, y, out| out[0] = y[0] * (50.0 * t).cos() * 40.0,
                10.0,
                &[Complex64::new(1.0, 0.0)],
            )
            .unwrap_err();
        assert!(matches!(err, IntegratorError::StepLimit { limit: 2, .. }));
    }

    #[test]
    fn rejects_degenerate_span() {
        let integrator = AdaptiveIntegrator::new(1e-6, 1e-9, 10);
        let err = integrator
            .solve(|_t, _y, _out| {}, 0.0, &[Complex64::new(1.0, 0.0)])
            .unwrap_err();
        assert!(matches!(err, IntegratorError::InvalidSpan { .. }));
    }
}
