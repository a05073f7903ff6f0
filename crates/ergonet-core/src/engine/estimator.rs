//! Two-stage equilibrium expectation estimator.
//!
//! The estimator drives the moment condition E[s(G)] = s(G_observed).
//! The chain starts at the observed graph and dzA tracks the running
//! deviation s(G_current) - s(G_observed), maintained incrementally as
//! the signed sum of accepted change statistics over every sampler call
//! since the start of the run. That accumulation is what anchors the
//! estimate: whenever the chain drifts away from the observed
//! statistics, dzA grows and the updates push theta back until the
//! drift reverses. It runs in two stages:
//!
//! - **Algorithm S** walks theta with fixed-magnitude signed steps
//!   (`theta_k <- theta_k - ACA_S * sign(dzA_k)`), which drags each
//!   component into the region where dzA changes sign, while learning a
//!   per-component scale D_k from the running mean of |dzA_k|. The step
//!   is deliberately not scaled by D_k: the fixed magnitude is what
//!   covers ground fast enough to keep the chain pinned near the
//!   observed graph. Sparser networks get proportionally more
//!   scale-finding work through a density adjustment of the outer
//!   iteration count.
//! - **Algorithm EE** refines theta with the variance-controlled update
//!   `theta_k <- theta_k - ACA_EE * D_k * shrink_k * dzA_k` applied
//!   after every inner sampler call. When the coefficient of variation
//!   of a component's recent trajectory exceeds `comp_c`, its step
//!   shrinks proportionally; otherwise the shrink factor relaxes back
//!   toward one.
//!
//! As theta approaches the estimate, dzA oscillates about zero with a
//! magnitude set by the sampler's mixing, so the trajectory tail, not
//! the last iterate, is the natural point estimate.
//!
//! One row of theta and accumulated dzA per outer iteration is pushed
//! through a [`StepObserver`]; file formats live with the I/O layer.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::engine::errors::ExecError;
use crate::engine::graph::DirectedGraph;
use crate::engine::rng::ChainRng;
use crate::engine::sampler::Sampler;
use crate::engine::stats::Model;

/// Floor added to the mean |dzA| when inverting it into a scale.
const SCALE_EPSILON: f64 = 1e-10;

/// Outer steps of theta history used for the variance control.
const VARIANCE_WINDOW: usize = 100;

/// Minimum history before the variance control activates.
const VARIANCE_MIN_STEPS: usize = 10;

/// Lower bound for the per-component shrink factor.
const SHRINK_FLOOR: f64 = 1e-3;

/// Per-outer-step recovery of the shrink factor toward one.
const SHRINK_RECOVERY: f64 = 1.01;

/// Cap on the density adjustment of Algorithm S.
const DENSITY_FACTOR_MAX: u32 = 100;

/// Hyperparameters of the two stages.
#[derive(Debug, Clone)]
pub struct EstimateSettings {
    /// Step multiplier for Algorithm S.
    pub aca_s: f64,
    /// Step multiplier for Algorithm EE.
    pub aca_ee: f64,
    /// Coefficient-of-variation bound for the EE variance control.
    pub comp_c: f64,
    /// Proposals per sampler call.
    pub sampler_steps: u64,
    /// Outer iterations of Algorithm S, before density adjustment.
    pub s_steps: u32,
    /// Outer iterations of Algorithm EE.
    pub ee_steps: u32,
    /// Sampler calls per EE outer iteration.
    pub ee_inner_steps: u32,
}

impl Default for EstimateSettings {
    fn default() -> Self {
        Self {
            aca_s: 0.1,
            aca_ee: 1e-4,
            comp_c: 1e-2,
            sampler_steps: 1000,
            s_steps: 100,
            ee_steps: 500,
            ee_inner_steps: 100,
        }
    }
}

/// Receives one row per outer iteration, across both stages.
pub trait StepObserver {
    fn on_outer_step(&mut self, step: u32, theta: &[f64], dz_a: &[f64]) -> Result<(), ExecError>;
}

/// Discards every row.
pub struct NullObserver;

impl StepObserver for NullObserver {
    fn on_outer_step(&mut self, _: u32, _: &[f64], _: &[f64]) -> Result<(), ExecError> {
        Ok(())
    }
}

/// Outcome of one estimation chain.
#[derive(Debug, Clone)]
pub struct EstimationResult {
    /// Final theta iterate.
    pub theta: Vec<f64>,
    /// Mean theta over the last tenth of the EE outer iterations.
    pub theta_tail_mean: Vec<f64>,
    /// Per-component scales found by Algorithm S.
    pub scale: Vec<f64>,
    /// Mean acceptance rate over the EE stage.
    pub acceptance_rate: f64,
    /// Final psi when the improved-fixed-density kernel was used.
    pub psi: Option<f64>,
}

/// Sign with zero mapped to zero, unlike `f64::signum`.
#[inline]
fn sgn(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Outer-iteration multiplier for Algorithm S, monotone in sparsity.
fn density_adjustment(g: &DirectedGraph) -> u32 {
    let density = g.density();
    if density <= 0.0 {
        return DENSITY_FACTOR_MAX;
    }
    let factor = (1.0 / density).sqrt().ceil();
    (factor as u32).clamp(1, DENSITY_FACTOR_MAX)
}

fn ensure_finite(theta: &[f64], stage: &str) -> Result<(), ExecError> {
    for (k, t) in theta.iter().enumerate() {
        if !t.is_finite() {
            return Err(ExecError::Numerical(format!(
                "parameter {} became non-finite during {}",
                k, stage
            )));
        }
    }
    Ok(())
}

/// Runs Algorithm S followed by Algorithm EE on one chain.
///
/// The graph is borrowed mutably for the whole call and holds the final
/// chain state afterwards. Theta starts at zero.
pub fn estimate(
    g: &mut DirectedGraph,
    model: &Model,
    settings: &EstimateSettings,
    sampler: &mut Sampler,
    rng: &mut ChainRng,
    observer: &mut dyn StepObserver,
) -> Result<EstimationResult, ExecError> {
    let p = model.len();
    let mut theta = vec![0.0; p];
    let mut dz_a = vec![0.0; p];
    let mut scale = vec![1.0; p];
    let mut abs_sum = vec![0.0; p];

    // ---- Algorithm S: scale finding ---------------------------------
    let factor = density_adjustment(g);
    let s_total = settings.s_steps.saturating_mul(factor);
    info!(
        outer_steps = s_total,
        density_factor = factor,
        statistics = p,
        "algorithm S started"
    );

    let mut step = 0u32;
    for t in 1..=s_total {
        let run = sampler.run(g, model, &theta, settings.sampler_steps, rng)?;
        for k in 0..p {
            // dz_a carries s(G_current) - s(G_observed) across the
            // whole run; each call contributes its accepted changes.
            dz_a[k] += sampler.add_stats()[k] + sampler.del_stats()[k];
            abs_sum[k] += dz_a[k].abs();
            scale[k] = 1.0 / (abs_sum[k] / t as f64 + SCALE_EPSILON);
            theta[k] -= settings.aca_s * sgn(dz_a[k]);
        }
        ensure_finite(&theta, "algorithm S")?;
        step += 1;
        observer.on_outer_step(step, &theta, &dz_a)?;
        debug!(step, acceptance = run.acceptance_rate, "S outer step");
    }

    // ---- Algorithm EE: refinement with variance control -------------
    info!(
        outer_steps = settings.ee_steps,
        inner_steps = settings.ee_inner_steps,
        "algorithm EE started"
    );

    let mut shrink = vec![1.0; p];
    let mut window: VecDeque<Vec<f64>> = VecDeque::with_capacity(VARIANCE_WINDOW);
    let tail_from = settings.ee_steps - settings.ee_steps / 10;
    let mut tail_sum = vec![0.0; p];
    let mut tail_count = 0u32;
    let mut acceptance_sum = 0.0;
    let mut acceptance_runs = 0u64;

    for outer in 1..=settings.ee_steps {
        for _ in 0..settings.ee_inner_steps {
            let run = sampler.run(g, model, &theta, settings.sampler_steps, rng)?;
            for k in 0..p {
                dz_a[k] += sampler.add_stats()[k] + sampler.del_stats()[k];
                theta[k] -= settings.aca_ee * scale[k] * shrink[k] * dz_a[k];
            }
            acceptance_sum += run.acceptance_rate;
            acceptance_runs += 1;
        }
        ensure_finite(&theta, "algorithm EE")?;

        if window.len() == VARIANCE_WINDOW {
            window.pop_front();
        }
        window.push_back(theta.clone());
        if window.len() >= VARIANCE_MIN_STEPS {
            apply_variance_control(&window, settings.comp_c, &mut shrink);
        }

        if outer > tail_from {
            for k in 0..p {
                tail_sum[k] += theta[k];
            }
            tail_count += 1;
        }

        step += 1;
        observer.on_outer_step(step, &theta, &dz_a)?;
        if outer % 100 == 0 {
            debug!(outer, "EE outer step");
        }
    }

    if tail_count == 0 {
        // Degenerate run lengths: fall back to the final iterate.
        tail_sum.copy_from_slice(&theta);
        tail_count = 1;
    }
    let theta_tail_mean: Vec<f64> = tail_sum.iter().map(|s| s / tail_count as f64).collect();

    info!(
        acceptance = acceptance_sum / acceptance_runs.max(1) as f64,
        "estimation finished"
    );

    Ok(EstimationResult {
        theta,
        theta_tail_mean,
        scale,
        acceptance_rate: acceptance_sum / acceptance_runs.max(1) as f64,
        psi: sampler.psi(),
    })
}

/// Shrinks the step of any component whose recent coefficient of
/// variation exceeds `comp_c`, and relaxes the others back toward one.
fn apply_variance_control(window: &VecDeque<Vec<f64>>, comp_c: f64, shrink: &mut [f64]) {
    let steps = window.len() as f64;
    for k in 0..shrink.len() {
        let mean = window.iter().map(|row| row[k]).sum::<f64>() / steps;
        let var = window
            .iter()
            .map(|row| {
                let d = row[k] - mean;
                d * d
            })
            .sum::<f64>()
            / steps;
        let sd = var.sqrt();
        if mean.abs() < f64::EPSILON {
            continue;
        }
        let ratio = (sd / mean).abs();
        if ratio > comp_c {
            shrink[k] = (shrink[k] * comp_c / ratio).max(SHRINK_FLOOR);
        } else {
            shrink[k] = (shrink[k] * SHRINK_RECOVERY).min(1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rng::chain_rng;
    use crate::engine::sampler::{SamplerKind, SamplerOptions};
    use crate::engine::stats::{StatisticKind, Term};
    use crate::engine::twopath::TwoPathBackend;

    fn arc_model() -> Model {
        Model::new(
            vec![Term {
                kind: StatisticKind::Arc,
                label: "Arc".into(),
            }],
            2.0,
        )
        .unwrap()
    }

    #[test]
    fn sgn_maps_zero_to_zero() {
        assert_eq!(sgn(3.5), 1.0);
        assert_eq!(sgn(-0.1), -1.0);
        assert_eq!(sgn(0.0), 0.0);
    }

    #[test]
    fn density_adjustment_grows_with_sparsity() {
        let mut dense = DirectedGraph::new(4, TwoPathBackend::Sparse).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                if i != j {
                    dense.insert_arc(i, j);
                }
            }
        }
        assert_eq!(density_adjustment(&dense), 1);

        let mut sparse = DirectedGraph::new(100, TwoPathBackend::Sparse).unwrap();
        sparse.insert_arc(0, 1);
        assert!(density_adjustment(&sparse) > 10);

        let empty = DirectedGraph::new(10, TwoPathBackend::Sparse).unwrap();
        assert_eq!(density_adjustment(&empty), DENSITY_FACTOR_MAX);
    }

    #[test]
    fn observer_sees_every_outer_step() {
        struct Counter {
            rows: u32,
            last_step: u32,
        }
        impl StepObserver for Counter {
            fn on_outer_step(
                &mut self,
                step: u32,
                theta: &[f64],
                dz_a: &[f64],
            ) -> Result<(), ExecError> {
                assert_eq!(theta.len(), 1);
                assert_eq!(dz_a.len(), 1);
                self.rows += 1;
                self.last_step = step;
                Ok(())
            }
        }

        let mut g = DirectedGraph::new(12, TwoPathBackend::Sparse).unwrap();
        for k in 0..24u32 {
            let (i, j) = (k % 12, (k * 5 + 1) % 12);
            if i != j && !g.is_arc(i, j) {
                g.insert_arc(i, j);
            }
        }
        let model = arc_model();
        let settings = EstimateSettings {
            sampler_steps: 50,
            s_steps: 3,
            ee_steps: 7,
            ee_inner_steps: 2,
            ..Default::default()
        };
        let mut sampler = Sampler::new(SamplerKind::TieNoTie, SamplerOptions::default(), 1);
        let mut rng = chain_rng(11, 0);
        let mut counter = Counter {
            rows: 0,
            last_step: 0,
        };
        let factor = density_adjustment(&g);
        estimate(&mut g, &model, &settings, &mut sampler, &mut rng, &mut counter).unwrap();
        assert_eq!(counter.rows, 3 * factor + 7);
        assert_eq!(counter.last_step, counter.rows);
    }

    #[test]
    fn estimate_moves_density_parameter_downward_for_sparse_graph() {
        // A sparse observed graph under a zero-parameter model gains
        // arcs, so dzA for the density term is positive and theta must
        // head negative.
        let mut g = DirectedGraph::new(15, TwoPathBackend::Sparse).unwrap();
        for k in 0..10u32 {
            let (i, j) = (k % 15, (k * 4 + 2) % 15);
            if i != j && !g.is_arc(i, j) {
                g.insert_arc(i, j);
            }
        }
        let model = arc_model();
        let settings = EstimateSettings {
            sampler_steps: 200,
            s_steps: 5,
            ee_steps: 40,
            ee_inner_steps: 5,
            aca_ee: 1e-2,
            ..Default::default()
        };
        let mut sampler = Sampler::new(SamplerKind::TieNoTie, SamplerOptions::default(), 1);
        let mut rng = chain_rng(12, 0);
        let result = estimate(
            &mut g,
            &model,
            &settings,
            &mut sampler,
            &mut rng,
            &mut NullObserver,
        )
        .unwrap();
        assert!(result.theta_tail_mean[0] < 0.0);
        assert!(result.acceptance_rate > 0.0);
        assert_eq!(result.scale.len(), 1);
    }

    #[test]
    fn variance_control_shrinks_noisy_components() {
        let mut window = VecDeque::new();
        // Component 0 stable, component 1 wildly oscillating.
        for t in 0..20 {
            window.push_back(vec![5.0 + 1e-6 * t as f64, if t % 2 == 0 { 4.0 } else { 1.0 }]);
        }
        let mut shrink = vec![1.0, 1.0];
        apply_variance_control(&window, 0.01, &mut shrink);
        assert!((shrink[0] - 1.0).abs() < 1e-9);
        assert!(shrink[1] < 1.0);
        assert!(shrink[1] >= SHRINK_FLOOR);
    }
}
