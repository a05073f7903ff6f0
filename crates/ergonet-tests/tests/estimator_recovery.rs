//! End-to-end estimation check: simulate a graph at a known parameter,
//! then recover it with the two-stage estimator starting from zero.

use ergonet_core::engine::estimator::{estimate, EstimateSettings, NullObserver};
use ergonet_core::engine::rng::chain_rng;
use ergonet_core::engine::stats::{StatisticKind, Term};
use ergonet_core::engine::twopath::TwoPathBackend;
use ergonet_core::{DirectedGraph, Model, Sampler, SamplerKind, SamplerOptions};

#[test]
fn ee_recovers_known_density_parameter() {
    let theta_star = -2.5;
    let model = Model::new(
        vec![Term {
            kind: StatisticKind::Arc,
            label: "Arc".into(),
        }],
        2.0,
    )
    .unwrap();

    // Draw one realization at theta_star with the exact (symmetric
    // proposal) kernel.
    let mut g = DirectedGraph::new(30, TwoPathBackend::Sparse).unwrap();
    let mut sampler = Sampler::new(SamplerKind::Basic, SamplerOptions::default(), 1);
    let mut rng = chain_rng(7001, 0);
    sampler
        .run(&mut g, &model, &[theta_star], 500_000, &mut rng)
        .unwrap();
    let observed_arcs = g.num_arcs();
    assert!(observed_arcs > 20, "draw unexpectedly sparse: {}", observed_arcs);

    // Estimate from scratch on the realized graph.
    let settings = EstimateSettings {
        aca_s: 0.1,
        aca_ee: 1e-2,
        comp_c: 1e-2,
        sampler_steps: 1000,
        s_steps: 20,
        ee_steps: 400,
        ee_inner_steps: 10,
    };
    let mut sampler = Sampler::new(SamplerKind::Basic, SamplerOptions::default(), 1);
    let mut rng = chain_rng(7002, 0);
    let result = estimate(
        &mut g,
        &model,
        &settings,
        &mut sampler,
        &mut rng,
        &mut NullObserver,
    )
    .unwrap();

    // One realization pins theta only to within its own sampling error,
    // roughly 1/sd(arc count) ~ 0.13 here; allow a few standard errors.
    let point = result.theta_tail_mean[0];
    assert!(
        (point - theta_star).abs() < 0.45,
        "tail mean {} too far from {}",
        point,
        theta_star
    );
    assert!(result.theta[0].is_finite());
    assert!(result.acceptance_rate > 0.0 && result.acceptance_rate < 1.0);
}
