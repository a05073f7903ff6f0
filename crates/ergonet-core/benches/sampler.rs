//! Benchmarks for the sampler inner loop and the change-statistic
//! aggregator.
//!
//! Run with `cargo bench --bench sampler`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ergonet_core::engine::rng::chain_rng;
use ergonet_core::engine::sampler::{Sampler, SamplerKind, SamplerOptions};
use ergonet_core::engine::stats::{calc_change_stats, Model, StatisticKind, Term};
use ergonet_core::engine::twopath::TwoPathBackend;
use ergonet_core::DirectedGraph;

/// Deterministic arc generator; an LCG keeps the setup independent of
/// the sampler's own RNG.
fn seeded_graph(n: u32, arcs: u32, backend: TwoPathBackend, seed: u64) -> DirectedGraph {
    let mut g = DirectedGraph::new(n, backend).unwrap();
    let mut state = seed;
    let mut next = |bound: u32| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 33) as u32) % bound
    };
    let mut placed = 0;
    while placed < arcs {
        let i = next(n);
        let j = next(n);
        if i != j && !g.is_arc(i, j) {
            g.insert_arc(i, j);
            placed += 1;
        }
    }
    g
}

fn structural_model() -> Model {
    let kinds = [
        StatisticKind::Arc,
        StatisticKind::Reciprocity,
        StatisticKind::AltInStars,
        StatisticKind::AltOutStars,
        StatisticKind::AltKTrianglesT,
        StatisticKind::AltTwoPathsT,
    ];
    let terms = kinds
        .iter()
        .map(|k| Term {
            kind: k.clone(),
            label: format!("{:?}", k),
        })
        .collect();
    Model::new(terms, 2.0).unwrap()
}

fn bench_tnt_proposals(c: &mut Criterion) {
    let mut group = c.benchmark_group("tnt_proposals");
    let model = structural_model();
    let theta = vec![-2.0, 1.0, 0.5, 0.5, 0.3, -0.1];

    for backend in [TwoPathBackend::Sparse, TwoPathBackend::Dense] {
        let label = format!("{:?}", backend);
        group.bench_with_input(
            BenchmarkId::new("n1000", &label),
            &backend,
            |b, &backend| {
                let mut g = seeded_graph(1000, 5000, backend, 99);
                let mut sampler =
                    Sampler::new(SamplerKind::TieNoTie, SamplerOptions::default(), model.len());
                let mut rng = chain_rng(17, 0);
                b.iter(|| {
                    let run = sampler
                        .run(&mut g, &model, &theta, 1000, &mut rng)
                        .unwrap();
                    black_box(run.accepted)
                });
            },
        );
    }
    group.finish();
}

fn bench_change_stats(c: &mut Criterion) {
    let model = structural_model();
    let theta = vec![-2.0, 1.0, 0.5, 0.5, 0.3, -0.1];
    let g = seeded_graph(1000, 5000, TwoPathBackend::Sparse, 7);
    let mut scratch = vec![0.0; model.len()];

    c.bench_function("calc_change_stats", |b| {
        let mut k = 0u32;
        b.iter(|| {
            // walk dyads deterministically, skipping present arcs
            k = k.wrapping_add(7919);
            let i = k % 1000;
            let j = (k / 1000 + i + 1) % 1000;
            if i == j || g.is_arc(i, j) {
                return;
            }
            black_box(calc_change_stats(
                black_box(&g),
                &model,
                i,
                j,
                false,
                &theta,
                &mut scratch,
            ));
        });
    });
}

criterion_group!(benches, bench_tnt_proposals, bench_change_stats);
criterion_main!(benches);
