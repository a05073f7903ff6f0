//! Closed-form change-statistic scenarios checked end to end through
//! the public aggregator.

use ergonet_core::engine::stats::{
    calc_change_stats, change_statistic, graph_statistics, Model, StatisticKind, Term,
};
use ergonet_core::engine::twopath::TwoPathBackend;
use ergonet_core::DirectedGraph;

fn graph(n: u32, arcs: &[(u32, u32)], backend: TwoPathBackend) -> DirectedGraph {
    let mut g = DirectedGraph::new(n, backend).unwrap();
    for &(i, j) in arcs {
        g.insert_arc(i, j);
    }
    g
}

fn single(kind: StatisticKind) -> Model {
    Model::new(
        vec![Term {
            kind,
            label: "stat".into(),
        }],
        2.0,
    )
    .unwrap()
}

#[test]
fn reciprocity_deltas_on_small_graphs() {
    // On the three-cycle every absent arc has its reverse present, so
    // any addition closes a mutual dyad.
    let cycle = graph(3, &[(0, 1), (1, 2), (2, 0)], TwoPathBackend::Sparse);
    assert_eq!(
        change_statistic(&cycle, &StatisticKind::Reciprocity, 1, 0, 2.0),
        1.0
    );
    assert_eq!(
        change_statistic(&cycle, &StatisticKind::Reciprocity, 0, 2, 2.0),
        1.0
    );

    // On the two-arc path, 0 -> 2 has no reverse and adds no mutual pair.
    let path = graph(3, &[(0, 1), (1, 2)], TwoPathBackend::Sparse);
    assert_eq!(
        change_statistic(&path, &StatisticKind::Reciprocity, 0, 2, 2.0),
        0.0
    );
    assert_eq!(
        change_statistic(&path, &StatisticKind::Reciprocity, 2, 1, 2.0),
        1.0
    );
}

#[test]
fn alternating_triangle_star_matches_closed_form() {
    // Star 0 -> {1, 2, 3}, lambda = 2: adding 1 -> 2 closes one
    // transitive triangle, worth lambda * (1 - (1 - 1/lambda)^1) = 1.
    let lambda = 2.0;
    for backend in [
        TwoPathBackend::Disabled,
        TwoPathBackend::Dense,
        TwoPathBackend::Sparse,
    ] {
        let g = graph(4, &[(0, 1), (0, 2), (0, 3)], backend);
        let delta = change_statistic(&g, &StatisticKind::AltKTrianglesT, 1, 2, lambda);
        let expected = lambda * (1.0 - (1.0 - 1.0 / lambda).powi(1));
        assert!(
            (delta - expected).abs() < 1e-12,
            "{:?}: {} vs {}",
            backend,
            delta,
            expected
        );
    }
}

#[test]
fn every_structural_kind_agrees_across_backends() {
    let arcs = [
        (0, 1),
        (1, 2),
        (2, 0),
        (0, 3),
        (3, 4),
        (4, 0),
        (2, 4),
        (1, 4),
        (5, 2),
        (3, 5),
        (6, 1),
        (2, 6),
    ];
    let kinds = [
        StatisticKind::Arc,
        StatisticKind::Reciprocity,
        StatisticKind::AltInStars,
        StatisticKind::AltOutStars,
        StatisticKind::In2Stars,
        StatisticKind::Out2Stars,
        StatisticKind::Isolates,
        StatisticKind::Sink,
        StatisticKind::Source,
        StatisticKind::AltKTrianglesT,
        StatisticKind::AltKTrianglesC,
        StatisticKind::AltKTrianglesD,
        StatisticKind::AltKTrianglesU,
        StatisticKind::AltTwoPathsT,
        StatisticKind::AltTwoPathsD,
        StatisticKind::AltTwoPathsU,
    ];

    let reference = graph(8, &arcs, TwoPathBackend::Disabled);
    let dense = graph(8, &arcs, TwoPathBackend::Dense);
    let sparse = graph(8, &arcs, TwoPathBackend::Sparse);

    for i in 0..8 {
        for j in 0..8 {
            if i == j || reference.is_arc(i, j) {
                continue;
            }
            for kind in &kinds {
                let want = change_statistic(&reference, kind, i, j, 2.0);
                let got_dense = change_statistic(&dense, kind, i, j, 2.0);
                let got_sparse = change_statistic(&sparse, kind, i, j, 2.0);
                assert!(
                    (want - got_dense).abs() < 1e-12 && (want - got_sparse).abs() < 1e-12,
                    "{:?} at ({}, {}): {} / {} / {}",
                    kind,
                    i,
                    j,
                    want,
                    got_dense,
                    got_sparse
                );
            }
        }
    }
}

#[test]
fn accumulated_changes_reproduce_absolute_statistics() {
    // Insert arcs one at a time, summing aggregator output; the total
    // must equal the from-scratch statistics of the final graph.
    let arcs = [(0, 1), (1, 0), (1, 2), (2, 3), (3, 1), (0, 2), (2, 0)];
    let model = Model::new(
        vec![
            Term {
                kind: StatisticKind::Arc,
                label: "Arc".into(),
            },
            Term {
                kind: StatisticKind::Reciprocity,
                label: "Reciprocity".into(),
            },
            Term {
                kind: StatisticKind::AltKTrianglesT,
                label: "AT-T".into(),
            },
            Term {
                kind: StatisticKind::AltTwoPathsT,
                label: "A2P-T".into(),
            },
        ],
        2.0,
    )
    .unwrap();
    let theta = vec![0.0; model.len()];
    let mut scratch = vec![0.0; model.len()];
    let mut totals = vec![0.0; model.len()];

    let mut g = DirectedGraph::new(5, TwoPathBackend::Sparse).unwrap();
    for &(i, j) in &arcs {
        calc_change_stats(&g, &model, i, j, false, &theta, &mut scratch);
        for (total, delta) in totals.iter_mut().zip(scratch.iter()) {
            *total += delta;
        }
        g.insert_arc(i, j);
    }

    let fresh = graph_statistics(&g, &model);
    for (k, (total, want)) in totals.iter().zip(fresh.iter()).enumerate() {
        assert!(
            (total - want).abs() < 1e-9,
            "statistic {} accumulated {} vs recounted {}",
            k,
            total,
            want
        );
    }
}
