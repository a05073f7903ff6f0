//! Load, save, reload: the arc list survives the round trip unchanged.

use ergonet_core::engine::twopath::TwoPathBackend;
use ergonet_frontend::pajek::{load_graph, save_graph};

#[test]
fn pajek_round_trip_is_arc_for_arc_identical() {
    let dir = std::env::temp_dir().join("ergonet-pajek-roundtrip");
    std::fs::create_dir_all(&dir).unwrap();
    let original = dir.join("original.net");
    let resaved = dir.join("resaved.net");

    std::fs::write(
        &original,
        "*vertices 7\n\
         1 \"a\"\n\
         2 \"b\"\n\
         *arcs\n\
         1 2\n\
         2 3\n\
         3 1\n\
         5 6\n\
         7 4\n\
         4 7\n",
    )
    .unwrap();

    let first = load_graph(&original, TwoPathBackend::Sparse).unwrap();
    save_graph(&first, &resaved).unwrap();
    let second = load_graph(&resaved, TwoPathBackend::Sparse).unwrap();

    assert_eq!(first.num_nodes(), second.num_nodes());
    assert_eq!(
        first.arcs().collect::<Vec<_>>(),
        second.arcs().collect::<Vec<_>>()
    );

    // And the resave of the reload is byte-identical.
    let resaved_again = dir.join("resaved2.net");
    save_graph(&second, &resaved_again).unwrap();
    assert_eq!(
        std::fs::read(&resaved).unwrap(),
        std::fs::read(&resaved_again).unwrap()
    );
}
