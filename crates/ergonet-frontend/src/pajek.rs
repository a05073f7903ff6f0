//! Pajek arc-list reading and writing.
//!
//! The accepted subset is a `*vertices N` header, optional vertex label
//! lines, a `*arcs` marker, then one `tail head` pair per line with
//! 1-based node ids. Ids are renumbered to 0..N-1 on load. Self loops,
//! duplicate arcs, and out-of-range ids are input errors reported with
//! their line number.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rustc_hash::FxHashSet;

use ergonet_core::engine::twopath::TwoPathBackend;
use ergonet_core::DirectedGraph;

use crate::errors::FrontendError;

/// Parses Pajek text into a node count and 0-based arc list.
pub fn parse_pajek<R: BufRead>(reader: R, file: &str) -> Result<(u32, Vec<(u32, u32)>), FrontendError> {
    let mut num_nodes: Option<u32> = None;
    let mut in_arcs = false;
    let mut arcs: Vec<(u32, u32)> = Vec::new();
    let mut seen: FxHashSet<u64> = FxHashSet::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| FrontendError::io(file, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_ascii_lowercase();

        if lower.starts_with("*vertices") {
            let count = trimmed
                .split_whitespace()
                .nth(1)
                .ok_or_else(|| FrontendError::input(file, line_no, "*vertices needs a count"))?;
            let count: u32 = count.parse().map_err(|e| {
                FrontendError::input(file, line_no, format!("bad vertex count: {}", e))
            })?;
            num_nodes = Some(count);
            continue;
        }
        if lower.starts_with("*arcs") {
            if num_nodes.is_none() {
                return Err(FrontendError::input(
                    file,
                    line_no,
                    "*arcs before *vertices",
                ));
            }
            in_arcs = true;
            continue;
        }
        if lower.starts_with("*edges") {
            return Err(FrontendError::input(
                file,
                line_no,
                "*edges marks an undirected network; a directed arc list needs *arcs",
            ));
        }
        if lower.starts_with('*') {
            return Err(FrontendError::input(
                file,
                line_no,
                format!("unrecognized section marker '{}'", trimmed),
            ));
        }

        if !in_arcs {
            // vertex label line; ids and labels are not used
            continue;
        }

        let n = num_nodes.expect("checked when *arcs was seen");
        let mut fields = trimmed.split_whitespace();
        let (tail, head) = match (fields.next(), fields.next()) {
            (Some(t), Some(h)) => (t, h),
            _ => {
                return Err(FrontendError::input(
                    file,
                    line_no,
                    "arc line needs two node ids",
                ))
            }
        };
        let parse_id = |raw: &str| -> Result<u32, FrontendError> {
            let id: u32 = raw.parse().map_err(|e| {
                FrontendError::input(file, line_no, format!("bad node id '{}': {}", raw, e))
            })?;
            if id < 1 || id > n {
                return Err(FrontendError::input(
                    file,
                    line_no,
                    format!("node id {} outside 1..={}", id, n),
                ));
            }
            Ok(id - 1)
        };
        let (tail, head) = (parse_id(tail)?, parse_id(head)?);
        if tail == head {
            return Err(FrontendError::input(
                file,
                line_no,
                format!("self loop on node {}", tail + 1),
            ));
        }
        if !seen.insert(((tail as u64) << 32) | head as u64) {
            return Err(FrontendError::input(
                file,
                line_no,
                format!("duplicate arc {} -> {}", tail + 1, head + 1),
            ));
        }
        arcs.push((tail, head));
    }

    match num_nodes {
        Some(n) => Ok((n, arcs)),
        None => Err(FrontendError::input(file, 1, "missing *vertices header")),
    }
}

/// Loads a directed graph from a Pajek file, rejecting duplicate arcs.
pub fn load_graph(path: &Path, backend: TwoPathBackend) -> Result<DirectedGraph, FrontendError> {
    let file = File::open(path).map_err(|e| FrontendError::io(path.display().to_string(), e))?;
    let name = path.display().to_string();
    let (num_nodes, arcs) = parse_pajek(BufReader::new(file), &name)?;

    let mut g = DirectedGraph::new(num_nodes, backend)?;
    g.reserve_arcs(arcs.len());
    for (tail, head) in arcs {
        g.insert_arc(tail, head);
    }
    Ok(g)
}

/// Writes the graph in the same Pajek subset that [`parse_pajek`] reads.
pub fn write_pajek<W: Write>(g: &DirectedGraph, writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "*vertices {}", g.num_nodes())?;
    writeln!(writer, "*arcs")?;
    for arc in g.arcs() {
        writeln!(writer, "{} {}", arc.tail + 1, arc.head + 1)?;
    }
    Ok(())
}

/// Writes the graph to a new file at `path`.
pub fn save_graph(g: &DirectedGraph, path: &Path) -> Result<(), FrontendError> {
    let file = File::create(path).map_err(|e| FrontendError::io(path.display().to_string(), e))?;
    let mut writer = BufWriter::new(file);
    write_pajek(g, &mut writer).map_err(|e| FrontendError::io(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_header_labels_and_arcs() {
        let text = "*Vertices 4\n1 \"alpha\"\n2 \"beta\"\n*Arcs\n1 2\n2 3\n4 1\n";
        let (n, arcs) = parse_pajek(Cursor::new(text), "test.net").unwrap();
        assert_eq!(n, 4);
        assert_eq!(arcs, vec![(0, 1), (1, 2), (3, 0)]);
    }

    #[test]
    fn rejects_out_of_range_and_self_loops() {
        let text = "*vertices 3\n*arcs\n1 4\n";
        let err = parse_pajek(Cursor::new(text), "test.net").unwrap_err();
        assert!(err.to_string().contains("outside"));

        let text = "*vertices 3\n*arcs\n2 2\n";
        let err = parse_pajek(Cursor::new(text), "test.net").unwrap_err();
        assert!(err.to_string().contains("self loop"));
    }

    #[test]
    fn rejects_edges_sections_and_missing_header() {
        let text = "*vertices 3\n*edges\n1 2\n";
        assert!(parse_pajek(Cursor::new(text), "t").is_err());

        let text = "1 2\n";
        assert!(parse_pajek(Cursor::new(text), "t").is_err());
    }

    #[test]
    fn write_then_parse_is_identity() {
        let mut g = DirectedGraph::new(5, TwoPathBackend::Sparse).unwrap();
        for &(i, j) in &[(0, 1), (1, 2), (2, 0), (4, 3)] {
            g.insert_arc(i, j);
        }
        let mut buf = Vec::new();
        write_pajek(&g, &mut buf).unwrap();
        let (n, arcs) = parse_pajek(Cursor::new(buf), "roundtrip.net").unwrap();
        assert_eq!(n, 5);
        assert_eq!(arcs, vec![(0, 1), (1, 2), (2, 0), (4, 3)]);
    }
}
