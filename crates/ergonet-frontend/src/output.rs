//! Result writers: theta and dzA trajectories, simulation statistics,
//! and simulated networks.
//!
//! Trajectory files are plain whitespace-separated text, one row per
//! outer iteration, named `<prefix>_<rank>.txt` so that independent
//! chains never share a file. Write failures surface as execution
//! errors and abort the run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use ergonet_core::engine::estimator::StepObserver;
use ergonet_core::engine::simulate::SampleObserver;
use ergonet_core::{DirectedGraph, ExecError};

use crate::errors::FrontendError;
use crate::pajek::write_pajek;

fn to_exec(err: std::io::Error, what: &str) -> ExecError {
    ExecError::Execution(format!("writing {}: {}", what, err))
}

fn write_row<W: Write>(
    writer: &mut W,
    step: u64,
    values: &[f64],
    what: &str,
) -> Result<(), ExecError> {
    write!(writer, "{}", step).map_err(|e| to_exec(e, what))?;
    for v in values {
        write!(writer, " {}", v).map_err(|e| to_exec(e, what))?;
    }
    writeln!(writer).map_err(|e| to_exec(e, what))
}

fn create_with_header(
    prefix: &str,
    rank: u32,
    labels: &[&str],
) -> Result<(BufWriter<File>, String), FrontendError> {
    let path = format!("{}_{}.txt", prefix, rank);
    let file = File::create(&path).map_err(|e| FrontendError::io(path.clone(), e))?;
    let mut writer = BufWriter::new(file);
    write!(writer, "t").map_err(|e| FrontendError::io(path.clone(), e))?;
    for label in labels {
        write!(writer, " {}", label).map_err(|e| FrontendError::io(path.clone(), e))?;
    }
    writeln!(writer).map_err(|e| FrontendError::io(path.clone(), e))?;
    Ok((writer, path))
}

/// Streams theta and dzA rows for one estimation chain.
pub struct TrajectoryWriter {
    theta: BufWriter<File>,
    theta_path: String,
    dz_a: BufWriter<File>,
    dz_a_path: String,
}

impl TrajectoryWriter {
    /// Opens `<theta_prefix>_<rank>.txt` and `<dza_prefix>_<rank>.txt`
    /// and writes their header rows.
    pub fn create(
        theta_prefix: &str,
        dza_prefix: &str,
        rank: u32,
        labels: &[&str],
    ) -> Result<Self, FrontendError> {
        let (theta, theta_path) = create_with_header(theta_prefix, rank, labels)?;
        let (dz_a, dz_a_path) = create_with_header(dza_prefix, rank, labels)?;
        Ok(Self {
            theta,
            theta_path,
            dz_a,
            dz_a_path,
        })
    }

    /// Flushes both files; call once after the estimator returns.
    pub fn finish(mut self) -> Result<(), FrontendError> {
        self.theta
            .flush()
            .map_err(|e| FrontendError::io(self.theta_path.clone(), e))?;
        self.dz_a
            .flush()
            .map_err(|e| FrontendError::io(self.dz_a_path.clone(), e))?;
        Ok(())
    }
}

impl StepObserver for TrajectoryWriter {
    fn on_outer_step(&mut self, step: u32, theta: &[f64], dz_a: &[f64]) -> Result<(), ExecError> {
        write_row(&mut self.theta, step as u64, theta, &self.theta_path)?;
        write_row(&mut self.dz_a, step as u64, dz_a, &self.dz_a_path)
    }
}

/// Streams one statistics row per simulation sample, optionally
/// persisting each sampled network as a Pajek file.
pub struct SimulationWriter {
    stats: Option<(BufWriter<File>, String)>,
    net_prefix: Option<String>,
}

impl SimulationWriter {
    pub fn create(
        stats_file: Option<&PathBuf>,
        net_prefix: Option<&str>,
        labels: &[&str],
    ) -> Result<Self, FrontendError> {
        let stats = match stats_file {
            Some(path) => {
                let name = path.display().to_string();
                let file = File::create(path).map_err(|e| FrontendError::io(name.clone(), e))?;
                let mut writer = BufWriter::new(file);
                write!(writer, "t").map_err(|e| FrontendError::io(name.clone(), e))?;
                for label in labels {
                    write!(writer, " {}", label).map_err(|e| FrontendError::io(name.clone(), e))?;
                }
                writeln!(writer).map_err(|e| FrontendError::io(name.clone(), e))?;
                Some((writer, name))
            }
            None => None,
        };
        Ok(Self {
            stats,
            net_prefix: net_prefix.map(str::to_string),
        })
    }

    pub fn finish(mut self) -> Result<(), FrontendError> {
        if let Some((writer, path)) = self.stats.as_mut() {
            writer
                .flush()
                .map_err(|e| FrontendError::io(path.clone(), e))?;
        }
        Ok(())
    }
}

impl SampleObserver for SimulationWriter {
    fn on_sample(
        &mut self,
        iteration: u64,
        stats: &[f64],
        g: &DirectedGraph,
    ) -> Result<(), ExecError> {
        if let Some((writer, path)) = self.stats.as_mut() {
            write_row(writer, iteration, stats, path)?;
        }
        if let Some(prefix) = &self.net_prefix {
            let path = format!("{}_{}.net", prefix, iteration);
            let file = File::create(&path).map_err(|e| to_exec(e, &path))?;
            let mut writer = BufWriter::new(file);
            write_pajek(g, &mut writer).map_err(|e| to_exec(e, &path))?;
            writer.flush().map_err(|e| to_exec(e, &path))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ergonet_core::engine::twopath::TwoPathBackend;

    #[test]
    fn trajectory_rows_are_whitespace_separated() {
        let dir = std::env::temp_dir().join("ergonet-output-test");
        std::fs::create_dir_all(&dir).unwrap();
        let theta_prefix = dir.join("theta").display().to_string();
        let dza_prefix = dir.join("dzA").display().to_string();

        let mut writer =
            TrajectoryWriter::create(&theta_prefix, &dza_prefix, 3, &["Arc", "Reciprocity"])
                .unwrap();
        writer.on_outer_step(1, &[-1.5, 0.25], &[4.0, -2.0]).unwrap();
        writer.on_outer_step(2, &[-1.25, 0.5], &[1.0, 0.0]).unwrap();
        writer.finish().unwrap();

        let text = std::fs::read_to_string(format!("{}_3.txt", theta_prefix)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "t Arc Reciprocity");
        assert_eq!(lines[1], "1 -1.5 0.25");
        assert_eq!(lines[2], "2 -1.25 0.5");

        let text = std::fs::read_to_string(format!("{}_3.txt", dza_prefix)).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("1 4 -2"));
    }

    #[test]
    fn simulation_writer_persists_networks() {
        let dir = std::env::temp_dir().join("ergonet-simnet-test");
        std::fs::create_dir_all(&dir).unwrap();
        let stats_path = dir.join("stats.txt");
        let net_prefix = dir.join("sim").display().to_string();

        let mut g = DirectedGraph::new(3, TwoPathBackend::Sparse).unwrap();
        g.insert_arc(0, 1);

        let mut writer =
            SimulationWriter::create(Some(&stats_path), Some(&net_prefix), &["Arc"]).unwrap();
        writer.on_sample(1000, &[1.0], &g).unwrap();
        writer.finish().unwrap();

        let text = std::fs::read_to_string(&stats_path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let net = std::fs::read_to_string(format!("{}_1000.net", net_prefix)).unwrap();
        assert!(net.starts_with("*vertices 3"));
        assert!(net.contains("1 2"));
    }
}
