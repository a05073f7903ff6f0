//! Attribute table and snowball zone file readers.
//!
//! Attribute files are whitespace-separated tables: the first line
//! names one or more attribute columns, and line i+1 gives node i's
//! values. `NA` (any case) marks a missing entry. Set-valued columns
//! hold comma-separated non-negative integers, with `none` for the
//! empty set.
//!
//! Zone files are headerless: one non-negative wave number per line,
//! one line per node.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashSet;

use ergonet_core::engine::graph::AttributeSet;

use crate::config::Config;
use crate::errors::FrontendError;

type Column<T> = (String, Vec<Option<T>>);

fn read_table<T, R, F>(
    reader: R,
    file: &str,
    num_nodes: u32,
    parse: F,
) -> Result<Vec<Column<T>>, FrontendError>
where
    R: BufRead,
    F: Fn(&str) -> Result<T, String>,
{
    let mut lines = reader.lines().enumerate();

    let header = loop {
        match lines.next() {
            Some((idx, line)) => {
                let line = line.map_err(|e| FrontendError::io(file, e))?;
                if !line.trim().is_empty() {
                    break (idx + 1, line);
                }
            }
            None => return Err(FrontendError::input(file, 1, "empty attribute file")),
        }
    };
    let names: Vec<String> = header.1.split_whitespace().map(str::to_string).collect();
    let mut columns: Vec<Vec<Option<T>>> = names
        .iter()
        .map(|_| Vec::with_capacity(num_nodes as usize))
        .collect();

    let mut rows = 0u32;
    for (idx, line) in lines {
        let line_no = idx + 1;
        let line = line.map_err(|e| FrontendError::io(file, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != names.len() {
            return Err(FrontendError::input(
                file,
                line_no,
                format!("{} fields for {} columns", fields.len(), names.len()),
            ));
        }
        for (col, raw) in fields.iter().enumerate() {
            let value = if raw.eq_ignore_ascii_case("na") {
                None
            } else {
                Some(parse(raw).map_err(|msg| FrontendError::input(file, line_no, msg))?)
            };
            columns[col].push(value);
        }
        rows += 1;
    }

    if rows != num_nodes {
        return Err(FrontendError::input(
            file,
            1,
            format!("{} data rows for {} nodes", rows, num_nodes),
        ));
    }
    Ok(names.into_iter().zip(columns).collect())
}

fn parse_binary(raw: &str) -> Result<u8, String> {
    match raw {
        "0" => Ok(0),
        "1" => Ok(1),
        _ => Err(format!("binary attribute value must be 0 or 1, got '{}'", raw)),
    }
}

fn parse_categorical(raw: &str) -> Result<u32, String> {
    raw.parse::<u32>()
        .map_err(|e| format!("bad categorical value '{}': {}", raw, e))
}

fn parse_continuous(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|e| format!("bad continuous value '{}': {}", raw, e))
}

fn parse_set(raw: &str) -> Result<FxHashSet<u32>, String> {
    if raw.eq_ignore_ascii_case("none") {
        return Ok(FxHashSet::default());
    }
    raw.split(',')
        .map(|item| {
            item.parse::<u32>()
                .map_err(|e| format!("bad set element '{}': {}", item, e))
        })
        .collect()
}

fn open(path: &Path) -> Result<(BufReader<File>, String), FrontendError> {
    let name = path.display().to_string();
    let file = File::open(path).map_err(|e| FrontendError::io(name.clone(), e))?;
    Ok((BufReader::new(file), name))
}

/// Loads every attribute file named by the configuration into one
/// attribute set covering `num_nodes` nodes.
pub fn load_attributes(config: &Config, num_nodes: u32) -> Result<AttributeSet, FrontendError> {
    let mut attrs = AttributeSet::new(num_nodes);

    if let Some(path) = &config.binattr_file {
        let (reader, name) = open(path)?;
        for (col_name, values) in read_table(reader, &name, num_nodes, parse_binary)? {
            attrs.add_binary(&col_name, values)?;
        }
    }
    if let Some(path) = &config.catattr_file {
        let (reader, name) = open(path)?;
        for (col_name, values) in read_table(reader, &name, num_nodes, parse_categorical)? {
            attrs.add_categorical(&col_name, values)?;
        }
    }
    if let Some(path) = &config.contattr_file {
        let (reader, name) = open(path)?;
        for (col_name, values) in read_table(reader, &name, num_nodes, parse_continuous)? {
            attrs.add_continuous(&col_name, values)?;
        }
    }
    if let Some(path) = &config.setattr_file {
        let (reader, name) = open(path)?;
        for (col_name, values) in read_table(reader, &name, num_nodes, parse_set)? {
            attrs.add_set(&col_name, values)?;
        }
    }
    Ok(attrs)
}

/// Reads a headerless zone file: one wave number per node.
pub fn read_zone_file(path: &Path, num_nodes: u32) -> Result<Vec<u32>, FrontendError> {
    let (reader, name) = open(path)?;
    let mut zones = Vec::with_capacity(num_nodes as usize);
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| FrontendError::io(&*name, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let zone: u32 = trimmed.parse().map_err(|e| {
            FrontendError::input(&*name, line_no, format!("bad zone '{}': {}", trimmed, e))
        })?;
        zones.push(zone);
    }
    if zones.len() != num_nodes as usize {
        return Err(FrontendError::input(
            &*name,
            1,
            format!("{} zones for {} nodes", zones.len(), num_nodes),
        ));
    }
    Ok(zones)
}
