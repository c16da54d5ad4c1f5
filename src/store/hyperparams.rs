//! Hyperparameter store
//!
//! A semicolon-delimited columnar text file: one column per algorithm
//! name, each cell a `key,value` pair. Re-exporting unchanged parameters
//! round-trips byte-for-byte. Missing algorithms or keys on import are
//! fatal; a missing file on export is created.

use crate::error::{AdaptError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A parsed store cell value: int first, then float, then raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl StoreValue {
    fn parse(raw: &str) -> Self {
        if let Ok(v) = raw.parse::<i64>() {
            return StoreValue::Int(v);
        }
        if let Ok(v) = raw.parse::<f64>() {
            return StoreValue::Float(v);
        }
        StoreValue::Text(raw.to_string())
    }
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::Int(v) => write!(f, "{v}"),
            StoreValue::Float(v) => write!(f, "{v}"),
            StoreValue::Text(v) => f.write_str(v),
        }
    }
}

/// In-memory image of a store file: ordered columns of raw cells.
#[derive(Debug, Clone, Default)]
pub struct HyperparameterStore {
    columns: Vec<(String, Vec<String>)>,
}

impl HyperparameterStore {
    /// Parse a store file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AdaptError::Data(format!("cannot read {}: {e}", path.display())))?;
        Ok(Self::parse(&content))
    }

    fn parse(content: &str) -> Self {
        let mut lines = content.lines();
        let header = match lines.next() {
            Some(h) => h,
            None => return Self::default(),
        };
        let names: Vec<String> = header.split(';').map(|s| unquote(s).to_string()).collect();
        let mut columns: Vec<(String, Vec<String>)> =
            names.into_iter().map(|n| (n, Vec::new())).collect();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            for (i, cell) in line.split(';').enumerate() {
                if i >= columns.len() {
                    break;
                }
                let cell = unquote(cell);
                if !cell.is_empty() {
                    columns[i].1.push(cell.to_string());
                }
            }
        }
        Self { columns }
    }

    /// The `key -> value` entries of one algorithm column. `eval_metric`
    /// rows are skipped on import. A missing column or malformed cell is
    /// fatal; no defaults are synthesized.
    pub fn import(&self, algo: &str) -> Result<BTreeMap<String, StoreValue>> {
        let column = self
            .columns
            .iter()
            .find(|(name, _)| name == algo)
            .ok_or_else(|| AdaptError::MissingHyperparameter {
                algo: algo.to_string(),
                key: "<column>".to_string(),
            })?;

        let mut out = BTreeMap::new();
        for cell in &column.1 {
            let (key, value) = cell.split_once(',').ok_or_else(|| {
                AdaptError::Data(format!("malformed store cell '{cell}' for '{algo}'"))
            })?;
            if key == "eval_metric" {
                continue;
            }
            out.insert(key.to_string(), StoreValue::parse(value));
        }
        Ok(out)
    }

    /// Set or replace one algorithm's column.
    pub fn set(&mut self, algo: &str, entries: &BTreeMap<String, StoreValue>) {
        let cells: Vec<String> = entries.iter().map(|(k, v)| format!("{k},{v}")).collect();
        match self.columns.iter_mut().find(|(name, _)| name == algo) {
            Some((_, col)) => *col = cells,
            None => self.columns.push((algo.to_string(), cells)),
        }
    }

    /// Algorithm names present, in column order.
    pub fn algorithms(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Serialize back to the semicolon-delimited format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let names: Vec<&str> = self.columns.iter().map(|(n, _)| n.as_str()).collect();
        out.push_str(&names.join(";"));
        out.push('\n');
        let depth = self.columns.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
        for row in 0..depth {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|(_, c)| match c.get(row) {
                    Some(cell) => format!("\"{cell}\""),
                    None => String::new(),
                })
                .collect();
            out.push_str(&cells.join(";"));
            out.push('\n');
        }
        out
    }

    /// Write the store to disk, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.render())?;
        Ok(())
    }
}

/// Read-modify-write export of one algorithm's parameters. The file is
/// created if absent; other columns are preserved untouched.
pub fn export_hyperparameters(
    path: &Path,
    algo: &str,
    entries: &BTreeMap<String, StoreValue>,
) -> Result<()> {
    let mut store = if path.exists() {
        HyperparameterStore::load(path)?
    } else {
        HyperparameterStore::default()
    };
    store.set(algo, entries);
    store.save(path)
}

fn unquote(cell: &str) -> &str {
    let cell = cell.trim();
    cell.strip_prefix('"')
        .and_then(|c| c.strip_suffix('"'))
        .unwrap_or(cell)
}
