//! Dataset import
//!
//! CSV datasets carry one feature per column plus a binary `y` label
//! column and an `index` column that is dropped on load. Ratio-derived
//! columns are filtered by name before conversion to a dense matrix.

use crate::error::{AdaptError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::path::Path;

/// Column-name fragments excluded by feature selection.
const DROPPED_FRAGMENTS: [&str; 3] = ["rto", "ecart", "elast"];

/// Floor used both to fill NaNs and to replace exact zeros, so later
/// element-wise divisions stay finite.
const VALUE_FLOOR: f64 = 1e-5;

/// Load a dataset CSV into a feature matrix and label vector.
///
/// Drops the `index` column, optionally applies name-based feature
/// selection, splits off the `y` column, and floors NaNs/zeros.
pub fn import_dataset(path: &Path, select_features: bool) -> Result<(Array2<f64>, Array1<f64>)> {
    let file = std::fs::File::open(path)
        .map_err(|e| AdaptError::Data(format!("cannot open {}: {e}", path.display())))?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| AdaptError::Data(format!("cannot parse {}: {e}", path.display())))?;

    let mut df = df;
    if df.get_column_names().iter().any(|c| c.as_str() == "index") {
        df = df
            .drop("index")
            .map_err(|e| AdaptError::Data(e.to_string()))?;
    }
    if select_features {
        df = drop_ratio_columns(df)?;
    }

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    if !names.iter().any(|c| c == "y") {
        return Err(AdaptError::Data(format!(
            "{} has no 'y' label column",
            path.display()
        )));
    }

    let y = column_to_f64(&df, "y")?;
    let feature_names: Vec<&str> = names.iter().filter(|c| *c != "y").map(|s| s.as_str()).collect();

    let n_rows = df.height();
    let n_cols = feature_names.len();
    let mut x = Array2::<f64>::zeros((n_rows, n_cols));
    for (j, name) in feature_names.iter().enumerate() {
        let col = column_to_f64(&df, name)?;
        for (i, v) in col.iter().enumerate() {
            x[[i, j]] = *v;
        }
    }

    let x = set_nan_floor(x);
    let y = Array1::from_vec(y);
    Ok((x, y))
}

/// Replace NaNs with the value floor and exact zeros with the same floor.
/// Applied at import time so every downstream matrix is NaN-free.
pub fn set_nan_floor(mut x: Array2<f64>) -> Array2<f64> {
    x.mapv_inplace(|v| {
        if v.is_nan() || v == 0.0 {
            VALUE_FLOOR
        } else {
            v
        }
    });
    x
}

fn drop_ratio_columns(df: DataFrame) -> Result<DataFrame> {
    let to_drop: Vec<String> = df
        .get_column_names()
        .iter()
        .filter(|c| DROPPED_FRAGMENTS.iter().any(|f| c.contains(f)))
        .map(|s| s.to_string())
        .collect();
    let mut df = df;
    for name in to_drop {
        df = df
            .drop(&name)
            .map_err(|e| AdaptError::Data(e.to_string()))?;
    }
    Ok(df)
}

fn column_to_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let col = df
        .column(name)
        .map_err(|_| AdaptError::Data(format!("column '{name}' not found")))?;
    let series = col.as_materialized_series();
    let ca = series
        .cast(&DataType::Float64)
        .map_err(|e| AdaptError::Data(format!("column '{name}' is not numeric: {e}")))?;
    let ca = ca
        .f64()
        .map_err(|e| AdaptError::Data(e.to_string()))?
        .clone();
    Ok(ca
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_import_drops_index_and_splits_label() {
        let f = write_csv("index,f1,f2,y\n0,1.0,2.0,1\n1,3.0,4.0,0\n");
        let (x, y) = import_dataset(f.path(), true).unwrap();
        assert_eq!(x.dim(), (2, 2));
        assert_eq!(y.to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_feature_selection_drops_ratio_columns() {
        let f = write_csv("index,f1,rto_a,ecart_b,elast_c,y\n0,1.0,9.0,9.0,9.0,1\n1,2.0,9.0,9.0,9.0,0\n");
        let (x, _) = import_dataset(f.path(), true).unwrap();
        assert_eq!(x.ncols(), 1);
        let (x_all, _) = import_dataset(f.path(), false).unwrap();
        assert_eq!(x_all.ncols(), 4);
    }

    #[test]
    fn test_nan_and_zero_floor() {
        let f = write_csv("index,f1,f2,y\n0,,0.0,1\n1,3.0,4.0,0\n");
        let (x, _) = import_dataset(f.path(), true).unwrap();
        assert_eq!(x[[0, 0]], 1e-5);
        assert_eq!(x[[0, 1]], 1e-5);
        assert_eq!(x[[1, 0]], 3.0);
    }

    #[test]
    fn test_missing_label_column_is_fatal() {
        let f = write_csv("index,f1,f2\n0,1.0,2.0\n");
        assert!(import_dataset(f.path(), true).is_err());
    }
}
