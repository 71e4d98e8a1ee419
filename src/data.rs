//! Data loading and cleaning of the raw churn export using Polars

use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::error::ChurnError;
use crate::features::{FeatureKind, FEATURE_CONTRACT};
use crate::preprocessing::{self, ColumnFrame, ColumnValues, UNKNOWN_CATEGORY};

/// Identifier, geographic and post-hoc churn-explanation columns. Columns
/// absent from a dataset are skipped.
pub const DROP_COLUMNS: [&str; 13] = [
    "CustomerID",
    "Count",
    "Country",
    "State",
    "City",
    "Zip Code",
    "Latitude",
    "Longitude",
    "Lat Long",
    "Churn Label",
    "Churn Reason",
    "Churn Score",
    "CLTV",
];

/// Numeric column that arrives as text with blank cells for brand-new customers.
pub const TOTAL_CHARGES: &str = "Total Charges";

/// Load a raw CSV export and clean it into a fully populated feature table.
///
/// # Arguments
/// * `path` - Path to the CSV file (first row = headers)
///
/// # Returns
/// * `DataFrame` with dropped columns removed, text trimmed, `Total Charges`
///   numeric and nulls imputed column by column
pub fn load_feature_table(path: impl AsRef<Path>) -> crate::Result<DataFrame> {
    let path = path.as_ref();
    let raw = read_csv(path)?;
    info!(path = %path.display(), rows = raw.height(), columns = raw.width(), "dataset loaded");
    clean_table(raw)
}

/// Parse a CSV file. Any failure is reported as `DataLoad`.
pub fn read_csv(path: &Path) -> crate::Result<DataFrame> {
    if !path.exists() {
        return Err(ChurnError::DataLoad {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| ChurnError::DataLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Cleaning steps applied after parsing, in order: drop, trim, coerce, fill.
pub fn clean_table(df: DataFrame) -> crate::Result<DataFrame> {
    let mut df = prepare_table(df)?;
    fill_missing(&mut df)?;
    Ok(df)
}

/// Parse a CSV export and apply every cleaning step except imputation, so
/// missing cells are still visible.
pub fn load_raw_table(path: impl AsRef<Path>) -> crate::Result<DataFrame> {
    prepare_table(read_csv(path.as_ref())?)
}

fn prepare_table(df: DataFrame) -> crate::Result<DataFrame> {
    let mut df = drop_unused_columns(df)?;
    trim_text_columns(&mut df)?;
    coerce_numeric_features(&mut df)?;
    Ok(df)
}

/// Coerce every numeric contract feature to `Float64`. CSV parsing types a
/// column that is blank on every row as text, and `Total Charges` arrives as
/// text with blank cells.
pub fn coerce_numeric_features(df: &mut DataFrame) -> crate::Result<()> {
    for (name, kind) in FEATURE_CONTRACT {
        if kind == FeatureKind::Numeric {
            coerce_numeric(df, name)?;
        }
    }
    Ok(())
}

/// Drop the columns of `DROP_COLUMNS` that are present.
pub fn drop_unused_columns(mut df: DataFrame) -> crate::Result<DataFrame> {
    for name in DROP_COLUMNS {
        if has_column(&df, name) {
            df = df.drop(name)?;
            debug!(column = name, "dropped column");
        }
    }
    Ok(df)
}

/// Strip surrounding whitespace from every cell of every text column. A cell
/// left empty counts as missing, the same as a blank CSV field.
pub fn trim_text_columns(df: &mut DataFrame) -> crate::Result<()> {
    for name in text_column_names(df) {
        let trimmed: Vec<Option<String>> = df
            .column(&name)?
            .str()?
            .into_iter()
            .map(|cell| cell.map(str::trim).filter(|text| !text.is_empty()))
            .map(|cell| cell.map(str::to_string))
            .collect();
        df.with_column(Series::new(&name, trimmed))?;
    }
    Ok(())
}

/// Cast a column to `Float64`; cells that do not parse become null.
pub fn coerce_numeric(df: &mut DataFrame, name: &str) -> crate::Result<()> {
    if !has_column(df, name) {
        return Ok(());
    }
    let column = df.column(name)?;
    let values: Vec<Option<f64>> = if column.dtype() == &DataType::String {
        column
            .str()?
            .into_iter()
            .map(|cell| cell.and_then(|text| text.trim().parse::<f64>().ok()))
            .collect()
    } else {
        column.cast(&DataType::Float64)?.f64()?.into_iter().collect()
    };
    let unparsed = values.iter().filter(|v| v.is_none()).count();
    if unparsed > 0 {
        debug!(column = name, cells = unparsed, "cells coerced to missing");
    }
    df.with_column(Series::new(name, values))?;
    Ok(())
}

/// Fill nulls: text columns with their mode (or `"Unknown"`), numeric
/// columns with their median. A numeric column without any value is left
/// untouched.
pub fn fill_missing(df: &mut DataFrame) -> crate::Result<()> {
    let columns: Vec<(String, DataType)> = df
        .get_columns()
        .iter()
        .map(|s| (s.name().to_string(), s.dtype().clone()))
        .collect();

    for (name, dtype) in columns {
        let column = df.column(&name)?;
        if column.null_count() == 0 {
            continue;
        }

        if dtype == DataType::String {
            let cells: Vec<Option<&str>> = column.str()?.into_iter().collect();
            let fill = preprocessing::mode(cells.iter().flatten().copied())
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
            let filled: Vec<String> = cells
                .iter()
                .map(|cell| cell.unwrap_or(fill.as_str()).to_string())
                .collect();
            debug!(column = %name, fill = %fill, "filled text column with mode");
            df.with_column(Series::new(&name, filled))?;
        } else if dtype.is_numeric() {
            let cells: Vec<Option<f64>> = column
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .collect();
            let Some(fill) = preprocessing::median(cells.iter().flatten().copied()) else {
                warn!(column = %name, "numeric column has no values; left unfilled");
                continue;
            };
            let filled: Vec<f64> = cells.iter().map(|cell| cell.unwrap_or(fill)).collect();
            debug!(column = %name, fill, "filled numeric column with median");
            df.with_column(Series::new(&name, filled))?;
        }
    }
    Ok(())
}

/// Split a cleaned table into features and the target column.
pub fn split_features_target(df: &DataFrame, target: &str) -> crate::Result<(DataFrame, Series)> {
    if !has_column(df, target) {
        return Err(ChurnError::Training(format!(
            "target column '{target}' is missing from the dataset"
        )));
    }
    let y = df.column(target)?.clone();
    let x = df.drop(target)?;
    Ok((x, y))
}

/// Convert features into the transformer's column frame, partitioned by
/// declared dtype: numbers are numeric, strings are categorical. Columns of
/// any other dtype are not features and are skipped.
pub fn feature_frame(df: &DataFrame) -> crate::Result<ColumnFrame> {
    let mut frame = ColumnFrame::new();
    for column in df.get_columns() {
        let name = column.name();
        let dtype = column.dtype();
        if dtype == &DataType::String {
            let values = column
                .str()?
                .into_iter()
                .map(|cell| cell.map(str::to_string))
                .collect();
            frame.push(name, ColumnValues::Categorical(values));
        } else if dtype.is_numeric() {
            let values = column
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .collect();
            frame.push(name, ColumnValues::Numeric(values));
        } else {
            warn!(column = name, dtype = %dtype, "skipping column with unsupported dtype");
        }
    }
    Ok(frame)
}

/// Binary target as 0/1 values; nulls count as 0.
pub fn target_values(y: &Series) -> crate::Result<Vec<f64>> {
    Ok(y
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect())
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_columns().iter().any(|s| s.name() == name)
}

fn text_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|s| s.dtype() == &DataType::String)
        .map(|s| s.name().to_string())
        .collect()
}
