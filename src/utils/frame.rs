//! Typed access to DataFrame columns

use crate::error::{PrepError, Result};
use polars::prelude::*;

/// Whether the frame has a column with this name
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

/// Read a column as optional strings, casting non-string columns
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| PrepError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    let ca = series.str()?;

    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Read a column as optional floats
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PrepError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let ca = series.f64()?;

    Ok(ca.into_iter().collect())
}

/// Names of all string-typed columns
pub fn string_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| c.dtype() == &DataType::String)
        .map(|c| c.name().to_string())
        .collect()
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Stack `bottom` under `top`, aligning their schemas
///
/// Columns follow `top`'s order, then any column only `bottom` has. A column
/// missing on one side is filled with nulls. Columns whose types disagree are
/// widened to `Float64` when both are numeric and to `String` otherwise.
pub fn stack_aligned(top: &DataFrame, bottom: &DataFrame) -> Result<DataFrame> {
    let mut names: Vec<String> = top.get_column_names().iter().map(|s| s.to_string()).collect();
    for name in bottom.get_column_names() {
        if !names.iter().any(|n| n == name.as_str()) {
            names.push(name.to_string());
        }
    }

    let mut top_columns = Vec::with_capacity(names.len());
    let mut bottom_columns = Vec::with_capacity(names.len());

    for name in &names {
        let upper = top.column(name).ok().map(|c| c.as_materialized_series().clone());
        let lower = bottom.column(name).ok().map(|c| c.as_materialized_series().clone());

        let dtype = match (&upper, &lower) {
            (Some(u), Some(l)) if u.dtype() == l.dtype() => u.dtype().clone(),
            (Some(u), Some(l)) if is_numeric(u.dtype()) && is_numeric(l.dtype()) => DataType::Float64,
            (Some(_), Some(_)) => DataType::String,
            (Some(u), None) => u.dtype().clone(),
            (None, Some(l)) => l.dtype().clone(),
            (None, None) => continue,
        };

        let fill = |series: Option<Series>, height: usize| -> Result<Column> {
            let series = match series {
                Some(s) if s.dtype() == &dtype => s,
                Some(s) => s.cast(&dtype)?,
                None => Series::full_null(name.as_str().into(), height, &dtype),
            };
            Ok(series.into_column())
        };

        top_columns.push(fill(upper, top.height())?);
        bottom_columns.push(fill(lower, bottom.height())?);
    }

    let stacked = DataFrame::new(top_columns)?.vstack(&DataFrame::new(bottom_columns)?)?;
    Ok(stacked)
}

/// Reorder so `first` is the leading column
pub fn with_leading_column(df: &DataFrame, first: &str) -> Result<DataFrame> {
    if !has_column(df, first) {
        return Err(PrepError::ColumnNotFound(first.to_string()));
    }
    let mut order: Vec<String> = vec![first.to_string()];
    order.extend(
        df.get_column_names()
            .iter()
            .filter(|n| n.as_str() != first)
            .map(|n| n.to_string()),
    );
    Ok(df.select(order)?)
}
