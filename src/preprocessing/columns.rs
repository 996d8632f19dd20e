//! Column extraction between polars frames and plain vectors

use crate::error::{PanelError, Result};
use crate::timeseries::calendar::{date_from_epoch_days, epoch_days};
use crate::timeseries::EntityKey;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Fail with `MissingRequiredColumn` naming every absent column
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|name| df.column(name).is_err())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PanelError::MissingRequiredColumn(missing.join(", ")))
    }
}

fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|col| col.as_materialized_series())
        .map_err(|_| PanelError::MissingRequiredColumn(name.to_string()))
}

/// Check if dtype is numeric
fn is_numeric_dtype(dtype: &DataType) -> bool {
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
            | DataType::Null
    )
}

/// Numeric column as `f64`, nulls kept as `None`
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = series(df, name)?;
    if !is_numeric_dtype(series.dtype()) {
        return Err(PanelError::InvalidSchema(format!(
            "column '{}' must be numeric, found {}",
            name,
            series.dtype()
        )));
    }
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Any column rendered as strings, nulls kept as `None`
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let casted = series(df, name)?.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Composite entity key per row; null ids are a schema error
pub fn entity_keys(df: &DataFrame, id_cols: &[String]) -> Result<Vec<EntityKey>> {
    let mut columns = Vec::with_capacity(id_cols.len());
    for name in id_cols {
        let values = string_values(df, name)?;
        if let Some(row) = values.iter().position(Option::is_none) {
            return Err(PanelError::InvalidSchema(format!(
                "id column '{}' is null at row {}",
                name, row
            )));
        }
        columns.push(values.into_iter().flatten().collect::<Vec<String>>());
    }

    Ok((0..df.height())
        .map(|row| EntityKey(columns.iter().map(|col| col[row].clone()).collect()))
        .collect())
}

/// Parse a raw date column (`Date`, `Datetime` or `String`)
pub fn parse_dates(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>> {
    let series = series(df, name)?;
    match series.dtype() {
        DataType::Date => physical_dates(series, name),
        DataType::Datetime(_, _) => physical_dates(&series.cast(&DataType::Date)?, name),
        DataType::String => series
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.and_then(parse_date_str).ok_or_else(|| {
                    PanelError::InvalidSchema(format!(
                        "unparseable date {:?} in column '{}' at row {}",
                        value, name, row
                    ))
                })
            })
            .collect(),
        other => Err(PanelError::InvalidSchema(format!(
            "column '{}' has type {} and cannot be read as dates",
            name, other
        ))),
    }
}

/// Dates of a column already rewritten by the preprocessor
pub fn week_values(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>> {
    let series = series(df, name)?;
    if series.dtype() != &DataType::Date {
        return Err(PanelError::InvalidSchema(format!(
            "column '{}' must hold preprocessed week dates, found {}",
            name,
            series.dtype()
        )));
    }
    physical_dates(series, name)
}

fn physical_dates(series: &Series, name: &str) -> Result<Vec<NaiveDate>> {
    let days = series.cast(&DataType::Int32)?;
    days.i32()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.and_then(date_from_epoch_days).ok_or_else(|| {
                PanelError::InvalidSchema(format!("null or out-of-range date in column '{}' at row {}", name, row))
            })
        })
        .collect()
}

fn parse_date_str(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Build a polars `Date` series
pub fn date_series(name: &str, dates: &[NaiveDate]) -> Result<Series> {
    let days: Vec<i32> = dates.iter().copied().map(epoch_days).collect();
    Ok(Series::new(name.into(), days).cast(&DataType::Date)?)
}
