//! Field cleaning for the user and session tables

use crate::config::CleaningConfig;
use crate::error::Result;
use crate::utils::{f64_values, has_column, string_column_names, string_values};
use polars::prelude::*;
use tracing::debug;

/// Counts of the recoverable cleaning events applied to a table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleaningStats {
    /// Cells holding the unknown marker that became missing
    pub unknown_replaced: usize,
    /// Ages outside the plausible range that became missing
    pub ages_nulled: usize,
    pub dropped_columns: Vec<String>,
}

/// Applies the cleaning rules of a [`CleaningConfig`]
#[derive(Debug, Clone)]
pub struct DataCleaner {
    config: CleaningConfig,
}

impl DataCleaner {
    pub fn new(config: CleaningConfig) -> Self {
        Self { config }
    }

    /// Clean the concatenated user table
    pub fn clean_users(&self, df: DataFrame) -> Result<(DataFrame, CleaningStats)> {
        let mut stats = CleaningStats::default();

        let mut df = self.drop_columns(df, &mut stats)?;
        stats.unknown_replaced = self.replace_unknown(&mut df, &self.config.unknown_user_columns)?;
        stats.ages_nulled = self.null_implausible_ages(&mut df)?;

        debug!(
            unknown_replaced = stats.unknown_replaced,
            ages_nulled = stats.ages_nulled,
            "Cleaned user table"
        );
        Ok((df, stats))
    }

    /// Clean the session table
    pub fn clean_sessions(&self, mut df: DataFrame) -> Result<(DataFrame, CleaningStats)> {
        let mut stats = CleaningStats::default();

        if self.config.unknown_in_sessions {
            let columns = string_column_names(&df);
            stats.unknown_replaced = self.replace_unknown(&mut df, &columns)?;
        }

        debug!(unknown_replaced = stats.unknown_replaced, "Cleaned session table");
        Ok((df, stats))
    }

    fn drop_columns(&self, mut df: DataFrame, stats: &mut CleaningStats) -> Result<DataFrame> {
        for name in &self.config.drop_columns {
            if has_column(&df, name) {
                df = df.drop(name)?;
                stats.dropped_columns.push(name.clone());
            }
        }
        Ok(df)
    }

    /// Turn the unknown marker into missing in the given string columns
    ///
    /// Columns that are absent or not string-typed cannot hold the marker and
    /// are left alone.
    pub fn replace_unknown(&self, df: &mut DataFrame, columns: &[String]) -> Result<usize> {
        let marker = self.config.unknown_marker.as_str();
        let mut replaced = 0usize;

        for name in columns {
            let is_string = df
                .column(name)
                .map(|c| c.dtype() == &DataType::String)
                .unwrap_or(false);
            if !is_string {
                continue;
            }

            let values = string_values(df, name)?;
            let hits = values.iter().filter(|v| v.as_deref() == Some(marker)).count();
            if hits == 0 {
                continue;
            }

            let cleaned: Vec<Option<String>> = values
                .into_iter()
                .map(|v| v.filter(|s| s != marker))
                .collect();
            df.with_column(Series::new(name.as_str().into(), cleaned))?;
            replaced += hits;
        }

        Ok(replaced)
    }

    /// Ages outside `[min_age, max_age]` become missing
    pub fn null_implausible_ages(&self, df: &mut DataFrame) -> Result<usize> {
        let name = self.config.age_column.as_str();
        if !has_column(df, name) {
            return Ok(0);
        }

        let (min, max) = (self.config.min_age, self.config.max_age);
        let mut nulled = 0usize;
        let ages: Vec<Option<f64>> = f64_values(df, name)?
            .into_iter()
            .map(|age| match age {
                Some(a) if a < min || a > max => {
                    nulled += 1;
                    None
                }
                other => other,
            })
            .collect();

        df.with_column(Series::new(name.into(), ages))?;
        Ok(nulled)
    }
}
