//! Calendar features derived from the account and activity timestamps

use crate::config::ColumnsConfig;
use crate::error::Result;
use crate::utils::string_values;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::warn;

const ACCOUNT_CREATED_FORMAT: &str = "%Y-%m-%d";
const FIRST_ACTIVE_FORMAT: &str = "%Y%m%d%H%M%S";
const FIRST_ACTIVE_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Name of the parsed first-activity column added to the table
pub const DATE_FIRST_ACTIVE: &str = "date_first_active";

/// Number of values that could not be parsed, per source column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateStats {
    pub unparsed_account_created: usize,
    pub unparsed_first_active: usize,
}

/// Splits the two user timestamps into weekday/year/month/day columns
#[derive(Debug, Clone)]
pub struct DateFeatures {
    account_created: String,
    first_active_timestamp: String,
}

impl DateFeatures {
    pub fn new(columns: &ColumnsConfig) -> Self {
        Self {
            account_created: columns.account_created.clone(),
            first_active_timestamp: columns.first_active_timestamp.clone(),
        }
    }

    /// Append the derived date columns to `df`
    ///
    /// Unparseable or missing timestamps produce missing derived values.
    pub fn apply(&self, df: &mut DataFrame) -> Result<DateStats> {
        let mut stats = DateStats::default();

        let created: Vec<Option<NaiveDate>> = string_values(df, &self.account_created)?
            .iter()
            .map(|raw| {
                let parsed = raw.as_deref().and_then(parse_account_created);
                if raw.is_some() && parsed.is_none() {
                    stats.unparsed_account_created += 1;
                }
                parsed
            })
            .collect();

        let first_active: Vec<Option<NaiveDateTime>> =
            string_values(df, &self.first_active_timestamp)?
                .iter()
                .map(|raw| {
                    let parsed = raw.as_deref().and_then(parse_first_active);
                    if raw.is_some() && parsed.is_none() {
                        stats.unparsed_first_active += 1;
                    }
                    parsed
                })
                .collect();

        if stats.unparsed_account_created > 0 || stats.unparsed_first_active > 0 {
            warn!(
                account_created = stats.unparsed_account_created,
                first_active = stats.unparsed_first_active,
                "Unparseable dates treated as missing"
            );
        }

        let first_active_text: Vec<Option<String>> = first_active
            .iter()
            .map(|d| d.map(|d| d.format(FIRST_ACTIVE_OUTPUT_FORMAT).to_string()))
            .collect();
        df.with_column(Series::new(DATE_FIRST_ACTIVE.into(), first_active_text))?;

        let first_active_dates: Vec<Option<NaiveDate>> =
            first_active.iter().map(|d| d.map(|d| d.date())).collect();

        df.with_column(Series::new(
            "weekday_account_created".into(),
            component(&created, weekday),
        ))?;
        df.with_column(Series::new(
            "weekday_first_active".into(),
            component(&first_active_dates, weekday),
        ))?;

        for (suffix, dates) in [("account_created", &created), ("first_active", &first_active_dates)] {
            df.with_column(Series::new(
                format!("year_{suffix}").into(),
                component(dates, |d| d.year()),
            ))?;
            df.with_column(Series::new(
                format!("month_{suffix}").into(),
                component(dates, |d| d.month() as i32),
            ))?;
            df.with_column(Series::new(
                format!("day_{suffix}").into(),
                component(dates, |d| d.day() as i32),
            ))?;
        }

        Ok(stats)
    }
}

fn parse_account_created(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), ACCOUNT_CREATED_FORMAT).ok()
}

fn parse_first_active(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), FIRST_ACTIVE_FORMAT).ok()
}

/// Day of week, 0 = Monday
fn weekday(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_monday() as i32
}

fn component(dates: &[Option<NaiveDate>], f: impl Fn(NaiveDate) -> i32) -> Vec<Option<i32>> {
    dates.iter().map(|d| d.map(&f)).collect()
}
