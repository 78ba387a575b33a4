//! Identifier-keyed assembly of the wide user table

use super::table::SummaryTable;
use crate::error::{PrepError, Result};
use crate::utils::{has_column, string_values};
use polars::prelude::*;
use std::collections::HashSet;
use tracing::debug;

/// Joins summary tables onto the user table by user id
#[derive(Debug, Clone)]
pub struct JoinAssembler {
    id_column: String,
}

impl JoinAssembler {
    pub fn new(id_column: impl Into<String>) -> Self {
        Self {
            id_column: id_column.into(),
        }
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Outer join of `users` with every summary table
    ///
    /// The user rows keep their order and columns. Ids that only appear in a
    /// summary table are appended afterwards, in table order and sorted within
    /// a table, with every user column missing. Summary columns are appended
    /// to the right; a row without a summary gets the table's neutral values.
    pub fn outer_join(&self, users: &DataFrame, tables: &[&SummaryTable]) -> Result<DataFrame> {
        let mut ids = self.user_ids(users)?;
        let mut known: HashSet<String> = ids.iter().cloned().collect();

        let mut extra: Vec<String> = Vec::new();
        for table in tables {
            for id in table.user_ids() {
                if known.insert(id.to_string()) {
                    extra.push(id.to_string());
                }
            }
        }

        let mut wide = if extra.is_empty() {
            users.clone()
        } else {
            users.vstack(&self.missing_rows(users, &extra)?)?
        };
        ids.extend(extra.iter().cloned());

        for table in tables {
            for (index, name) in table.columns().iter().enumerate() {
                if has_column(&wide, name) {
                    return Err(PrepError::DataError(format!(
                        "{} column '{}' already exists in the user table",
                        table.name(),
                        name
                    )));
                }
                wide.with_column(table.column_series(index, &ids)?)?;
            }
        }

        debug!(
            users = users.height(),
            session_only = extra.len(),
            columns = wide.width(),
            "Assembled wide table"
        );
        Ok(wide)
    }

    /// Keep only the rows whose id is in `ids`, in the table's row order
    pub fn restrict(&self, wide: &DataFrame, ids: &[String]) -> Result<DataFrame> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mask: Vec<bool> = string_values(wide, &self.id_column)?
            .iter()
            .map(|id| id.as_deref().is_some_and(|id| wanted.contains(id)))
            .collect();

        let mask = BooleanChunked::from_slice("mask".into(), &mask);
        Ok(wide.filter(&mask)?)
    }

    /// Ids of the user table; a missing id is malformed input
    pub fn user_ids(&self, users: &DataFrame) -> Result<Vec<String>> {
        string_values(users, &self.id_column)?
            .into_iter()
            .enumerate()
            .map(|(row, id)| {
                id.ok_or_else(|| {
                    PrepError::DataError(format!("row {row} has no '{}'", self.id_column))
                })
            })
            .collect()
    }

    /// Rows with the user table's schema, holding only an id
    fn missing_rows(&self, users: &DataFrame, ids: &[String]) -> Result<DataFrame> {
        let columns = users
            .get_columns()
            .iter()
            .map(|column| {
                if column.name().as_str() == self.id_column {
                    // strict: an id that does not fit the column type is an error, not a null
                    let id_series = Series::new(column.name().clone(), ids);
                    Ok(id_series.strict_cast(column.dtype())?.into_column())
                } else {
                    Ok(Series::full_null(column.name().clone(), ids.len(), column.dtype()).into_column())
                }
            })
            .collect::<Result<Vec<Column>>>()?;

        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::{FeatureSource, FeatureValue};

    struct Logins;

    impl FeatureSource for Logins {
        type Summary = i64;

        fn name(&self) -> &str {
            "logins"
        }

        fn features(&self, n: &i64) -> Vec<(String, FeatureValue)> {
            vec![
                ("logins".to_string(), FeatureValue::Count(*n)),
                ("login_rate".to_string(), FeatureValue::Float(Some(*n as f64 / 10.0))),
            ]
        }

        fn neutral_features(&self) -> Vec<(String, FeatureValue)> {
            vec![
                ("logins".to_string(), FeatureValue::Count(0)),
                ("login_rate".to_string(), FeatureValue::Float(None)),
            ]
        }
    }

    fn users() -> DataFrame {
        df!(
            "id" => &["a", "b"],
            "age" => &[Some(30.0), None],
            "gender" => &["MALE", "FEMALE"]
        )
        .unwrap()
    }

    fn logins() -> SummaryTable {
        SummaryTable::build(&Logins, vec![("c".to_string(), 4), ("a".to_string(), 2)]).unwrap()
    }

    #[test]
    fn test_outer_join_keeps_every_id() {
        let assembler = JoinAssembler::new("id");
        let table = logins();
        let wide = assembler.outer_join(&users(), &[&table]).unwrap();

        assert_eq!(wide.height(), 3);
        let names: Vec<String> = wide.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["id", "age", "gender", "logins", "login_rate"]);

        let ids = string_values(&wide, "id").unwrap();
        assert_eq!(ids, vec![Some("a".into()), Some("b".into()), Some("c".into())]);

        // c is session-only: user columns missing, own summary kept
        let gender = string_values(&wide, "gender").unwrap();
        assert_eq!(gender[2], None);
        let logins = wide.column("logins").unwrap().as_materialized_series().clone();
        let logins: Vec<Option<i64>> = logins.i64().unwrap().into_iter().collect();
        assert_eq!(logins, vec![Some(2), Some(0), Some(4)]);

        // b has no summary: neutral values
        let rate = wide.column("login_rate").unwrap().as_materialized_series().clone();
        let rate: Vec<Option<f64>> = rate.f64().unwrap().into_iter().collect();
        assert_eq!(rate, vec![Some(0.2), None, Some(0.4)]);
    }

    #[test]
    fn test_join_without_tables_is_identity() {
        let assembler = JoinAssembler::new("id");
        let wide = assembler.outer_join(&users(), &[]).unwrap();
        assert!(wide.equals_missing(&users()));
    }

    #[test]
    fn test_restrict() {
        let assembler = JoinAssembler::new("id");
        let table = logins();
        let wide = assembler.outer_join(&users(), &[&table]).unwrap();

        let restricted = assembler
            .restrict(&wide, &["c".to_string(), "a".to_string(), "zzz".to_string()])
            .unwrap();
        assert_eq!(restricted.height(), 2);
        assert_eq!(restricted.width(), wide.width());
        let ids = string_values(&restricted, "id").unwrap();
        assert_eq!(ids, vec![Some("a".into()), Some("c".into())]);
    }

    #[test]
    fn test_column_collision_is_an_error() {
        let users = df!("id" => &["a"], "logins" => &[1i64]).unwrap();
        let table = logins();
        assert!(JoinAssembler::new("id").outer_join(&users, &[&table]).is_err());
    }

    #[test]
    fn test_missing_user_id_is_an_error() {
        let users = df!("id" => &[Some("a"), None]).unwrap();
        assert!(JoinAssembler::new("id").user_ids(&users).is_err());
    }
}
