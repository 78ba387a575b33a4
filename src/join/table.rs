//! Per-user summary tables keyed by user id

use crate::error::{PrepError, Result};
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A single derived feature value
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Count(i64),
    Float(Option<f64>),
    Text(Option<String>),
}

impl FeatureValue {
    /// The value of the same kind used when a user has no entry:
    /// zero for counts, missing otherwise
    pub fn absent(&self) -> FeatureValue {
        match self {
            FeatureValue::Count(_) => FeatureValue::Count(0),
            FeatureValue::Float(_) => FeatureValue::Float(None),
            FeatureValue::Text(_) => FeatureValue::Text(None),
        }
    }

    fn same_kind(&self, other: &FeatureValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Turns one kind of per-user summary into named feature values
pub trait FeatureSource {
    type Summary;

    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Features of one summary, in a stable order
    fn features(&self, summary: &Self::Summary) -> Vec<(String, FeatureValue)>;

    /// Features a user without any session events receives
    fn neutral_features(&self) -> Vec<(String, FeatureValue)>;
}

/// Summary features of many users, addressable by user id
///
/// Columns are the neutral record's columns first, then every other column
/// seen in any summary in sorted order. Rows are stored sparsely; a column a
/// user lacks reads as the column's neutral value.
#[derive(Debug, Clone)]
pub struct SummaryTable {
    name: String,
    columns: Vec<String>,
    neutral: Vec<FeatureValue>,
    rows: HashMap<String, Vec<(usize, FeatureValue)>>,
}

impl SummaryTable {
    /// Build a table from summaries keyed by user id
    pub fn build<S, I>(source: &S, summaries: I) -> Result<Self>
    where
        S: FeatureSource,
        I: IntoIterator<Item = (String, S::Summary)>,
    {
        let neutral_features = source.neutral_features();
        let mut sparse: Vec<(String, Vec<(String, FeatureValue)>)> = Vec::new();
        let mut dynamic: BTreeSet<String> = BTreeSet::new();
        let mut kinds: HashMap<String, FeatureValue> = neutral_features
            .iter()
            .map(|(name, value)| (name.clone(), value.absent()))
            .collect();

        check_distinct(source.name(), &neutral_features)?;

        for (user_id, summary) in summaries {
            let features = source.features(&summary);
            check_distinct(source.name(), &features)?;
            for (name, value) in &features {
                match kinds.get(name) {
                    Some(kind) if !kind.same_kind(value) => {
                        return Err(PrepError::DataError(format!(
                            "{} feature '{}' has inconsistent types",
                            source.name(),
                            name
                        )));
                    }
                    Some(_) => {}
                    None => {
                        kinds.insert(name.clone(), value.absent());
                        dynamic.insert(name.clone());
                    }
                }
            }
            sparse.push((user_id, features));
        }

        let mut columns: Vec<String> = neutral_features.iter().map(|(n, _)| n.clone()).collect();
        let mut neutral: Vec<FeatureValue> = neutral_features.into_iter().map(|(_, v)| v).collect();
        for name in dynamic {
            if let Some(kind) = kinds.remove(&name) {
                columns.push(name);
                neutral.push(kind);
            }
        }

        let position: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut rows = HashMap::with_capacity(sparse.len());
        for (user_id, features) in sparse {
            let mut row: Vec<(usize, FeatureValue)> = features
                .into_iter()
                .filter_map(|(name, value)| position.get(name.as_str()).map(|&i| (i, value)))
                .collect();
            row.sort_by_key(|(i, _)| *i);
            if rows.insert(user_id.clone(), row).is_some() {
                return Err(PrepError::DataError(format!(
                    "{} summary produced twice for user '{}'",
                    source.name(),
                    user_id
                )));
            }
        }

        Ok(Self {
            name: source.name().to_string(),
            columns,
            neutral,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.rows.contains_key(user_id)
    }

    /// User ids with a summary, sorted
    pub fn user_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.rows.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Value of `column` for `user_id`, neutral when the user has no entry
    pub fn value(&self, user_id: &str, column: usize) -> Option<&FeatureValue> {
        let neutral = self.neutral.get(column)?;
        let found = self.rows.get(user_id).and_then(|row| {
            row.binary_search_by_key(&column, |(i, _)| *i)
                .ok()
                .map(|pos| &row[pos].1)
        });
        Some(found.unwrap_or(neutral))
    }

    /// Materialize one column for the given row order
    pub fn column_series(&self, column: usize, user_ids: &[String]) -> Result<Series> {
        let name = self
            .columns
            .get(column)
            .ok_or_else(|| PrepError::ColumnNotFound(format!("{}#{}", self.name, column)))?;
        let kind = &self.neutral[column];

        let values = user_ids.iter().map(|id| self.value(id, column));
        let series = match kind {
            FeatureValue::Count(_) => {
                let v: Vec<i64> = values
                    .map(|v| match v {
                        Some(FeatureValue::Count(n)) => *n,
                        _ => 0,
                    })
                    .collect();
                Series::new(name.as_str().into(), v)
            }
            FeatureValue::Float(_) => {
                let v: Vec<Option<f64>> = values
                    .map(|v| match v {
                        Some(FeatureValue::Float(x)) => *x,
                        _ => None,
                    })
                    .collect();
                Series::new(name.as_str().into(), v)
            }
            FeatureValue::Text(_) => {
                let v: Vec<Option<String>> = values
                    .map(|v| match v {
                        Some(FeatureValue::Text(s)) => s.clone(),
                        _ => None,
                    })
                    .collect();
                Series::new(name.as_str().into(), v)
            }
        };

        Ok(series)
    }
}

/// Two features of one summary must not share a name
fn check_distinct(source: &str, features: &[(String, FeatureValue)]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(features.len());
    for (name, _) in features {
        if !seen.insert(name.as_str()) {
            return Err(PrepError::DataError(format!(
                "{source} feature name '{name}' is produced twice"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Visits;

    impl FeatureSource for Visits {
        type Summary = Vec<&'static str>;

        fn name(&self) -> &str {
            "visits"
        }

        fn features(&self, pages: &Self::Summary) -> Vec<(String, FeatureValue)> {
            let mut out = vec![
                ("visits".to_string(), FeatureValue::Count(pages.len() as i64)),
                ("first_page".to_string(), FeatureValue::Text(pages.first().map(|p| p.to_string()))),
            ];
            for page in pages {
                out.push((format!("page_{page}"), FeatureValue::Count(1)));
            }
            out
        }

        fn neutral_features(&self) -> Vec<(String, FeatureValue)> {
            vec![
                ("visits".to_string(), FeatureValue::Count(0)),
                ("first_page".to_string(), FeatureValue::Text(None)),
            ]
        }
    }

    fn table() -> SummaryTable {
        SummaryTable::build(
            &Visits,
            vec![
                ("u2".to_string(), vec!["home", "search"]),
                ("u1".to_string(), vec!["about"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_columns_neutral_first_then_sorted() {
        let table = table();
        assert_eq!(
            table.columns(),
            &["visits", "first_page", "page_about", "page_home", "page_search"]
        );
        assert_eq!(table.user_ids(), vec!["u1", "u2"]);
    }

    #[test]
    fn test_missing_entries_read_as_neutral() {
        let table = table();
        assert_eq!(table.value("u1", 3), Some(&FeatureValue::Count(0)));
        assert_eq!(table.value("nobody", 0), Some(&FeatureValue::Count(0)));
        assert_eq!(table.value("nobody", 1), Some(&FeatureValue::Text(None)));
        assert_eq!(table.value("u2", 4), Some(&FeatureValue::Count(1)));
        assert_eq!(table.value("u2", 99), None);
    }

    #[test]
    fn test_column_series_follows_requested_order() {
        let table = table();
        let order = vec!["u2".to_string(), "zz".to_string(), "u1".to_string()];

        let visits = table.column_series(0, &order).unwrap();
        let visits: Vec<Option<i64>> = visits.i64().unwrap().into_iter().collect();
        assert_eq!(visits, vec![Some(2), Some(0), Some(1)]);

        let first = table.column_series(1, &order).unwrap();
        assert_eq!(first.null_count(), 1);
    }

    #[test]
    fn test_duplicate_user_is_rejected() {
        let result = SummaryTable::build(
            &Visits,
            vec![("u1".to_string(), vec!["a"]), ("u1".to_string(), vec!["b"])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_colliding_feature_names_are_rejected() {
        let result = SummaryTable::build(
            &Visits,
            vec![("u1".to_string(), vec!["home", "home"])],
        );
        let err = result.unwrap_err();
        assert!(matches!(err, PrepError::DataError(_)));
        assert!(err.to_string().contains("page_home"));
    }
}
