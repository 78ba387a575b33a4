//! One-hot encoding of categorical columns

use crate::error::{PrepError, Result};
use crate::utils::{has_column, string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Expands categorical columns into one `0/1` column per observed value
///
/// Categories are collected in sorted order so the output schema does not
/// depend on row order. Missing values encode as all zeros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    // column name -> sorted categories
    mappings: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the encoder to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.mappings.clear();

        for col_name in columns {
            if !has_column(df, col_name) {
                return Err(PrepError::ColumnNotFound(col_name.clone()));
            }
            let categories: BTreeSet<String> =
                string_values(df, col_name)?.into_iter().flatten().collect();
            self.mappings
                .push((col_name.clone(), categories.into_iter().collect()));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PrepError::EncodingError("encoder is not fitted".to_string()));
        }

        let mut result = df.clone();

        for (col_name, categories) in &self.mappings {
            let values = string_values(df, col_name)?;

            for category in categories {
                let new_col_name = format!("{}_{}", col_name, category);
                let indicator: Vec<i32> = values
                    .iter()
                    .map(|v| i32::from(v.as_deref() == Some(category.as_str())))
                    .collect();

                result.with_column(Series::new(new_col_name.into(), indicator))?;
            }

            result = result.drop(col_name)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Categories learned for a column
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.mappings
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cats)| cats.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_onehot_encoding() {
        let df = df!(
            "id" => &["u1", "u2", "u3", "u4"],
            "gender" => &[Some("MALE"), Some("FEMALE"), None, Some("MALE")],
            "signup_flow" => &[0i64, 25, 0, 3]
        )
        .unwrap();

        let mut encoder = OneHotEncoder::new();
        let result = encoder
            .fit_transform(&df, &columns(&["gender", "signup_flow"]))
            .unwrap();

        assert!(result.column("gender").is_err());
        assert!(result.column("signup_flow").is_err());
        // id + 2 genders + 3 flows
        assert_eq!(result.width(), 6);
        assert_eq!(encoder.categories("gender").unwrap(), &["FEMALE", "MALE"]);

        let male = result.column("gender_MALE").unwrap().as_materialized_series().clone();
        let male: Vec<Option<i32>> = male.i32().unwrap().into_iter().collect();
        assert_eq!(male, vec![Some(1), Some(0), Some(0), Some(1)]);

        let female = result.column("gender_FEMALE").unwrap().as_materialized_series().clone();
        let female: Vec<Option<i32>> = female.i32().unwrap().into_iter().collect();
        assert_eq!(female[2], Some(0));

        assert!(result.column("signup_flow_25").is_ok());
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let df = df!("a" => &["x"]).unwrap();
        let mut encoder = OneHotEncoder::new();
        assert!(matches!(
            encoder.fit(&df, &columns(&["b"])),
            Err(PrepError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_transform_requires_fit() {
        let df = df!("a" => &["x"]).unwrap();
        assert!(OneHotEncoder::new().transform(&df).is_err());
    }
}
