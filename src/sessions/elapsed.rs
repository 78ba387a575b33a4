//! Per-user statistics of the seconds elapsed between session events

use crate::join::{FeatureSource, FeatureValue};
use serde::{Deserialize, Serialize};

/// Time statistics of one user's events
///
/// Missing elapsed values are excluded. With no values, `count` and `sum` are
/// zero and every other statistic is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElapsedSummary {
    pub user_id: String,
    pub count: u64,
    pub sum: f64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation; needs at least two values
    pub std: Option<f64>,
}

/// Summarizes elapsed-seconds sequences
#[derive(Debug, Clone)]
pub struct ElapsedTimeSummarizer {
    /// Prefix of the output feature names, normally the source column name
    prefix: String,
}

impl ElapsedTimeSummarizer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Summarize one user's elapsed values
    pub fn summarize<I>(&self, user_id: &str, values: I) -> ElapsedSummary
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut present: Vec<f64> = values
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();
        // Sorting first makes the floating point sums independent of input order
        present.sort_by(f64::total_cmp);

        let count = present.len();
        let sum: f64 = present.iter().sum();

        if count == 0 {
            return ElapsedSummary {
                user_id: user_id.to_string(),
                count: 0,
                sum: 0.0,
                mean: None,
                min: None,
                max: None,
                median: None,
                std: None,
            };
        }

        let mean = sum / count as f64;
        let median = if count % 2 == 1 {
            present[count / 2]
        } else {
            (present[count / 2 - 1] + present[count / 2]) / 2.0
        };
        let std = (count > 1).then(|| {
            let ss: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        });

        ElapsedSummary {
            user_id: user_id.to_string(),
            count: count as u64,
            sum,
            mean: Some(mean),
            min: present.first().copied(),
            max: present.last().copied(),
            median: Some(median),
            std,
        }
    }

    fn column(&self, stat: &str) -> String {
        format!("{}_{}", self.prefix, stat)
    }
}

impl FeatureSource for ElapsedTimeSummarizer {
    type Summary = ElapsedSummary;

    fn name(&self) -> &str {
        "elapsed"
    }

    fn features(&self, s: &ElapsedSummary) -> Vec<(String, FeatureValue)> {
        vec![
            (self.column("count"), FeatureValue::Count(s.count as i64)),
            (self.column("sum"), FeatureValue::Float(Some(s.sum))),
            (self.column("mean"), FeatureValue::Float(s.mean)),
            (self.column("min"), FeatureValue::Float(s.min)),
            (self.column("max"), FeatureValue::Float(s.max)),
            (self.column("median"), FeatureValue::Float(s.median)),
            (self.column("std"), FeatureValue::Float(s.std)),
        ]
    }

    fn neutral_features(&self) -> Vec<(String, FeatureValue)> {
        self.features(&self.summarize("", std::iter::empty()))
    }
}
