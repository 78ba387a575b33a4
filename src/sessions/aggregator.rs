//! Per-user categorical session summary

use super::event::{SessionEvent, SessionSchema};
use crate::config::AggregationConfig;
use crate::error::{PrepError, Result};
use crate::join::{FeatureSource, FeatureValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Categorical summary of one user's events
///
/// Every field is a count or a set-derived value, so the summary does not
/// depend on the order the events arrive in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub user_id: String,
    /// Number of events
    pub session_length: usize,
    /// Tallied column -> value -> occurrences
    pub value_counts: BTreeMap<String, BTreeMap<String, u64>>,
    /// Tallied column -> events where the column is present
    pub present_counts: BTreeMap<String, u64>,
    /// Most frequent device; ties go to the lexicographically smallest value
    pub most_used_device: Option<String>,
}

/// Derives a [`SessionSummary`] from a user's events
#[derive(Debug, Clone)]
pub struct SessionAggregator {
    config: AggregationConfig,
    /// (column name, index into the event categories)
    tally: Vec<(String, usize)>,
    device: usize,
}

impl SessionAggregator {
    /// Resolve the configured columns against the event schema
    pub fn new(config: AggregationConfig, schema: &SessionSchema) -> Result<Self> {
        let resolve = |name: &str| {
            schema
                .index_of(name)
                .ok_or_else(|| PrepError::ColumnNotFound(name.to_string()))
        };

        let tally = config
            .tally_columns
            .iter()
            .map(|name| resolve(name).map(|i| (name.clone(), i)))
            .collect::<Result<Vec<_>>>()?;
        let device = resolve(&config.device_column)?;

        Ok(Self {
            config,
            tally,
            device,
        })
    }

    /// Summarize one user's events; an empty slice yields the neutral summary
    pub fn aggregate(&self, user_id: &str, events: &[SessionEvent]) -> SessionSummary {
        let mut value_counts: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        let mut present_counts: BTreeMap<String, u64> = BTreeMap::new();

        for (column, index) in &self.tally {
            let counts = value_counts.entry(column.clone()).or_default();
            let mut present = 0u64;
            for value in events.iter().filter_map(|e| e.category(*index)) {
                *counts.entry(value.to_string()).or_insert(0) += 1;
                present += 1;
            }
            present_counts.insert(column.clone(), present);
        }

        SessionSummary {
            user_id: user_id.to_string(),
            session_length: events.len(),
            value_counts,
            present_counts,
            most_used_device: self.most_used(events),
        }
    }

    fn most_used(&self, events: &[SessionEvent]) -> Option<String> {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for device in events.iter().filter_map(|e| e.category(self.device)) {
            *counts.entry(device).or_insert(0) += 1;
        }

        // BTreeMap iterates in ascending key order, so keeping the first
        // maximum picks the smallest value on ties
        let mut best: Option<(&str, u64)> = None;
        for (device, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((device, count));
            }
        }
        best.map(|(device, _)| device.to_string())
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }
}

impl FeatureSource for SessionAggregator {
    type Summary = SessionSummary;

    fn name(&self) -> &str {
        "sessions"
    }

    fn features(&self, summary: &SessionSummary) -> Vec<(String, FeatureValue)> {
        let mut features = vec![(
            self.config.session_length_column.clone(),
            FeatureValue::Count(summary.session_length as i64),
        )];

        for (column, _) in &self.tally {
            let present = summary.present_counts.get(column).copied().unwrap_or(0);
            features.push((format!("{column}_count"), FeatureValue::Count(present as i64)));
        }

        features.push((
            self.config.most_used_column.clone(),
            FeatureValue::Text(summary.most_used_device.clone()),
        ));

        for (column, counts) in &summary.value_counts {
            for (value, count) in counts {
                features.push((
                    format!("{column}_{value}_count"),
                    FeatureValue::Count(*count as i64),
                ));
            }
        }

        features
    }

    fn neutral_features(&self) -> Vec<(String, FeatureValue)> {
        self.features(&self.aggregate("", &[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(action: Option<&str>, action_type: Option<&str>, device: Option<&str>) -> SessionEvent {
        SessionEvent {
            user_id: "u".to_string(),
            categories: vec![
                action.map(str::to_string),
                action_type.map(str::to_string),
                None,
                device.map(str::to_string),
            ],
            secs_elapsed: None,
        }
    }

    fn aggregator() -> SessionAggregator {
        let config = AggregationConfig::default();
        let schema = SessionSchema::from_config(&config);
        SessionAggregator::new(config, &schema).unwrap()
    }

    fn events() -> Vec<SessionEvent> {
        vec![
            event(Some("search"), Some("click"), Some("iPhone")),
            event(Some("search"), None, Some("Mac Desktop")),
            event(None, Some("view"), Some("iPhone")),
            event(Some("show"), Some("view"), None),
        ]
    }

    #[test]
    fn test_aggregate_counts() {
        let summary = aggregator().aggregate("u", &events());

        assert_eq!(summary.session_length, 4);
        assert_eq!(summary.value_counts["action"]["search"], 2);
        assert_eq!(summary.value_counts["action"]["show"], 1);
        assert_eq!(summary.value_counts["action_type"]["view"], 2);
        assert!(summary.value_counts["action_detail"].is_empty());
        assert_eq!(summary.present_counts["action"], 3);
        assert_eq!(summary.present_counts["device_type"], 3);
        assert_eq!(summary.most_used_device.as_deref(), Some("iPhone"));
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        let aggregator = aggregator();
        let forward = aggregator.aggregate("u", &events());

        let mut reversed = events();
        reversed.reverse();
        assert_eq!(aggregator.aggregate("u", &reversed), forward);

        let mut rotated = events();
        rotated.rotate_left(1);
        assert_eq!(aggregator.aggregate("u", &rotated), forward);
    }

    #[test]
    fn test_device_tie_picks_smallest_value() {
        let events = vec![
            event(None, None, Some("iPhone")),
            event(None, None, Some("Android Phone")),
        ];
        let summary = aggregator().aggregate("u", &events);
        assert_eq!(summary.most_used_device.as_deref(), Some("Android Phone"));
    }

    #[test]
    fn test_empty_events_give_neutral_summary() {
        let summary = aggregator().aggregate("u", &[]);
        assert_eq!(summary.session_length, 0);
        assert_eq!(summary.most_used_device, None);
        assert!(summary.present_counts.values().all(|&c| c == 0));
    }

    #[test]
    fn test_features_naming() {
        let aggregator = aggregator();
        let features = aggregator.features(&aggregator.aggregate("u", &events()));
        let names: Vec<&str> = features.iter().map(|(n, _)| n.as_str()).collect();

        assert_eq!(names[0], "session_length");
        assert!(names.contains(&"action_count"));
        assert!(names.contains(&"most_used_device"));
        assert!(names.contains(&"action_search_count"));
        assert!(names.contains(&"device_type_Mac Desktop_count"));

        let neutral = aggregator.neutral_features();
        assert_eq!(neutral.len(), 6);
    }

    #[test]
    fn test_unknown_device_column_is_an_error() {
        let config = AggregationConfig::default();
        let schema = SessionSchema::new(vec!["action".to_string()]);
        assert!(SessionAggregator::new(config, &schema).is_err());
    }

    #[test]
    fn test_value_named_like_another_count_column_is_rejected() {
        // action "type" would read as the present count of action_type
        let aggregator = aggregator();
        let events = vec![
            event(Some("type"), None, None),
            event(Some("type"), Some("click"), None),
        ];
        let summary = aggregator.aggregate("u", &events);

        let err = crate::join::SummaryTable::build(&aggregator, vec![("u".to_string(), summary)])
            .unwrap_err();
        assert!(err.to_string().contains("action_type_count"));
    }
}
