//! Typed session events and their partition by user

use crate::config::{AggregationConfig, ColumnsConfig};
use crate::error::Result;
use crate::utils::{f64_values, string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Ordered names of the categorical session fields kept on each event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSchema {
    columns: Vec<String>,
}

impl SessionSchema {
    /// Every column the aggregation configuration reads, without duplicates
    pub fn from_config(config: &AggregationConfig) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for name in config
            .tally_columns
            .iter()
            .chain(std::iter::once(&config.device_column))
        {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
        Self { columns }
    }

    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// One recorded user action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub user_id: String,
    /// Categorical fields, positioned by the [`SessionSchema`]
    pub categories: Vec<Option<String>>,
    pub secs_elapsed: Option<f64>,
}

impl SessionEvent {
    pub fn category(&self, index: usize) -> Option<&str> {
        self.categories.get(index).and_then(|c| c.as_deref())
    }
}

/// All events of one user
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UserEvents {
    pub user_id: String,
    pub events: Vec<SessionEvent>,
}

/// The loaded session table
#[derive(Debug, Clone)]
pub struct SessionLog {
    schema: SessionSchema,
    events: Vec<SessionEvent>,
    /// Rows discarded because they carried no user id
    discarded: usize,
}

impl SessionLog {
    pub fn new(schema: SessionSchema, events: Vec<SessionEvent>) -> Self {
        Self {
            schema,
            events,
            discarded: 0,
        }
    }

    /// Build the log from a cleaned session frame
    ///
    /// Rows without a user id cannot be keyed and are discarded.
    pub fn from_frame(
        df: &DataFrame,
        columns: &ColumnsConfig,
        aggregation: &AggregationConfig,
    ) -> Result<Self> {
        let schema = SessionSchema::from_config(aggregation);

        let user_ids = string_values(df, &columns.session_user)?;
        let elapsed = f64_values(df, &columns.elapsed)?;
        let mut category_columns = schema
            .columns()
            .iter()
            .map(|name| string_values(df, name).map(Vec::into_iter))
            .collect::<Result<Vec<_>>>()?;

        let mut events = Vec::with_capacity(df.height());
        let mut discarded = 0usize;

        for (user_id, secs_elapsed) in user_ids.into_iter().zip(elapsed) {
            let categories: Vec<Option<String>> = category_columns
                .iter_mut()
                .map(|values| values.next().flatten())
                .collect();

            match user_id {
                Some(user_id) => events.push(SessionEvent {
                    user_id,
                    categories,
                    secs_elapsed,
                }),
                None => discarded += 1,
            }
        }

        if discarded > 0 {
            warn!(discarded, "Session rows without a user id discarded");
        }

        Ok(Self {
            schema,
            events,
            discarded,
        })
    }

    pub fn schema(&self) -> &SessionSchema {
        &self.schema
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Partition the events by user, users in first-seen order
    pub(crate) fn group_by_user(self) -> Vec<UserEvents> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<UserEvents> = Vec::new();

        for event in self.events {
            match index.get(&event.user_id) {
                Some(&i) => groups[i].events.push(event),
                None => {
                    index.insert(event.user_id.clone(), groups.len());
                    groups.push(UserEvents {
                        user_id: event.user_id.clone(),
                        events: vec![event],
                    });
                }
            }
        }

        groups
    }
}
