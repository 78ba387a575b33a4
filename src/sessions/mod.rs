//! Per-user session features
//!
//! The session log is partitioned by user id, every user is summarized by the
//! [`SessionAggregator`] and the [`ElapsedTimeSummarizer`] on the
//! [`ParallelDispatcher`]'s pool, and the results come back as two
//! [`SummaryTable`]s keyed by user id.

mod aggregator;
mod dispatch;
mod elapsed;
mod event;

pub use aggregator::{SessionAggregator, SessionSummary};
pub use dispatch::{DispatchStats, ParallelDispatcher};
pub use elapsed::{ElapsedSummary, ElapsedTimeSummarizer};
pub use event::{SessionEvent, SessionLog, SessionSchema};

use crate::config::{AggregationConfig, ParallelConfig};
use crate::error::Result;
use crate::join::SummaryTable;

/// Summary tables produced from one session log
#[derive(Debug, Clone)]
pub struct SessionFeatures {
    pub sessions: SummaryTable,
    pub elapsed: SummaryTable,
    pub stats: DispatchStats,
}

/// Summarize every user of `log` in parallel
pub fn build_session_features(
    log: SessionLog,
    aggregation: &AggregationConfig,
    elapsed_prefix: &str,
    parallel: &ParallelConfig,
) -> Result<SessionFeatures> {
    let aggregator = SessionAggregator::new(aggregation.clone(), log.schema())?;
    let summarizer = ElapsedTimeSummarizer::new(elapsed_prefix);

    let groups: Vec<(String, Vec<SessionEvent>)> = log
        .group_by_user()
        .into_iter()
        .map(|g| (g.user_id, g.events))
        .collect();

    let worker_aggregator = aggregator.clone();
    let worker_summarizer = summarizer.clone();
    let (results, stats) = ParallelDispatcher::new(parallel.clone()).dispatch(
        groups,
        move |user_id, events: &Vec<SessionEvent>| {
            let session = worker_aggregator.aggregate(user_id, events);
            let elapsed =
                worker_summarizer.summarize(user_id, events.iter().map(|e| e.secs_elapsed));
            Ok((session, elapsed))
        },
    )?;

    let mut session_summaries = Vec::with_capacity(results.len());
    let mut elapsed_summaries = Vec::with_capacity(results.len());
    for (user_id, (session, elapsed)) in results {
        session_summaries.push((user_id.clone(), session));
        elapsed_summaries.push((user_id, elapsed));
    }

    Ok(SessionFeatures {
        sessions: SummaryTable::build(&aggregator, session_summaries)?,
        elapsed: SummaryTable::build(&summarizer, elapsed_summaries)?,
        stats,
    })
}
