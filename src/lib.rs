//! nomad-prep - feature preparation for travel-booking destination prediction
//!
//! Turns the raw user and session tables into wide, classifier-ready tables:
//! - Cleaning of unknown markers, implausible ages and unused columns
//! - Calendar features from the account and activity timestamps
//! - Per-user session summaries computed in parallel and joined by user id
//! - Train/test split, one-hot encoding and CSV checkpoints
//!
//! # Modules
//!
//! - [`config`] - Every path and business rule of a run
//! - [`preprocessing`] - Cleaning, date features, one-hot encoding
//! - [`sessions`] - Session events, per-user aggregation and the worker pool
//! - [`join`] - Summary tables and the keyed outer join
//! - [`pipeline`] - The end-to-end run
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data processing
pub mod preprocessing;
pub mod sessions;
pub mod join;
pub mod pipeline;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{PrepError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{
        AggregationConfig, CleaningConfig, ColumnsConfig, EncodingConfig, ParallelConfig,
        PathsConfig, PipelineConfig,
    };
    pub use crate::error::{PrepError, Result};
    pub use crate::join::{FeatureSource, FeatureValue, JoinAssembler, SummaryTable};
    pub use crate::pipeline::{AssembledTables, Pipeline, PipelineReport};
    pub use crate::preprocessing::{DataCleaner, DateFeatures, OneHotEncoder};
    pub use crate::sessions::{
        build_session_features, ElapsedSummary, ElapsedTimeSummarizer, ParallelDispatcher,
        SessionAggregator, SessionEvent, SessionLog, SessionSummary,
    };
    pub use crate::utils::{DataLoader, DataSaver};
}
