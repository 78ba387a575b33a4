//! The end-to-end preparation run
//!
//! load → clean → date features → per-user session features (parallel) →
//! outer join → train/test restriction → checkpoint → drop dates → one-hot
//! encoding → train/test restriction → checkpoint

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::join::JoinAssembler;
use crate::preprocessing::{CleaningStats, DataCleaner, DateFeatures, DateStats, OneHotEncoder};
use crate::sessions::{build_session_features, DispatchStats, SessionLog};
use crate::utils::{has_column, stack_aligned, with_leading_column, DataLoader, DataSaver};
use polars::prelude::*;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// A table written by the run
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// What a run did
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub train_users: usize,
    pub test_users: usize,
    pub session_events: usize,
    /// Session rows dropped for lacking a user id
    pub discarded_events: usize,
    pub session_users: usize,
    /// Users seen in sessions but in neither user table
    pub session_only_users: usize,
    pub user_cleaning: CleaningStats,
    pub session_cleaning: CleaningStats,
    pub dates: DateStats,
    pub dispatch: DispatchStats,
    pub outputs: Vec<OutputFile>,
    pub elapsed: Duration,
}

/// Tables produced by [`Pipeline::assemble`], before anything is written
#[derive(Debug, Clone)]
pub struct AssembledTables {
    /// Outer join of all users and all session users
    pub wide: DataFrame,
    pub processed_train: DataFrame,
    pub processed_test: DataFrame,
    pub encoded_train: DataFrame,
    pub encoded_test: DataFrame,
    pub report: PipelineReport,
}

/// Runs the preparation described by a [`PipelineConfig`]
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage and write the four output tables
    pub fn run(&self) -> Result<PipelineReport> {
        let start = Instant::now();
        let mut tables = self.assemble()?;
        let paths = &self.config.paths;

        let outputs = [
            (&mut tables.processed_train, &paths.processed_train_file),
            (&mut tables.processed_test, &paths.processed_test_file),
            (&mut tables.encoded_train, &paths.encoded_train_file),
            (&mut tables.encoded_test, &paths.encoded_test_file),
        ];

        for (df, file_name) in outputs {
            let path = paths.output_path(file_name);
            DataSaver::save_csv(df, &path)?;
            info!(path = %path.display(), rows = df.height(), columns = df.width(), "Wrote table");
            tables.report.outputs.push(OutputFile {
                path,
                rows: df.height(),
                columns: df.width(),
            });
        }

        tables.report.elapsed = start.elapsed();
        Ok(tables.report)
    }

    /// Run every stage in memory
    pub fn assemble(&self) -> Result<AssembledTables> {
        let config = &self.config;
        let columns = &config.columns;
        let mut report = PipelineReport::default();

        // All sources are read before any work so a bad file aborts early
        // Ids are opaque text; `007` must not be read as the number 7
        let loader = DataLoader::new()
            .with_infer_schema_length(config.csv.infer_schema_length)
            .with_delimiter(config.csv.delimiter as u8)
            .with_string_columns([columns.id.as_str(), columns.session_user.as_str()]);
        let train = loader.load_csv(&config.paths.train_users_path())?;
        let test = loader.load_csv(&config.paths.test_users_path())?;
        let sessions = loader.load_csv(&config.paths.sessions_path())?;
        info!(
            train = train.height(),
            test = test.height(),
            sessions = sessions.height(),
            "Loaded source tables"
        );

        let assembler = JoinAssembler::new(columns.id.clone());
        let train_ids = assembler.user_ids(&train)?;
        let test_ids = assembler.user_ids(&test)?;
        report.train_users = train_ids.len();
        report.test_users = test_ids.len();

        let cleaner = DataCleaner::new(config.cleaning.clone());
        let (mut users, user_cleaning) = cleaner.clean_users(stack_aligned(&train, &test)?)?;
        report.user_cleaning = user_cleaning;
        report.dates = DateFeatures::new(columns).apply(&mut users)?;

        let (sessions, session_cleaning) = cleaner.clean_sessions(sessions)?;
        report.session_cleaning = session_cleaning;
        let log = SessionLog::from_frame(&sessions, columns, &config.aggregation)?;
        drop(sessions);
        report.session_events = log.len();
        report.discarded_events = log.discarded();

        let features =
            build_session_features(log, &config.aggregation, &columns.elapsed, &config.parallel)?;
        report.session_users = features.stats.users;
        report.dispatch = features.stats.clone();

        let wide = assembler.outer_join(&users, &[&features.sessions, &features.elapsed])?;
        report.session_only_users = wide.height() - users.height();
        info!(
            rows = wide.height(),
            columns = wide.width(),
            session_only = report.session_only_users,
            "Joined session features"
        );

        let processed_train = self.split(&assembler, &wide, &train_ids, false)?;
        let processed_test = self.split(&assembler, &wide, &test_ids, true)?;

        let mut encodable = wide.clone();
        for name in &config.encoding.drop_columns {
            if has_column(&encodable, name) {
                encodable = encodable.drop(name)?;
            }
        }
        let encoded =
            OneHotEncoder::new().fit_transform(&encodable, &config.encoding.categorical_features)?;
        info!(columns = encoded.width(), "Encoded categorical features");

        let encoded_train = self.split(&assembler, &encoded, &train_ids, false)?;
        let encoded_test = self.split(&assembler, &encoded, &test_ids, true)?;

        Ok(AssembledTables {
            wide,
            processed_train,
            processed_test,
            encoded_train,
            encoded_test,
            report,
        })
    }

    /// Restrict to one split, id first; the test split loses the label
    fn split(
        &self,
        assembler: &JoinAssembler,
        df: &DataFrame,
        ids: &[String],
        drop_target: bool,
    ) -> Result<DataFrame> {
        let mut part = assembler.restrict(df, ids)?;
        let target = &self.config.columns.target;
        if drop_target && has_column(&part, target) {
            part = part.drop(target)?;
        }
        with_leading_column(&part, assembler.id_column())
    }
}
