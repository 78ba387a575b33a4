//! Keyed assembly of user rows and per-user summaries
//!
//! Summaries are joined by user id only, never by position: the
//! [`JoinAssembler`] performs the outer join and the inner restriction used to
//! split the wide table back into train and test rows.

mod assembler;
mod table;

pub use assembler::JoinAssembler;
pub use table::{FeatureSource, FeatureValue, SummaryTable};
