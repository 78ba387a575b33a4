//! Tabular preprocessing of the user table
//!
//! - Cleaning: unknown markers and implausible ages become missing values
//! - Calendar features split out of the account and activity timestamps
//! - One-hot encoding of the categorical features

mod cleaning;
mod dates;
mod encoder;

pub use cleaning::{CleaningStats, DataCleaner};
pub use dates::{DateFeatures, DateStats, DATE_FIRST_ACTIVE};
pub use encoder::OneHotEncoder;
