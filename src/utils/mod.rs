//! Utility functions and types

pub mod data_loader;
pub mod frame;

pub use data_loader::{DataLoader, DataSaver, FileInfo};
pub use frame::{
    f64_values, has_column, stack_aligned, string_column_names, string_values,
    with_leading_column,
};
