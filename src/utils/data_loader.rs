//! CSV loading and saving

use crate::error::{PrepError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loader for the delimited source tables
pub struct DataLoader {
    /// Rows scanned for type inference (None = whole file)
    infer_schema_length: Option<usize>,
    delimiter: u8,
    /// Columns always read as text, never inferred
    string_columns: Vec<String>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(10_000),
            delimiter: b',',
            string_columns: Vec::new(),
        }
    }

    /// Set the number of rows used for schema inference
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read these columns as text whatever they look like
    ///
    /// Identifiers such as `007` would otherwise be inferred as integers and
    /// lose their leading zeros.
    pub fn with_string_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.string_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Load a CSV file with a header row
    ///
    /// A missing or malformed file is reported with its path; callers treat
    /// this as fatal.
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| PrepError::DataError(format!("cannot open {}: {e}", path.display())))?;

        let header = self.read_header(path)?;
        let overwrite: Schema = self
            .string_columns
            .iter()
            .filter(|name| header.contains(*name))
            .map(|name| (PlSmallStr::from(name.as_str()), DataType::String))
            .collect();

        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_schema_overwrite((!overwrite.is_empty()).then(|| Arc::new(overwrite)))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PrepError::DataError(format!("cannot parse {}: {e}", path.display())))
    }

    /// Get file info without loading full data
    pub fn get_file_info(&self, path: &Path) -> Result<FileInfo> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| PrepError::DataError(format!("cannot stat {}: {e}", path.display())))?;

        let columns = self.read_header(path)?;

        let file = File::open(path)?;
        let mut n_rows = 0usize;
        for line in BufReader::new(file).lines().skip(1) {
            if !line?.trim().is_empty() {
                n_rows += 1;
            }
        }

        Ok(FileInfo {
            path: path.to_path_buf(),
            file_size: metadata.len(),
            n_rows,
            n_cols: columns.len(),
            columns,
        })
    }

    /// Column names of the header row
    fn read_header(&self, path: &Path) -> Result<Vec<String>> {
        let file = File::open(path)
            .map_err(|e| PrepError::DataError(format!("cannot open {}: {e}", path.display())))?;
        let header = BufReader::new(file)
            .lines()
            .next()
            .transpose()?
            .unwrap_or_default();

        if header.trim().is_empty() {
            return Ok(Vec::new());
        }
        let delimiter = self.delimiter as char;
        Ok(header
            .split(delimiter)
            .map(|s| s.trim().trim_matches('"').to_string())
            .collect())
    }
}

/// File information
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<String>,
}

/// Writes output tables
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV, creating the parent directory when needed
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = File::create(path)
            .map_err(|e| PrepError::DataError(format!("cannot create {}: {e}", path.display())))?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(|e| PrepError::DataError(format!("cannot write {}: {e}", path.display())))
    }
}
