//! Structural problems with a source tree
//!
//! These never abort a run. The affected folder or file is reported as
//! skipped and the run moves on.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("'{folder}' subfolder not found")]
    MissingFolder { folder: String },

    #[error("'{file}' not found in '{folder}'")]
    MissingFile { folder: String, file: String },

    #[error("header row has no '{column}' column")]
    MissingColumn { column: String },
}
