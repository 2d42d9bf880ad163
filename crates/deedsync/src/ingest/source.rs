//! Extract files: discovery and record splitting
//!
//! An extract is one text file of records separated by the literal `{EOR}`
//! token. The first record names the tab-separated columns, every later one
//! is a data record.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::config::IngestConfig;
use crate::engine::WorkItem;
use crate::error::LayoutError;

pub const RECORD_SEPARATOR: &str = "{EOR}";
pub const FIELD_SEPARATOR: char = '\t';

const BYTE_ORDER_MARK: char = '\u{feff}';

/// One data record of an extract, not yet decoded
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Label of the extract the record came from
    pub source: Arc<str>,
    /// 1-based position among the data records of its extract
    pub position: usize,
    pub text: String,
}

impl RawRecord {
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.text.split(FIELD_SEPARATOR)
    }
}

impl WorkItem for RawRecord {
    fn identity(&self) -> String {
        format!("{}#{}", self.source, self.position)
    }
}

/// A split extract: the header row and the data records after it
#[derive(Debug, Clone)]
pub struct Extract {
    pub header: String,
    pub records: Vec<RawRecord>,
}

fn strip_line_ends(record: &str) -> &str {
    record
        .trim_start_matches(['\r', '\n'])
        .trim_end_matches(['\r', '\n'])
}

/// Split extract text into its header row and data records.
///
/// Records that are blank once trimmed are dropped before anything else, so
/// a leading blank record never becomes the header. Returns `None` when no
/// record survives.
pub fn split_extract(source: &str, text: &str) -> Option<Extract> {
    let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
    let mut records = text
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
        .map(strip_line_ends);

    let header = records.next()?.to_string();
    let source: Arc<str> = Arc::from(source);
    let records = records
        .enumerate()
        .map(|(index, text)| RawRecord {
            source: Arc::clone(&source),
            position: index + 1,
            text: text.to_string(),
        })
        .collect();

    Some(Extract { header, records })
}

/// Read an extract as text.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected; the
/// affected fields decode as garbage but the rest of the file still loads.
pub async fn read_extract(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read extract {}", path.display()))?;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            warn!(path = %path.display(), "Extract is not valid UTF-8, invalid bytes replaced");
            Ok(String::from_utf8_lossy(err.as_bytes()).into_owned())
        },
    }
}

/// Where the extracts live inside the source root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    pub folder_prefix: String,
    pub nested_folder: String,
    pub header_file: String,
    pub detail_file: String,
}

impl From<&IngestConfig> for SourceLayout {
    fn from(config: &IngestConfig) -> Self {
        Self {
            folder_prefix: config.folder_prefix.clone(),
            nested_folder: config.nested_folder.clone(),
            header_file: config.header_file.clone(),
            detail_file: config.detail_file.clone(),
        }
    }
}

/// One source folder holding both extracts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFolder {
    pub name: String,
    pub header_path: PathBuf,
    pub detail_path: PathBuf,
}

impl SourceFolder {
    /// Report label for a file of this folder, e.g. `WASTP001/WASTP_prime.txt`
    pub fn label(&self, path: &Path) -> String {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        format!("{}/{}", self.name, file)
    }
}

/// Folders found under the source root
#[derive(Debug, Default)]
pub struct Discovery {
    pub sources: Vec<SourceFolder>,
    /// Folders that match the prefix but lack part of the layout
    pub skipped: Vec<(String, LayoutError)>,
}

/// Find every source folder under `root`, sorted by name.
pub fn discover_sources(root: &Path, layout: &SourceLayout) -> std::io::Result<Discovery> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() && name.starts_with(&layout.folder_prefix) {
            candidates.push((name, entry.path()));
        }
    }
    candidates.sort();

    let mut discovery = Discovery::default();
    for (name, path) in candidates {
        let nested = path.join(&layout.nested_folder);
        if !nested.is_dir() {
            discovery.skipped.push((
                name,
                LayoutError::MissingFolder {
                    folder: layout.nested_folder.clone(),
                },
            ));
            continue;
        }

        let header_path = nested.join(&layout.header_file);
        let detail_path = nested.join(&layout.detail_file);
        let missing = [(&header_path, &layout.header_file), (&detail_path, &layout.detail_file)]
            .into_iter()
            .find(|(path, _)| !path.is_file());

        if let Some((_, file)) = missing {
            discovery.skipped.push((
                name,
                LayoutError::MissingFile {
                    folder: layout.nested_folder.clone(),
                    file: file.clone(),
                },
            ));
            continue;
        }

        discovery.sources.push(SourceFolder {
            name,
            header_path,
            detail_path,
        });
    }

    Ok(discovery)
}
