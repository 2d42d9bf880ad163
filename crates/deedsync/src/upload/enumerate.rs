//! Upload candidate discovery

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Which files under a folder are upload candidates
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    /// Directory name pruned at any depth (case-insensitive)
    pub excluded_folder: Option<String>,
    /// File extension left out, without the dot (case-insensitive)
    pub excluded_extension: Option<String>,
}

impl FileFilter {
    fn prunes(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && matches_ignore_case(Some(entry.file_name()), self.excluded_folder.as_deref())
    }

    fn accepts_file(&self, path: &Path) -> bool {
        !matches_ignore_case(path.extension(), self.excluded_extension.as_deref())
    }
}

fn matches_ignore_case(name: Option<&OsStr>, pattern: Option<&str>) -> bool {
    match (name, pattern) {
        (Some(name), Some(pattern)) => name.to_string_lossy().eq_ignore_ascii_case(pattern),
        _ => false,
    }
}

/// Result of walking one folder
#[derive(Debug, Default)]
pub struct Listing {
    pub files: Vec<PathBuf>,
    /// Entries the walk could not read, with the error text
    pub unreadable: Vec<(PathBuf, String)>,
}

/// Immediate subdirectories of `root`, sorted by name.
pub fn discover_folders(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut folders = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            folders.push(entry.path());
        }
    }
    folders.sort();
    Ok(folders)
}

/// Every file under `dir` the filter accepts, each exactly once.
///
/// Depth-first; inside a directory its files come before its
/// subdirectories, both sorted by name.
pub fn enumerate_files(dir: &Path, filter: &FileFilter) -> Listing {
    let mut listing = Listing::default();

    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by(files_first)
        .into_iter()
        .filter_entry(|entry| !filter.prunes(entry));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if filter.accepts_file(entry.path()) {
                    listing.files.push(entry.into_path());
                }
            },
            Ok(_) => {},
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                warn!(path = %path.display(), error = %err, "Unreadable entry during walk");
                listing.unreadable.push((path, err.to_string()));
            },
        }
    }

    listing
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}
