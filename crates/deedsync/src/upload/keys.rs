//! Flat destination keys with deterministic collision suffixes

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// `<prefix><stem>[_N][.ext]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationKey {
    prefix: String,
    stem: String,
    suffix: Option<usize>,
    extension: Option<String>,
}

impl DestinationKey {
    fn new(prefix: &str, stem: &str, extension: Option<&str>, suffix: Option<usize>) -> Self {
        Self {
            prefix: prefix.to_string(),
            stem: stem.to_string(),
            suffix,
            extension: extension.map(str::to_string),
        }
    }

    /// The key without its prefix
    pub fn name(&self) -> String {
        let mut name = self.stem.clone();
        if let Some(n) = self.suffix {
            name.push_str(&format!("_{n}"));
        }
        if let Some(ext) = &self.extension {
            name.push('.');
            name.push_str(ext);
        }
        name
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.name())
    }
}

/// Assigns flat keys to files in enumeration order.
///
/// The first file with a given base name keeps it; the N-th later one gets
/// `_N` before its extension. Suffixed names that would clash with a key
/// already issued skip ahead to the next free number. Feeding the same
/// paths in the same order always yields the same keys.
#[derive(Debug)]
pub struct KeyAssigner {
    prefix: String,
    seen: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl KeyAssigner {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            seen: HashMap::new(),
            issued: HashSet::new(),
        }
    }

    pub fn assign(&mut self, path: &Path) -> DestinationKey {
        let base = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base_path = Path::new(&base);
        let stem = base_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = base_path.extension().map(|e| e.to_string_lossy().into_owned());

        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;

        let mut key = if *count == 1 {
            DestinationKey::new(&self.prefix, &stem, extension.as_deref(), None)
        } else {
            DestinationKey::new(&self.prefix, &stem, extension.as_deref(), Some(*count))
        };

        while self.issued.contains(&key.to_string()) {
            *count += 1;
            key = DestinationKey::new(&self.prefix, &stem, extension.as_deref(), Some(*count));
        }

        self.issued.insert(key.to_string());
        key
    }
}
