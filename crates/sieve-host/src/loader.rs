//! Filter list loading
//!
//! A list that does not exist contributes nothing. Any other read failure is
//! reported, and the remaining lists still load.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sieve_compiler::{IndexBuilder, ParseStats};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read filter list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read one list. `Ok(None)` when the file does not exist.
pub fn read_list(path: &Path) -> Result<Option<String>, LoadError> {
    match std::fs::read(path) {
        // Lists in the wild are not always valid UTF-8
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log::info!("filter list {} not found, skipping", path.display());
            Ok(None)
        }
        Err(source) => Err(LoadError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Lists read into a builder, plus what went wrong along the way.
#[derive(Debug, Default)]
pub struct LoadedLists {
    pub builder: IndexBuilder,
    pub parse: ParseStats,
    pub loaded: usize,
    pub missing: usize,
    pub errors: Vec<LoadError>,
}

impl LoadedLists {
    /// True when lists were configured and every one of them failed to read.
    pub fn all_failed(&self) -> bool {
        !self.errors.is_empty() && self.loaded == 0 && self.missing == 0
    }
}

pub fn load_lists<P: AsRef<Path>>(paths: &[P]) -> LoadedLists {
    let mut loaded = LoadedLists::default();

    for path in paths {
        let path = path.as_ref();
        match read_list(path) {
            Ok(Some(text)) => {
                let stats = loaded.builder.add_list(&text);
                log::info!(
                    "loaded {}: {} rules, {} exceptions, {} skipped lines",
                    path.display(),
                    stats.rules,
                    stats.exceptions,
                    stats.errors
                );
                loaded.parse.merge(&stats);
                loaded.loaded += 1;
            }
            Ok(None) => loaded.missing += 1,
            Err(err) => {
                log::warn!("{err}");
                loaded.errors.push(err);
            }
        }
    }

    loaded
}
