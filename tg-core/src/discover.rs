//! Recursive discovery of IDL files.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use tg_cfg::ConfigSet;

use crate::cfgs::{IDL_SUFFIX, TOLERATE_MISSING_IDL_ROOT};
use crate::Error;

/// Finds IDL files underneath a root directory.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Matches file names like `*.thrift`, case-insensitively.
    matcher: GlobMatcher,
    /// Whether a missing or unreadable directory is an error or just empty.
    tolerate_missing_root: bool,
}

impl Discovery {
    /// Create a [`Discovery`] for files ending in `.{suffix}`.
    pub fn new(suffix: &str, tolerate_missing_root: bool) -> Result<Self, Error> {
        let suffix = suffix.trim_start_matches('.');
        // The suffix is a literal extension, never a pattern.
        let matcher = GlobBuilder::new(&format!("*.{}", globset::escape(suffix)))
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map_err(|source| Error::Pattern {
                suffix: suffix.to_string(),
                source,
            })?
            .compile_matcher();

        Ok(Discovery {
            matcher,
            tolerate_missing_root,
        })
    }

    pub fn from_configs(configs: &ConfigSet) -> Result<Self, Error> {
        Discovery::new(
            &IDL_SUFFIX.read(configs),
            TOLERATE_MISSING_IDL_ROOT.read(configs),
        )
    }

    /// Returns true if `path` has a file name that looks like an IDL file.
    pub fn is_idl(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.matcher.is_match(Path::new(name)))
    }

    /// Recursively walk `root` returning every IDL file underneath it.
    ///
    /// Symbolic links to files are followed, symbolic links to directories are not.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>, Error> {
        tracing::info!(?root, "searching through IDL source folder");

        let mut found = Vec::new();
        match fs::metadata(root) {
            Ok(metadata) if metadata.is_dir() => (),
            Ok(_) => return self.unreadable(root, None).map(|()| found),
            Err(err) => return self.unreadable(root, Some(err)).map(|()| found),
        }

        self.walk(root, &mut found)?;
        tracing::debug!(?root, count = found.len(), "discovered IDL files");
        Ok(found)
    }

    fn walk(&self, dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), Error> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => return self.unreadable(dir, Some(err)),
        };
        let mut entries: Vec<_> = match entries.collect::<Result<_, _>>() {
            Ok(entries) => entries,
            Err(err) => return self.unreadable(dir, Some(err)),
        };
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    self.unreadable(&path, Some(err))?;
                    continue;
                }
            };

            if file_type.is_dir() {
                self.walk(&path, found)?;
            } else if file_type.is_file() {
                if self.is_idl(&path) {
                    found.push(path);
                }
            } else if file_type.is_symlink() {
                let target_is_file = fs::metadata(&path).is_ok_and(|meta| meta.is_file());
                if target_is_file && self.is_idl(&path) {
                    found.push(path);
                } else {
                    tracing::debug!(?path, "not following symbolic link");
                }
            }
        }

        Ok(())
    }

    fn unreadable(&self, path: &Path, source: Option<std::io::Error>) -> Result<(), Error> {
        if self.tolerate_missing_root {
            match source {
                Some(err) => tracing::warn!(?path, %err, "skipping unreadable IDL folder"),
                None => tracing::debug!(?path, "no IDL folder"),
            }
            Ok(())
        } else {
            Err(Error::IdlRoot {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}
