//! Path exclusion and file-name masks.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use dupefind_core::{ScanWarning, WarningKind};

/// Canonicalized set of excluded directories.
///
/// A path is excluded when it equals an excluded directory or lies beneath
/// one. Matching is by whole path components, so `/data/sub` does not
/// exclude `/data/subway`.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    dirs: Vec<PathBuf>,
}

impl ExclusionSet {
    /// Canonicalize the given directories.
    ///
    /// A directory that cannot be canonicalized (usually because it does not
    /// exist) is kept as written, and a warning describes the failure.
    /// Empty entries exclude nothing and are dropped.
    pub fn new<I, P>(dirs: I) -> (Self, Vec<ScanWarning>)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut warnings = Vec::new();
        let dirs = dirs
            .into_iter()
            .filter(|dir| !dir.as_ref().as_os_str().is_empty())
            .map(|dir| {
                let dir = dir.as_ref();
                dir.canonicalize().unwrap_or_else(|err| {
                    warnings.push(ScanWarning::from_io(dir, &err, WarningKind::CanonicalizeError));
                    dir.to_path_buf()
                })
            })
            .collect();
        (Self { dirs }, warnings)
    }

    /// Check whether a canonical path is excluded.
    pub fn is_excluded(&self, canonical: &Path) -> bool {
        self.dirs.iter().any(|dir| canonical.starts_with(dir))
    }

    /// Number of excluded directories.
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    /// Check if nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

/// Compiled file-name masks.
///
/// Masks are shell globs (`*`, `?`, `[abc]`, `{a,b}`) matched against the
/// file name alone. With no masks configured every name matches.
#[derive(Debug, Clone)]
pub struct NameMask {
    set: Option<GlobSet>,
}

impl NameMask {
    /// Compile masks. Masks that fail to compile are skipped with a warning.
    pub fn new(masks: &[String], case_insensitive: bool) -> Self {
        if masks.is_empty() {
            return Self { set: None };
        }

        let mut builder = GlobSetBuilder::new();
        for mask in masks {
            match GlobBuilder::new(mask)
                .case_insensitive(case_insensitive)
                .literal_separator(true)
                .build()
            {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(err) => tracing::warn!(mask = %mask, error = %err, "ignoring invalid mask"),
            }
        }

        let set = builder.build().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "mask set failed to build, no file will match");
            GlobSet::empty()
        });
        Self { set: Some(set) }
    }

    /// A mask that accepts every name.
    pub fn any() -> Self {
        Self { set: None }
    }

    /// Check whether a file name matches at least one mask.
    pub fn matches(&self, file_name: &OsStr) -> bool {
        match &self.set {
            None => true,
            Some(set) => set.is_match(Path::new(file_name)),
        }
    }
}

impl Default for NameMask {
    fn default() -> Self {
        Self::any()
    }
}
