//! Scan configuration types.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ScanError;

/// How far below a scan root the scanner may descend.
///
/// Serialized as the integer `level` used by front ends: any negative value
/// means unlimited, `0` means top level only, `n > 0` caps recursion at `n`
/// directory levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum DepthPolicy {
    /// No depth pruning.
    #[default]
    Unlimited,
    /// Only regular files directly inside a root; subdirectories are never opened.
    TopLevelOnly,
    /// Directories are descended into while their depth is below `n`.
    MaxDepth(u32),
}

impl DepthPolicy {
    /// Map a front-end `level` value onto a policy.
    pub fn from_level(level: i64) -> Self {
        match level {
            l if l < 0 => Self::Unlimited,
            0 => Self::TopLevelOnly,
            n => Self::MaxDepth(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }

    /// The `level` value this policy corresponds to.
    pub fn level(&self) -> i64 {
        match self {
            Self::Unlimited => -1,
            Self::TopLevelOnly => 0,
            Self::MaxDepth(n) => i64::from(*n),
        }
    }

    /// Deepest entry depth the walker may yield, counting the root's own
    /// children as depth 1.
    ///
    /// A file nested inside `n` subdirectories sits at entry depth `n + 1`.
    pub fn max_entry_depth(&self) -> usize {
        match self {
            Self::Unlimited => usize::MAX,
            Self::TopLevelOnly => 1,
            Self::MaxDepth(n) => (*n as usize).saturating_add(1),
        }
    }
}

impl From<i64> for DepthPolicy {
    fn from(level: i64) -> Self {
        Self::from_level(level)
    }
}

impl From<DepthPolicy> for i64 {
    fn from(policy: DepthPolicy) -> Self {
        policy.level()
    }
}

/// Digest used to fingerprint file contents.
///
/// `Crc32` is fast but has a small, known chance of reporting two different
/// files of the same size as equal. Pair it with `verify_bytes` when that
/// matters. `Md5` and `Blake3` make accidental collisions negligible.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DigestAlgorithm {
    #[default]
    Crc32,
    Md5,
    Blake3,
}

/// How files inside a size bucket are compared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum CompareStrategy {
    /// Stream and digest both files of every pair.
    #[default]
    Pairwise,
    /// Digest each file once, then group by digest.
    DigestOnce,
}

/// Configuration for one duplicate search.
///
/// Built once per request and never mutated while the search runs.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root directories to scan.
    ///
    /// May be left out of a config file when roots come from elsewhere;
    /// [`ScanConfig::validate`] rejects a config that ends up with none.
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Directories whose subtrees are skipped.
    #[builder(default)]
    #[serde(default)]
    pub exclude: Vec<PathBuf>,

    /// Recursion depth policy.
    #[builder(default)]
    #[serde(default, rename = "level")]
    pub depth: DepthPolicy,

    /// Smallest file size, in bytes, that is considered.
    #[builder(default = "1")]
    #[serde(default = "default_min_size")]
    pub min_size: u64,

    /// Shell-glob patterns matched against file names. Empty matches everything.
    #[builder(default)]
    #[serde(default)]
    pub masks: Vec<String>,

    /// Match masks without regard to case.
    #[builder(default = "false")]
    #[serde(default)]
    pub case_insensitive: bool,

    /// Bytes read per chunk while digesting.
    #[builder(default = "1024")]
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Digest algorithm.
    #[builder(default)]
    #[serde(default, rename = "algo")]
    pub algorithm: DigestAlgorithm,

    /// Comparison strategy within a size bucket.
    #[builder(default)]
    #[serde(default)]
    pub strategy: CompareStrategy,

    /// Confirm digest matches byte for byte.
    #[builder(default = "false")]
    #[serde(default)]
    pub verify_bytes: bool,
}

fn default_min_size() -> u64 {
    1
}

fn default_block_size() -> usize {
    1024
}

/// Checks shared by the builder and [`ScanConfig::validate`].
fn check_parts(roots: Option<&[PathBuf]>, block_size: usize, masks: &[String]) -> Result<(), String> {
    match roots {
        Some([]) => return Err("At least one root directory is required".to_string()),
        Some(roots) if roots.iter().any(|r| r.as_os_str().is_empty()) => {
            return Err("Root path cannot be empty".to_string());
        }
        None => return Err("Root path is required".to_string()),
        _ => {}
    }

    if block_size == 0 {
        return Err("Block size must be greater than zero".to_string());
    }

    for mask in masks {
        globset::Glob::new(mask).map_err(|e| format!("Invalid mask '{mask}': {e}"))?;
    }

    Ok(())
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        check_parts(
            self.roots.as_deref(),
            self.block_size.unwrap_or_else(default_block_size),
            self.masks.as_deref().unwrap_or_default(),
        )
    }

    /// Set the depth policy from a front-end `level` value.
    pub fn level(&mut self, level: i64) -> &mut Self {
        self.depth = Some(DepthPolicy::from_level(level));
        self
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a config scanning a single root with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
            exclude: Vec::new(),
            depth: DepthPolicy::Unlimited,
            min_size: default_min_size(),
            masks: Vec::new(),
            case_insensitive: false,
            block_size: default_block_size(),
            algorithm: DigestAlgorithm::Crc32,
            strategy: CompareStrategy::Pairwise,
            verify_bytes: false,
        }
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ScanError> {
        let config: Self = toml::from_str(text).map_err(|e| ScanError::InvalidConfig {
            message: e.to_string(),
        })?;
        if config.block_size == 0 {
            return Err(ScanError::InvalidConfig {
                message: "block_size must be greater than zero".to_string(),
            });
        }
        Ok(config)
    }

    /// Apply the builder's checks to a config assembled by hand, e.g. one
    /// loaded from a file and then overridden field by field.
    pub fn validate(&self) -> Result<(), ScanError> {
        check_parts(Some(&self.roots), self.block_size, &self.masks)
            .map_err(|message| ScanError::InvalidConfig { message })
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let text = std::fs::read_to_string(path).map_err(|e| ScanError::io(path, e))?;
        Self::from_toml_str(&text)
    }
}
