//! Endpoint and dataset configuration
//!
//! The archive URL map, the object-store endpoint and the known dataset splits
//! are plain data in [`ToolkitConfig`]. Callers build one (usually via
//! [`ToolkitConfig::default`]) and hand it to the downloaders, which keeps the
//! network surface swappable in tests.

use crate::errors::{EarthNetError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Base URL the default archive map is built from
pub const DEFAULT_ARCHIVE_BASE_URL: &str = "https://s3.bgc-jena.mpg.de:9000/earthnet/earthnet2021";

/// Anonymous S3 endpoint hosting the EarthNet buckets
pub const DEFAULT_ENDPOINT: &str = "https://s3.bgc-jena.mpg.de:9000";

/// Dataset served by the object store when none is named
pub const DEFAULT_DATASET: &str = "earthnet2021x";

/// A named partition of an EarthNet dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Iid,
    Ood,
    Extreme,
    Seasonal,
}

impl Split {
    /// Every split, in download order
    pub const ALL: [Split; 5] = [
        Split::Train,
        Split::Iid,
        Split::Ood,
        Split::Extreme,
        Split::Seasonal,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Iid => "iid",
            Split::Ood => "ood",
            Split::Extreme => "extreme",
            Split::Seasonal => "seasonal",
        }
    }

    /// Tarball name the split is published under
    #[must_use]
    pub const fn archive_filename(self) -> &'static str {
        match self {
            Split::Train => "train.tar.gz",
            Split::Iid => "iid_test.tar.gz",
            Split::Ood => "ood_test.tar.gz",
            Split::Extreme => "extreme_test.tar.gz",
            Split::Seasonal => "seasonal_test.tar.gz",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = EarthNetError;

    fn from_str(s: &str) -> Result<Self> {
        Split::ALL
            .into_iter()
            .find(|split| split.as_str() == s)
            .ok_or_else(|| EarthNetError::InvalidSplit {
                split: s.to_string(),
                expected: Split::ALL.map(Split::as_str).join(", "),
            })
    }
}

/// Which splits an archive download covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitSelection {
    All,
    Only(Vec<Split>),
}

impl SplitSelection {
    /// Resolve the selection into concrete splits, preserving the requested order
    #[must_use]
    pub fn splits(&self) -> Vec<Split> {
        match self {
            SplitSelection::All => Split::ALL.to_vec(),
            SplitSelection::Only(splits) => {
                let mut seen = Vec::with_capacity(splits.len());
                for split in splits {
                    if !seen.contains(split) {
                        seen.push(*split);
                    }
                }
                seen
            }
        }
    }
}

impl FromStr for SplitSelection {
    type Err = EarthNetError;

    /// Parses `"all"` or a comma separated list such as `"train,iid"`
    fn from_str(s: &str) -> Result<Self> {
        if s.trim() == "all" {
            return Ok(SplitSelection::All);
        }
        let splits = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Split::from_str)
            .collect::<Result<Vec<_>>>()?;
        Ok(SplitSelection::Only(splits))
    }
}

/// Where a split's tarball lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSource {
    pub url: String,
    pub filename: String,
}

/// Connection settings for the anonymous object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    /// S3-compatible endpoint URL
    pub endpoint: String,
    /// Region name the endpoint expects
    pub region: String,
    /// Bucket holding the `{dataset}/{split}/{region}/{id}.nc` keys
    pub bucket: String,
    /// Allow plain HTTP endpoints (local mocks)
    pub allow_http: bool,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: "thuringia".to_string(),
            bucket: "earthnet".to_string(),
            allow_http: false,
        }
    }
}

/// Toolkit-wide configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub archives: BTreeMap<Split, ArchiveSource>,
    pub object_store: ObjectStoreConfig,
    pub datasets: BTreeMap<String, Vec<String>>,
    /// HTTP proxy for object-store traffic
    pub proxy: Option<String>,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            archives: archive_map(DEFAULT_ARCHIVE_BASE_URL),
            object_store: ObjectStoreConfig::default(),
            datasets: BTreeMap::from([(
                DEFAULT_DATASET.to_string(),
                Split::ALL.iter().map(|s| s.to_string()).collect(),
            )]),
            proxy: None,
        }
    }
}

impl ToolkitConfig {
    /// Load a configuration file; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Replace the archive map with one rooted at `base_url`
    #[must_use]
    pub fn with_archive_base_url(mut self, base_url: &str) -> Self {
        self.archives = archive_map(base_url);
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        if proxy.is_some() {
            self.proxy = proxy;
        }
        self
    }

    /// Look up the archive for a split
    pub fn archive(&self, split: Split) -> Result<&ArchiveSource> {
        self.archives
            .get(&split)
            .ok_or_else(|| EarthNetError::InvalidSplit {
                split: split.to_string(),
                expected: self
                    .archives
                    .keys()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Splits of a dataset, failing on unknown datasets
    pub fn dataset_splits(&self, dataset: &str) -> Result<&[String]> {
        self.datasets
            .get(dataset)
            .map(Vec::as_slice)
            .ok_or_else(|| EarthNetError::UnknownDataset {
                dataset: dataset.to_string(),
            })
    }
}

fn archive_map(base_url: &str) -> BTreeMap<Split, ArchiveSource> {
    let base = base_url.trim_end_matches('/');
    Split::ALL
        .into_iter()
        .map(|split| {
            let filename = split.archive_filename().to_string();
            let url = format!("{base}/{filename}");
            (split, ArchiveSource { url, filename })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_split_selection() {
        assert_eq!("all".parse::<SplitSelection>().unwrap(), SplitSelection::All);
        assert_eq!(
            "train, iid,train".parse::<SplitSelection>().unwrap().splits(),
            vec![Split::Train, Split::Iid]
        );
        assert!(matches!(
            "train,test".parse::<SplitSelection>(),
            Err(EarthNetError::InvalidSplit { split, .. }) if split == "test"
        ));
    }

    #[test]
    fn default_archive_map_covers_every_split() {
        let config = ToolkitConfig::default().with_archive_base_url("http://localhost:8000/");
        for split in Split::ALL {
            let source = config.archive(split).unwrap();
            assert_eq!(source.filename, split.archive_filename());
            assert_eq!(
                source.url,
                format!("http://localhost:8000/{}", split.archive_filename())
            );
        }
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ToolkitConfig =
            serde_json::from_str(r#"{"proxy": "http://proxy:3128"}"#).unwrap();
        assert_eq!(config.proxy.as_deref(), Some("http://proxy:3128"));
        assert_eq!(config.object_store, ObjectStoreConfig::default());
        assert_eq!(config.dataset_splits(DEFAULT_DATASET).unwrap().len(), 5);
    }
}
