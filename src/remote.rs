//! Access to minicubes hosted on the EarthNet object store
//!
//! Objects are laid out as `{dataset}/{split}/{region}/{id}.nc` inside the
//! configured bucket and are readable anonymously. [`RemoteStore`] wraps any
//! [`ObjectStore`] and drives it from a private current-thread runtime, so
//! the public surface stays synchronous.

use crate::config::{ObjectStoreConfig, ToolkitConfig};
use crate::errors::{EarthNetError, Result};
use crate::minicube::Minicube;
use crate::progress;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument, warn};

/// Split argument that expands to every split of a dataset
pub const ALL_SPLITS: &str = "all";

/// Blocking facade over an object store
pub struct RemoteStore {
    store: Arc<dyn ObjectStore>,
    runtime: Runtime,
}

impl RemoteStore {
    /// Anonymous S3 client for the configured endpoint
    pub fn new(config: &ToolkitConfig) -> Result<Self> {
        let store = anonymous_s3(&config.object_store, config.proxy.as_deref())?;
        Self::from_store(Arc::new(store))
    }

    /// Wrap an existing store (an in-memory one in tests)
    pub fn from_store(store: Arc<dyn ObjectStore>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { store, runtime })
    }

    /// Every key below `prefix`, sorted
    pub fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = ObjectPath::from(prefix);
        let mut keys: Vec<String> = self.runtime.block_on(async {
            self.store
                .list(Some(&prefix))
                .map_ok(|meta| meta.location.to_string())
                .try_collect()
                .await
        })?;
        keys.sort();
        Ok(keys)
    }

    /// Read one object fully into memory
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let location = ObjectPath::from(key);
        let bytes = self.runtime.block_on(async {
            let result = self.store.get(&location).await?;
            result.bytes().await
        })?;
        debug!(size = bytes.len(), "Read object {key}");
        Ok(bytes.to_vec())
    }

    /// Stream one object into a local file
    fn copy_to(&self, key: &str, destination: &Path) -> Result<u64> {
        let location = ObjectPath::from(key);
        let mut file = File::create(destination)?;
        self.runtime.block_on(async {
            let mut stream = self.store.get(&location).await?.into_stream();
            let mut written = 0_u64;
            while let Some(chunk) = stream.try_next().await? {
                file.write_all(&chunk)?;
                written += chunk.len() as u64;
            }
            Ok::<_, EarthNetError>(written)
        })
    }

    /// Mirror a dataset split into `save_directory`
    ///
    /// `split` may be [`ALL_SPLITS`]. At most `limit` objects are copied per
    /// split; a limit of zero means no limit. Existing local files are
    /// overwritten, there is no resume.
    #[instrument(skip(self, config, save_directory))]
    pub fn download(
        &self,
        config: &ToolkitConfig,
        dataset: &str,
        split: &str,
        save_directory: &Path,
        limit: Option<usize>,
    ) -> Result<Vec<PathBuf>> {
        let splits = config.dataset_splits(dataset)?;

        if split == ALL_SPLITS {
            let mut saved = Vec::new();
            for split in splits {
                saved.extend(self.download_split(dataset, split, save_directory, limit)?);
            }
            return Ok(saved);
        }

        if !splits.iter().any(|s| s == split) {
            return Err(EarthNetError::InvalidSplit {
                split: split.to_string(),
                expected: splits.join(", "),
            });
        }
        self.download_split(dataset, split, save_directory, limit)
    }

    fn download_split(
        &self,
        dataset: &str,
        split: &str,
        save_directory: &Path,
        limit: Option<usize>,
    ) -> Result<Vec<PathBuf>> {
        info!("Finding files of {dataset}, split {split} to download");
        let mut keys = self.list(&format!("{dataset}/{split}"))?;
        if let Some(limit) = limit.filter(|&l| l > 0) {
            keys.truncate(limit);
        }

        info!("Downloading {} files of {dataset}, split {split}", keys.len());
        let bar = progress::items_bar(keys.len() as u64, split, true);
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            let destination = save_directory.join(&key);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            self.copy_to(&key, &destination)?;
            saved.push(destination);
            bar.inc(1);
        }
        bar.finish();
        info!("Downloaded {dataset}, split {split}");

        Ok(saved)
    }

    /// Key of the first `{id}.nc` anywhere below `{dataset}/{split}`
    ///
    /// Keys are compared in sorted order, so the lexicographically first
    /// region wins when an id appears more than once.
    pub fn find_minicube(&self, dataset: &str, split: &str, id: &str) -> Result<String> {
        let prefix = format!("{dataset}/{split}");
        let filename = format!("{id}.nc");
        info!("Searching for {id}");

        let matches: Vec<String> = self
            .list(&prefix)?
            .into_iter()
            .filter(|key| key.rsplit('/').next() == Some(filename.as_str()))
            .collect();

        if matches.len() > 1 {
            warn!("Minicube {id} found in several regions, using the first: {matches:?}");
        }
        let key = matches
            .into_iter()
            .next()
            .ok_or(EarthNetError::MinicubeNotFound {
                id: id.to_string(),
                prefix,
            })?;
        info!("Found {id} at {key}");
        Ok(key)
    }

    /// Open a remote minicube as an in-memory labeled dataset
    pub fn load_minicube(
        &self,
        dataset: &str,
        split: &str,
        id: &str,
        region: Option<&str>,
    ) -> Result<Minicube> {
        let key = match region {
            Some(region) => format!("{dataset}/{split}/{region}/{id}.nc"),
            None => self.find_minicube(dataset, split, id)?,
        };

        let bytes = self.get(&key)?;
        let mut scratch = tempfile::Builder::new().suffix(".nc").tempfile()?;
        scratch.write_all(&bytes)?;
        scratch.flush()?;

        Minicube::from_netcdf(scratch.path())
    }
}

fn anonymous_s3(config: &ObjectStoreConfig, proxy: Option<&str>) -> Result<impl ObjectStore> {
    let mut options = ClientOptions::new().with_allow_http(config.allow_http);
    if let Some(proxy) = proxy {
        options = options.with_proxy_url(proxy);
    }

    let store = AmazonS3Builder::new()
        .with_endpoint(&config.endpoint)
        .with_region(&config.region)
        .with_bucket_name(&config.bucket)
        .with_skip_signature(true)
        .with_client_options(options)
        .build()?;
    Ok(store)
}
