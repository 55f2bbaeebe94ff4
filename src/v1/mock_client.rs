// == Std
use std::{
    collections::{BTreeMap, HashMap},
    ops::Range,
    path::{Path, PathBuf},
    time::Duration,
};

// == Internal crates
use super::{
    client::FolderApi,
    model::{FetchError, Folder, PermissionRecord, retain_addressable},
};
use crate::common::Urn;

// == External crates
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum MockFixtureError {
    #[error("Failed to read mock fixture '{path}': {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse mock fixture '{path}': {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

/// The complete data set served by [`MockFolderApi`], in the same shapes the backend returns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockFixture {
    /// The root folder list
    #[serde(default)]
    pub folders: Vec<Folder>,
    /// Subfolders keyed by parent urn
    #[serde(default)]
    pub subfolders: BTreeMap<Urn, Vec<Folder>>,
    /// Permission records keyed by node urn
    #[serde(default)]
    pub permissions: BTreeMap<Urn, Vec<PermissionRecord>>,
}

impl MockFixture {
    /// Reads a fixture from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MockFixtureError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|source| MockFixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| MockFixtureError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A node is known if it appears as a root folder, a subfolder, or a key of either map
    fn is_known(&self, urn: &Urn) -> bool {
        self.subfolders.contains_key(urn)
            || self.permissions.contains_key(urn)
            || self
                .folders
                .iter()
                .chain(self.subfolders.values().flatten())
                .any(|folder| folder.urn() == urn)
    }
}

/// Serves a [`MockFixture`] with simulated request latency.
///
/// Known nodes without an explicit entry are treated as having no subfolders and no permissions. Unknown urns fail,
/// which is the closest equivalent to a backend error.
pub struct MockFolderApi {
    fixture: MockFixture,
    /// Simulated latency range for requests, in milliseconds, each request will be delayed by a random number of
    /// milliseconds within this range
    request_latency_range_ms: Range<u32>,
    /// Fixed latency for requests about specific nodes, takes precedence over the random range
    latency_overrides: HashMap<Urn, Duration>,
}

impl MockFolderApi {
    pub fn new(fixture: MockFixture, request_latency_range_ms: Range<u32>) -> Self {
        MockFolderApi {
            fixture,
            request_latency_range_ms,
            latency_overrides: HashMap::new(),
        }
    }

    /// Makes every request about the given node take exactly `latency`
    pub fn with_latency_for(mut self, urn: Urn, latency: Duration) -> Self {
        self.latency_overrides.insert(urn, latency);
        self
    }

    async fn delay(&self, urn: Option<&Urn>) {
        let delay = match urn.and_then(|urn| self.latency_overrides.get(urn)) {
            Some(latency) => *latency,
            None if self.request_latency_range_ms.is_empty() => Duration::ZERO,
            None => Duration::from_millis(rand::random_range(self.request_latency_range_ms.clone()) as u64),
        };
        if !delay.is_zero() {
            tracing::trace!(?delay, "MockFolderApi delaying request");
        }
        sleep(delay).await;
    }
}

impl FolderApi for MockFolderApi {
    async fn fetch_folders(&self) -> Result<Vec<Folder>, FetchError> {
        self.delay(None).await;
        Ok(retain_addressable(self.fixture.folders.clone()))
    }

    async fn fetch_subfolders(&self, urn: &Urn) -> Result<Vec<Folder>, FetchError> {
        self.delay(Some(urn)).await;

        match self.fixture.subfolders.get(urn) {
            Some(subfolders) => Ok(retain_addressable(subfolders.clone())),
            None if self.fixture.is_known(urn) => Ok(Vec::new()),
            None => Err(FetchError::Fixture(urn.to_string())),
        }
    }

    async fn fetch_permissions(&self, urn: &Urn) -> Result<Vec<PermissionRecord>, FetchError> {
        self.delay(Some(urn)).await;

        match self.fixture.permissions.get(urn) {
            Some(permissions) => Ok(permissions.clone()),
            None if self.fixture.is_known(urn) => Ok(Vec::new()),
            None => Err(FetchError::Fixture(urn.to_string())),
        }
    }
}
