// == Internal crates
use super::model::{FetchError, Folder, PermissionRecord};
use crate::common::Urn;

/// The three read-only endpoints of the folder permissions backend.
///
/// Implementations must be shareable across tasks since the session issues the subfolder and permission fetches for a
/// folder concurrently.
pub trait FolderApi: Send + Sync + 'static {
    /// Fetches the root folder list
    fn fetch_folders(&self) -> impl Future<Output = Result<Vec<Folder>, FetchError>> + Send;

    /// Fetches the direct subfolders of the given node
    fn fetch_subfolders(&self, urn: &Urn) -> impl Future<Output = Result<Vec<Folder>, FetchError>> + Send;

    /// Fetches the permission records of the given node
    fn fetch_permissions(&self, urn: &Urn)
    -> impl Future<Output = Result<Vec<PermissionRecord>, FetchError>> + Send;
}
