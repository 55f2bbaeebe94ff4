// == Std
use std::fmt::Display;

// == Internal crates
use crate::common::Urn;

// == External crates
use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type SectionSet = EnumSet<Section>;

/// A single permission grant as returned by the backend. The schema is entirely backend-defined, keys keep the order
/// the backend sent them in.
pub type PermissionRecord = serde_json::Map<String, serde_json::Value>;

/// Represents a browsable folder node. Subfolders share the same shape, scoped under their parent's urn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Folder {
    /// The unique identifier of this folder
    urn: Urn,
    /// The display name of this folder
    name: String,
}

impl Folder {
    /// Creates a new Folder with the given urn and display name
    pub fn new(urn: Urn, name: impl Into<String>) -> Self {
        Folder { urn, name: name.into() }
    }

    /// Returns the urn of this folder
    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Returns the display name of this folder
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Drops folders whose urn is blank, logging each one. Such a folder can be listed but never fetched from.
pub fn retain_addressable(folders: Vec<Folder>) -> Vec<Folder> {
    folders
        .into_iter()
        .filter(|folder| {
            let addressable = !folder.urn.is_blank();
            if !addressable {
                tracing::warn!(name = %folder.name, "Dropping folder with a blank urn");
            }
            addressable
        })
        .collect()
}

/// The independently loaded parts of the view
#[derive(Debug, Hash, EnumSetType)]
pub enum Section {
    /// The root folder list
    Folders,
    /// The subfolders of the selected folder
    Subfolders,
    /// The permission records of the selected folder or subfolder
    Permissions,
}

impl Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Section::Folders => write!(f, "folders"),
            Section::Subfolders => write!(f, "subfolders"),
            Section::Permissions => write!(f, "permissions"),
        }
    }
}

/// Tags a request with the selection it was issued for. A response is only adopted when its generation still matches
/// the current one for its section.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    /// Returns the generation following this one
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// The one failure kind the viewer distinguishes. The variants only exist to make logs useful, the view state treats
/// all of them the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request to '{url}' failed: {message}")]
    Transport { url: String, message: String },
    #[error("Request to '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Response from '{url}' could not be decoded: {message}")]
    Decode { url: String, message: String },
    #[error("Mock fixture has no entry for '{0}'")]
    Fixture(String),
    #[error("Fetch task did not complete: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_deserialize() {
        let folders: Vec<Folder> =
            serde_json::from_str(r#"[{"urn": "A", "name": "Root"}, {"name": "Docs", "urn": "B"}]"#).unwrap();

        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].urn(), &Urn::new("A").unwrap());
        assert_eq!(folders[0].name(), "Root");
        assert_eq!(folders[1].name(), "Docs", "Field order in the payload should not matter");
    }

    #[test]
    fn test_blank_urns_are_dropped_individually() {
        let folders: Vec<Folder> = serde_json::from_str(
            r#"[{"urn": " A ", "name": "Padded"}, {"urn": "", "name": "Blank"}, {"urn": "B", "name": "Docs"}]"#,
        )
        .unwrap();
        assert_eq!(folders.len(), 3, "A blank urn should not fail the whole list");

        let folders = retain_addressable(folders);
        let names = folders.iter().map(Folder::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["Padded", "Docs"]);
        assert_eq!(folders[0].urn().as_str(), " A ", "Surviving urns should be untouched");
    }

    #[test]
    fn test_permission_record_preserves_key_order() {
        let record: PermissionRecord =
            serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "middle": 3}"#).unwrap();
        let keys = record.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(keys, vec!["zeta", "alpha", "middle"], "Backend key order should be preserved");
    }

    #[test]
    fn test_generation_ordering() {
        let first = Generation::default();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.value(), 1);
    }
}
