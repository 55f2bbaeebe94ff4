//! Reducer-style view state for the folder permissions viewer.
//!
//! A [`ViewState`] is an immutable snapshot. Applying a [`ViewEvent`] yields the next snapshot together with the
//! fetches ([`Effect`]) the caller has to issue. Every subfolder and permission fetch is tagged with the
//! [`Generation`] of the selection it was issued for, and loaded results carrying an older generation are dropped, so
//! a slow response for a previous selection can never overwrite data for the current one.

// == Internal crates
use super::{
    model::{FetchError, Folder, Generation, PermissionRecord, Section, SectionSet},
    table::{ColumnInference, TableSpec},
};
use crate::common::Urn;

/// Everything that can happen to the view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The view was shown for the first time, the root folder list should be loaded
    Mounted,
    /// The user picked a root folder
    FolderSelected(Urn),
    /// The user picked a subfolder of the selected folder
    SubfolderSelected(Urn),
    FoldersLoaded(Result<Vec<Folder>, FetchError>),
    SubfoldersLoaded {
        generation: Generation,
        result: Result<Vec<Folder>, FetchError>,
    },
    PermissionsLoaded {
        generation: Generation,
        result: Result<Vec<PermissionRecord>, FetchError>,
    },
}

/// A fetch the caller must issue. The result is fed back as the matching loaded event with the same generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchFolders,
    FetchSubfolders { urn: Urn, generation: Generation },
    FetchPermissions { urn: Urn, generation: Generation },
}

impl Effect {
    /// The loaded event reporting that this fetch failed
    pub fn failed(self, error: FetchError) -> ViewEvent {
        match self {
            Effect::FetchFolders => ViewEvent::FoldersLoaded(Err(error)),
            Effect::FetchSubfolders { generation, .. } => ViewEvent::SubfoldersLoaded {
                generation,
                result: Err(error),
            },
            Effect::FetchPermissions { generation, .. } => ViewEvent::PermissionsLoaded {
                generation,
                result: Err(error),
            },
        }
    }
}

/// The outcome of applying an event
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: ViewState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &ViewState) -> Self {
        Transition {
            state: state.clone(),
            effects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    mounted: bool,
    folders: Vec<Folder>,
    subfolders: Vec<Folder>,
    /// `None` until permissions for the current selection have loaded
    permissions: Option<Vec<PermissionRecord>>,
    selected_folder: Option<Urn>,
    selected_subfolder: Option<Urn>,
    loading: SectionSet,
    failed: SectionSet,
    subfolder_generation: Generation,
    permission_generation: Generation,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an event, returning the next state and the fetches to issue
    pub fn apply(&self, event: ViewEvent) -> Transition {
        match event {
            ViewEvent::Mounted => self.on_mounted(),
            ViewEvent::FolderSelected(urn) => self.on_folder_selected(urn),
            ViewEvent::SubfolderSelected(urn) => self.on_subfolder_selected(urn),
            ViewEvent::FoldersLoaded(result) => self.on_folders_loaded(result),
            ViewEvent::SubfoldersLoaded { generation, result } => self.on_subfolders_loaded(generation, result),
            ViewEvent::PermissionsLoaded { generation, result } => self.on_permissions_loaded(generation, result),
        }
    }

    fn on_mounted(&self) -> Transition {
        if self.mounted {
            tracing::debug!("View already mounted, folder list is only fetched once");
            return Transition::unchanged(self);
        }

        let mut state = self.clone();
        state.mounted = true;
        state.loading.insert(Section::Folders);
        state.failed.remove(Section::Folders);

        Transition {
            state,
            effects: vec![Effect::FetchFolders],
        }
    }

    fn on_folder_selected(&self, urn: Urn) -> Transition {
        let mut state = self.clone();
        state.selected_folder = Some(urn.clone());
        state.selected_subfolder = None;
        state.subfolders.clear();
        state.permissions = None;
        state.subfolder_generation = self.subfolder_generation.next();
        state.permission_generation = self.permission_generation.next();
        state.loading.insert_all(Section::Subfolders | Section::Permissions);
        state.failed.remove_all(Section::Subfolders | Section::Permissions);

        let effects = vec![
            Effect::FetchSubfolders {
                urn: urn.clone(),
                generation: state.subfolder_generation,
            },
            Effect::FetchPermissions {
                urn,
                generation: state.permission_generation,
            },
        ];

        Transition { state, effects }
    }

    fn on_subfolder_selected(&self, urn: Urn) -> Transition {
        let mut state = self.clone();
        state.selected_subfolder = Some(urn.clone());
        state.permissions = None;
        state.permission_generation = self.permission_generation.next();
        state.loading.insert(Section::Permissions);
        state.failed.remove(Section::Permissions);

        let effects = vec![Effect::FetchPermissions {
            urn,
            generation: state.permission_generation,
        }];

        Transition { state, effects }
    }

    fn on_folders_loaded(&self, result: Result<Vec<Folder>, FetchError>) -> Transition {
        if !self.loading.contains(Section::Folders) {
            tracing::debug!("Ignoring folder list that was not requested");
            return Transition::unchanged(self);
        }

        let mut state = self.clone();
        state.loading.remove(Section::Folders);
        match result {
            Ok(folders) => state.folders = folders,
            Err(error) => {
                tracing::error!(%error, "Failed to load folders");
                state.failed.insert(Section::Folders);
            }
        }

        Transition {
            state,
            effects: Vec::new(),
        }
    }

    fn on_subfolders_loaded(&self, generation: Generation, result: Result<Vec<Folder>, FetchError>) -> Transition {
        if generation != self.subfolder_generation {
            tracing::debug!(
                stale = generation.value(),
                current = self.subfolder_generation.value(),
                "Discarding superseded subfolder response"
            );
            return Transition::unchanged(self);
        }

        let mut state = self.clone();
        state.loading.remove(Section::Subfolders);
        match result {
            Ok(subfolders) => state.subfolders = subfolders,
            Err(error) => {
                tracing::error!(%error, "Failed to load subfolders");
                state.failed.insert(Section::Subfolders);
            }
        }

        Transition {
            state,
            effects: Vec::new(),
        }
    }

    fn on_permissions_loaded(
        &self,
        generation: Generation,
        result: Result<Vec<PermissionRecord>, FetchError>,
    ) -> Transition {
        if generation != self.permission_generation {
            tracing::debug!(
                stale = generation.value(),
                current = self.permission_generation.value(),
                "Discarding superseded permissions response"
            );
            return Transition::unchanged(self);
        }

        let mut state = self.clone();
        state.loading.remove(Section::Permissions);
        match result {
            Ok(permissions) => state.permissions = Some(permissions),
            Err(error) => {
                tracing::error!(%error, "Failed to load permissions");
                state.failed.insert(Section::Permissions);
            }
        }

        Transition {
            state,
            effects: Vec::new(),
        }
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn subfolders(&self) -> &[Folder] {
        &self.subfolders
    }

    pub fn permissions(&self) -> Option<&[PermissionRecord]> {
        self.permissions.as_deref()
    }

    pub fn selected_folder(&self) -> Option<&Urn> {
        self.selected_folder.as_ref()
    }

    pub fn selected_subfolder(&self) -> Option<&Urn> {
        self.selected_subfolder.as_ref()
    }

    /// Returns the node whose permissions are shown, the subfolder if one is selected
    pub fn selected_node(&self) -> Option<&Urn> {
        self.selected_subfolder.as_ref().or(self.selected_folder.as_ref())
    }

    pub fn is_loading(&self, section: Section) -> bool {
        self.loading.contains(section)
    }

    pub fn loading_sections(&self) -> SectionSet {
        self.loading
    }

    /// Sections whose latest fetch failed. They show no data until the next selection refetches them.
    pub fn failed_sections(&self) -> SectionSet {
        self.failed
    }

    /// True when no fetch is outstanding
    pub fn is_idle(&self) -> bool {
        self.loading.is_empty()
    }

    /// Projects the currently loaded permissions into table data
    pub fn table(&self, inference: &ColumnInference) -> TableSpec {
        TableSpec::project_with(self.permissions(), inference)
    }
}
