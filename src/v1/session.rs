// == Std
use std::{collections::HashMap, sync::Arc};

// == Internal crates
use super::{
    client::FolderApi,
    model::FetchError,
    state::{Effect, ViewEvent, ViewState},
};
use crate::common::Urn;

// == External crates
use tokio::task::{Id, JoinSet};

/// Drives a [`ViewState`] against a [`FolderApi`].
///
/// The session is the only writer of the view state. User events are applied immediately, and every fetch they require
/// is spawned as its own task. Completions are applied one at a time through [`Session::next_update`], so fetches
/// overlap freely while state transitions stay sequential. A task that panics or is cancelled is reported as a failed
/// fetch of its section.
///
/// Spawning requires a tokio runtime, so all mutating methods must be called from within one.
pub struct Session<A: FolderApi> {
    api: Arc<A>,
    state: ViewState,
    /// Spawned fetches whose result has not been applied yet, including superseded ones
    tasks: JoinSet<ViewEvent>,
    /// The effect each task runs, to report it as failed if the task does not complete
    effects: HashMap<Id, Effect>,
}

impl<A: FolderApi> Session<A> {
    pub fn new(api: Arc<A>) -> Self {
        Session {
            api,
            state: ViewState::new(),
            tasks: JoinSet::new(),
            effects: HashMap::new(),
        }
    }

    /// Returns the current view state snapshot
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Loads the root folder list. Only the first call has any effect.
    pub fn mount(&mut self) {
        self.dispatch(ViewEvent::Mounted);
    }

    /// Selects a root folder, clearing subfolders and permissions and fetching both for the new folder
    pub fn select_folder(&mut self, urn: Urn) {
        tracing::info!(%urn, "Folder selected");
        self.dispatch(ViewEvent::FolderSelected(urn));
    }

    /// Selects a subfolder, clearing permissions and fetching them for the subfolder
    pub fn select_subfolder(&mut self, urn: Urn) {
        tracing::info!(%urn, "Subfolder selected");
        self.dispatch(ViewEvent::SubfolderSelected(urn));
    }

    /// Number of spawned fetches whose results have not been applied yet
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for the next fetch to complete and applies its result. Returns false without waiting if nothing is in
    /// flight.
    ///
    /// Cancel safe: if the returned future is dropped before completing, no result is lost.
    pub async fn next_update(&mut self) -> bool {
        let event = match self.tasks.join_next_with_id().await {
            None => return false,
            Some(Ok((id, event))) => {
                self.effects.remove(&id);
                event
            }
            Some(Err(error)) => {
                let Some(effect) = self.effects.remove(&error.id()) else {
                    tracing::error!(%error, "Unknown fetch task ended");
                    return true;
                };
                tracing::error!(%error, ?effect, "Fetch task did not complete");
                effect.failed(FetchError::Task(error.to_string()))
            }
        };

        self.dispatch(event);
        true
    }

    /// Applies completions until no section of the current selection is loading. Superseded fetches may still be in
    /// flight afterwards.
    pub async fn settle(&mut self) {
        while !self.state.is_idle() {
            if !self.next_update().await {
                break;
            }
        }
    }

    /// Applies completions until every spawned fetch has reported back
    pub async fn drain(&mut self) {
        while self.next_update().await {}
    }

    fn dispatch(&mut self, event: ViewEvent) {
        let transition = self.state.apply(event);
        self.state = transition.state;
        for effect in transition.effects {
            self.spawn(effect);
        }
    }

    fn spawn(&mut self, effect: Effect) {
        let api = Arc::clone(&self.api);
        let task = effect.clone();

        let handle = self.tasks.spawn(async move {
            match task {
                Effect::FetchFolders => ViewEvent::FoldersLoaded(api.fetch_folders().await),
                Effect::FetchSubfolders { urn, generation } => ViewEvent::SubfoldersLoaded {
                    generation,
                    result: api.fetch_subfolders(&urn).await,
                },
                Effect::FetchPermissions { urn, generation } => ViewEvent::PermissionsLoaded {
                    generation,
                    result: api.fetch_permissions(&urn).await,
                },
            }
        });
        self.effects.insert(handle.id(), effect);
    }
}

#[cfg(all(test, feature = "mock_client"))]
mod tests {
    use super::*;
    use crate::v1::{
        client::FolderApi,
        mock_client::{MockFixture, MockFolderApi},
        model::{Folder, PermissionRecord, Section},
        table::ColumnInference,
    };
    use serde_json::json;
    use std::time::Duration;

    fn urn(value: &str) -> Urn {
        Urn::new(value).unwrap()
    }

    fn fixture() -> MockFixture {
        serde_json::from_value(json!({
            "folders": [{"urn": "A", "name": "Root"}, {"urn": "B", "name": "Shared"}],
            "subfolders": {
                "A": [{"urn": "A1", "name": "Plans"}],
                "B": []
            },
            "permissions": {
                "A": [{"autodeskId": "x", "role": "viewer", "subjectId": "y"}],
                "A1": [{"name": "Ana", "role": "editor"}],
                "B": [{"name": "Team", "role": "admin"}]
            }
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_browse_flow() {
        let api = Arc::new(MockFolderApi::new(fixture(), 0..1));
        let mut session = Session::new(api);

        session.mount();
        assert!(session.state().is_loading(Section::Folders));
        session.settle().await;
        assert_eq!(session.state().folders().len(), 2);

        session.select_folder(urn("A"));
        assert!(session.state().subfolders().is_empty(), "Subfolders should be cleared immediately");
        assert!(session.state().permissions().is_none(), "Permissions should be cleared immediately");
        assert_eq!(session.in_flight(), 2, "Subfolder and permission fetches should run concurrently");
        session.settle().await;

        assert_eq!(session.state().subfolders()[0].name(), "Plans");
        let table = session.state().table(&ColumnInference::FirstRecord);
        assert_eq!(
            serde_json::to_value(&table).unwrap(),
            json!({
                "columns": [{"title": "role", "dataIndex": "role", "key": "role"}],
                "rows": [{"key": 0, "role": "viewer"}],
            })
        );

        session.select_subfolder(urn("A1"));
        assert_eq!(session.in_flight(), 1);
        session.settle().await;
        let table = session.state().table(&ColumnInference::FirstRecord);
        assert_eq!(table.rows()[0].get("name"), Some(&json!("Ana")));
        assert_eq!(session.state().subfolders().len(), 1, "Subfolders should survive a subfolder selection");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_response_for_previous_folder_is_discarded() {
        let api = MockFolderApi::new(fixture(), 0..1).with_latency_for(urn("A"), Duration::from_secs(5));
        let mut session = Session::new(Arc::new(api));

        session.select_folder(urn("A"));
        session.select_folder(urn("B"));
        session.settle().await;
        assert_eq!(session.state().permissions().unwrap()[0]["name"], json!("Team"));

        // Let A's slow responses arrive
        session.drain().await;
        assert_eq!(session.in_flight(), 0);
        assert_eq!(session.state().selected_folder(), Some(&urn("B")));
        assert_eq!(
            session.state().permissions().unwrap()[0]["name"],
            json!("Team"),
            "A's late permissions should not replace B's"
        );
        assert!(session.state().subfolders().is_empty(), "A's late subfolders should not replace B's");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_clears_loading() {
        let mut session = Session::new(Arc::new(MockFolderApi::new(fixture(), 0..1)));

        session.select_folder(urn("missing"));
        session.settle().await;

        assert!(session.state().is_idle(), "Loading should be cleared after failures");
        assert!(session.state().subfolders().is_empty());
        assert!(session.state().permissions().is_none());
        assert_eq!(
            session.state().failed_sections(),
            Section::Subfolders | Section::Permissions
        );
    }

    #[tokio::test]
    async fn test_next_update_without_fetches() {
        let mut session = Session::new(Arc::new(MockFolderApi::new(fixture(), 0..1)));
        assert!(!session.next_update().await, "Nothing should be awaited when no fetch is in flight");
        session.settle().await;
        session.drain().await;
    }

    /// Lists folders normally but panics while fetching permissions
    struct PanickingApi;

    impl FolderApi for PanickingApi {
        async fn fetch_folders(&self) -> Result<Vec<Folder>, FetchError> {
            Ok(vec![Folder::new(urn("A"), "Root")])
        }

        async fn fetch_subfolders(&self, _urn: &Urn) -> Result<Vec<Folder>, FetchError> {
            Ok(Vec::new())
        }

        async fn fetch_permissions(&self, urn: &Urn) -> Result<Vec<PermissionRecord>, FetchError> {
            panic!("permissions handler crashed for {urn}");
        }
    }

    #[tokio::test]
    async fn test_panicking_fetch_is_reported_as_failure() {
        let mut session = Session::new(Arc::new(PanickingApi));
        session.mount();
        session.settle().await;
        assert_eq!(session.state().folders().len(), 1);

        session.select_folder(urn("A"));
        session.settle().await;

        assert!(session.state().is_idle(), "A panicked fetch should not leave its section loading");
        assert_eq!(session.in_flight(), 0);
        assert!(session.state().failed_sections().contains(Section::Permissions));
        assert!(!session.state().failed_sections().contains(Section::Subfolders));
        assert!(session.state().permissions().is_none());
    }
}
