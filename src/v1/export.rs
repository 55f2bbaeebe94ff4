// == Std
use std::{collections::HashSet, io};

// == Internal crates
use super::{
    client::FolderApi,
    model::{FetchError, Folder, PermissionRecord},
    table::format_cell,
};
use crate::common::Urn;

// == External crates
use serde::Serialize;

/// Name of the synthetic root every folder path starts from
pub const ROOT_PATH: &str = "Root";

/// Header row of the CSV report, in column order
pub const EXPORT_HEADERS: [&str; 10] = [
    "Folder Name",
    "path",
    "URN",
    "Subject Name",
    "Email",
    "User Type",
    "Subject Status",
    "Subject Type",
    "Actions",
    "Inherit Actions",
];

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Specifies how deep to descend below the root folders, `None` means unlimited depth
    /// For example, a depth limit of 0 will only list the root folders without fetching any subfolders
    pub depth_limit: Option<u32>,
}

/// A folder found while walking the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderNode {
    pub urn: Urn,
    pub name: String,
    /// Slash separated display path, e.g. `Root/Projects/Plans`
    pub path: String,
    /// Distance from the root folder list, root folders are at depth 0
    pub depth: u32,
}

/// One permission grant of one folder, flattened for spreadsheet-style reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionExportRow {
    pub folder_name: String,
    pub path: String,
    pub urn: Urn,
    pub subject_name: String,
    pub email: String,
    pub user_type: String,
    pub subject_status: String,
    pub subject_type: String,
    pub actions: String,
    pub inherit_actions: String,
}

impl PermissionExportRow {
    fn new(node: &FolderNode, record: &PermissionRecord) -> Self {
        let field = |name: &str| record.get(name).map(format_cell).unwrap_or_default();
        PermissionExportRow {
            folder_name: node.name.clone(),
            path: node.path.clone(),
            urn: node.urn.clone(),
            subject_name: field("name"),
            email: field("email"),
            user_type: field("userType"),
            subject_status: field("subjectStatus"),
            subject_type: field("subjectType"),
            actions: field("actions"),
            inherit_actions: field("inheritActions"),
        }
    }

    fn csv_record(&self) -> [&str; 10] {
        [
            self.folder_name.as_str(),
            self.path.as_str(),
            self.urn.as_str(),
            self.subject_name.as_str(),
            self.email.as_str(),
            self.user_type.as_str(),
            self.subject_status.as_str(),
            self.subject_type.as_str(),
            self.actions.as_str(),
            self.inherit_actions.as_str(),
        ]
    }
}

/// Writes the rows as CSV, header row first
pub fn write_csv<W: io::Write>(rows: &[PermissionExportRow], writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(EXPORT_HEADERS)?;
    for row in rows {
        writer.write_record(row.csv_record())?;
    }
    writer.flush()?;
    Ok(())
}

/// Walks the folder tree depth first, starting at the root folder list, and returns every folder in pre-order.
///
/// Failing to fetch the root folder list is an error. Failing to fetch the subfolders of a node is logged and the node
/// is kept as a leaf. A urn that was already visited is not expanded a second time.
pub async fn walk_folder_tree<A: FolderApi>(api: &A, options: &WalkOptions) -> Result<Vec<FolderNode>, FetchError> {
    let roots = api.fetch_folders().await?;

    let mut nodes = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = pending_children(roots, ROOT_PATH, 0);

    while let Some(node) = stack.pop() {
        tracing::debug!(path = %node.path, urn = %node.urn, "Visiting folder");

        let expand = visited.insert(node.urn.clone()) && options.depth_limit.is_none_or(|limit| node.depth < limit);
        if expand {
            match api.fetch_subfolders(&node.urn).await {
                Ok(children) => stack.extend(pending_children(children, &node.path, node.depth + 1)),
                Err(error) => tracing::warn!(%error, path = %node.path, "Skipping subfolders"),
            }
        }

        nodes.push(node);
    }

    Ok(nodes)
}

/// Builds the nodes for a list of folders, reversed so that popping them off a stack yields the original order
fn pending_children(folders: Vec<Folder>, parent_path: &str, depth: u32) -> Vec<FolderNode> {
    folders
        .into_iter()
        .rev()
        .map(|folder| FolderNode {
            path: format!("{parent_path}/{}", folder.name()),
            name: folder.name().to_string(),
            urn: folder.urn().clone(),
            depth,
        })
        .collect()
}

/// Fetches the permissions of every node and flattens them into report rows, in node order. Nodes whose permissions
/// cannot be fetched are logged and skipped.
pub async fn export_permissions<A: FolderApi>(api: &A, nodes: &[FolderNode]) -> Vec<PermissionExportRow> {
    let mut rows = Vec::new();

    for node in nodes {
        match api.fetch_permissions(&node.urn).await {
            Ok(records) => {
                tracing::debug!(path = %node.path, count = records.len(), "Fetched permissions");
                rows.extend(records.iter().map(|record| PermissionExportRow::new(node, record)));
            }
            Err(error) => tracing::warn!(%error, path = %node.path, "Skipping permissions"),
        }
    }

    rows
}
