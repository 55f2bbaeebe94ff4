// == Std
use std::{
    error::Error,
    io::{self, Write},
    ops::Range,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

// == Internal crates
use fpv_api::{
    common::Urn,
    config::ViewerConfig,
    v1::{
        client::FolderApi,
        export::{WalkOptions, export_permissions, walk_folder_tree, write_csv},
        http_client::HttpFolderApi,
        mock_client::{MockFixture, MockFolderApi},
        model::{Folder, Section},
        session::Session,
        state::ViewState,
        table::{ColumnInference, TableSpec},
    },
};

// == External crates
use argh::FromArgs;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Latency range applied to every request served from a mock fixture
const MOCK_LATENCY_RANGE_MS: Range<u32> = 20..200;

#[derive(FromArgs)]
/// Browse folders and inspect their permission records
struct Args {
    /// backend base url, overrides FPV_BASE_URL
    #[argh(option)]
    base_url: Option<String>,
    /// per-request timeout in milliseconds, overrides FPV_TIMEOUT_MS
    #[argh(option)]
    timeout_ms: Option<u64>,
    /// serve data from a JSON fixture file instead of the backend
    #[argh(option)]
    mock: Option<PathBuf>,
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Folders(FoldersCommand),
    Subfolders(SubfoldersCommand),
    Permissions(PermissionsCommand),
    Browse(BrowseCommand),
    Export(ExportCommand),
}

#[derive(FromArgs)]
/// list the root folders
#[argh(subcommand, name = "folders")]
struct FoldersCommand {}

#[derive(FromArgs)]
/// list the subfolders of a folder
#[argh(subcommand, name = "subfolders")]
struct SubfoldersCommand {
    /// urn of the parent folder
    #[argh(positional)]
    urn: Urn,
}

#[derive(FromArgs)]
/// show the permission records of a folder as a table
#[argh(subcommand, name = "permissions")]
struct PermissionsCommand {
    /// urn of the folder or subfolder
    #[argh(positional)]
    urn: Urn,
    /// column inference, "first" (default) or "union"
    #[argh(option)]
    columns: Option<String>,
    /// comma separated list of columns to show, overrides --columns
    #[argh(option)]
    schema: Option<String>,
    /// print the table as JSON instead of text
    #[argh(switch)]
    json: bool,
}

#[derive(FromArgs)]
/// pick folders and subfolders interactively
#[argh(subcommand, name = "browse")]
struct BrowseCommand {
    /// column inference, "first" (default) or "union"
    #[argh(option)]
    columns: Option<String>,
}

#[derive(FromArgs)]
/// walk the folder tree and export every permission record
#[argh(subcommand, name = "export")]
struct ExportCommand {
    /// how many levels of subfolders to descend, unlimited if omitted
    #[argh(option)]
    depth: Option<u32>,
    /// output format, "json" (default) or "csv"
    #[argh(option, default = "ExportFormat::Json")]
    format: ExportFormat,
    /// output compact JSON instead of pretty-printed
    #[argh(switch, short = 'c')]
    compact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Json,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format '{other}', expected 'json' or 'csv'")),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env file is fine, the environment and flags still apply
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Args = argh::from_env();

    let mut config = ViewerConfig::from_env()?;
    if let Some(base_url) = args.base_url {
        config = config.with_base_url(base_url, "--base-url")?;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config = config.with_request_timeout(Some(Duration::from_millis(timeout_ms)));
    }

    match args.mock {
        Some(path) => {
            let fixture = MockFixture::load(&path).await?;
            tracing::info!(path = %path.display(), "Serving mock fixture");
            run(Arc::new(MockFolderApi::new(fixture, MOCK_LATENCY_RANGE_MS)), args.command).await
        }
        None => {
            let api = HttpFolderApi::new(&config)?;
            tracing::info!(base_url = %api.base_url(), "Using backend");
            run(Arc::new(api), args.command).await
        }
    }
}

async fn run<A: FolderApi>(api: Arc<A>, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Folders(_) => {
            print_folders(&api.fetch_folders().await?);
        }
        Command::Subfolders(cmd) => {
            print_folders(&api.fetch_subfolders(&cmd.urn).await?);
        }
        Command::Permissions(cmd) => {
            let inference = column_inference(cmd.columns.as_deref(), cmd.schema.as_deref())?;
            let records = api.fetch_permissions(&cmd.urn).await?;
            let table = TableSpec::project_with(Some(&records), &inference);
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                print!("{table}");
            }
        }
        Command::Browse(cmd) => {
            let inference = column_inference(cmd.columns.as_deref(), None)?;
            let mut session = Session::new(api);
            let input = BufReader::new(tokio::io::stdin());
            browse(&mut session, input, &mut io::stdout(), &inference).await?;
        }
        Command::Export(cmd) => {
            let nodes = walk_folder_tree(&*api, &WalkOptions { depth_limit: cmd.depth }).await?;
            tracing::info!(folders = nodes.len(), "Walked folder tree");
            let rows = export_permissions(&*api, &nodes).await;
            match cmd.format {
                ExportFormat::Csv => write_csv(&rows, io::stdout())?,
                ExportFormat::Json => {
                    if cmd.compact {
                        serde_json::to_writer(io::stdout(), &rows)?;
                    } else {
                        serde_json::to_writer_pretty(io::stdout(), &rows)?;
                    }
                    println!();
                }
            }
        }
    }

    Ok(())
}

/// A line of input in a browse session
#[derive(Debug, PartialEq, Eq)]
enum BrowseInput {
    Folder(usize),
    Subfolder(usize),
    Refresh,
    Quit,
}

fn parse_browse_input(line: &str) -> Result<BrowseInput, String> {
    let mut parts = line.split_whitespace();
    let command = parts.next();
    let index = parts.next().map(|raw| {
        raw.parse::<usize>()
            .ok()
            .filter(|index| *index > 0)
            .ok_or_else(|| format!("'{raw}' is not a list number"))
    });

    match (command, index) {
        (None, None) => Ok(BrowseInput::Refresh),
        (Some("q" | "quit"), None) => Ok(BrowseInput::Quit),
        (Some("f" | "folder"), Some(index)) => Ok(BrowseInput::Folder(index? - 1)),
        (Some("s" | "subfolder"), Some(index)) => Ok(BrowseInput::Subfolder(index? - 1)),
        _ => Err(format!("unrecognized input '{}', use 'f <n>', 's <n>' or 'q'", line.trim())),
    }
}

/// Runs an interactive browse session until the input ends or the user quits.
///
/// Input lines and fetch completions are handled as they arrive, so a new selection can be made while the previous one
/// is still loading. The view is rendered again after each of them.
async fn browse<A, R, W>(
    session: &mut Session<A>,
    input: R,
    out: &mut W,
    inference: &ColumnInference,
) -> Result<(), Box<dyn Error>>
where
    A: FolderApi,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    session.mount();
    render(out, session.state(), inference)?;

    let mut lines = input.lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_browse_input(&line) {
                    Ok(BrowseInput::Quit) => break,
                    Ok(BrowseInput::Refresh) => {}
                    Ok(BrowseInput::Folder(index)) => {
                        match session.state().folders().get(index).map(|f| f.urn().clone()) {
                            Some(urn) => session.select_folder(urn),
                            None => writeln!(out, "there is no folder {}", index + 1)?,
                        }
                    }
                    Ok(BrowseInput::Subfolder(index)) => {
                        match session.state().subfolders().get(index).map(|f| f.urn().clone()) {
                            Some(urn) => session.select_subfolder(urn),
                            None => writeln!(out, "there is no subfolder {}", index + 1)?,
                        }
                    }
                    Err(message) => writeln!(out, "{message}")?,
                }
            }
            _ = session.next_update(), if session.in_flight() > 0 => {}
        }

        render(out, session.state(), inference)?;
    }

    Ok(())
}

fn render(out: &mut impl Write, state: &ViewState, inference: &ColumnInference) -> io::Result<()> {
    writeln!(out, "== Folders")?;
    render_section(out, state, Section::Folders, state.folders(), state.selected_folder())?;

    if state.selected_folder().is_some() {
        writeln!(out, "== Subfolders")?;
        render_section(out, state, Section::Subfolders, state.subfolders(), state.selected_subfolder())?;
    }

    if let Some(node) = state.selected_node() {
        writeln!(out, "== Permissions of {node}")?;
        if state.is_loading(Section::Permissions) {
            writeln!(out, "(loading)")?;
        } else if state.failed_sections().contains(Section::Permissions) {
            writeln!(out, "failed to load permissions")?;
        } else if state.permissions().is_some() {
            write!(out, "{}", state.table(inference))?;
        }
    }

    let loading = state.loading_sections();
    if !loading.is_empty() {
        let sections = loading.iter().map(|section| section.to_string()).collect::<Vec<_>>();
        writeln!(out, "-- still loading {}", sections.join(", "))?;
    }
    writeln!(out)
}

fn render_section(
    out: &mut impl Write,
    state: &ViewState,
    section: Section,
    folders: &[Folder],
    selected: Option<&Urn>,
) -> io::Result<()> {
    if state.is_loading(section) {
        writeln!(out, "(loading)")
    } else if state.failed_sections().contains(section) {
        writeln!(out, "failed to load {section}")
    } else if folders.is_empty() {
        writeln!(out, "(none)")
    } else {
        for (i, folder) in folders.iter().enumerate() {
            let marker = if Some(folder.urn()) == selected { "*" } else { " " };
            writeln!(out, "{marker}{:>3}. {}", i + 1, folder.name())?;
        }
        Ok(())
    }
}

fn print_folders(folders: &[Folder]) {
    for folder in folders {
        println!("{}\t{}", folder.urn(), folder.name());
    }
}

fn column_inference(columns: Option<&str>, schema: Option<&str>) -> Result<ColumnInference, String> {
    if let Some(schema) = schema {
        let fields = schema
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        return Ok(ColumnInference::Schema(fields));
    }

    match columns {
        None | Some("first") => Ok(ColumnInference::FirstRecord),
        Some("union") => Ok(ColumnInference::Union),
        Some(other) => Err(format!("unknown column inference '{other}', expected 'first' or 'union'")),
    }
}
