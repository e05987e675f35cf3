//! shellward - Undoable file operations with recycle bin and helper-process support.
//!
//! Usage:
//!   shellward copy SOURCES... --to DIR     Copy items into a folder
//!   shellward move SOURCES... --to DIR     Move items into a folder
//!   shellward delete PATHS...              Move items to the recycle bin
//!   shellward rename PATH NAME             Rename an item in place
//!   shellward restore PATHS...             Restore recycled items to where they were
//!   shellward create PATH                  Create an empty file or folder
//!   shellward list-trash                   List recycle bin contents
//!   shellward helper                       Serve helper requests on stdin/stdout

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, eyre, Context, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use shellward_core::{FileSystemStatusCode, FilesystemItemType, OpsConfig, PathWithType, StorageHistory};
use shellward_ops::ipc::{serve, HelperExecutor, ProcessConnector};
use shellward_ops::{
    ConflictResolveOption, CollisionPolicy, DialogResponse, FileOperations, FilesystemOperations,
    HeadlessDialogs, OperationContext, ReportReceiver, Reporter, ShellFilesystemOperations,
};

#[derive(Parser)]
#[command(
    name = "shellward",
    version,
    about = "Undoable copy, move, delete, rename and restore",
    long_about = "shellward performs file operations the way a file manager does: \
                  deletions go to the recycle bin, collisions are resolved by policy, \
                  refused operations are retried through a helper process, and every \
                  completed operation is printed as an undo record."
)]
struct Cli {
    /// Configuration file (defaults to <config dir>/shellward/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Allow retrying refused operations with administrator rights
    #[arg(long, global = true)]
    elevate: bool,

    /// How to resolve name collisions
    #[arg(long, global = true, value_enum, default_value = "keep-both")]
    on_conflict: ConflictChoice,

    /// Send operations to the helper process in one batch
    #[arg(long, global = true)]
    via_helper: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy items into a folder
    Copy {
        /// Items to copy
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Destination folder
        #[arg(short, long)]
        to: PathBuf,
    },

    /// Move items into a folder
    Move {
        /// Items to move
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Destination folder
        #[arg(short, long)]
        to: PathBuf,
    },

    /// Delete items, to the recycle bin unless --permanent
    Delete {
        /// Items to delete
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Skip the recycle bin
        #[arg(short, long)]
        permanent: bool,
    },

    /// Rename an item in place
    Rename {
        /// Item to rename
        path: PathBuf,

        /// New name
        name: String,
    },

    /// Restore recycled items to their original location
    Restore {
        /// Original paths of the items
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Create an empty file or folder
    Create {
        /// Path of the new item
        path: PathBuf,

        /// Create a folder instead of a file
        #[arg(short = 'd', long)]
        folder: bool,
    },

    /// List recycle bin contents
    ListTrash {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Serve helper requests on stdin/stdout
    Helper,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
enum ConflictChoice {
    /// Give the incoming item a unique name
    #[default]
    KeepBoth,
    /// Replace the existing item
    Replace,
    /// Leave the existing item alone
    Skip,
}

impl ConflictChoice {
    /// Batch option for an item whose destination is `target`.
    fn option_for(self, target: &Path) -> ConflictResolveOption {
        match self {
            Self::KeepBoth => ConflictResolveOption::GenerateNewName,
            Self::Replace => ConflictResolveOption::ReplaceExisting,
            Self::Skip if target.exists() => ConflictResolveOption::Skip,
            Self::Skip => ConflictResolveOption::None,
        }
    }

    /// Answer given when a rename collides.
    fn dialog_response(self) -> DialogResponse {
        match self {
            Self::KeepBoth => DialogResponse::Primary,
            Self::Replace => DialogResponse::Secondary,
            Self::Skip => DialogResponse::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
struct TrashEntry {
    original_path: PathBuf,
    recycle_path: PathBuf,
    deleted_at: Option<String>,
    item_type: FilesystemItemType,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    if let Command::Helper = cli.command {
        return run_helper(config).await;
    }

    let dialogs = Arc::new(HeadlessDialogs::new(
        cli.elevate,
        Some(cli.on_conflict.dialog_response()),
    ));
    let helper = ProcessConnector::new(
        config.helper_command.clone(),
        config.elevated_helper_command.clone(),
    );
    let context = OperationContext::new(config)
        .with_dialogs(dialogs.clone())
        .with_helper(Arc::new(helper));
    let ops: Arc<dyn FileOperations> = if cli.via_helper {
        Arc::new(ShellFilesystemOperations::new(context.clone()))
    } else {
        Arc::new(FilesystemOperations::new(context.clone()))
    };

    let result = run_command(cli.command, cli.on_conflict, &context, ops.as_ref()).await;

    for notice in dialogs.notices() {
        eprintln!("{}: {}", notice.title(), notice.message());
    }
    result
}

async fn run_command(
    command: Command,
    on_conflict: ConflictChoice,
    context: &OperationContext,
    ops: &dyn FileOperations,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let (reporter, receiver) = Reporter::channel();
    let ReportReceiver { progress, mut status } = receiver;
    let printer = print_progress(progress);

    let history = match command {
        Command::Copy { sources, to } => {
            let (items, targets, options) = plan_transfer(&sources, &to, on_conflict)?;
            ops.copy_items(&items, &targets, &options, &reporter, &cancel)
                .await
        }
        Command::Move { sources, to } => {
            let (items, targets, options) = plan_transfer(&sources, &to, on_conflict)?;
            ops.move_items(&items, &targets, &options, &reporter, &cancel)
                .await
        }
        Command::Delete { paths, permanent } => {
            let items = resolve_all(&paths)?;
            ops.delete_items(&items, permanent, &reporter, &cancel)
                .await
        }
        Command::Rename { path, name } => {
            let item = PathWithType::resolve(&path)?;
            ops.rename(&item, &name, CollisionPolicy::FailIfExists, &reporter, &cancel)
                .await
        }
        Command::Restore { paths } => {
            let mut histories = Vec::with_capacity(paths.len());
            for path in &paths {
                let entry = find_recycled(context, path)?;
                histories.push(Some(
                    ops.restore_from_trash(&entry, path, &reporter, &cancel)
                        .await,
                ));
            }
            StorageHistory::merge(histories)
        }
        Command::Create { path, folder } => {
            let item_type = if folder {
                FilesystemItemType::Directory
            } else {
                FilesystemItemType::File
            };
            let (history, _) = ops
                .create(&PathWithType::new(path, item_type), &reporter, &cancel)
                .await;
            history
        }
        Command::ListTrash { format } => {
            printer.abort();
            return list_trash(context, format);
        }
        Command::Helper => {
            printer.abort();
            bail!("The helper serves requests on its own and takes no operation context");
        }
    };

    drop(reporter);
    printer.abort();
    eprintln!();

    let mut last = None;
    while let Ok(code) = status.try_recv() {
        last = Some(code);
    }
    let status = last.unwrap_or(FileSystemStatusCode::Generic);

    match &history {
        Some(history) => {
            println!("{}", history.description());
            println!("{}", serde_json::to_string_pretty(history)?);
        }
        None => println!("Nothing to undo"),
    }

    if status.is_failure() {
        bail!("Operation finished with status: {status}");
    }
    Ok(())
}

/// Load configuration from `path`, the default location, or defaults.
fn load_config(path: Option<&Path>) -> Result<OpsConfig> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => dirs::config_dir()
            .map(|dir| dir.join("shellward").join("config.toml"))
            .filter(|path| path.exists()),
    };

    let Some(path) = path else {
        debug!(target: "shellward", "No configuration file, using defaults");
        return Ok(OpsConfig::default());
    };

    let content = fs::read_to_string(&path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).wrap_err_with(|| format!("Invalid configuration in {}", path.display()))
}

async fn run_helper(config: OpsConfig) -> Result<()> {
    let max_depth = config.max_depth;
    let (alternate_streams_visible, max_name_length) = (config.alternate_streams_visible, config.max_name_length);
    let recycle_bin = OperationContext::new(config).recycle_bin;
    let executor = Arc::new(
        HelperExecutor::new(max_depth, recycle_bin).with_name_rules(alternate_streams_visible, max_name_length),
    );

    serve(tokio::io::stdin(), tokio::io::stdout(), executor)
        .await
        .context("Helper channel failed")
}

fn print_progress(mut progress: tokio::sync::mpsc::UnboundedReceiver<f32>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(value) = progress.recv().await {
            eprint!("\r{value:>5.1}%");
        }
    })
}

fn resolve_all(paths: &[PathBuf]) -> Result<Vec<PathWithType>> {
    paths
        .iter()
        .map(|path| PathWithType::resolve(path).wrap_err_with(|| format!("Cannot use {}", path.display())))
        .collect()
}

type TransferPlan = (Vec<PathWithType>, Vec<PathBuf>, Vec<ConflictResolveOption>);

/// Items, full destination paths and collision options for a transfer into `folder`.
fn plan_transfer(sources: &[PathBuf], folder: &Path, on_conflict: ConflictChoice) -> Result<TransferPlan> {
    let items = resolve_all(sources)?;
    let mut targets = Vec::with_capacity(items.len());
    let mut options = Vec::with_capacity(items.len());

    for item in &items {
        let name = item
            .path
            .file_name()
            .ok_or_else(|| eyre!("{} has no file name", item.path.display()))?;
        let target = folder.join(name);
        options.push(on_conflict.option_for(&target));
        targets.push(target);
    }

    Ok((items, targets, options))
}

/// The newest recycle bin entry deleted from `original`.
fn find_recycled(context: &OperationContext, original: &Path) -> Result<PathWithType> {
    context
        .recycle_bin
        .enumerate()?
        .into_iter()
        .filter(|item| item.matches_original(original))
        .max_by_key(|item| item.deleted_at)
        .map(|item| item.to_path_with_type())
        .ok_or_else(|| eyre!("{} is not in the recycle bin", original.display()))
}

fn list_trash(context: &OperationContext, format: OutputFormat) -> Result<()> {
    let items = context.recycle_bin.enumerate()?;

    match format {
        OutputFormat::Text => {
            if items.is_empty() {
                println!("Recycle bin is empty");
            }
            for item in &items {
                let deleted = item
                    .deleted_at
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{deleted:<16}  {:<9}  {}",
                    item.item_type.to_string(),
                    item.original_path.display()
                );
            }
        }
        OutputFormat::Json => {
            let entries: Vec<TrashEntry> = items
                .into_iter()
                .map(|item| TrashEntry {
                    original_path: item.original_path,
                    recycle_path: item.recycle_path,
                    deleted_at: item.deleted_at.map(|d| d.to_rfc3339()),
                    item_type: item.item_type,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}
