use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, eyre, WrapErr};

use taskboard::board::storage::{find_board_dir, init_board_dir, FileRemote, StorageError};
use taskboard::board::{ColumnPatch, ColumnRole, NewTask, Priority, Task, TaskEdit};
use taskboard::config::{Config, ConfigError};
use taskboard::notify::{Notice, NoticeLevel};
use taskboard::remote::Remote;
use taskboard::store::BoardState;
use taskboard::{logging, Gateway, GatewayError};

#[derive(Parser)]
#[command(name = "taskboard", about = "Task board with WIP limits, trash and shared tasks")]
struct Cli {
    /// Acting user (defaults to $USER)
    #[arg(long, global = true, env = "TASKBOARD_USER")]
    user: Option<String>,

    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new .taskboard/ directory here
    Init,
    /// Add a task (to the "To Do" column unless --column is given)
    Add {
        title: String,
        /// Target column title
        #[arg(short, long)]
        column: Option<String>,
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        /// Assignees (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        assignee: Vec<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List tasks by column
    List {
        /// Only this column
        #[arg(short, long)]
        column: Option<String>,
        /// Filter by text in title or description
        #[arg(short, long)]
        search: Option<String>,
        /// Show archived tasks instead
        #[arg(long)]
        archived: bool,
    },
    /// Move a task to another column
    Move {
        /// Task id or unique prefix
        task: String,
        /// Target column title
        column: String,
        /// Position in the target column (appends by default)
        #[arg(short, long)]
        position: Option<u32>,
    },
    /// Edit task fields
    Edit {
        task: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Remove the due date
        #[arg(long, conflicts_with = "due")]
        no_due: bool,
        /// Replace assignees (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        assignee: Option<Vec<String>>,
    },
    /// Move tasks to the trash
    Delete {
        #[arg(required = true)]
        tasks: Vec<String>,
    },
    /// Restore a task from the trash
    Restore { task: String },
    /// Manage trashed tasks
    Trash {
        #[command(subcommand)]
        action: Option<TrashAction>,
    },
    /// Hide a task from its column without deleting it
    Archive { task: String },
    /// Bring an archived task back into its column
    Unarchive { task: String },
    /// List tasks from other boards assigned to you
    Assigned,
    /// Configure board settings
    Config {
        #[command(subcommand)]
        setting: ConfigSetting,
    },
}

#[derive(Subcommand)]
enum TrashAction {
    /// List trashed tasks
    List,
    /// Permanently delete tasks past the retention period
    Purge,
    /// Permanently delete everything in the trash
    Empty,
}

#[derive(Subcommand)]
enum ConfigSetting {
    /// Set WIP limit for a column
    Wip {
        /// Column title
        column: String,
        /// WIP limit (0 to remove)
        limit: u32,
    },
}

fn main() {
    // Install color_eyre for unexpected panics/errors (developer bugs).
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let cwd = match env::current_dir() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: cannot determine current directory: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, &cwd) {
        print_user_error(&e);
        std::process::exit(1);
    }
}

/// Print a user-friendly error message, with actionable hints for known error types.
fn print_user_error(error: &color_eyre::Report) {
    // Gateway errors were already printed as notices.
    if error.downcast_ref::<GatewayError>().is_some() {
        return;
    }

    if let Some(storage_err) = error.downcast_ref::<StorageError>() {
        match storage_err {
            StorageError::NotFound(_) => {
                eprintln!("error: no task board found in this directory.");
                eprintln!("  Run `taskboard init` to create one.");
            }
            StorageError::InvalidTask { path, reason } => {
                eprintln!("error: invalid task file: {}", path.display());
                eprintln!("  {reason}");
            }
            other => eprintln!("error: could not read or write board files.\n  {other}"),
        }
        return;
    }

    if let Some(config_err) = error.downcast_ref::<ConfigError>() {
        eprintln!("error: invalid configuration.");
        eprintln!("  {config_err}");
        return;
    }

    eprintln!("error: {e:#}", e = error);
}

fn run(cli: Cli, cwd: &Path) -> color_eyre::Result<()> {
    if let Command::Init = cli.command {
        return cmd_init(cwd);
    }

    let board_dir = find_board_dir(cwd)?;
    let config = match Config::locate(cli.config.as_deref(), Some(&board_dir)) {
        Some(path) => Config::load(&path).wrap_err_with(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    logging::init(config.log_filter.as_deref());
    let user = resolve_user(cli.user, &config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let remote: Arc<dyn Remote> = Arc::new(FileRemote::open(board_dir));
        let mut gw = Gateway::new(remote, config, user);
        let result = match gw.load_board().await {
            Ok(()) => execute(&mut gw, cli.command).await,
            Err(e) => Err(e.into()),
        };
        gw.shutdown().await;
        print_notices(&gw.drain_notices());
        result
    })
}

fn resolve_user(flag: Option<String>, config: &Config) -> color_eyre::Result<String> {
    flag.or_else(|| config.user_id.clone())
        .or_else(|| env::var("USER").ok())
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| eyre!("No user given. Pass --user or set TASKBOARD_USER."))
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        match notice.level {
            NoticeLevel::Info => println!("{}", notice.message),
            NoticeLevel::Warning => eprintln!("warning: {}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}

fn cmd_init(cwd: &Path) -> color_eyre::Result<()> {
    if cwd.join(taskboard::board::storage::BOARD_DIR).exists() {
        bail!("Board already exists in this directory.");
    }
    let dir = init_board_dir(cwd)?;
    Config::default().save(&dir.join("config.toml"))?;
    println!("Initialized task board in {}", dir.display());
    println!("Run `taskboard add \"Task title\"` to add tasks.");
    Ok(())
}

async fn execute(gw: &mut Gateway, command: Command) -> color_eyre::Result<()> {
    match command {
        Command::Init => bail!("Board already exists in this directory."),
        Command::Add {
            title,
            column,
            priority,
            assignee,
            due,
            description,
        } => {
            let column_id = match column {
                Some(title) => find_column(gw.state(), &title)?,
                None => gw
                    .state()
                    .column_by_role(ColumnRole::Backlog)
                    .map(|c| c.id.clone())
                    .ok_or_else(|| eyre!("No \"To Do\" column; pass --column"))?,
            };
            let task = gw
                .create_task(NewTask {
                    title,
                    description,
                    priority,
                    due_date: due,
                    column_id: Some(column_id),
                    assignees: assignee,
                })
                .await?;
            println!("Created {} ({})", short_id(&task.id), task.title);
        }
        Command::List {
            column,
            search,
            archived,
        } => {
            if let Some(query) = search {
                gw.set_search_query(query);
            }
            if archived {
                print_archived(gw.state());
            } else {
                print_columns(gw.state(), column.as_deref())?;
            }
        }
        Command::Move {
            task,
            column,
            position,
        } => {
            let task_id = find_task(gw.state(), &task)?;
            let column_id = find_column(gw.state(), &column)?;
            gw.move_task(&task_id, &column_id, position).await?;
            println!("Moved {} to {}", short_id(&task_id), column);
        }
        Command::Edit {
            task,
            title,
            description,
            priority,
            due,
            no_due,
            assignee,
        } => {
            let task_id = find_task(gw.state(), &task)?;
            let due_date = if no_due { Some(None) } else { due.map(Some) };
            gw.edit_task(
                &task_id,
                TaskEdit {
                    title,
                    description,
                    priority,
                    due_date,
                    assignees: assignee,
                },
            )
            .await?;
            println!("Updated {}", short_id(&task_id));
        }
        Command::Delete { tasks } => {
            for task in tasks {
                let task_id = find_task(gw.state(), &task)?;
                gw.delete_task(&task_id).await?;
                println!("Moved {} to trash", short_id(&task_id));
            }
        }
        Command::Restore { task } => {
            let task_id = find_task(gw.state(), &task)?;
            gw.restore_task(&task_id).await?;
            println!("Restored {}", short_id(&task_id));
        }
        Command::Trash { action } => match action.unwrap_or(TrashAction::List) {
            TrashAction::List => print_trash(gw.state()),
            TrashAction::Purge => {
                let purged = gw.purge_trash(Utc::now()).await?;
                if purged == 0 {
                    println!("Nothing to purge.");
                }
            }
            TrashAction::Empty => {
                let ids: Vec<String> = gw.state().trashed_tasks().iter().map(|t| t.id.clone()).collect();
                if ids.is_empty() {
                    println!("Trash is already empty.");
                } else {
                    gw.bulk_permanent_delete(&ids).await?;
                }
            }
        },
        Command::Archive { task } => {
            let task_id = find_task(gw.state(), &task)?;
            gw.archive_task(&task_id).await?;
            println!("Archived {}", short_id(&task_id));
        }
        Command::Unarchive { task } => {
            let task_id = find_task(gw.state(), &task)?;
            gw.unarchive_task(&task_id).await?;
            println!("Unarchived {}", short_id(&task_id));
        }
        Command::Assigned => print_assigned(gw.state()),
        Command::Config { setting } => match setting {
            ConfigSetting::Wip { column, limit } => {
                let column_id = find_column(gw.state(), &column)?;
                let wip_limit = (limit > 0).then_some(limit);
                gw.update_column(
                    &column_id,
                    ColumnPatch {
                        wip_limit: Some(wip_limit),
                        ..Default::default()
                    },
                )
                .await?;
                match wip_limit {
                    Some(limit) => println!("Set WIP limit for '{column}' to {limit}"),
                    None => println!("Removed WIP limit from '{column}'"),
                }
            }
        },
    }
    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Resolve a task id or unique id prefix, live or trashed.
fn find_task(state: &BoardState, prefix: &str) -> color_eyre::Result<String> {
    let mut matches = state
        .tasks
        .iter()
        .chain(state.trash.iter())
        .filter(|t| t.id.starts_with(prefix))
        .map(|t| t.id.as_str())
        .collect::<Vec<_>>();
    matches.sort_unstable();
    matches.dedup();
    match matches.as_slice() {
        [id] => Ok(id.to_string()),
        [] => bail!("Task '{prefix}' not found"),
        _ => bail!("Task id '{prefix}' is ambiguous ({} matches)", matches.len()),
    }
}

fn find_column(state: &BoardState, title: &str) -> color_eyre::Result<String> {
    state
        .column_by_title(title)
        .map(|c| c.id.clone())
        .ok_or_else(|| eyre!("Column '{}' not found", title))
}

fn task_line(task: &Task) -> String {
    let due = task
        .due_date
        .map(|d| format!("  due {d}"))
        .unwrap_or_default();
    let assignees = if task.assignees.is_empty() {
        String::new()
    } else {
        format!("  @{}", task.assignees.join(", @"))
    };
    format!(
        "  {}  {:<6}  {}{}{}",
        short_id(&task.id),
        task.priority.as_str(),
        task.title,
        assignees,
        due
    )
}

fn print_columns(state: &BoardState, only: Option<&str>) -> color_eyre::Result<()> {
    if let Some(title) = only {
        if state.column_by_title(title).is_none() {
            bail!("Column '{}' not found", title);
        }
    }
    for col in &state.columns {
        if only.is_some_and(|title| !col.title_matches(title)) {
            continue;
        }
        let tasks = state.column_tasks(&col.id);
        let wip = col
            .wip_limit
            .map(|limit| format!(" [WIP {}/{}]", taskboard::wip::active_count(&col.id, &state.tasks), limit))
            .unwrap_or_default();
        println!("\n{} ({}){}", col.title, tasks.len(), wip);
        println!("{}", "─".repeat(40));
        for task in tasks {
            println!("{}", task_line(task));
        }
    }
    println!();
    Ok(())
}

fn print_archived(state: &BoardState) {
    let archived = state.archived_tasks();
    if archived.is_empty() {
        println!("No archived tasks.");
        return;
    }
    println!("\nArchived ({})", archived.len());
    println!("{}", "─".repeat(40));
    for task in archived {
        println!("{}", task_line(task));
    }
    println!();
}

fn print_trash(state: &BoardState) {
    let trashed = state.trashed_tasks();
    if trashed.is_empty() {
        println!("Trash is empty.");
        return;
    }
    println!(
        "\nTrash ({} task{}):",
        trashed.len(),
        if trashed.len() == 1 { "" } else { "s" }
    );
    println!("{}", "─".repeat(60));
    for task in trashed {
        let (when, who) = task
            .tombstone
            .as_ref()
            .map(|t| (t.deleted_at.format("%Y-%m-%d %H:%M").to_string(), t.deleted_by.as_str()))
            .unwrap_or_default();
        println!("  {}  {:<30} deleted {} by {}", short_id(&task.id), task.title, when, who);
    }
    println!("\nRestore with: taskboard restore <task-id>");
    println!();
}

fn print_assigned(state: &BoardState) {
    let own = state.board_id();
    let foreign: Vec<&Task> = state
        .active_tasks()
        .filter(|t| Some(t.board_id.as_str()) != own)
        .collect();
    if foreign.is_empty() {
        println!("No tasks from other boards are assigned to you.");
        return;
    }
    for task in foreign {
        let column = state
            .column(&task.column_id)
            .map(|c| c.title.as_str())
            .unwrap_or("?");
        println!("{}  [{}, owner {}]", task_line(task), column, task.owner_id);
    }
}
