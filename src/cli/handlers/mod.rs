use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::item_io::CONFIG_FILE_NAME;
use crate::io::{registry, settings};
use crate::model::board::FileFilter;
use crate::sync::{BoardError, Reconciler};

/// Longest single wait in `kb watch` before checking the deadline again.
const WATCH_TICK: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;
    let board_dir = match &cli.board_dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };

    match cli.command.unwrap_or(Commands::Show(ShowArgs::default())) {
        // Session commands
        Commands::Recent(args) => cmd_recent(args, json),
        Commands::Watch(args) => cmd_watch(&board_dir, args, json),

        // Read commands
        Commands::Show(args) => cmd_show(&board_dir, args, json),

        // Card commands
        Commands::Add(args) => cmd_add(&board_dir, args),
        Commands::Rm(args) => cmd_rm(&board_dir, args),
        Commands::Rename(args) => cmd_rename(&board_dir, args),
        Commands::Write(args) => cmd_write(&board_dir, args),
        Commands::Mv(args) => cmd_mv(&board_dir, args),

        // Board structure
        Commands::Column(args) => cmd_column(&board_dir, args),
        Commands::Group(args) => cmd_group(&board_dir, args),
        Commands::Tag(args) => cmd_tag(&board_dir, args, json),
        Commands::Filter(args) => cmd_filter(&board_dir, args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Open the board, remember it as recently used, and report a rebuilt config.
fn open_board(dir: &Path, watch: bool) -> Result<Reconciler, Box<dyn std::error::Error>> {
    let settings = settings::read_settings();
    let mut rec = if watch {
        Reconciler::open(dir, &settings.watcher)?
    } else {
        Reconciler::open_unwatched(dir)?
    };

    let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    registry::record_open(&rec.board().name, &canonical, settings.recent.limit);

    if rec.take_corruption_flag() {
        eprintln!(
            "warning: {} was corrupt; the original was backed up and the board was rebuilt",
            CONFIG_FILE_NAME
        );
    }
    Ok(rec)
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_show(dir: &Path, args: ShowArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let rec = open_board(dir, false)?;
    if let Some(ref column) = args.column
        && rec.column(column).is_none()
    {
        return Err(BoardError::UnknownColumn(column.clone()).into());
    }

    if json {
        let board = board_to_json(&rec, args.column.as_deref());
        println!("{}", serde_json::to_string_pretty(&board)?);
        return Ok(());
    }

    if args.column.is_none() {
        println!("{}", rec.board().name);
        println!();
    }
    let mut first = true;
    for col in rec.columns() {
        if args.column.as_ref().is_some_and(|c| *c != col.folder_name) {
            continue;
        }
        if !first {
            println!();
        }
        first = false;
        for line in format_column(&rec, col) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Card commands
// ---------------------------------------------------------------------------

fn cmd_add(dir: &Path, args: AddArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open_board(dir, false)?;
    let file = rec.create_item(&args.column, &args.title)?;
    println!("{}/{}", args.column, file);
    Ok(())
}

fn cmd_rm(dir: &Path, args: ItemArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open_board(dir, false)?;
    rec.delete_item(&args.column, &args.file)?;
    println!("Deleted: {}/{}", args.column, args.file);
    Ok(())
}

fn cmd_rename(dir: &Path, args: RenameArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open_board(dir, false)?;
    let file = rec.rename_item(&args.column, &args.file, &args.title)?;
    println!("Renamed: {}/{} -> {}", args.column, args.file, file);
    Ok(())
}

fn cmd_write(dir: &Path, args: ItemArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open_board(dir, false)?;
    let mut content = String::new();
    std::io::stdin().read_to_string(&mut content)?;
    rec.write_item_content(&args.column, &args.file, &content)?;
    Ok(())
}

fn cmd_mv(dir: &Path, args: MvArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open_board(dir, false)?;
    let target = args.to.clone().unwrap_or_else(|| args.column.clone());

    // Without --group/--ungroup a reorder within the column keeps the card's group.
    let group = match (&args.group, args.ungroup) {
        (Some(g), _) => Some(g.clone()),
        (None, true) => None,
        (None, false) if target == args.column => rec
            .column(&args.column)
            .and_then(|c| c.item(&args.file))
            .and_then(|i| i.group.clone()),
        (None, false) => None,
    };

    let outcome = rec.move_item(&args.column, &args.file, &target, group.as_deref(), args.index)?;
    if let Some(e) = &outcome.persist_error {
        eprintln!("warning: card moved, but board state was not saved: {}", e);
    }
    println!(
        "Moved: {}/{} -> {}/{}",
        args.column, args.file, target, outcome.file_name
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

fn cmd_column(dir: &Path, args: ColumnCmd) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open_board(dir, false)?;
    match args.action {
        ColumnAction::Add(a) => {
            let folder = rec.create_column(&a.name)?;
            println!("Created column: {}", folder);
        }
        ColumnAction::Rename(a) => {
            let folder = rec.rename_column(&a.column, &a.name)?;
            println!("Renamed column: {} -> {}", a.column, folder);
        }
        ColumnAction::Rm(a) => {
            rec.delete_column(&a.column)?;
            println!("Deleted column: {}", a.column);
        }
        ColumnAction::Mv(a) => {
            rec.reorder_column(&a.column, a.position)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

fn cmd_group(dir: &Path, args: GroupCmd) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open_board(dir, false)?;
    match args.action {
        GroupAction::Add(a) => {
            let name = rec.create_group(&a.column, &a.name)?;
            println!("Created group: {}", name);
        }
        GroupAction::Rename(a) => {
            let name = rec.rename_group(&a.column, &a.group, &a.name)?;
            println!("Renamed group: {} -> {}", a.group, name);
        }
        GroupAction::Rm(a) => {
            rec.delete_group(&a.column, &a.group)?;
            println!("Deleted group: {}", a.group);
        }
        GroupAction::Mv(a) => {
            let mut names: Vec<String> = rec
                .column(&a.column)
                .ok_or_else(|| BoardError::UnknownColumn(a.column.clone()))?
                .groups
                .iter()
                .map(|g| g.name.clone())
                .filter(|n| *n != a.group)
                .collect();
            if names.len() == rec.column(&a.column).map_or(0, |c| c.groups.len()) {
                return Err(BoardError::UnknownGroup {
                    column: a.column,
                    group: a.group,
                }
                .into());
            }
            let pos = a.position.min(names.len());
            names.insert(pos, a.group);
            rec.reorder_groups(&a.column, &names)?;
        }
        GroupAction::Collapse(a) => rec.set_group_collapsed(&a.column, &a.group, true)?,
        GroupAction::Expand(a) => rec.set_group_collapsed(&a.column, &a.group, false)?,
        GroupAction::Move(a) => {
            let name = rec.move_group(&a.column, &a.group, &a.to)?;
            println!("Moved group: {}/{} -> {}/{}", a.column, a.group, a.to, name);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

fn cmd_tag(dir: &Path, args: TagCmd, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open_board(dir, false)?;
    match args.action {
        TagAction::List => return cmd_tag_list(&rec, json),
        TagAction::Create(a) => {
            let tag = rec.create_tag(&a.name, a.color.as_deref())?;
            println!("Created tag: {} ({})", tag.name, tag.color);
        }
        TagAction::Rm(a) => {
            rec.delete_tag(&a.name)?;
            println!("Deleted tag: {}", a.name);
        }
        TagAction::Rename(a) => {
            let name = rec.rename_tag(&a.name, &a.new_name)?;
            println!("Renamed tag: {} -> {}", a.name, name);
        }
        TagAction::Color(a) => rec.set_tag_color(&a.name, &a.color)?,
        TagAction::Toggle(a) => {
            let (assigned, target) = match (&a.group, &a.file) {
                (Some(group), _) => (
                    rec.toggle_group_tag(&a.column, group, &a.tag)?,
                    format!("group {}/{}", a.column, group),
                ),
                (None, Some(file)) => (
                    rec.toggle_item_tag(&a.column, file, &a.tag)?,
                    format!("{}/{}", a.column, file),
                ),
                (None, None) => return Err("a card file or --group is required".into()),
            };
            let verb = if assigned { "Tagged" } else { "Untagged" };
            println!("{}: {} #{}", verb, target, a.tag);
        }
    }
    Ok(())
}

fn cmd_tag_list(rec: &Reconciler, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let uses = |name: &str| {
        rec.board().tags.as_ref().map_or(0, |t| {
            t.assignments
                .values()
                .filter(|tags| tags.iter().any(|n| n == name))
                .count()
        })
    };
    let tags: Vec<TagJson> = rec
        .tag_definitions()
        .iter()
        .map(|t| TagJson {
            name: t.name.clone(),
            color: t.color.clone(),
            uses: uses(&t.name),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
        return Ok(());
    }
    if tags.is_empty() {
        println!("No tags defined.");
        return Ok(());
    }
    let name_w = tags.iter().map(|t| t.name.len()).max().unwrap_or(0).max(4);
    for t in &tags {
        println!("  {:<width$}  {}  {}", t.name, t.color, t.uses, width = name_w);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Board settings and session commands
// ---------------------------------------------------------------------------

fn cmd_filter(dir: &Path, args: FilterArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open_board(dir, false)?;
    if args.clear {
        rec.set_file_filter(None)?;
    } else if !args.include.is_empty() || !args.exclude.is_empty() {
        rec.set_file_filter(Some(FileFilter {
            include_extensions: args.include,
            exclude_extensions: args.exclude,
        }))?;
    }

    let filter = rec.board().file_filter.clone().unwrap_or_default();
    if json {
        println!("{}", serde_json::to_string_pretty(&filter)?);
    } else if filter.is_empty() {
        println!("No filter.");
    } else if !filter.include_extensions.is_empty() {
        println!("include: {}", filter.include_extensions.join(", "));
    } else {
        println!("exclude: {}", filter.exclude_extensions.join(", "));
    }
    Ok(())
}

fn cmd_watch(dir: &Path, args: WatchArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut rec = open_board(dir, true)?;
    let deadline = args.duration.map(|s| Instant::now() + Duration::from_secs(s));
    if !json {
        eprintln!("watching {} (Ctrl-C to stop)", rec.root().display());
    }

    loop {
        let wait = match deadline {
            Some(end) => {
                let now = Instant::now();
                if now >= end {
                    break;
                }
                (end - now).min(WATCH_TICK)
            }
            None => WATCH_TICK,
        };
        for evt in rec.wait_for_events(wait) {
            if json {
                println!("{}", serde_json::to_string(&evt)?);
            } else {
                println!("{}", evt);
            }
        }
    }
    rec.stop_watching();
    Ok(())
}

fn cmd_recent(args: RecentArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = registry::recent_path();
    if let Some(board) = args.remove {
        return match registry::remove_from(&path, &board) {
            Some(entry) => {
                println!("Removed: {}", entry.name);
                Ok(())
            }
            None => Err(format!("not found: {}", board).into()),
        };
    }

    let reg = registry::read_recent_from(&path);
    if json {
        let items: Vec<RecentJson> = reg
            .boards
            .iter()
            .map(|b| RecentJson {
                name: b.name.clone(),
                path: b.path.clone(),
                last_opened: b.last_opened.to_rfc3339(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if reg.boards.is_empty() {
        println!("No recent boards.");
        return Ok(());
    }
    let name_w = reg.boards.iter().map(|b| b.name.len()).max().unwrap_or(0).max(4);
    for b in &reg.boards {
        println!(
            "  {:<width$}  {:<30}  {}",
            b.name,
            registry::abbreviate_path(&b.path),
            registry::relative_time(&b.last_opened),
            width = name_w
        );
    }
    Ok(())
}
