use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kb", about = concat!("kb v", env!("CARGO_PKG_VERSION"), " - a kanban board over plain folders"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Open the board in a different directory
    #[arg(short = 'C', long = "board-dir", global = true)]
    pub board_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show columns, groups and cards (default)
    Show(ShowArgs),
    /// Create a markdown card
    Add(AddArgs),
    /// Delete a card
    Rm(ItemArgs),
    /// Rename a card
    Rename(RenameArgs),
    /// Replace a card's content with stdin
    Write(ItemArgs),
    /// Move a card (reorder, regroup or cross-column)
    Mv(MvArgs),
    /// Column management
    Column(ColumnCmd),
    /// Group management
    Group(GroupCmd),
    /// Tag definitions and assignments
    Tag(TagCmd),
    /// Set or clear the extension filter
    Filter(FilterArgs),
    /// Watch the board and print changes as they happen
    Watch(WatchArgs),
    /// List or prune recently opened boards
    Recent(RecentArgs),
}

// ---------------------------------------------------------------------------
// Card commands
// ---------------------------------------------------------------------------

#[derive(Args, Default)]
pub struct ShowArgs {
    /// Only show this column (folder name)
    pub column: Option<String>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Column folder name
    pub column: String,
    /// Card title (becomes the file name)
    pub title: String,
}

#[derive(Args)]
pub struct ItemArgs {
    /// Column folder name
    pub column: String,
    /// Card file name
    pub file: String,
}

#[derive(Args)]
pub struct RenameArgs {
    /// Column folder name
    pub column: String,
    /// Card file name
    pub file: String,
    /// New title
    pub title: String,
}

#[derive(Args)]
pub struct MvArgs {
    /// Column folder name
    pub column: String,
    /// Card file name
    pub file: String,
    /// Target column (default: same column)
    #[arg(long)]
    pub to: Option<String>,
    /// Put the card in this group
    #[arg(long, conflicts_with = "ungroup")]
    pub group: Option<String>,
    /// Take the card out of its group
    #[arg(long)]
    pub ungroup: bool,
    /// Position in the target column (0-indexed)
    #[arg(long)]
    pub index: Option<usize>,
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ColumnCmd {
    #[command(subcommand)]
    pub action: ColumnAction,
}

#[derive(Subcommand)]
pub enum ColumnAction {
    /// Create a column folder
    Add(ColumnAddArgs),
    /// Rename a column (and its folder)
    Rename(ColumnRenameArgs),
    /// Delete a column folder and everything in it
    Rm(ColumnArg),
    /// Move (reorder) a column
    Mv(ColumnMvArgs),
}

#[derive(Args)]
pub struct ColumnAddArgs {
    /// Column name
    pub name: String,
}

#[derive(Args)]
pub struct ColumnRenameArgs {
    /// Column folder name
    pub column: String,
    /// New name
    pub name: String,
}

#[derive(Args)]
pub struct ColumnArg {
    /// Column folder name
    pub column: String,
}

#[derive(Args)]
pub struct ColumnMvArgs {
    /// Column folder name
    pub column: String,
    /// New position (0-indexed)
    pub position: usize,
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct GroupCmd {
    #[command(subcommand)]
    pub action: GroupAction,
}

#[derive(Subcommand)]
pub enum GroupAction {
    /// Create a group in a column
    Add(GroupAddArgs),
    /// Rename a group
    Rename(GroupRenameArgs),
    /// Delete a group (its cards become ungrouped)
    Rm(GroupArg),
    /// Move (reorder) a group within its column
    Mv(GroupMvArgs),
    /// Collapse a group
    Collapse(GroupArg),
    /// Expand a group
    Expand(GroupArg),
    /// Move a group and its cards to another column
    Move(GroupMoveArgs),
}

#[derive(Args)]
pub struct GroupAddArgs {
    /// Column folder name
    pub column: String,
    /// Group name
    pub name: String,
}

#[derive(Args)]
pub struct GroupArg {
    /// Column folder name
    pub column: String,
    /// Group name
    pub group: String,
}

#[derive(Args)]
pub struct GroupRenameArgs {
    /// Column folder name
    pub column: String,
    /// Group name
    pub group: String,
    /// New name
    pub name: String,
}

#[derive(Args)]
pub struct GroupMvArgs {
    /// Column folder name
    pub column: String,
    /// Group name
    pub group: String,
    /// New position (0-indexed)
    pub position: usize,
}

#[derive(Args)]
pub struct GroupMoveArgs {
    /// Column folder name
    pub column: String,
    /// Group name
    pub group: String,
    /// Target column
    pub to: String,
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TagCmd {
    #[command(subcommand)]
    pub action: TagAction,
}

#[derive(Subcommand)]
pub enum TagAction {
    /// List tag definitions
    List,
    /// Define a tag
    Create(TagCreateArgs),
    /// Delete a tag and all its assignments
    Rm(TagArg),
    /// Rename a tag everywhere
    Rename(TagRenameArgs),
    /// Change a tag's color
    Color(TagColorArgs),
    /// Toggle a tag on a card, or on a group with --group
    Toggle(TagToggleArgs),
}

#[derive(Args)]
pub struct TagArg {
    /// Tag name
    pub name: String,
}

#[derive(Args)]
pub struct TagCreateArgs {
    /// Tag name
    pub name: String,
    /// Color as #RRGGBB
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct TagRenameArgs {
    /// Tag name
    pub name: String,
    /// New name
    pub new_name: String,
}

#[derive(Args)]
pub struct TagColorArgs {
    /// Tag name
    pub name: String,
    /// Color as #RRGGBB
    pub color: String,
}

#[derive(Args)]
pub struct TagToggleArgs {
    /// Tag name
    pub tag: String,
    /// Column folder name
    pub column: String,
    /// Card file name
    #[arg(required_unless_present = "group")]
    pub file: Option<String>,
    /// Toggle on this group instead of a card
    #[arg(long, conflicts_with = "file")]
    pub group: Option<String>,
}

// ---------------------------------------------------------------------------
// Board settings and session commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct FilterArgs {
    /// Only show files with these extensions (repeatable)
    #[arg(long, num_args = 1..)]
    pub include: Vec<String>,
    /// Hide files with these extensions (repeatable)
    #[arg(long, num_args = 1..)]
    pub exclude: Vec<String>,
    /// Remove the filter
    #[arg(long, conflicts_with_all = ["include", "exclude"])]
    pub clear: bool,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Stop after this many seconds (default: run until interrupted)
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,
}

#[derive(Args)]
pub struct RecentArgs {
    /// Forget a board by path
    #[arg(long, value_name = "PATH")]
    pub remove: Option<String>,
}
